//! Melhor Envio shipping quotes and shipment tracking.
//!
//! The access token lives in server configuration only. Without one the
//! client reports `NotConfigured` instead of calling out.

use pratas_common::address::PostalCode;
use pratas_common::package::{DeclaredItem, PackageDescriptor};
use pratas_common::quote::{
    normalize, CarrierOffer, QuoteError, QuoteErrorKind, QuoteOutcome, QuoteRequest,
};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::adapters::{QuoteProvider, ShipmentTracker};

pub const DEFAULT_MELHOR_ENVIO_URL: &str = "https://api.melhorenvio.com.br";
const CALCULATE_PATH: &str = "/api/v2/me/shipment/calculate";
const TRACKING_PATH: &str = "/api/v2/me/shipment/tracking";

#[derive(Clone)]
pub struct MelhorEnvioClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    user_agent: String,
}

/// Error bodies look like `{"message": "Unauthenticated."}`.
#[derive(Deserialize)]
struct ProviderMessage {
    message: String,
}

/// Offers normally arrive as an array; a single object is accepted too.
#[derive(Deserialize)]
#[serde(untagged)]
enum CalculateResponse {
    Many(Vec<CarrierOffer>),
    One(Box<CarrierOffer>),
}

impl CalculateResponse {
    fn into_offers(self) -> Vec<CarrierOffer> {
        match self {
            CalculateResponse::Many(offers) => offers,
            CalculateResponse::One(offer) => vec![*offer],
        }
    }
}

fn provider_message(body: &str) -> String {
    serde_json::from_str::<ProviderMessage>(body)
        .map(|m| m.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

impl MelhorEnvioClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        token: Option<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
            user_agent: user_agent.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    fn token(&self) -> Result<&str, QuoteError> {
        self.token
            .as_deref()
            .ok_or_else(|| QuoteError::new(QuoteErrorKind::NotConfigured, "missing token"))
    }

    /// POST `body` and return the response text of a 2xx answer.
    async fn post(
        &self,
        token: &str,
        path: &str,
        body: &impl serde::Serialize,
    ) -> Result<String, QuoteError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .json(body)
            .send()
            .await
            .map_err(|e| QuoteError::new(QuoteErrorKind::Network, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| QuoteError::new(QuoteErrorKind::Network, e.to_string()))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(QuoteError::new(
                QuoteErrorKind::Unauthorized,
                provider_message(&body),
            ));
        }
        if !status.is_success() {
            return Err(QuoteError::new(
                QuoteErrorKind::Status(status.as_u16()),
                provider_message(&body),
            ));
        }
        Ok(body)
    }

    async fn calculate(&self, token: &str, request: &QuoteRequest) -> Result<QuoteOutcome, QuoteError> {
        let body = self.post(token, CALCULATE_PATH, request).await?;
        let parsed: CalculateResponse = serde_json::from_str(&body)
            .map_err(|e| QuoteError::new(QuoteErrorKind::Decode, e.to_string()))?;
        Ok(normalize(parsed.into_offers()))
    }
}

impl ShipmentTracker for MelhorEnvioClient {
    async fn track(&self, tracking_code: &str) -> Result<serde_json::Value, QuoteError> {
        let token = self.token()?;
        let body = self
            .post(token, TRACKING_PATH, &json!({ "objects": [tracking_code] }))
            .await
            .inspect_err(|e| warn!(tracking_code, error = %e, "shipment tracking failed"))?;
        serde_json::from_str(&body).map_err(|e| QuoteError::new(QuoteErrorKind::Decode, e.to_string()))
    }
}

impl QuoteProvider for MelhorEnvioClient {
    async fn quote(
        &self,
        origin: &PostalCode,
        destination: &PostalCode,
        package: &PackageDescriptor,
        items: &[DeclaredItem],
    ) -> Result<QuoteOutcome, QuoteError> {
        let token = self
            .token()
            .inspect_err(|_| warn!("shipping quote requested but no carrier token is configured"))?;

        let request = QuoteRequest::new(origin, destination, package, items);
        info!(
            from = %origin,
            to = %destination,
            weight = package.weight,
            height = package.height,
            width = package.width,
            length = package.length,
            "requesting shipping quote"
        );

        match self.calculate(token, &request).await {
            Ok(outcome) => {
                match &outcome {
                    QuoteOutcome::Options { quotes } => {
                        info!(to = %destination, options = quotes.len(), "shipping quote received")
                    }
                    QuoteOutcome::NoOptions => {
                        info!(to = %destination, "no carrier serves destination")
                    }
                }
                Ok(outcome)
            }
            Err(err) => {
                warn!(to = %destination, error = %err, "shipping quote failed");
                Err(err)
            }
        }
    }
}
