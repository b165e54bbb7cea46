//! ViaCEP postal-code lookup.

use pratas_common::address::{PartialAddress, PostalCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::adapters::AddressLookup;
use crate::error::LookupError;

pub const DEFAULT_VIACEP_URL: &str = "https://viacep.com.br/ws";

/// Raw ViaCEP answer. Unknown codes come back as `{"erro": true}`
/// (older deployments send the string `"true"`).
#[derive(Debug, Deserialize)]
struct ViaCepResponse {
    #[serde(default)]
    logradouro: String,
    #[serde(default)]
    localidade: String,
    #[serde(default)]
    uf: String,
    #[serde(default)]
    erro: Option<Value>,
}

impl ViaCepResponse {
    fn is_miss(&self) -> bool {
        match &self.erro {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    fn into_address(self) -> Option<PartialAddress> {
        if self.is_miss() {
            return None;
        }
        Some(PartialAddress {
            street: self.logradouro,
            city: self.localidade,
            region: self.uf,
        })
    }
}

#[derive(Clone)]
pub struct ViaCepClient {
    http: reqwest::Client,
    base_url: String,
}

impl ViaCepClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, postal_code: &PostalCode) -> String {
        format!("{}/{}/json/", self.base_url, postal_code.digits())
    }
}

impl AddressLookup for ViaCepClient {
    async fn lookup(&self, postal_code: &PostalCode) -> Result<Option<PartialAddress>, LookupError> {
        let url = self.url(postal_code);
        debug!(%postal_code, "looking up address");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%postal_code, status = status.as_u16(), "address lookup rejected");
            return Err(LookupError::Status(status.as_u16()));
        }

        let body: ViaCepResponse = response
            .json()
            .await
            .map_err(|e| LookupError::Decode(e.to_string()))?;
        let found = body.into_address();
        if found.is_none() {
            debug!(%postal_code, "postal code unknown to lookup service");
        }
        Ok(found)
    }
}
