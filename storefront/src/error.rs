use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pratas_common::product::ProductId;
use pratas_common::quote::{QuoteError, QuoteErrorKind};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::admin::AdminError;
use crate::checkout::SubmitError;
use crate::orders::PlaceOrderError;

/// Failures of the hosted backend (or the in-memory stand-in).
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("insufficient stock for product {product}: have {available}, need {requested}")]
    InsufficientStock {
        product: ProductId,
        available: u32,
        requested: u32,
    },

    #[error("concurrent update kept conflicting on {0}")]
    Conflict(String),

    #[error("{0} already exists")]
    Duplicate(String),

    #[error("backend returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("backend request failed: {0}")]
    Transport(String),

    #[error("backend response undecodable: {0}")]
    Decode(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the postal-code lookup service.
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    #[error("postal lookup request failed: {0}")]
    Transport(String),

    #[error("postal lookup returned HTTP {0}")]
    Status(u16),

    #[error("postal lookup response undecodable: {0}")]
    Decode(String),
}

/// Error returned by HTTP handlers, rendered as `{"error": "..."}`.
///
/// The body carries only text safe for shoppers; details are logged.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("missing or invalid admin token")]
    Unauthorized,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Quote(#[from] QuoteError),

    #[error(transparent)]
    Checkout(#[from] SubmitError),

    #[error(transparent)]
    Admin(#[from] AdminError),

    #[error("background task failed: {0}")]
    Task(String),
}

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::InsufficientStock { .. }
        | StoreError::Conflict(_)
        | StoreError::Duplicate(_) => StatusCode::CONFLICT,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Store(e) => store_status(e),
            ApiError::Lookup(_) => StatusCode::BAD_GATEWAY,
            ApiError::Quote(e) => match e.kind {
                QuoteErrorKind::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::BAD_GATEWAY,
            },
            ApiError::Checkout(SubmitError::Invalid(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Checkout(SubmitError::Failed(PlaceOrderError::Stock { source, .. })) => {
                store_status(source)
            }
            ApiError::Checkout(SubmitError::Failed(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Admin(AdminError::InvalidTransition { .. })
            | ApiError::Admin(AdminError::TrackingNotAllowed { .. }) => StatusCode::CONFLICT,
            ApiError::Admin(AdminError::EmptyTrackingCode)
            | ApiError::Admin(AdminError::MissingFields(_))
            | ApiError::Admin(AdminError::NoCarriersEnabled) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Admin(AdminError::Store(e)) => store_status(e),
            ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::Quote(e) => e.user_message(),
            ApiError::Checkout(e) => e.user_message(),
            ApiError::Lookup(_) => "Não foi possível consultar o CEP.".to_string(),
            ApiError::Store(StoreError::NotFound(what)) => format!("{what} not found"),
            ApiError::Store(_) | ApiError::Task(_) => {
                "Serviço indisponível. Tente novamente.".to_string()
            }
            ApiError::Admin(AdminError::Store(StoreError::NotFound(what))) => {
                format!("{what} not found")
            }
            ApiError::Admin(AdminError::Store(_)) => {
                "Serviço indisponível. Tente novamente.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
