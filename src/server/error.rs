use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    QuotaExceeded(String),

    #[error("store error: {0}")]
    Persistence(#[from] sled::Error),

    #[error("{vendor} error: {detail}")]
    Vendor {
        vendor: &'static str,
        detail: String,
    },

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    pub fn vendor(vendor: &'static str, detail: impl Into<String>) -> Self {
        Self::Vendor {
            vendor,
            detail: detail.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::QuotaExceeded(_) => StatusCode::FORBIDDEN,
            Self::Persistence(_) | Self::Vendor { .. } | Self::NotConfigured(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "invalid_request",
            Self::Auth(_) => "unauthorized",
            Self::QuotaExceeded(_) => "quota_exceeded",
            Self::Persistence(_) | Self::Vendor { .. } | Self::NotConfigured(_) => {
                "internal_error"
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Internal details stay in the log; clients get a generic message.
        let message = if status.is_server_error() {
            log::error!("request failed: {self}");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        (
            status,
            Json(json!({ "error": { "message": message, "type": self.kind() } })),
        )
            .into_response()
    }
}
