use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::directory::DirectoryError;
use crate::models::order::DeliveryStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("order already delivered")]
    AlreadyDelivered,

    #[error("invalid verification code")]
    InvalidCode,

    #[error("order is no longer available")]
    NoLongerAvailable,

    #[error("delivery status cannot change from {from} to {to}")]
    InvalidTransition {
        from: DeliveryStatus,
        to: DeliveryStatus,
    },

    #[error("storage error: {0}")]
    Storage(#[from] DirectoryError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable reason code. Callers react differently to
    /// "already delivered" (stop retrying) than to "no longer available"
    /// (refresh the offer), so the code must survive message rewording.
    pub fn reason(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::AlreadyDelivered => "already_delivered",
            AppError::InvalidCode => "invalid_code",
            AppError::NoLongerAvailable => "no_longer_available",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::Storage(_) => "storage",
            AppError::Internal(_) => "internal",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyDelivered
            | AppError::InvalidCode
            | AppError::NoLongerAvailable
            | AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.to_string(),
            "reason": self.reason(),
        }));

        (self.status_code(), body).into_response()
    }
}
