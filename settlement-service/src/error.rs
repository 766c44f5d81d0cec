use axum::response::{IntoResponse, Response};
use rust_decimal::Decimal;
use service_core::error::AppError;

use crate::models::transaction::DeclineCategory;

/// Domain errors for payment, proof and scheduling operations.
///
/// Every variant maps onto one HTTP status via `AppError`, so handlers can
/// bubble these with `?` and get a consistent JSON error body.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("{message}")]
    Validation { message: String },

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        available: Decimal,
        requested: Decimal,
    },

    #[error("Card declined: {code}")]
    CardDeclined { code: String },

    #[error("{message}")]
    Gateway {
        code: String,
        message: String,
        category: DeclineCategory,
        retryable: bool,
    },

    #[error("{message}")]
    Security {
        message: String,
        quarantine_id: Option<i64>,
    },

    #[error("{message}")]
    Authorization { message: String },

    #[error("{entity} not found")]
    NotFound { entity: String },

    #[error("{message}")]
    State { message: String },

    #[error("{message}")]
    Integrity { message: String },

    #[error("{what} has expired")]
    Expired { what: String },

    #[error(transparent)]
    Infra(#[from] AppError),
}

impl PaymentError {
    pub fn validation(message: impl Into<String>) -> Self {
        PaymentError::Validation {
            message: message.into(),
        }
    }

    pub fn state(message: impl Into<String>) -> Self {
        PaymentError::State {
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        PaymentError::NotFound {
            entity: entity.into(),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Validation { message } => {
                AppError::BadRequest(anyhow::anyhow!(message))
            }
            PaymentError::InvalidAmount => {
                AppError::BadRequest(anyhow::anyhow!("Amount must be greater than zero"))
            }
            PaymentError::InsufficientBalance {
                available,
                requested,
            } => AppError::Unprocessable(anyhow::anyhow!(
                "Insufficient balance: available {available}, requested {requested}"
            )),
            PaymentError::CardDeclined { code } => {
                AppError::PaymentRequired(anyhow::anyhow!("Card declined: {code}"))
            }
            PaymentError::Gateway { code, message, .. } => {
                AppError::BadGateway(format!("{code}: {message}"))
            }
            // Scan detail stays in the audit trail and quarantine record;
            // callers only learn the file was refused.
            PaymentError::Security { .. } => {
                AppError::Forbidden(anyhow::anyhow!("File failed security scan"))
            }
            PaymentError::Authorization { message } => {
                AppError::Forbidden(anyhow::anyhow!(message))
            }
            PaymentError::NotFound { entity } => {
                AppError::NotFound(anyhow::anyhow!("{entity} not found"))
            }
            PaymentError::State { message } => AppError::Conflict(anyhow::anyhow!(message)),
            PaymentError::Integrity { message } => AppError::Conflict(anyhow::anyhow!(message)),
            PaymentError::Expired { what } => AppError::Gone(anyhow::anyhow!("{what} has expired")),
            PaymentError::Infra(inner) => inner,
        }
    }
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}
