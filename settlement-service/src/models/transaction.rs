//! Payment transaction model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Transaction status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Processing,
    Completed,
    Failed,
    VerificationFailed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Processing => "processing",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::VerificationFailed => "verification_failed",
        }
    }
}

/// Category of a payment failure, consulted by the retry orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclineCategory {
    Validation,
    Gateway,
    Network,
}

impl DeclineCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclineCategory::Validation => "validation",
            DeclineCategory::Gateway => "gateway",
            DeclineCategory::Network => "network",
        }
    }
}

/// Error detail attached to a failed transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionError {
    pub code: String,
    pub message: String,
    pub category: DeclineCategory,
}

/// Gateway-side detail attached to a successful transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayReceipt {
    pub gateway_transaction_id: String,
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub masked_card: Option<String>,
}

/// One payment attempt. Records are append-only: a retry creates a new
/// transaction linked through `original_transaction_id`, it never rewrites
/// the failed attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub order_id: String,
    pub amount: Decimal,
    pub payment_method: String,
    pub status: TransactionStatus,
    pub transaction_id: String,
    pub timestamp: DateTime<Utc>,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TransactionError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_response: Option<GatewayReceipt>,
}
