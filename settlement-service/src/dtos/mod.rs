use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::quarantine::ReviewAction;
use crate::models::recurring::Frequency;
use crate::models::transaction::Transaction;
use crate::services::phone::Network;

#[derive(Debug, Deserialize, Validate)]
pub struct CardPaymentRequest {
    #[validate(length(min = 1, message = "order_id is required"))]
    pub order_id: String,
    pub amount: Decimal,
    #[validate(length(min = 1, message = "card_number is required"))]
    pub card_number: String,
    /// MM/YY.
    #[validate(length(min = 1, message = "expiry is required"))]
    pub expiry: String,
    #[validate(length(min = 1, message = "cvv is required"))]
    pub cvv: String,
    #[validate(length(min = 1, message = "holder_name is required"))]
    pub holder_name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct WalletPaymentRequest {
    #[validate(length(min = 1, message = "order_id is required"))]
    pub order_id: String,
    pub amount: Decimal,
    /// Gateway name: jazzcash, easypaisa, upaisa, sadapay or wallet.
    #[validate(length(min = 1, message = "gateway is required"))]
    pub gateway: String,
    #[validate(length(min = 1, message = "phone_number is required"))]
    pub phone_number: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub approved: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct WalletMovementRequest {
    pub amount: Decimal,
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PhoneQuery {
    pub number: String,
}

#[derive(Debug, Deserialize)]
pub struct SignedUrlParams {
    pub expires: i64,
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct PhoneValidationResponse {
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized: Option<String>,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,
}

#[derive(Debug, Serialize)]
pub struct PaymentListResponse {
    pub payments: Vec<Transaction>,
    pub total: usize,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ReviewProofRequest {
    pub approved: bool,
}

#[derive(Debug, Deserialize)]
pub struct QuarantineReviewRequest {
    pub action: ReviewAction,
}

#[derive(Debug, Deserialize)]
pub struct BulkQuarantineReviewRequest {
    pub ids: Vec<i64>,
    pub action: ReviewAction,
}

#[derive(Debug, Deserialize)]
pub struct CleanupRequest {
    /// Override for the cleanup cutoff, mainly for drills. Defaults to now.
    pub as_of: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub expired_proofs: usize,
    pub purged_quarantine: usize,
}

#[derive(Debug, Deserialize)]
pub struct AuditQueryParams {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub actor: Option<String>,
    pub file_name: Option<String>,
    pub order_id: Option<String>,
    pub action: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    /// json or csv. Defaults to json.
    pub format: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub actor: Option<String>,
    pub file_name: Option<String>,
    pub order_id: Option<String>,
    pub action: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateVendorRequest {
    #[validate(length(min = 1, max = 120, message = "name must be 1-120 characters"))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRecurringRequest {
    pub vendor_id: i64,
    pub amount: Decimal,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_auto_retry")]
    pub auto_retry: bool,
    #[validate(range(max = 10, message = "max_retries must be at most 10"))]
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[validate(range(
        min = 1,
        max = 168,
        message = "retry_interval_hours must be between 1 and 168"
    ))]
    #[serde(default = "default_retry_interval")]
    pub retry_interval_hours: u32,
}

fn default_auto_retry() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_interval() -> u32 {
    24
}

#[derive(Debug, Deserialize)]
pub struct ProcessDueRequest {
    /// Treat this instant as "now" when collecting due entries.
    pub as_of: Option<DateTime<Utc>>,
}
