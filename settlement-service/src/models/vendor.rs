use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A payee that recurring plans disburse to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vendor {
    pub id: i64,
    pub name: String,
    /// Cumulative amount disbursed across all plans.
    pub total_paid: Decimal,
    pub payment_count: u32,
    pub created_at: DateTime<Utc>,
}
