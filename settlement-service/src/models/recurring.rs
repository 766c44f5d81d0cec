//! Recurring payment plan model.

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Payment cadence for a recurring plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Yearly => "yearly",
        }
    }

    /// Step a due date forward by one cadence interval.
    ///
    /// Month-based intervals are calendar-aware: stepping 2024-01-31 by one
    /// month lands on 2024-02-29, not an invalid date.
    pub fn advance_date(&self, from: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Daily => from + Duration::days(1),
            Frequency::Weekly => from + Duration::weeks(1),
            Frequency::Monthly => from + Months::new(1),
            Frequency::Quarterly => from + Months::new(3),
            Frequency::Yearly => from + Months::new(12),
        }
    }

    /// Approximate payments per calendar month, used for projection analytics.
    pub fn monthly_multiplier(&self) -> Decimal {
        match self {
            Frequency::Daily => Decimal::from(30),
            Frequency::Weekly => Decimal::new(433, 2),
            Frequency::Monthly => Decimal::ONE,
            Frequency::Quarterly => Decimal::new(33, 2),
            Frequency::Yearly => Decimal::new(83, 3),
        }
    }
}

/// Recurring plan status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurringStatus {
    Active,
    Paused,
    Cancelled,
    Completed,
    Failed,
}

impl RecurringStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurringStatus::Active => "active",
            RecurringStatus::Paused => "paused",
            RecurringStatus::Cancelled => "cancelled",
            RecurringStatus::Completed => "completed",
            RecurringStatus::Failed => "failed",
        }
    }
}

/// A standing instruction to pay a vendor on a fixed cadence.
///
/// Owned and mutated only through the scheduler; `completed` and `failed`
/// are terminal, queryable states.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringPayment {
    pub id: i64,
    pub vendor_id: i64,
    pub amount: Decimal,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// None once the plan reached a terminal state.
    pub next_payment_date: Option<NaiveDate>,
    pub status: RecurringStatus,
    pub auto_retry: bool,
    pub max_retries: u32,
    pub retry_interval_hours: u32,
    pub total_payments: u32,
    pub successful_payments: u32,
    pub failed_payments: u32,
    pub created_at: DateTime<Utc>,
}

/// Scheduled payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledStatus {
    Pending,
    Completed,
    Failed,
}

impl ScheduledStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduledStatus::Pending => "pending",
            ScheduledStatus::Completed => "completed",
            ScheduledStatus::Failed => "failed",
        }
    }
}

/// One due payment enqueued by the scheduler. At most one pending entry per
/// active plan, plus transient retry entries during dunning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledPayment {
    pub id: i64,
    pub recurring_payment_id: i64,
    pub scheduled_at: DateTime<Utc>,
    pub status: ScheduledStatus,
    pub retry_count: u32,
    pub is_retry: bool,
}
