//! Payment proof model.

use crate::models::quarantine::ScanReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Proof verification status.
///
/// `deleted` and expired entries are soft-deleted: the record stays for audit
/// and is never hard-removed by the normal flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofStatus {
    Uploaded,
    PendingVerification,
    Verified,
    Rejected,
    Deleted,
}

impl ProofStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProofStatus::Uploaded => "uploaded",
            ProofStatus::PendingVerification => "pending_verification",
            ProofStatus::Verified => "verified",
            ProofStatus::Rejected => "rejected",
            ProofStatus::Deleted => "deleted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProofStatus::Verified | ProofStatus::Rejected | ProofStatus::Deleted
        )
    }
}

/// Quarantine state of the proof object itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuarantineState {
    Clean,
    Quarantined,
}

/// An uploaded settlement proof accepted by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentProof {
    pub id: i64,
    /// Generated, collision-resistant: `{order_id}_{user_id}_{millis}_{rand}.{ext}`.
    pub file_name: String,
    pub original_name: String,
    pub mime_type: String,
    pub file_size: i64,
    /// Hex SHA-256 of the stored bytes.
    pub checksum: String,
    pub order_id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    pub status: ProofStatus,
    pub quarantine_status: QuarantineState,
    pub storage_key: String,
    pub thumbnail_key: String,
    pub uploaded_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_result: Option<ScanReport>,
}
