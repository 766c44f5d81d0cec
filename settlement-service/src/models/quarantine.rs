//! Quarantine registry model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Risk classification attached by the malware scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// Outcome of a malware scan over a file's bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub clean: bool,
    /// Threat categories detected, empty when clean.
    pub threats: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
}

impl ScanReport {
    pub fn clean() -> Self {
        Self {
            clean: true,
            threats: Vec::new(),
            risk_level: None,
        }
    }
}

/// Quarantine entry status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuarantineStatus {
    Quarantined,
    Released,
    Deleted,
    Extended,
}

impl QuarantineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuarantineStatus::Quarantined => "quarantined",
            QuarantineStatus::Released => "released",
            QuarantineStatus::Deleted => "deleted",
            QuarantineStatus::Extended => "extended",
        }
    }

    /// Released and deleted entries are final; they cannot be reviewed again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, QuarantineStatus::Released | QuarantineStatus::Deleted)
    }
}

/// Admin review action over a quarantine entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Release,
    Delete,
    ExtendQuarantine,
}

impl ReviewAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewAction::Release => "release",
            ReviewAction::Delete => "delete",
            ReviewAction::ExtendQuarantine => "extend_quarantine",
        }
    }
}

/// A file isolated after a failed security scan. The registry entry is never
/// hard-removed; `delete` purges the stored bytes only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantineEntry {
    pub id: i64,
    pub original_file_name: String,
    pub threats: Vec<String>,
    pub risk_level: RiskLevel,
    pub status: QuarantineStatus,
    /// Storage key of the isolated bytes, kept out of the proofs namespace.
    pub storage_key: String,
    pub quarantined_at: DateTime<Utc>,
    pub auto_delete_after: DateTime<Utc>,
}
