use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One append-only audit record. Entries are never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    /// Role or system identity that performed the action.
    pub actor: String,
    pub subject_id: String,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}
