//! Append-only audit trail with compliance export.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::models::audit::AuditEntry;
use crate::services::repository::{AuditFilter, AuditStore};

/// Fields for one audit record; timestamp and id are assigned on append.
#[derive(Debug, Clone)]
pub struct AuditDraft {
    pub action: String,
    pub actor: String,
    pub subject_id: String,
    pub outcome: String,
    pub file_name: Option<String>,
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }
}

pub struct ExportBundle {
    pub content_type: &'static str,
    pub body: String,
}

pub struct AuditTrail {
    store: Arc<dyn AuditStore>,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, draft: AuditDraft) -> AuditEntry {
        self.store
            .append(AuditEntry {
                id: 0,
                timestamp: Utc::now(),
                action: draft.action,
                actor: draft.actor,
                subject_id: draft.subject_id,
                outcome: draft.outcome,
                file_name: draft.file_name,
                order_id: draft.order_id,
            })
            .await
    }

    pub async fn query(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        self.store.query(filter).await
    }

    /// Render matching entries as a compliance bundle. Reads only.
    pub async fn export(&self, format: ExportFormat, filter: &AuditFilter) -> ExportBundle {
        let entries = self.query(filter).await;
        match format {
            ExportFormat::Json => ExportBundle {
                content_type: "application/json",
                body: json!({
                    "exported_at": Utc::now(),
                    "total": entries.len(),
                    "entries": entries,
                })
                .to_string(),
            },
            ExportFormat::Csv => {
                let mut body = String::from(
                    "id,timestamp,action,actor,subject_id,outcome,file_name,order_id\n",
                );
                for entry in &entries {
                    body.push_str(&format!(
                        "{},{},{},{},{},{},{},{}\n",
                        entry.id,
                        entry.timestamp.to_rfc3339(),
                        csv_escape(&entry.action),
                        csv_escape(&entry.actor),
                        csv_escape(&entry.subject_id),
                        csv_escape(&entry.outcome),
                        csv_escape(entry.file_name.as_deref().unwrap_or("")),
                        csv_escape(entry.order_id.as_deref().unwrap_or("")),
                    ));
                }
                ExportBundle {
                    content_type: "text/csv",
                    body,
                }
            }
        }
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::repository::InMemoryAuditStore;

    fn draft(action: &str, actor: &str) -> AuditDraft {
        AuditDraft {
            action: action.to_string(),
            actor: actor.to_string(),
            subject_id: "subject-1".to_string(),
            outcome: "granted".to_string(),
            file_name: Some("proof_1.jpg".to_string()),
            order_id: Some("order-1".to_string()),
        }
    }

    fn trail() -> AuditTrail {
        AuditTrail::new(Arc::new(InMemoryAuditStore::new()))
    }

    #[tokio::test]
    async fn query_filters_by_actor_and_action() {
        let trail = trail();
        trail.record(draft("proof_access", "admin")).await;
        trail.record(draft("proof_access", "finance_manager")).await;
        trail.record(draft("quarantine_review", "admin")).await;

        let by_actor = trail
            .query(&AuditFilter {
                actor: Some("admin".to_string()),
                ..Default::default()
            })
            .await;
        assert_eq!(by_actor.len(), 2);

        let by_both = trail
            .query(&AuditFilter {
                actor: Some("admin".to_string()),
                action: Some("quarantine_review".to_string()),
                ..Default::default()
            })
            .await;
        assert_eq!(by_both.len(), 1);
    }

    #[tokio::test]
    async fn query_filters_by_time_window() {
        let trail = trail();
        let before = Utc::now() - chrono::Duration::minutes(1);
        trail.record(draft("proof_access", "admin")).await;
        let after = Utc::now() + chrono::Duration::minutes(1);

        let inside = trail
            .query(&AuditFilter {
                from: Some(before),
                to: Some(after),
                ..Default::default()
            })
            .await;
        assert_eq!(inside.len(), 1);

        let outside = trail
            .query(&AuditFilter {
                from: Some(after),
                ..Default::default()
            })
            .await;
        assert!(outside.is_empty());
    }

    #[tokio::test]
    async fn export_reads_without_mutating() {
        let trail = trail();
        trail.record(draft("proof_access", "admin")).await;
        trail.record(draft("proof_access", "admin")).await;

        let bundle = trail.export(ExportFormat::Json, &AuditFilter::default()).await;
        assert_eq!(bundle.content_type, "application/json");
        let parsed: serde_json::Value = serde_json::from_str(&bundle.body).unwrap();
        assert_eq!(parsed["total"], 2);
        assert_eq!(parsed["entries"].as_array().unwrap().len(), 2);

        // The log is unchanged afterwards.
        assert_eq!(trail.query(&AuditFilter::default()).await.len(), 2);
    }

    #[tokio::test]
    async fn csv_export_escapes_embedded_commas_and_quotes() {
        let trail = trail();
        let mut d = draft("proof_access", "admin");
        d.outcome = "denied, token \"missing\"".to_string();
        trail.record(d).await;

        let bundle = trail.export(ExportFormat::Csv, &AuditFilter::default()).await;
        assert_eq!(bundle.content_type, "text/csv");
        let mut lines = bundle.body.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,timestamp,action,actor,subject_id,outcome,file_name,order_id"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("\"denied, token \"\"missing\"\"\""));
    }
}
