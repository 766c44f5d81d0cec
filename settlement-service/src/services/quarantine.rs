//! Quarantine registry for files that failed a security scan.
//!
//! Infected bytes are moved into an isolated storage prefix and kept for a
//! retention window. Entries are only ever resolved through explicit admin
//! review; the registry itself never silently drops a record.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use serde::Serialize;
use uuid::Uuid;

use crate::error::PaymentError;
use crate::models::quarantine::{
    QuarantineEntry, QuarantineStatus, ReviewAction, RiskLevel, ScanReport,
};
use crate::services::audit::{AuditDraft, AuditTrail};
use crate::services::repository::QuarantineStore;
use crate::services::storage::Storage;

const RETENTION_DAYS: i64 = 30;

#[derive(Debug, Serialize)]
pub struct BulkReviewItem {
    pub id: i64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkReviewResult {
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub items: Vec<BulkReviewItem>,
}

pub struct QuarantineService {
    store: Arc<dyn QuarantineStore>,
    storage: Arc<dyn Storage>,
    audit: Arc<AuditTrail>,
}

impl QuarantineService {
    pub fn new(
        store: Arc<dyn QuarantineStore>,
        storage: Arc<dyn Storage>,
        audit: Arc<AuditTrail>,
    ) -> Self {
        Self {
            store,
            storage,
            audit,
        }
    }

    /// Isolate infected bytes and register the quarantine entry.
    ///
    /// The entry and its audit record are persisted before the caller sees
    /// any error from the surrounding upload flow.
    pub async fn quarantine_bytes(
        &self,
        original_file_name: &str,
        data: Vec<u8>,
        report: &ScanReport,
    ) -> Result<QuarantineEntry, PaymentError> {
        let storage_key = format!("quarantine/{}", Uuid::new_v4());
        self.storage.upload(&storage_key, data).await?;

        let now = Utc::now();
        let entry = self
            .store
            .insert(QuarantineEntry {
                id: 0,
                original_file_name: original_file_name.to_string(),
                threats: report.threats.clone(),
                risk_level: report.risk_level.unwrap_or(RiskLevel::Medium),
                status: QuarantineStatus::Quarantined,
                storage_key,
                quarantined_at: now,
                auto_delete_after: now + Duration::days(RETENTION_DAYS),
            })
            .await;

        self.audit
            .record(AuditDraft {
                action: "file_quarantined".to_string(),
                actor: "system".to_string(),
                subject_id: entry.id.to_string(),
                outcome: format!("threats: {}", entry.threats.join(", ")),
                file_name: Some(original_file_name.to_string()),
                order_id: None,
            })
            .await;
        counter!("quarantine_events_total", "kind" => "quarantined").increment(1);
        tracing::warn!(
            quarantine_id = entry.id,
            file_name = original_file_name,
            threats = ?entry.threats,
            "file moved to quarantine"
        );
        Ok(entry)
    }

    pub async fn get(&self, id: i64) -> Option<QuarantineEntry> {
        self.store.get(id).await
    }

    pub async fn list(&self) -> Vec<QuarantineEntry> {
        self.store.list().await
    }

    /// Apply one admin review decision. Released and deleted entries are
    /// terminal; further review attempts are state errors.
    pub async fn review(
        &self,
        id: i64,
        action: ReviewAction,
        admin_role: &str,
    ) -> Result<QuarantineEntry, PaymentError> {
        let mut entry = self
            .store
            .get(id)
            .await
            .ok_or_else(|| PaymentError::not_found("Quarantine entry"))?;
        if entry.status.is_terminal() {
            return Err(PaymentError::state(format!(
                "Quarantine entry {id} is already {}",
                entry.status.as_str()
            )));
        }

        match action {
            ReviewAction::Release => {
                entry.status = QuarantineStatus::Released;
            }
            ReviewAction::Delete => {
                // Bytes go, the entry stays for audit.
                self.storage.delete(&entry.storage_key).await?;
                entry.status = QuarantineStatus::Deleted;
            }
            ReviewAction::ExtendQuarantine => {
                entry.auto_delete_after = entry.auto_delete_after + Duration::days(RETENTION_DAYS);
                entry.status = QuarantineStatus::Extended;
            }
        }

        let entry = self
            .store
            .update(entry)
            .await
            .ok_or_else(|| PaymentError::not_found("Quarantine entry"))?;
        self.audit
            .record(AuditDraft {
                action: "quarantine_review".to_string(),
                actor: admin_role.to_string(),
                subject_id: id.to_string(),
                outcome: action.as_str().to_string(),
                file_name: Some(entry.original_file_name.clone()),
                order_id: None,
            })
            .await;
        counter!("quarantine_events_total", "kind" => action.as_str()).increment(1);
        Ok(entry)
    }

    /// Apply a review decision per id, collecting outcomes. One bad id never
    /// aborts the rest of the batch.
    pub async fn bulk_review(
        &self,
        ids: &[i64],
        action: ReviewAction,
        admin_role: &str,
    ) -> BulkReviewResult {
        let mut items = Vec::with_capacity(ids.len());
        let mut successful = 0;
        for &id in ids {
            match self.review(id, action, admin_role).await {
                Ok(_) => {
                    successful += 1;
                    items.push(BulkReviewItem {
                        id,
                        success: true,
                        error: None,
                    });
                }
                Err(err) => items.push(BulkReviewItem {
                    id,
                    success: false,
                    error: Some(err.to_string()),
                }),
            }
        }
        BulkReviewResult {
            processed: ids.len(),
            successful,
            failed: ids.len() - successful,
            items,
        }
    }

    /// Drop stored bytes for entries past their retention window and mark
    /// them deleted. Returns how many entries were purged.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, PaymentError> {
        let mut purged = 0;
        for mut entry in self.store.list().await {
            if entry.status == QuarantineStatus::Deleted || entry.auto_delete_after > now {
                continue;
            }
            self.storage.delete(&entry.storage_key).await?;
            entry.status = QuarantineStatus::Deleted;
            let id = entry.id;
            let file_name = entry.original_file_name.clone();
            self.store.update(entry).await;
            self.audit
                .record(AuditDraft {
                    action: "quarantine_purged".to_string(),
                    actor: "system".to_string(),
                    subject_id: id.to_string(),
                    outcome: "retention window elapsed".to_string(),
                    file_name: Some(file_name),
                    order_id: None,
                })
                .await;
            purged += 1;
        }
        Ok(purged)
    }
}
