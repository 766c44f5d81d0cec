//! Settlement-proof upload pipeline.
//!
//! Each upload walks `received -> validated -> scanned -> (quarantined |
//! accepted)` in strict order. A file that fails validation never reaches
//! the scanner or storage, and a rejected upload leaves no proof record,
//! no stored bytes and no audit entry.

use std::io::Cursor;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use metrics::counter;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::PaymentError;
use crate::models::proof::{PaymentProof, ProofStatus, QuarantineState};
use crate::services::audit::{AuditDraft, AuditTrail};
use crate::services::quarantine::QuarantineService;
use crate::services::repository::ProofStore;
use crate::services::scanner::MalwareScanner;
use crate::services::storage::Storage;

pub const MIN_FILE_BYTES: usize = 1024;
pub const MAX_FILE_BYTES: usize = 5 * 1024 * 1024;
const MIN_DIMENSION: u32 = 100;
const MAX_NAME_LENGTH: usize = 255;
const MAX_IDENTIFIER_LENGTH: usize = 64;
const THUMBNAIL_EDGE: u32 = 120;

const ALLOWED_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];
const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];
const SUSPICIOUS_PATTERNS: [&str; 6] = [".exe", ".bat", ".cmd", ".scr", ".pif", ".com"];

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub data: Vec<u8>,
    pub original_name: String,
    pub mime_type: String,
    pub order_id: String,
    pub user_id: String,
    pub transaction_id: Option<String>,
}

pub struct ProofUploadPipeline {
    store: Arc<dyn ProofStore>,
    storage: Arc<dyn Storage>,
    scanner: Arc<dyn MalwareScanner>,
    quarantine: Arc<QuarantineService>,
    audit: Arc<AuditTrail>,
    ttl_days: i64,
}

impl ProofUploadPipeline {
    pub fn new(
        store: Arc<dyn ProofStore>,
        storage: Arc<dyn Storage>,
        scanner: Arc<dyn MalwareScanner>,
        quarantine: Arc<QuarantineService>,
        audit: Arc<AuditTrail>,
        ttl_days: i64,
    ) -> Self {
        Self {
            store,
            storage,
            scanner,
            quarantine,
            audit,
            ttl_days,
        }
    }

    pub async fn upload(&self, request: UploadRequest) -> Result<PaymentProof, PaymentError> {
        let (image, extension) = validate(&request)?;

        let report = self
            .scanner
            .scan(&request.data, &request.original_name)
            .await;
        if !report.clean {
            counter!("proof_uploads_total", "outcome" => "quarantined").increment(1);
            let entry = self
                .quarantine
                .quarantine_bytes(&request.original_name, request.data, &report)
                .await?;
            return Err(PaymentError::Security {
                message: format!("Security scan failed: {}", report.threats.join(", ")),
                quarantine_id: Some(entry.id),
            });
        }

        let uploaded_at = Utc::now();
        let stem = format!(
            "{}_{}_{}_{}",
            request.order_id,
            request.user_id,
            uploaded_at.timestamp_millis(),
            random_token(8)
        );
        let file_name = format!("{stem}.{extension}");
        let thumbnail_key = format!("{stem}_thumb.{extension}");

        let checksum = hex::encode(Sha256::digest(&request.data));
        let file_size = request.data.len() as i64;
        let thumbnail = encode_thumbnail(&image, &extension)?;

        self.storage.upload(&file_name, request.data).await?;
        if let Err(err) = self.storage.upload(&thumbnail_key, thumbnail).await {
            // Keep the commit all-or-nothing.
            self.storage.delete(&file_name).await?;
            return Err(err.into());
        }

        let status = if request.transaction_id.is_some() {
            ProofStatus::PendingVerification
        } else {
            ProofStatus::Uploaded
        };
        let proof = self
            .store
            .insert(PaymentProof {
                id: 0,
                file_name: file_name.clone(),
                original_name: request.original_name,
                mime_type: request.mime_type,
                file_size,
                checksum,
                order_id: request.order_id.clone(),
                user_id: request.user_id.clone(),
                transaction_id: request.transaction_id,
                status,
                quarantine_status: QuarantineState::Clean,
                storage_key: file_name.clone(),
                thumbnail_key,
                uploaded_at,
                expires_at: uploaded_at + Duration::days(self.ttl_days),
                scan_result: Some(report),
            })
            .await;

        self.audit
            .record(AuditDraft {
                action: "proof_uploaded".to_string(),
                actor: request.user_id,
                subject_id: proof.id.to_string(),
                outcome: "accepted".to_string(),
                file_name: Some(file_name),
                order_id: Some(request.order_id),
            })
            .await;
        counter!("proof_uploads_total", "outcome" => "accepted").increment(1);
        tracing::info!(
            proof_id = proof.id,
            file_name = %proof.file_name,
            order_id = %proof.order_id,
            "proof accepted"
        );
        Ok(proof)
    }

    /// Apply an admin verification decision to an accepted proof.
    pub async fn mark_reviewed(
        &self,
        file_name: &str,
        approved: bool,
        reviewer_role: &str,
    ) -> Result<PaymentProof, PaymentError> {
        let mut proof = self
            .store
            .get_by_file_name(file_name)
            .await
            .ok_or_else(|| PaymentError::not_found("Payment proof"))?;
        if proof.status.is_terminal() {
            return Err(PaymentError::state(format!(
                "Proof '{file_name}' is already {}",
                proof.status.as_str()
            )));
        }

        proof.status = if approved {
            ProofStatus::Verified
        } else {
            ProofStatus::Rejected
        };
        let proof = self
            .store
            .update(proof)
            .await
            .ok_or_else(|| PaymentError::not_found("Payment proof"))?;
        self.audit
            .record(AuditDraft {
                action: "proof_review".to_string(),
                actor: reviewer_role.to_string(),
                subject_id: proof.id.to_string(),
                outcome: proof.status.as_str().to_string(),
                file_name: Some(proof.file_name.clone()),
                order_id: Some(proof.order_id.clone()),
            })
            .await;
        Ok(proof)
    }

    pub async fn get(&self, file_name: &str) -> Option<PaymentProof> {
        self.store.get_by_file_name(file_name).await
    }

    pub async fn list(&self) -> Vec<PaymentProof> {
        self.store.list().await
    }

    /// Soft-delete proofs past their expiry. Stored bytes are removed, the
    /// records stay for audit. Returns how many proofs were expired.
    pub async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<usize, PaymentError> {
        let mut expired = 0;
        for mut proof in self.store.list().await {
            if proof.status == ProofStatus::Deleted || proof.expires_at > now {
                continue;
            }
            self.storage.delete(&proof.storage_key).await?;
            self.storage.delete(&proof.thumbnail_key).await?;
            proof.status = ProofStatus::Deleted;
            let subject_id = proof.id.to_string();
            let file_name = proof.file_name.clone();
            let order_id = proof.order_id.clone();
            self.store.update(proof).await;
            self.audit
                .record(AuditDraft {
                    action: "proof_expired".to_string(),
                    actor: "system".to_string(),
                    subject_id,
                    outcome: "soft-deleted".to_string(),
                    file_name: Some(file_name),
                    order_id: Some(order_id),
                })
                .await;
            expired += 1;
        }
        Ok(expired)
    }
}

/// Run every structural check in order, returning the decoded image for
/// thumbnail generation. Each rejection carries its own message.
fn validate(request: &UploadRequest) -> Result<(DynamicImage, String), PaymentError> {
    // Both identifiers end up in the storage key, so anything outside the
    // safe charset (path separators above all) is refused outright.
    if !is_safe_identifier(&request.order_id) {
        return Err(PaymentError::validation(
            "order_id may only contain letters, digits, '-' and '_'",
        ));
    }
    if !is_safe_identifier(&request.user_id) {
        return Err(PaymentError::validation(
            "user_id may only contain letters, digits, '-' and '_'",
        ));
    }

    if !ALLOWED_MIME_TYPES.contains(&request.mime_type.as_str()) {
        return Err(PaymentError::validation(format!(
            "File type '{}' is not supported. Allowed types: JPEG, PNG, WebP",
            request.mime_type
        )));
    }

    let extension = request
        .original_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(PaymentError::validation(format!(
            "File extension '.{extension}' is not allowed"
        )));
    }

    if request.data.len() < MIN_FILE_BYTES {
        return Err(PaymentError::validation(
            "File is too small. Minimum size is 1KB",
        ));
    }
    if request.data.len() > MAX_FILE_BYTES {
        return Err(PaymentError::validation(
            "File is too large. Maximum size is 5MB",
        ));
    }

    if request.original_name.len() > MAX_NAME_LENGTH {
        return Err(PaymentError::validation(
            "File name is too long. Maximum length is 255 characters",
        ));
    }
    let lowered = request.original_name.to_ascii_lowercase();
    if SUSPICIOUS_PATTERNS
        .iter()
        .any(|pattern| lowered.contains(pattern))
    {
        return Err(PaymentError::validation(
            "File name contains a suspicious pattern",
        ));
    }

    let image = image::load_from_memory(&request.data)
        .map_err(|_| PaymentError::validation("File is not a valid image"))?;
    let (width, height) = image.dimensions();
    if width < MIN_DIMENSION || height < MIN_DIMENSION {
        return Err(PaymentError::validation(
            "Image dimensions are too small. Minimum size is 100x100 pixels",
        ));
    }

    Ok((image, extension))
}

/// Thumbnail in the same format as the source, so a JPEG source never has to
/// round-trip through an encoder that rejects its color type.
fn encode_thumbnail(image: &DynamicImage, extension: &str) -> Result<Vec<u8>, PaymentError> {
    let format = match extension {
        "jpg" | "jpeg" => ImageOutputFormat::Jpeg(85),
        "webp" => ImageOutputFormat::WebP,
        _ => ImageOutputFormat::Png,
    };
    let thumbnail = image.thumbnail(THUMBNAIL_EDGE, THUMBNAIL_EDGE);
    let mut out = Vec::new();
    thumbnail
        .write_to(&mut Cursor::new(&mut out), format)
        .map_err(|e| {
            PaymentError::Infra(service_core::error::AppError::InternalError(
                anyhow::anyhow!("thumbnail encoding failed: {e}"),
            ))
        })?;
    Ok(out)
}

fn is_safe_identifier(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_IDENTIFIER_LENGTH
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn random_token(len: usize) -> String {
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}
