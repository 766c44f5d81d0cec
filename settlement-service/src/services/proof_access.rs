//! RBAC-gated, audited retrieval of proof files via short-lived signed URLs.
//!
//! `fetch` walks a fixed sequence of checks and stops at the first failure:
//! record exists and is not soft-deleted, not quarantined, not expired,
//! stored bytes match the recorded checksum, and a point-in-time re-scan
//! comes back clean. Every attempt lands in the audit trail either way.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use service_core::error::AppError;
use service_core::utils::signature::{generate_file_signature, verify_file_signature};
use sha2::{Digest, Sha256};

use crate::error::PaymentError;
use crate::models::proof::{PaymentProof, ProofStatus, QuarantineState};
use crate::services::audit::{AuditDraft, AuditTrail};
use crate::services::authorizer::{Authorizer, Capability};
use crate::services::quarantine::QuarantineService;
use crate::services::repository::ProofStore;
use crate::services::scanner::MalwareScanner;
use crate::services::storage::Storage;

/// Who is asking, carried through authorization and into the audit trail.
#[derive(Debug, Clone)]
pub struct AccessContext {
    pub role: String,
    pub session_token: Option<String>,
    pub client_ip: String,
}

/// Short-lived signed links for a proof and its thumbnail.
#[derive(Debug, Clone, Serialize)]
pub struct SignedAccessDescriptor {
    pub file_name: String,
    pub url: String,
    pub thumbnail_url: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub struct SecureProofAccessGateway {
    proofs: Arc<dyn ProofStore>,
    quarantine: Arc<QuarantineService>,
    storage: Arc<dyn Storage>,
    scanner: Arc<dyn MalwareScanner>,
    audit: Arc<AuditTrail>,
    authorizer: Authorizer,
    signing_secret: Secret<String>,
    url_ttl: Duration,
}

impl SecureProofAccessGateway {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        proofs: Arc<dyn ProofStore>,
        quarantine: Arc<QuarantineService>,
        storage: Arc<dyn Storage>,
        scanner: Arc<dyn MalwareScanner>,
        audit: Arc<AuditTrail>,
        signing_secret: Secret<String>,
        url_ttl: Duration,
    ) -> Self {
        Self {
            proofs,
            quarantine,
            storage,
            scanner,
            audit,
            authorizer: Authorizer,
            signing_secret,
            url_ttl,
        }
    }

    pub async fn fetch(
        &self,
        file_name: &str,
        ctx: &AccessContext,
    ) -> Result<SignedAccessDescriptor, PaymentError> {
        if let Err(err) = self.authorizer.authorize(
            &ctx.role,
            ctx.session_token.as_deref(),
            Capability::AccessProofs,
        ) {
            self.record_attempt(file_name, ctx, &format!("denied: {err}"))
                .await;
            return Err(err);
        }

        let proof = match self.proofs.get_by_file_name(file_name).await {
            Some(proof) if proof.status != ProofStatus::Deleted => proof,
            _ => {
                self.record_attempt(file_name, ctx, "denied: not found").await;
                return Err(PaymentError::not_found("Payment proof"));
            }
        };

        if proof.quarantine_status == QuarantineState::Quarantined {
            self.record_attempt(file_name, ctx, "denied: quarantined").await;
            return Err(PaymentError::Security {
                message: format!("Proof '{file_name}' is quarantined"),
                quarantine_id: None,
            });
        }

        let now = Utc::now();
        if now > proof.expires_at {
            self.record_attempt(file_name, ctx, "denied: expired").await;
            return Err(PaymentError::Expired {
                what: "Payment proof".to_string(),
            });
        }

        if !self.storage.exists(&proof.storage_key).await? {
            self.record_attempt(file_name, ctx, "denied: storage object missing")
                .await;
            return Err(PaymentError::not_found("Stored proof object"));
        }
        let bytes = self.storage.download(&proof.storage_key).await?;
        if hex::encode(Sha256::digest(&bytes)) != proof.checksum {
            self.record_attempt(file_name, ctx, "denied: checksum mismatch")
                .await;
            return Err(PaymentError::Integrity {
                message: format!("Stored bytes for '{file_name}' do not match the recorded checksum"),
            });
        }

        let report = self.scanner.scan(&bytes, &proof.file_name).await;
        if !report.clean {
            let entry = self.quarantine_on_rescan(proof, bytes, &report).await?;
            self.record_attempt(file_name, ctx, "denied: failed re-scan").await;
            return Err(PaymentError::Security {
                message: format!("Security scan failed: {}", report.threats.join(", ")),
                quarantine_id: Some(entry),
            });
        }

        let issued_at = now;
        let expires_at = issued_at + chrono::Duration::seconds(self.url_ttl.as_secs() as i64);
        let expires_ts = expires_at.timestamp();
        let url = self.signed_url(file_name, expires_ts)?;
        let thumbnail_url = self.signed_url(&proof.thumbnail_key, expires_ts)?;

        self.record_attempt(file_name, ctx, "granted").await;
        tracing::info!(
            file_name,
            role = %ctx.role,
            client_ip = %ctx.client_ip,
            "proof access granted"
        );
        Ok(SignedAccessDescriptor {
            file_name: file_name.to_string(),
            url,
            thumbnail_url,
            issued_at,
            expires_at,
        })
    }

    /// Serve the bytes behind a previously issued signed URL.
    pub async fn serve_file(
        &self,
        key: &str,
        expires: i64,
        signature: &str,
    ) -> Result<(Vec<u8>, &'static str), PaymentError> {
        let valid = verify_file_signature(
            self.signing_secret.expose_secret(),
            key,
            expires,
            signature,
        )
        .map_err(AppError::InternalError)?;
        if !valid {
            return Err(PaymentError::Authorization {
                message: "Invalid or tampered download link".to_string(),
            });
        }
        if Utc::now().timestamp() > expires {
            return Err(PaymentError::Expired {
                what: "Download link".to_string(),
            });
        }

        let proof = self
            .proofs
            .find_by_object_key(key)
            .await
            .ok_or_else(|| PaymentError::not_found("Payment proof"))?;
        if proof.status == ProofStatus::Deleted {
            return Err(PaymentError::not_found("Payment proof"));
        }
        if proof.quarantine_status == QuarantineState::Quarantined {
            return Err(PaymentError::Security {
                message: format!("Proof '{key}' is quarantined"),
                quarantine_id: None,
            });
        }
        if !self.storage.exists(key).await? {
            return Err(PaymentError::not_found("Stored proof object"));
        }
        let bytes = self.storage.download(key).await?;

        self.audit
            .record(AuditDraft {
                action: "proof_served".to_string(),
                actor: "signed_url".to_string(),
                subject_id: proof.id.to_string(),
                outcome: "granted".to_string(),
                file_name: Some(key.to_string()),
                order_id: Some(proof.order_id.clone()),
            })
            .await;
        Ok((bytes, content_type_for(key)))
    }

    /// Flip the proof to quarantined and isolate the bytes. Runs before the
    /// caller sees the security error.
    async fn quarantine_on_rescan(
        &self,
        mut proof: PaymentProof,
        bytes: Vec<u8>,
        report: &crate::models::quarantine::ScanReport,
    ) -> Result<i64, PaymentError> {
        proof.quarantine_status = QuarantineState::Quarantined;
        let file_name = proof.file_name.clone();
        self.proofs.update(proof).await;
        let entry = self
            .quarantine
            .quarantine_bytes(&file_name, bytes, report)
            .await?;
        Ok(entry.id)
    }

    fn signed_url(&self, key: &str, expires: i64) -> Result<String, PaymentError> {
        let signature =
            generate_file_signature(self.signing_secret.expose_secret(), key, expires)
                .map_err(AppError::InternalError)?;
        Ok(format!(
            "/proofs/file/{}?expires={}&signature={}",
            urlencoding::encode(key),
            expires,
            signature
        ))
    }

    async fn record_attempt(&self, file_name: &str, ctx: &AccessContext, outcome: &str) {
        self.audit
            .record(AuditDraft {
                action: "proof_access".to_string(),
                actor: ctx.role.clone(),
                subject_id: file_name.to_string(),
                outcome: outcome.to_string(),
                file_name: Some(file_name.to_string()),
                order_id: None,
            })
            .await;
    }
}

fn content_type_for(key: &str) -> &'static str {
    match key.rsplit_once('.').map(|(_, ext)| ext) {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}
