//! Central role and session policy for the admin surface.
//!
//! Every RBAC decision goes through one capability table instead of
//! per-handler role comparisons, so the matrices cannot drift apart.

use crate::error::PaymentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    AccessProofs,
    ReviewQuarantine,
    ExportAudit,
}

impl Capability {
    fn allowed_roles(&self) -> &'static [&'static str] {
        match self {
            Capability::AccessProofs => &["admin", "finance_manager", "support_admin"],
            Capability::ReviewQuarantine => &["admin", "support_admin"],
            Capability::ExportAudit => &["admin", "finance_manager"],
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Capability::AccessProofs => "access proof files",
            Capability::ReviewQuarantine => "review quarantined files",
            Capability::ExportAudit => "export audit logs",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::AccessProofs => "access_proofs",
            Capability::ReviewQuarantine => "review_quarantine",
            Capability::ExportAudit => "export_audit",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Authorizer;

impl Authorizer {
    /// Check role and session for a capability.
    ///
    /// Only the `admin` superuser role may omit the session token; every use
    /// of that bypass is logged at warn level.
    pub fn authorize(
        &self,
        role: &str,
        session_token: Option<&str>,
        capability: Capability,
    ) -> Result<(), PaymentError> {
        if !capability.allowed_roles().contains(&role) {
            return Err(PaymentError::Authorization {
                message: format!(
                    "Role '{role}' is not permitted to {}",
                    capability.description()
                ),
            });
        }

        let has_token = session_token.is_some_and(|token| !token.trim().is_empty());
        if !has_token {
            if role == "admin" {
                tracing::warn!(
                    role,
                    capability = capability.as_str(),
                    "admin session-token bypass used"
                );
            } else {
                return Err(PaymentError::Authorization {
                    message: "A session token is required".to_string(),
                });
            }
        }
        Ok(())
    }
}
