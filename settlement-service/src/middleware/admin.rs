//! Admin context extractor for the back-office surface.
//!
//! The role header is set by the frontend gateway after it has authenticated
//! the operator. Authorization decisions (which role may do what, whether a
//! session token is required) happen in the service layer, not here.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;

use crate::services::proof_access::AccessContext;

#[derive(Debug, Clone)]
pub struct AdminContext {
    pub role: String,
    pub session_token: Option<String>,
    pub client_ip: String,
}

impl AdminContext {
    pub fn access_context(&self) -> AccessContext {
        AccessContext {
            role: self.role.clone(),
            session_token: self.session_token.clone(),
            client_ip: self.client_ip.clone(),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let role = parts
            .headers
            .get("X-Admin-Role")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!("Missing X-Admin-Role header"))
            })?;

        let session_token = parts
            .headers
            .get("X-Session-Token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let client_ip = parts
            .headers
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(AdminContext {
            role,
            session_token,
            client_ip,
        })
    }
}
