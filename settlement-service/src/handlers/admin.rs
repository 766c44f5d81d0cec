//! Back-office surface: proof access and review, quarantine workflow,
//! audit queries and exports, lifecycle cleanup.

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use crate::dtos::{
    AuditQueryParams, BulkQuarantineReviewRequest, CleanupRequest, CleanupResponse, ExportParams,
    QuarantineReviewRequest, ReviewProofRequest,
};
use crate::error::PaymentError;
use crate::middleware::AdminContext;
use crate::services::audit::ExportFormat;
use crate::services::repository::AuditFilter;
use crate::services::Capability;
use crate::startup::AppState;

pub async fn fetch_proof(
    State(state): State<AppState>,
    ctx: AdminContext,
    Path(file_name): Path<String>,
) -> Result<impl IntoResponse, PaymentError> {
    let descriptor = state
        .access
        .fetch(&file_name, &ctx.access_context())
        .await?;
    Ok(Json(descriptor))
}

pub async fn review_proof(
    State(state): State<AppState>,
    ctx: AdminContext,
    Path(file_name): Path<String>,
    Json(request): Json<ReviewProofRequest>,
) -> Result<impl IntoResponse, PaymentError> {
    state.authorizer.authorize(
        &ctx.role,
        ctx.session_token.as_deref(),
        Capability::AccessProofs,
    )?;
    let proof = state
        .proofs
        .mark_reviewed(&file_name, request.approved, &ctx.role)
        .await?;
    Ok(Json(proof))
}

pub async fn list_quarantine(
    State(state): State<AppState>,
    ctx: AdminContext,
) -> Result<impl IntoResponse, PaymentError> {
    state.authorizer.authorize(
        &ctx.role,
        ctx.session_token.as_deref(),
        Capability::ReviewQuarantine,
    )?;
    Ok(Json(state.quarantine.list().await))
}

pub async fn review_quarantine(
    State(state): State<AppState>,
    ctx: AdminContext,
    Path(id): Path<i64>,
    Json(request): Json<QuarantineReviewRequest>,
) -> Result<impl IntoResponse, PaymentError> {
    state.authorizer.authorize(
        &ctx.role,
        ctx.session_token.as_deref(),
        Capability::ReviewQuarantine,
    )?;
    let entry = state
        .quarantine
        .review(id, request.action, &ctx.role)
        .await?;
    Ok(Json(entry))
}

/// Per-id outcomes; a failing id never aborts the rest.
pub async fn bulk_review_quarantine(
    State(state): State<AppState>,
    ctx: AdminContext,
    Json(request): Json<BulkQuarantineReviewRequest>,
) -> Result<impl IntoResponse, PaymentError> {
    state.authorizer.authorize(
        &ctx.role,
        ctx.session_token.as_deref(),
        Capability::ReviewQuarantine,
    )?;
    let result = state
        .quarantine
        .bulk_review(&request.ids, request.action, &ctx.role)
        .await;
    Ok(Json(result))
}

pub async fn query_audit(
    State(state): State<AppState>,
    ctx: AdminContext,
    Query(params): Query<AuditQueryParams>,
) -> Result<impl IntoResponse, PaymentError> {
    state.authorizer.authorize(
        &ctx.role,
        ctx.session_token.as_deref(),
        Capability::ExportAudit,
    )?;
    let filter = AuditFilter {
        from: params.from,
        to: params.to,
        actor: params.actor,
        file_name: params.file_name,
        order_id: params.order_id,
        action: params.action,
    };
    Ok(Json(state.audit.query(&filter).await))
}

pub async fn export_audit(
    State(state): State<AppState>,
    ctx: AdminContext,
    Query(params): Query<ExportParams>,
) -> Result<impl IntoResponse, PaymentError> {
    state.authorizer.authorize(
        &ctx.role,
        ctx.session_token.as_deref(),
        Capability::ExportAudit,
    )?;
    let format = match params.format.as_deref() {
        None => ExportFormat::Json,
        Some(raw) => ExportFormat::parse(raw)
            .ok_or_else(|| PaymentError::validation("format must be json or csv"))?,
    };
    let filter = AuditFilter {
        from: params.from,
        to: params.to,
        actor: params.actor,
        file_name: params.file_name,
        order_id: params.order_id,
        action: params.action,
    };
    let bundle = state.audit.export(format, &filter).await;
    Ok(([(header::CONTENT_TYPE, bundle.content_type)], bundle.body))
}

/// Soft-delete expired proofs and purge quarantine entries past retention.
pub async fn cleanup(
    State(state): State<AppState>,
    ctx: AdminContext,
    Json(request): Json<CleanupRequest>,
) -> Result<impl IntoResponse, PaymentError> {
    state.authorizer.authorize(
        &ctx.role,
        ctx.session_token.as_deref(),
        Capability::ReviewQuarantine,
    )?;
    let as_of = request.as_of.unwrap_or_else(Utc::now);
    let expired_proofs = state.proofs.cleanup_expired(as_of).await?;
    let purged_quarantine = state.quarantine.purge_expired(as_of).await?;
    Ok(Json(CleanupResponse {
        expired_proofs,
        purged_quarantine,
    }))
}
