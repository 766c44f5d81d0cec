use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{CreateRecurringRequest, CreateVendorRequest, ProcessDueRequest};
use crate::error::PaymentError;
use crate::startup::AppState;

pub async fn create_vendor(
    State(state): State<AppState>,
    Json(request): Json<CreateVendorRequest>,
) -> Result<impl IntoResponse, PaymentError> {
    request.validate().map_err(AppError::from)?;
    let vendor = state.scheduler.create_vendor(&request.name).await;
    Ok((StatusCode::CREATED, Json(vendor)))
}

pub async fn list_vendors(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.scheduler.list_vendors().await)
}

pub async fn create_plan(
    State(state): State<AppState>,
    Json(request): Json<CreateRecurringRequest>,
) -> Result<impl IntoResponse, PaymentError> {
    request.validate().map_err(AppError::from)?;
    let plan = state.scheduler.create(request).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

pub async fn list_plans(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.scheduler.list().await)
}

pub async fn get_plan(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, PaymentError> {
    let plan = state
        .scheduler
        .get(id)
        .await
        .ok_or_else(|| PaymentError::not_found("Recurring payment"))?;
    Ok(Json(plan))
}

pub async fn pause_plan(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, PaymentError> {
    Ok(Json(state.scheduler.pause(id).await?))
}

pub async fn resume_plan(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, PaymentError> {
    Ok(Json(state.scheduler.resume(id).await?))
}

pub async fn cancel_plan(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, PaymentError> {
    Ok(Json(state.scheduler.cancel(id).await?))
}

/// Manual sweep, mainly for operations drills. The background processor
/// performs the same call on its interval.
pub async fn process_due(
    State(state): State<AppState>,
    Json(request): Json<ProcessDueRequest>,
) -> impl IntoResponse {
    let as_of = request.as_of.unwrap_or_else(Utc::now);
    Json(state.scheduler.process_due(as_of).await)
}

pub async fn analytics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.scheduler.analytics().await)
}
