use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::dtos::{BalanceResponse, HistoryParams, WalletMovementRequest};
use crate::error::PaymentError;
use crate::startup::AppState;

pub async fn deposit(
    State(state): State<AppState>,
    Json(request): Json<WalletMovementRequest>,
) -> Result<impl IntoResponse, PaymentError> {
    let entry = state
        .wallet
        .deposit(request.amount, request.reference)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn withdraw(
    State(state): State<AppState>,
    Json(request): Json<WalletMovementRequest>,
) -> Result<impl IntoResponse, PaymentError> {
    let entry = state
        .wallet
        .withdraw(request.amount, request.reference)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn transfer(
    State(state): State<AppState>,
    Json(request): Json<WalletMovementRequest>,
) -> Result<impl IntoResponse, PaymentError> {
    let entry = state
        .wallet
        .transfer(request.amount, request.reference)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn pay(
    State(state): State<AppState>,
    Json(request): Json<WalletMovementRequest>,
) -> Result<impl IntoResponse, PaymentError> {
    let entry = state.wallet.pay(request.amount, request.reference).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn balance(State(state): State<AppState>) -> impl IntoResponse {
    Json(BalanceResponse {
        balance: state.wallet.balance().await,
    })
}

pub async fn history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(50).min(500);
    Json(state.wallet.history(limit).await)
}
