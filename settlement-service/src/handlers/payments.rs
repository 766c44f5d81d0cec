use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{
    CardPaymentRequest, PaginationParams, PaymentListResponse, PhoneQuery,
    PhoneValidationResponse, VerifyPaymentRequest, WalletPaymentRequest,
};
use crate::error::PaymentError;
use crate::services::phone;
use crate::services::transactions::CardDetails;
use crate::startup::AppState;

pub async fn charge_card(
    State(state): State<AppState>,
    Json(request): Json<CardPaymentRequest>,
) -> Result<impl IntoResponse, PaymentError> {
    request.validate().map_err(AppError::from)?;

    let details = CardDetails {
        card_number: request.card_number,
        expiry: request.expiry,
        cvv: request.cvv,
        holder_name: request.holder_name,
    };
    let transaction = state
        .ledger
        .charge_card(&details, request.amount, &request.order_id)
        .await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

/// Charge through a wallet rail. Exhausted retries come back as a 201 with a
/// failed transaction, not an error.
pub async fn charge_wallet(
    State(state): State<AppState>,
    Json(request): Json<WalletPaymentRequest>,
) -> Result<impl IntoResponse, PaymentError> {
    request.validate().map_err(AppError::from)?;

    let transaction = state
        .ledger
        .charge_wallet(
            &request.gateway,
            request.amount,
            &request.order_id,
            &request.phone_number,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

pub async fn list_payments(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(20).max(1).min(100);

    let (payments, total) = state.ledger.list(page, page_size).await;
    Json(PaymentListResponse {
        payments,
        total,
        page,
        page_size,
    })
}

pub async fn get_payment(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<impl IntoResponse, PaymentError> {
    let transaction = state.ledger.by_transaction_id(&transaction_id).await?;
    Ok(Json(transaction))
}

pub async fn payments_for_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> impl IntoResponse {
    Json(state.ledger.by_order(&order_id).await)
}

pub async fn verify_payment(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<impl IntoResponse, PaymentError> {
    let outcome = state
        .ledger
        .verify(&transaction_id, request.approved)
        .await?;
    Ok(Json(outcome))
}

pub async fn validate_phone(Query(query): Query<PhoneQuery>) -> impl IntoResponse {
    let normalized = phone::normalize(&query.number);
    let network = phone::network_of(&query.number);
    Json(PhoneValidationResponse {
        input: query.number,
        normalized,
        valid: network.is_some(),
        network,
    })
}
