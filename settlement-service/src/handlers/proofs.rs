use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::dtos::SignedUrlParams;
use crate::error::PaymentError;
use crate::middleware::UserContext;
use crate::services::proofs::UploadRequest;
use crate::startup::AppState;

/// Multipart upload: a `file` part plus `order_id` and optional
/// `transaction_id` text parts.
pub async fn upload_proof(
    State(state): State<AppState>,
    user: UserContext,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, PaymentError> {
    let mut file: Option<(Vec<u8>, String, String)> = None;
    let mut order_id: Option<String> = None;
    let mut transaction_id: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let original_name = field.file_name().unwrap_or("unnamed").to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(bad_multipart)?.to_vec();
                file = Some((data, original_name, mime_type));
            }
            "order_id" => order_id = Some(field.text().await.map_err(bad_multipart)?),
            "transaction_id" => {
                transaction_id = Some(field.text().await.map_err(bad_multipart)?)
            }
            _ => {}
        }
    }

    let (data, original_name, mime_type) =
        file.ok_or_else(|| PaymentError::validation("A file part is required"))?;
    let order_id = order_id.ok_or_else(|| PaymentError::validation("order_id is required"))?;

    let proof = state
        .proofs
        .upload(UploadRequest {
            data,
            original_name,
            mime_type,
            order_id,
            user_id: user.user_id,
            transaction_id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(proof)))
}

/// Signed-URL target. Signature and expiry are re-verified on every hit.
pub async fn serve_proof_file(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
    Query(params): Query<SignedUrlParams>,
) -> Result<impl IntoResponse, PaymentError> {
    let (bytes, content_type) = state
        .access
        .serve_file(&file_name, params.expires, &params.signature)
        .await?;
    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}

fn bad_multipart(err: axum::extract::multipart::MultipartError) -> PaymentError {
    PaymentError::Infra(AppError::BadRequest(anyhow::anyhow!(
        "Failed to read multipart field: {}",
        err
    )))
}
