//! Customer upload handler.

use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{Field, MultipartError, MultipartRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use bytes::BytesMut;

use crate::error::{AppError, Result, ValidationError};
use crate::services::upload::{IncomingFile, UploadRequest, UploadService};
use crate::state::AppState;

/// Multipart field names that carry files.
const FILE_FIELDS: [&str; 2] = ["files", "file"];

fn multipart_error(err: &MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ValidationError::BodyTooLarge.into()
    } else {
        ValidationError::Malformed(err.body_text()).into()
    }
}

async fn text(field: Field<'_>) -> Result<String> {
    field.text().await.map_err(|e| multipart_error(&e))
}

/// Stream a file part, keeping at most `max_size` bytes of it. Larger parts
/// are drained and counted so validation can reject them by size.
async fn file(mut field: Field<'_>, max_size: u64) -> Result<IncomingFile> {
    let name = field.file_name().unwrap_or("upload").to_string();
    let declared_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    let mut buffer = BytesMut::new();
    let mut size: u64 = 0;
    while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(&e))? {
        size = size.saturating_add(chunk.len() as u64);
        if size <= max_size {
            buffer.extend_from_slice(&chunk);
        } else if !buffer.is_empty() {
            buffer = BytesMut::new();
        }
    }

    if size > max_size {
        tracing::debug!(file = %name, size, max_size, "Dropped oversized upload part");
        return Ok(IncomingFile::oversized(name, declared_type, size));
    }
    Ok(IncomingFile::new(name, declared_type, buffer.freeze()))
}

/// Collect the form into an [`UploadRequest`]. Unknown fields are ignored.
async fn read_form(mut multipart: Multipart, max_file_size: u64) -> Result<UploadRequest> {
    let mut request = UploadRequest::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&e))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "storeId" => request.store_id = Some(text(field).await?),
            "customerName" => request.customer_name = Some(text(field).await?),
            "customerPhone" => request.customer_phone = Some(text(field).await?),
            n if FILE_FIELDS.contains(&n) => {
                request.files.push(file(field, max_file_size).await?);
            }
            other => tracing::debug!(field = other, "Ignoring unknown upload field"),
        }
    }

    Ok(request)
}

/// `POST /api/upload`
pub async fn upload(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse> {
    let multipart =
        multipart.map_err(|rejection| ValidationError::Malformed(rejection.body_text()))?;
    let config = state.config();
    let request = read_form(multipart, config.upload.max_file_size).await?;

    let receipt = UploadService::new(state.backends(), &config.upload, config.order_ttl)
        .upload(request)
        .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}
