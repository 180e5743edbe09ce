//! Handler for `POST /remove-background`.
//!
//! Reads the `file` field of a multipart upload into memory, runs the
//! decode/remove/encode pipeline on the blocking thread pool and returns
//! the PNG.

use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    Extension,
};
use tracing::instrument;

use crate::config::UPLOAD_FIELD_NAME;
use crate::error::AppError;
use crate::imaging;
use crate::middleware::RequestId;
use crate::state::AppState;

/// An uploaded file before decoding. Filename and content type are taken
/// from the client as-is and only used for logging.
#[derive(Debug)]
pub struct UploadedImage {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Pull the `file` field out of the multipart body. Other fields are skipped.
async fn read_upload(multipart: &mut Multipart) -> Result<UploadedImage, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD_NAME) {
            continue;
        }
        let filename = field.file_name().map(str::to_owned);
        let content_type = field.content_type().map(str::to_owned);
        let bytes = field.bytes().await?;
        return Ok(UploadedImage {
            filename,
            content_type,
            bytes,
        });
    }
    Err(AppError::MissingFile)
}

#[instrument(name = "remove_background::upload", skip_all)]
pub async fn upload(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let mut multipart = multipart?;
    let upload = read_upload(&mut multipart).await?;
    tracing::info!(
        request_id = %request_id.0,
        filename = upload.filename.as_deref().unwrap_or("<unnamed>"),
        content_type = upload.content_type.as_deref().unwrap_or("<none>"),
        bytes = upload.bytes.len(),
        "Received upload"
    );

    let remover = state.remover.clone();
    let max_dimension = state.config.remover.max_dimension;
    let span = tracing::Span::current();
    let task = tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        imaging::convert(&upload.bytes, remover.as_ref(), max_dimension)
    });

    let joined = match state.config.remover.timeout_seconds {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), task)
            .await
            .map_err(|_| AppError::Timeout(secs))?,
        None => task.await,
    };
    let converted = joined.map_err(|e| AppError::Internal(e.to_string()))??;

    tracing::info!(
        request_id = %request_id.0,
        width = converted.width,
        height = converted.height,
        png_bytes = converted.png.len(),
        "Returning processed image"
    );

    Ok(([(CONTENT_TYPE, "image/png")], converted.png).into_response())
}
