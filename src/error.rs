//! Application error type and its HTTP rendering.
//!
//! Every failure renders as `{"detail": "..."}`. Client-side problems carry a
//! descriptive detail; server-side problems are logged in full and reported
//! with a fixed message.

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::config::UPLOAD_FIELD_NAME;
use crate::imaging::ConversionError;
use crate::remover::RemovalError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("No file uploaded in field '{}'", UPLOAD_FIELD_NAME)]
    MissingFile,

    #[error("Invalid multipart request: {0}")]
    NotMultipart(#[from] MultipartRejection),

    #[error("Invalid multipart upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Could not decode image: {0}")]
    InputDecode(#[source] image::ImageError),

    #[error("Background removal failed: {0}")]
    Processing(#[source] RemovalError),

    #[error("Failed to encode result image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Background removal timed out after {0} seconds")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ConversionError> for AppError {
    fn from(err: ConversionError) -> Self {
        match err {
            ConversionError::Decode(e) => AppError::InputDecode(e),
            ConversionError::Removal(RemovalError::TimedOut { seconds, .. }) => {
                AppError::Timeout(seconds)
            }
            ConversionError::Removal(e) => AppError::Processing(e),
            ConversionError::Encode(e) => AppError::Encode(e),
        }
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingFile | AppError::InputDecode(_) => StatusCode::BAD_REQUEST,
            AppError::NotMultipart(e) => e.status(),
            AppError::Multipart(e) => e.status(),
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Processing(_) | AppError::Encode(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to clients.
    pub fn detail(&self) -> String {
        match self {
            AppError::MissingFile | AppError::InputDecode(_) | AppError::Timeout(_) => {
                self.to_string()
            }
            AppError::NotMultipart(e) => e.body_text(),
            AppError::Multipart(e) => e.body_text(),
            AppError::Processing(_) => "Background removal failed".to_string(),
            AppError::Encode(_) => "Failed to encode result image".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Rejected upload");
        }

        (
            status,
            Json(ErrorBody {
                detail: self.detail(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_error() -> image::ImageError {
        image::load_from_memory(b"plain text").unwrap_err()
    }

    #[test]
    fn decode_failure_is_client_error_with_detail() {
        let err = AppError::InputDecode(decode_error());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.detail().starts_with("Could not decode image: "));
    }

    #[test]
    fn processing_failure_hides_internal_text() {
        let err = AppError::Processing(RemovalError::Unsupported(
            "secret model path /opt/models".to_string(),
        ));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.detail(), "Background removal failed");
        assert!(err.to_string().contains("/opt/models"));
    }

    #[test]
    fn conversion_errors_map_to_matching_variants() {
        let err: AppError = ConversionError::Decode(decode_error()).into();
        assert!(matches!(err, AppError::InputDecode(_)));

        let err: AppError =
            ConversionError::Removal(RemovalError::Unsupported("x".to_string())).into();
        assert!(matches!(err, AppError::Processing(_)));
    }

    #[test]
    fn killed_removal_process_maps_to_timeout() {
        let err: AppError = ConversionError::Removal(RemovalError::TimedOut {
            program: "rembg".to_string(),
            seconds: 3,
        })
        .into();
        assert!(matches!(err, AppError::Timeout(3)));
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn timeout_is_gateway_timeout() {
        let err = AppError::Timeout(5);
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.detail(), "Background removal timed out after 5 seconds");
    }

    #[test]
    fn missing_file_names_the_field() {
        assert_eq!(
            AppError::MissingFile.detail(),
            "No file uploaded in field 'file'"
        );
    }
}
