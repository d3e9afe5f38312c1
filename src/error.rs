use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures raised while composing, rendering, or recording a certificate.
#[derive(Debug, Error)]
pub enum CertError {
    #[error("invalid color {0:?}: expected a hex RGB triple such as #1A2B3C")]
    InvalidColor(String),

    #[error("{field} font size {value} is outside {min}..={max}")]
    InvalidFontSize {
        field: &'static str,
        value: u8,
        min: u8,
        max: u8,
    },

    #[error("unsupported font family {0:?}")]
    UnsupportedFont(String),

    #[error("image could not be decoded: {0}")]
    InvalidImage(String),

    #[error("no font files found for {0}")]
    FontUnavailable(&'static str),

    #[error("PDF rendering failed: {0}")]
    Render(String),

    #[error("ledger data is corrupt: {0}")]
    DataCorruption(String),

    #[error("certificate ID {0} already exists in the ledger")]
    DuplicateIdentifier(String),

    #[error("ledger I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

impl CertError {
    /// Whether the error was caused by the caller's input rather than the server.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            CertError::InvalidColor(_)
                | CertError::InvalidFontSize { .. }
                | CertError::UnsupportedFont(_)
                | CertError::InvalidImage(_)
        )
    }
}

/// HTTP-facing error. Handlers return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Certificate(#[from] CertError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Certificate(e) if e.is_caller_error() => {
                (StatusCode::BAD_REQUEST, "INVALID_CERTIFICATE", e.to_string())
            }
            AppError::Certificate(e @ CertError::DataCorruption(_)) => {
                tracing::error!("Ledger corruption: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATA_CORRUPTION",
                    e.to_string(),
                )
            }
            AppError::Certificate(e) => {
                tracing::error!("Certificate error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CERTIFICATE_ERROR",
                    e.to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_errors_map_to_bad_request() {
        let response = AppError::from(CertError::InvalidColor("notacolor".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_ledger_errors_map_to_server_error() {
        let response =
            AppError::from(CertError::DataCorruption("line 2".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let response = AppError::NotFound("certificate ABCD1234".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_font_size_message_names_the_range() {
        let e = CertError::InvalidFontSize {
            field: "title",
            value: 50,
            min: 24,
            max: 40,
        };
        assert_eq!(e.to_string(), "title font size 50 is outside 24..=40");
    }
}
