//! Error handling for the barricade server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Body message for every non-validation failure. Details stay in the logs.
pub const GENERIC_ERROR_MESSAGE: &str = "Invalid input or internal error";

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Validation error (required field missing)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Parse error (malformed body, numeric field)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Image payload could not be decoded
    #[error("Image decode error: {0}")]
    Decode(#[from] image::ImageError),

    /// Detection model failure
    #[error("Detection error: {0}")]
    Detection(String),

    /// External call exceeded its deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Config error
    #[error("Config error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    fn error_code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Parse(_) => "PARSE_ERROR",
            Error::Decode(_) => "DECODE_ERROR",
            Error::Detection(_) => "DETECTION_ERROR",
            Error::Timeout(_) => "TIMEOUT",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::Http(_) => "HTTP_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let error_code = self.error_code();
        let (status, message) = match &self {
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                GENERIC_ERROR_MESSAGE.to_string(),
            ),
        };

        tracing::error!(
            status = %status,
            error_code = %error_code,
            detail = %self,
            "Request error"
        );

        // error_code is logged only
        let body = Json(json!({ "error": message }));

        (status, body).into_response()
    }
}
