use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

const GENERIC_FAILURE: &str = "Something went wrong during processing";

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No content returned by {service}")]
    UpstreamEmptyResponse { service: &'static str },

    #[error("No voice available from {service}")]
    NoVoiceAvailable { service: &'static str },

    #[error("{service} request failed: {message}")]
    Upstream {
        service: &'static str,
        status: Option<u16>,
        message: String,
        body: Option<Value>,
    },

    #[error("{service} did not respond in time")]
    UpstreamTimeout { service: &'static str },
}

impl AppError {
    /// Maps a transport-level failure from one of the collaborators.
    pub fn from_reqwest(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return AppError::UpstreamTimeout { service };
        }

        AppError::Upstream {
            service,
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
            body: None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream {
                status: Some(code), ..
            } => StatusCode::from_u16(*code)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::UpstreamEmptyResponse { .. } => "UPSTREAM_EMPTY_RESPONSE",
            AppError::NoVoiceAvailable { .. } => "NO_VOICE_AVAILABLE",
            AppError::Upstream { .. } => "UPSTREAM_ERROR",
            AppError::UpstreamTimeout { .. } => "UPSTREAM_TIMEOUT",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub error: String,
    pub code: String,
    pub details: Value,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let error = self.to_string();

        let (message, details) = match self {
            AppError::InvalidInput(msg) => (msg, Value::Null),
            AppError::Upstream { body, .. } => {
                (GENERIC_FAILURE.to_string(), body.unwrap_or(Value::Null))
            }
            _ => (GENERIC_FAILURE.to_string(), Value::Null),
        };

        tracing::error!("Request failed: {} ({}) - {}", code, status, error);

        (
            status,
            Json(ErrorResponse {
                message,
                error,
                code: code.to_string(),
                details,
            }),
        )
            .into_response()
    }
}
