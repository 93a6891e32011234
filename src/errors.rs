use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Errors produced while talking to the Beijing Gas API.
#[derive(Debug)]
pub enum GasError {
    /// The token exchange itself failed. Wraps the underlying cause.
    LoginFailed(Box<GasError>),
    /// No access token is available yet.
    AuthFailed(String),
    /// The vendor answered, but the payload was unsuccessful or malformed.
    InvalidData(String),
    /// Transport failure or non-2xx status.
    Http(reqwest::Error),
    /// The HTTP client could not be built.
    Config(String),
}

pub type GasResult<T> = Result<T, GasError>;

impl GasError {
    /// True for HTTP 401 responses, the vendor's signal for an expired token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, GasError::Http(e) if e.status() == Some(reqwest::StatusCode::UNAUTHORIZED))
    }

    /// Whether a token refresh followed by one retry may recover this error.
    pub fn needs_reauth(&self) -> bool {
        matches!(self, GasError::AuthFailed(_)) || self.is_unauthorized()
    }
}

impl fmt::Display for GasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GasError::LoginFailed(cause) => write!(f, "Login failed: {}", cause),
            GasError::AuthFailed(msg) => write!(f, "Auth failed: {}", msg),
            GasError::InvalidData(msg) => write!(f, "Invalid data: {}", msg),
            GasError::Http(e) => write!(f, "HTTP error: {}", e),
            GasError::Config(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for GasError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GasError::LoginFailed(cause) => Some(cause.as_ref()),
            GasError::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl IntoResponse for GasError {
    /// Maps vendor-side failures to 502 and local ones to 500.
    fn into_response(self) -> Response {
        let status = match &self {
            GasError::LoginFailed(_) => {
                tracing::warn!("Login to Beijing Gas failed: {}", self);
                StatusCode::BAD_GATEWAY
            }
            GasError::AuthFailed(_) | GasError::InvalidData(_) | GasError::Http(_) => {
                tracing::error!("Beijing Gas API error: {}", self);
                StatusCode::BAD_GATEWAY
            }
            GasError::Config(_) => {
                tracing::error!("Internal error: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for GasError {
    fn from(err: reqwest::Error) -> Self {
        GasError::Http(err)
    }
}
