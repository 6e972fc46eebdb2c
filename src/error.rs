//! Error handling

use axum::response::IntoResponse;
use tracing::info;

use crate::ai::AiError;

/// definitions for the sophia application.
#[derive(Debug)]
pub enum SophiaError {
    /// When you didn't do the right thing
    BadRequest,
    /// When DB operations fail
    Database(sea_orm::DbErr),
    /// When a requested resource is not found
    NotFound(String),
    /// When an internal server error occurs
    InternalServerError(String),
}

impl From<sea_orm::DbErr> for SophiaError {
    fn from(err: sea_orm::DbErr) -> Self {
        SophiaError::Database(err)
    }
}

impl From<std::io::Error> for SophiaError {
    fn from(err: std::io::Error) -> Self {
        SophiaError::InternalServerError(err.to_string())
    }
}

impl From<axum::http::Error> for SophiaError {
    fn from(err: axum::http::Error) -> Self {
        SophiaError::InternalServerError(err.to_string())
    }
}

impl From<url::ParseError> for SophiaError {
    fn from(err: url::ParseError) -> Self {
        SophiaError::InternalServerError(err.to_string())
    }
}

impl IntoResponse for SophiaError {
    fn into_response(self) -> axum::response::Response {
        match self {
            SophiaError::BadRequest => {
                info!("Bad request received");
                let mut response =
                    axum::response::Response::new(axum::body::Body::from("Bad Request"));
                *response.status_mut() = axum::http::StatusCode::BAD_REQUEST;
                response
            }
            SophiaError::Database(err) => {
                tracing::error!("Database error: {}", err);
                let mut response =
                    axum::response::Response::new(axum::body::Body::from("Database error"));
                *response.status_mut() = axum::http::StatusCode::INTERNAL_SERVER_ERROR;
                response
            }
            SophiaError::NotFound(url) => {
                tracing::error!("404 {url}");
                let mut response =
                    axum::response::Response::new(axum::body::Body::from("Not Found"));
                *response.status_mut() = axum::http::StatusCode::NOT_FOUND;
                response
            }
            SophiaError::InternalServerError(message) => {
                tracing::error!("Internal server error: {}", message);
                let mut response =
                    axum::response::Response::new(axum::body::Body::from("Internal server error"));
                *response.status_mut() = axum::http::StatusCode::INTERNAL_SERVER_ERROR;
                response
            }
        }
    }
}

/// User-facing buckets for upstream generation failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A credential is missing or was rejected.
    MissingCredential,
    /// The account's quota is used up.
    QuotaExceeded,
    /// The upstream service is overloaded or rate-limiting.
    Overloaded,
    /// Anything we can't place.
    Unknown,
}

/// Categorizes an error message by substring matching. Quota is checked
/// before overload because quota bodies usually also mention 429.
pub fn categorize(message: &str) -> ErrorCategory {
    let lower = message.to_ascii_lowercase();
    if lower.contains("api key") || lower.contains("credential") || lower.contains("permission") {
        ErrorCategory::MissingCredential
    } else if lower.contains("quota") {
        ErrorCategory::QuotaExceeded
    } else if lower.contains("overload")
        || lower.contains("unavailable")
        || lower.contains("rate limit")
        || lower.contains("resource_exhausted")
        || lower.contains("429")
    {
        ErrorCategory::Overloaded
    } else {
        ErrorCategory::Unknown
    }
}

/// Category for a client error, via its rendered message.
pub fn categorize_ai(err: &AiError) -> ErrorCategory {
    categorize(&err.to_string())
}

/// Message shown on the page when generation fails.
pub fn user_message(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::MissingCredential => {
            "Sophia's API credentials are missing or were rejected. Set GEMINI_API_KEY and restart."
        }
        ErrorCategory::QuotaExceeded => {
            "The generation quota is exhausted for now. Please try again later."
        }
        ErrorCategory::Overloaded => {
            "The muse is overloaded right now. Please try again in a moment."
        }
        ErrorCategory::Unknown => {
            "Something went wrong while consulting the muse. Please try again."
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn substring_buckets_cover_the_failure_kinds() {
        assert_eq!(
            categorize("missing API credential: GEMINI_API_KEY is not set"),
            ErrorCategory::MissingCredential
        );
        assert_eq!(
            categorize("API key not valid. Please pass a valid API key."),
            ErrorCategory::MissingCredential
        );
        assert_eq!(
            categorize("You exceeded your current quota (429 RESOURCE_EXHAUSTED)"),
            ErrorCategory::QuotaExceeded
        );
        assert_eq!(
            categorize("The model is overloaded. Please try again later."),
            ErrorCategory::Overloaded
        );
        assert_eq!(
            categorize("503 Service Unavailable"),
            ErrorCategory::Overloaded
        );
        assert_eq!(categorize("connection reset by peer"), ErrorCategory::Unknown);
    }

    #[test]
    fn typed_client_errors_land_in_their_buckets() {
        assert_eq!(
            categorize_ai(&AiError::MissingApiKey("GEMINI_API_KEY")),
            ErrorCategory::MissingCredential
        );
        assert_eq!(
            categorize_ai(&AiError::QuotaExceeded("daily cap".to_string())),
            ErrorCategory::QuotaExceeded
        );
        assert_eq!(
            categorize_ai(&AiError::Overloaded("busy".to_string())),
            ErrorCategory::Overloaded
        );
        assert_eq!(
            categorize_ai(&AiError::EmptyResponse("text model")),
            ErrorCategory::Unknown
        );
    }
}
