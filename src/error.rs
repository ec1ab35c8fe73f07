use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Verification error: {0}")]
    VerificationError(String),

    /// Lead store rejected or failed a write. Carries the store's own message when it sent one.
    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Load error: {0}")]
    LoadError(String),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

impl AppError {
    /// Text suitable for a user-facing notice, without the variant prefix.
    pub fn user_message(&self) -> String {
        match self {
            AppError::ValidationError(msg)
            | AppError::VerificationError(msg)
            | AppError::StoreError(msg)
            | AppError::LoadError(msg)
            | AppError::AuthError(msg)
            | AppError::NotFound(msg)
            | AppError::Timeout(msg)
            | AppError::Unavailable(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status_code, error_code, message) = match self {
            AppError::ValidationError(msg) => {
                log::warn!("Validation error: {msg}");
                (
                    actix_web::http::StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    msg.clone(),
                )
            }
            AppError::VerificationError(msg) => {
                log::warn!("Verification error: {msg}");
                (
                    actix_web::http::StatusCode::UNPROCESSABLE_ENTITY,
                    "VERIFICATION_ERROR",
                    msg.clone(),
                )
            }
            AppError::AuthError(msg) => {
                log::warn!("Authentication error: {msg}");
                (
                    actix_web::http::StatusCode::UNAUTHORIZED,
                    "AUTH_ERROR",
                    msg.clone(),
                )
            }
            AppError::NotFound(msg) => (
                actix_web::http::StatusCode::NOT_FOUND,
                "NOT_FOUND",
                msg.clone(),
            ),
            AppError::StoreError(msg) => {
                log::error!("Lead store error: {msg}");
                (
                    actix_web::http::StatusCode::BAD_GATEWAY,
                    "STORE_ERROR",
                    msg.clone(),
                )
            }
            AppError::LoadError(msg) => {
                log::error!("Lead load error: {msg}");
                (
                    actix_web::http::StatusCode::BAD_GATEWAY,
                    "LOAD_ERROR",
                    msg.clone(),
                )
            }
            AppError::Timeout(msg) => {
                log::error!("Upstream timeout: {msg}");
                (
                    actix_web::http::StatusCode::GATEWAY_TIMEOUT,
                    "TIMEOUT",
                    msg.clone(),
                )
            }
            AppError::Unavailable(msg) => {
                log::warn!("Service unavailable: {msg}");
                (
                    actix_web::http::StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    msg.clone(),
                )
            }
            _ => {
                log::error!("Internal error: {self}");
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        HttpResponse::build(status_code).json(json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": message
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_strips_prefix() {
        let err = AppError::StoreError("Duplicate phone number".to_string());
        assert_eq!(err.user_message(), "Duplicate phone number");
        assert_eq!(err.to_string(), "Store error: Duplicate phone number");
    }

    #[test]
    fn test_error_status_codes() {
        let cases = [
            (AppError::ValidationError("x".into()), 400),
            (AppError::AuthError("x".into()), 401),
            (AppError::NotFound("x".into()), 404),
            (AppError::VerificationError("x".into()), 422),
            (AppError::StoreError("x".into()), 502),
            (AppError::Unavailable("x".into()), 503),
            (AppError::Timeout("x".into()), 504),
            (AppError::InternalError("x".into()), 500),
        ];
        for (err, status) in cases {
            assert_eq!(err.error_response().status().as_u16(), status);
        }
    }
}
