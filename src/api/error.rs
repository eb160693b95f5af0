use crate::services::media::MediaError;
use crate::services::remote::ProviderError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Precondition Failed: {0}")]
    PreconditionFailed(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Provider error: {0}")]
    Provider(ProviderError),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) | AppError::Internal(_) | AppError::Anyhow(_) => "INTERNAL",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::BadRequest(_) => "VALIDATION",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::PreconditionFailed(_) => "PRECONDITION_FAILED",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::Provider(e) if e.is_retryable() => "PROVIDER_UNAVAILABLE",
            AppError::Provider(_) => "PROVIDER_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) | AppError::Anyhow(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::PreconditionFailed(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Provider(e) if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Provider(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<MediaError> for AppError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::InvalidFile(v) if v.code == "FILE_TOO_LARGE" => {
                AppError::PayloadTooLarge(v.message)
            }
            MediaError::InvalidFile(v) => AppError::BadRequest(v.message),
            MediaError::PreconditionFailed(msg) => AppError::PreconditionFailed(msg),
            MediaError::Provider(p) => AppError::Provider(p),
            MediaError::Database(db) => AppError::Database(db),
            MediaError::Scratch(io) => AppError::Internal(format!("scratch storage: {}", io)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Internal Server Error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal Server Error".to_string()
            }
            AppError::Anyhow(e) => {
                tracing::error!("Anyhow error: {:?}", e);
                "Internal Server Error".to_string()
            }
            AppError::Provider(e) => {
                tracing::error!("Media provider error: {}", e);
                if e.is_retryable() {
                    "Media provider is temporarily unavailable, please retry".to_string()
                } else {
                    "Media provider rejected the request".to_string()
                }
            }
            AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::PreconditionFailed(msg)
            | AppError::PayloadTooLarge(msg) => msg,
        };

        let body = Json(json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

/// Maps unique-constraint violations to 409 and everything else to a
/// database error.
pub fn conflict_on_unique(e: sea_orm::DbErr, message: &str) -> AppError {
    match e.sql_err() {
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => AppError::Conflict(message.to_string()),
        _ => AppError::Database(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::validation::ValidationError;

    #[test]
    fn test_provider_errors_map_to_gateway_statuses() {
        let retry: AppError = MediaError::Provider(ProviderError::retryable("vimeo", "503")).into();
        assert_eq!(retry.status(), StatusCode::SERVICE_UNAVAILABLE);
        let perm: AppError = MediaError::Provider(ProviderError::permanent("vimeo", "403")).into();
        assert_eq!(perm.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(perm.code(), "PROVIDER_ERROR");
    }

    #[test]
    fn test_oversized_file_is_413() {
        let err: AppError = MediaError::InvalidFile(ValidationError {
            code: "FILE_TOO_LARGE",
            message: "too big".to_string(),
        })
        .into();
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_precondition_is_409() {
        let err: AppError = MediaError::PreconditionFailed("gone".to_string()).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "PRECONDITION_FAILED");
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        use http_body_util::BodyExt;

        let res = AppError::Internal("db password is hunter2".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = res.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("hunter2"));
        assert!(text.contains("INTERNAL"));
    }
}
