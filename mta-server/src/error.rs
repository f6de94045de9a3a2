//! HTTP error type
//!
//! Every handler returns [`ApiResult`]; errors render as
//! `{"error": {"code": "...", "message": "..."}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mta_common::Tier;
use mta_gen::GenError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Content above the viewer's tier
    #[error("Requires {required} access")]
    UpgradeRequired { required: Tier },

    /// Optional integration without credentials
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// Third-party API failed
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Message safe to show a client
    pub fn public_message(&self) -> String {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::NotConfigured(msg)
            | ApiError::Upstream(msg) => msg.clone(),
            // Internal details stay in the log
            ApiError::Internal(_) => "Internal server error".to_string(),
            ApiError::UpgradeRequired { .. } => self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::UpgradeRequired { .. } => (StatusCode::FORBIDDEN, "UPGRADE_REQUIRED"),
            ApiError::NotConfigured(_) => (StatusCode::BAD_REQUEST, "NOT_CONFIGURED"),
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let message = self.public_message();

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => ApiError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ApiError::Conflict("Record already exists".to_string())
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                ApiError::BadRequest("Referenced record does not exist".to_string())
            }
            _ => {
                error!("Database error: {}", e);
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl From<mta_common::Error> for ApiError {
    fn from(e: mta_common::Error) -> Self {
        use mta_common::Error;
        match e {
            Error::Database(e) => e.into(),
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Conflict(msg) => ApiError::Conflict(msg),
            Error::Forbidden(msg) => ApiError::Forbidden(msg),
            other => {
                error!("{}", other);
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl From<GenError> for ApiError {
    fn from(e: GenError) -> Self {
        match e {
            GenError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            GenError::NotFound(msg) => ApiError::NotFound(msg),
            GenError::NotConfigured(msg) => ApiError::NotConfigured(msg),
            other => {
                error!("Upstream call failed: {}", other);
                ApiError::Upstream(other.to_string())
            }
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_upgrade_required_shape() {
        let (status, body) = body_json(ApiError::UpgradeRequired { required: Tier::Premium }).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "UPGRADE_REQUIRED");
        assert_eq!(body["error"]["message"], "Requires premium access");
    }

    #[tokio::test]
    async fn test_internal_hides_details() {
        let (status, body) = body_json(ApiError::Internal("disk on fire".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "Internal server error");
    }

    #[test]
    fn test_gen_error_mapping() {
        assert!(matches!(
            ApiError::from(GenError::Api { status: 500, message: "x".into() }),
            ApiError::Upstream(_)
        ));
        assert!(matches!(
            ApiError::from(GenError::NotConfigured("key".into())),
            ApiError::NotConfigured(_)
        ));
    }

    #[test]
    fn test_row_not_found_is_404() {
        assert!(matches!(ApiError::from(sqlx::Error::RowNotFound), ApiError::NotFound(_)));
    }
}
