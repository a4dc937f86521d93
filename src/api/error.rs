use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::wechat::WechatError;
use crate::TARGET_WEB_REQUEST;

/// Every way a handler can fail. Rendered as `{success: false, error, code}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation { code: &'static str, message: String },
    #[error("{0}")]
    NotFound(String),
    /// A state transition the record's current state does not allow.
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    QuotaExceeded(String),
    #[error("{0}")]
    ServiceUnavailable(String),
    /// An external service failed; its message is passed through.
    #[error("{message}")]
    Upstream { status: StatusCode, message: String },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::Validation {
            code,
            message: message.into(),
        }
    }

    pub fn missing(message: impl Into<String>) -> Self {
        ApiError::validation("MISSING_FIELDS", message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        ApiError::Upstream {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::QuotaExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream { status, .. } => *status,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation { code, .. } => *code,
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::QuotaExceeded(_) => "QUOTA_EXCEEDED",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Upstream { .. } => "UPSTREAM_ERROR",
            ApiError::Database(_) | ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Database(err) => {
                error!(target: TARGET_WEB_REQUEST, "Database error: {:?}", err);
                "服务器内部错误".to_string()
            }
            ApiError::Internal(err) => {
                error!(target: TARGET_WEB_REQUEST, "Internal error: {:?}", err);
                "服务器内部错误".to_string()
            }
            other => {
                warn!(target: TARGET_WEB_REQUEST, "Request failed ({}): {}", other.code(), other);
                other.to_string()
            }
        };

        let body = json!({
            "success": false,
            "error": message,
            "code": self.code(),
        });
        (self.status(), Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation("INVALID_BODY", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation("INVALID_PARAMS", rejection.body_text())
    }
}

impl From<WechatError> for ApiError {
    fn from(err: WechatError) -> Self {
        match err {
            WechatError::NotConfigured => {
                ApiError::ServiceUnavailable("微信发布服务未配置".to_string())
            }
            WechatError::Validation(message) => ApiError::validation("VALIDATION_ERROR", message),
            WechatError::Rejected { status, message } if (400..500).contains(&status) => {
                ApiError::Upstream {
                    status: StatusCode::BAD_REQUEST,
                    message,
                }
            }
            other => ApiError::upstream(other.to_string()),
        }
    }
}
