use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use rust_decimal::Decimal;
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Every failure a request or event can end in. Each variant is scoped to the
/// single request that produced it.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or missing input. Nothing was written.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    /// The caller is not allowed to perform this action on this resource.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// The request collides with the current state (double-complete, double-pay,
    /// stale write). Retrying the same request reports the same conflict.
    #[error("{0}")]
    Conflict(String),

    #[error("Order is not paid yet")]
    Unpaid,

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Decimal, available: Decimal },

    /// The payment gateway answered with a non-2xx status. Passed through verbatim.
    #[error("Payment gateway returned {status}")]
    Gateway { status: u16, body: String },

    #[error("Payment gateway unreachable: {0}")]
    GatewayUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code, so clients can branch without parsing messages.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "permission_denied",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Unpaid => "unpaid",
            AppError::InsufficientBalance { .. } => "insufficient_balance",
            AppError::Gateway { .. } => "gateway_error",
            AppError::GatewayUnavailable(_) => "gateway_unavailable",
            AppError::Database(_) => "database_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl AppError {
    /// Map a unique-constraint violation to `Conflict(message)`; any other
    /// database error stays a `Database` error.
    pub fn conflict_on_duplicate(err: DbErr, message: &str) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => AppError::Conflict(message.to_string()),
            _ => AppError::Database(err),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unpaid => StatusCode::PAYMENT_REQUIRED,
            AppError::InsufficientBalance { .. } => StatusCode::BAD_REQUEST,
            AppError::Gateway { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AppError::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                serde_json::json!({ "error": "Database error occurred", "code": self.code() })
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                serde_json::json!({ "error": "Internal server error", "code": self.code() })
            }
            AppError::Gateway { body, .. } => {
                tracing::warn!("Payment gateway error passed to client: {body}");
                serde_json::json!({ "error": "Payment gateway error", "code": self.code(), "raw": body })
            }
            AppError::InsufficientBalance { requested, available } => serde_json::json!({
                "error": self.to_string(),
                "code": self.code(),
                "requested": requested,
                "available": available,
            }),
            _ => serde_json::json!({ "error": self.to_string(), "code": self.code() }),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}
