use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Additional detail (validation failures, provider messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// Error taxonomy shared by every service in the crate.
///
/// Variants carry enough context for a user-facing message; handlers map them
/// to HTTP responses via [`IntoResponse`]. Database failures wrap
/// [`sea_orm::error::DbErr`] directly so services can use `?` throughout.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Only {available} items available")]
    InsufficientStock { available: i32 },

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Invalid coupon code")]
    InvalidCoupon,

    #[error("Coupon usage limit reached")]
    CouponUsageLimitReached,

    #[error("Minimum purchase of ${min_purchase} required")]
    CouponBelowMinimumPurchase { min_purchase: Decimal },

    #[error("Payment verification failed")]
    PaymentVerificationFailed,

    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::InsufficientStock { .. } => StatusCode::CONFLICT,
            ServiceError::EmptyCart
            | ServiceError::InvalidCoupon
            | ServiceError::CouponUsageLimitReached
            | ServiceError::CouponBelowMinimumPurchase { .. }
            | ServiceError::PaymentVerificationFailed
            | ServiceError::ValidationError(_)
            | ServiceError::InvalidOperation(_)
            | ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            ServiceError::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            ServiceError::DatabaseError(_) | ServiceError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_category(status: StatusCode) -> &'static str {
        match status {
            StatusCode::NOT_FOUND => "Not Found",
            StatusCode::CONFLICT => "Conflict",
            StatusCode::BAD_REQUEST => "Bad Request",
            StatusCode::UNAUTHORIZED => "Unauthorized",
            StatusCode::BAD_GATEWAY => "Bad Gateway",
            _ => "Internal Server Error",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal failure details stay in the logs, not the response body.
        let message = match &self {
            ServiceError::DatabaseError(err) => {
                tracing::error!("database error: {err}");
                "An internal error occurred".to_string()
            }
            ServiceError::InternalError(msg) => {
                tracing::error!("internal error: {msg}");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error: Self::error_category(status).to_string(),
            message,
            details: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn insufficient_stock_message_names_available_quantity() {
        let err = ServiceError::InsufficientStock { available: 3 };
        assert_eq!(err.to_string(), "Only 3 items available");
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn coupon_minimum_purchase_message_carries_threshold() {
        let err = ServiceError::CouponBelowMinimumPurchase {
            min_purchase: dec!(25.00),
        };
        assert_eq!(err.to_string(), "Minimum purchase of $25.00 required");
    }

    #[test]
    fn webhook_auth_failure_maps_to_401() {
        let err = ServiceError::AuthenticationError("invalid webhook signature".into());
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn coupon_errors_map_to_400() {
        assert_eq!(
            ServiceError::InvalidCoupon.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::CouponUsageLimitReached.status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
