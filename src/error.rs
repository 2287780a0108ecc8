//! Marketplace error types with HTTP status code mapping.
//!
//! [`MarketError`] is the central error type for the service. Each variant
//! maps to a stable numeric code and an HTTP status so clients can branch
//! on `OutOfStock` vs `Forbidden` vs `InvalidTransition` without parsing
//! messages.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::order::{OrderStatus, TransitionKind};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 4001,
///     "message": "artwork out of stock: Night Harbour",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`MarketError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status                   |
/// |-----------|-------------------|-------------------------------|
/// | 1000–1999 | Validation        | 400 Bad Request               |
/// | 2000–2999 | Not Found / State | 404 Not Found / 409 Conflict  |
/// | 3000–3999 | Server            | 500 / 503                     |
/// | 4000–4999 | Domain conflicts  | 409 / 410 / 422               |
/// | 5000–5999 | Auth              | 401 / 403                     |
/// | 6000–6999 | Payment gateway   | 400 Bad Request               |
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    /// Entity with the given id does not resolve.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (e.g. `"order"`).
        entity: &'static str,
        /// Identifier that failed to resolve.
        id: String,
    },

    /// An ORIGINAL artwork is no longer available.
    #[error("artwork out of stock: {0}")]
    OutOfStock(String),

    /// The state machine has no transition for this event from this status.
    #[error("invalid transition: cannot {event} an order in status {from}")]
    InvalidTransition {
        /// Status the order was in when the event arrived.
        from: OrderStatus,
        /// Event that was attempted.
        event: TransitionKind,
    },

    /// Operation requires a different entity state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Caller does not own the resource or lacks the role.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// No caller identity was supplied.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Gift card validity window has passed.
    #[error("gift card expired: {0}")]
    Expired(String),

    /// Gift card has no balance left.
    #[error("gift card fully redeemed: {0}")]
    FullyRedeemed(String),

    /// Malformed input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Payment callback failed signature or integrity verification.
    #[error("gateway verification failed: {0}")]
    GatewayVerificationFailed(String),

    /// A collaborator (gateway, notification dispatcher) is unreachable.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MarketError {
    /// Shorthand for [`MarketError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Validation(_) => 1001,
            Self::NotFound { .. } => 2001,
            Self::InvalidTransition { .. } => 2002,
            Self::InvalidState(_) => 2003,
            Self::Internal(_) => 3000,
            Self::Persistence(_) => 3001,
            Self::UpstreamUnavailable(_) => 3002,
            Self::OutOfStock(_) => 4001,
            Self::Expired(_) => 4002,
            Self::FullyRedeemed(_) => 4003,
            Self::Unauthorized(_) => 5001,
            Self::Forbidden(_) => 5002,
            Self::GatewayVerificationFailed(_) => 6001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::GatewayVerificationFailed(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidTransition { .. } | Self::InvalidState(_) | Self::OutOfStock(_) => {
                StatusCode::CONFLICT
            }
            Self::Expired(_) => StatusCode::GONE,
            Self::FullyRedeemed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for MarketError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl IntoResponse for MarketError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_have_distinct_codes() {
        let errors = [
            MarketError::OutOfStock("a".to_string()),
            MarketError::Forbidden("b".to_string()),
            MarketError::InvalidTransition {
                from: OrderStatus::Delivered,
                event: TransitionKind::Cancel,
            },
            MarketError::Expired("c".to_string()),
            MarketError::FullyRedeemed("d".to_string()),
        ];
        let mut codes: Vec<u32> = errors.iter().map(MarketError::error_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn invalid_transition_message_names_status_and_event() {
        let err = MarketError::InvalidTransition {
            from: OrderStatus::Delivered,
            event: TransitionKind::Cancel,
        };
        assert_eq!(
            err.to_string(),
            "invalid transition: cannot cancel an order in status DELIVERED"
        );
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = MarketError::not_found("order", "42");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "order not found: 42");
    }
}
