//! Request extractors.
//!
//! The identity provider in front of the service resolves the caller and
//! forwards it as headers. [`Caller`] is extracted from them in every
//! handler that needs an identity:
//!
//! | Header | Meaning |
//! |--------|---------|
//! | `x-user-id` | Authenticated user (UUID) |
//! | `x-user-role` | `customer` (default), `artist` or `admin` |
//! | `x-guest-session` | Anonymous session id, used when no user is set |

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;

use crate::domain::{Caller, Role, UserId};
use crate::error::MarketError;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the authenticated user's role.
pub const USER_ROLE_HEADER: &str = "x-user-role";
/// Header carrying the anonymous session id.
pub const GUEST_SESSION_HEADER: &str = "x-guest-session";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, MarketError> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(str::trim)
                .map_err(|_| MarketError::Unauthorized(format!("{name} is not valid text")))
        })
        .transpose()
}

/// Resolves the caller from identity headers.
///
/// # Errors
///
/// Returns [`MarketError::Unauthorized`] when neither identity is present
/// or a header is malformed.
pub fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, MarketError> {
    if let Some(user) = header(headers, USER_ID_HEADER)?.filter(|v| !v.is_empty()) {
        let id: UserId = user
            .parse()
            .map_err(|_| MarketError::Unauthorized(format!("malformed user id: {user}")))?;
        let role = match header(headers, USER_ROLE_HEADER)? {
            Some(role) if !role.is_empty() => role
                .parse::<Role>()
                .map_err(|e| MarketError::Unauthorized(e.to_string()))?,
            _ => Role::Customer,
        };
        return Ok(Caller::user(id, role));
    }

    match header(headers, GUEST_SESSION_HEADER)? {
        Some(session) if !session.is_empty() => {
            Caller::guest(session).map_err(|e| MarketError::Unauthorized(e.to_string()))
        }
        _ => Err(MarketError::Unauthorized(
            "no user or guest session identity".to_string(),
        )),
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = MarketError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller_from_headers(&parts.headers)
    }
}
