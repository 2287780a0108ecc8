//! Caller identity as resolved by the upstream identity provider.
//!
//! The service never authenticates anyone itself. It receives an
//! [`Owner`] (an authenticated user or an anonymous guest session) and a
//! [`Role`], and applies ownership/role checks on top of them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::UserId;
use crate::error::MarketError;

/// Maximum accepted length of a guest session identifier.
const MAX_GUEST_SESSION_LEN: usize = 128;

/// Owning identity of a cart line or an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Owner {
    /// Authenticated user.
    User(UserId),
    /// Anonymous browser session.
    Guest(String),
}

impl Owner {
    /// Builds a guest owner after validating the session identifier.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] if the session id is empty, too
    /// long, or contains characters other than ASCII alphanumerics, `-`
    /// and `_`.
    pub fn guest(session: &str) -> Result<Self, MarketError> {
        let valid = !session.is_empty()
            && session.len() <= MAX_GUEST_SESSION_LEN
            && session
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(MarketError::Validation(format!(
                "invalid guest session id: {session:?}"
            )));
        }
        Ok(Self::Guest(session.to_string()))
    }

    /// Returns the user id for authenticated owners.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            Self::Guest(_) => None,
        }
    }

    /// Returns `true` for anonymous sessions.
    #[must_use]
    pub const fn is_guest(&self) -> bool {
        matches!(self, Self::Guest(_))
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Guest(session) => write!(f, "guest:{session}"),
        }
    }
}

impl FromStr for Owner {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(id) = s.strip_prefix("user:") {
            let id = id
                .parse::<UserId>()
                .map_err(|e| MarketError::Validation(format!("invalid user id {id:?}: {e}")))?;
            return Ok(Self::User(id));
        }
        if let Some(session) = s.strip_prefix("guest:") {
            return Self::guest(session);
        }
        Err(MarketError::Validation(format!("invalid owner: {s:?}")))
    }
}

impl TryFrom<String> for Owner {
    type Error = MarketError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Owner> for String {
    fn from(owner: Owner) -> Self {
        owner.to_string()
    }
}

/// Role granted to the caller by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular buyer.
    #[default]
    Customer,
    /// Artist fulfilling orders for their own works.
    Artist,
    /// Marketplace operator.
    Admin,
}

impl FromStr for Role {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "customer" | "user" => Ok(Self::Customer),
            "artist" => Ok(Self::Artist),
            "admin" => Ok(Self::Admin),
            other => Err(MarketError::Validation(format!("unknown role: {other}"))),
        }
    }
}

/// Resolved identity of the party making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Identity the caller acts as.
    pub owner: Owner,
    /// Granted role. Guests are always [`Role::Customer`].
    pub role: Role,
}

impl Caller {
    /// Authenticated user with the given role.
    #[must_use]
    pub const fn user(id: UserId, role: Role) -> Self {
        Self {
            owner: Owner::User(id),
            role,
        }
    }

    /// Anonymous guest session.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] for a malformed session id.
    pub fn guest(session: &str) -> Result<Self, MarketError> {
        Ok(Self {
            owner: Owner::guest(session)?,
            role: Role::Customer,
        })
    }

    /// Returns `true` if the caller is a marketplace operator.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin && !self.owner.is_guest()
    }

    /// Fails unless the caller is an admin.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Forbidden`] for non-admin callers.
    pub fn require_admin(&self) -> Result<(), MarketError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(MarketError::Forbidden("admin role required".to_string()))
        }
    }

    /// Fails unless the caller is the given owner or an admin.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Forbidden`] if neither condition holds.
    pub fn require_owner_or_admin(&self, owner: &Owner) -> Result<(), MarketError> {
        if self.is_admin() || &self.owner == owner {
            Ok(())
        } else {
            Err(MarketError::Forbidden(
                "resource belongs to another identity".to_string(),
            ))
        }
    }
}
