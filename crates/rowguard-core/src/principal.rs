//! Principal context.
//!
//! Token verification happens upstream; this module only maps the verified
//! claims onto the identity the engine evaluates. Anything that does not
//! yield a usable user id becomes [`Principal::Anonymous`] rather than an
//! error, because the absence of an identity is itself a policy input.

use rowguard_common::UserId;
use serde_json::Value;
use std::fmt;

/// Role claim carried by tokens of signed-in users.
pub const AUTHENTICATED_ROLE: &str = "authenticated";

/// The caller on whose behalf one data operation is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Principal {
    Authenticated(UserId),
    Anonymous,
}

impl Principal {
    pub fn user(id: UserId) -> Self {
        Self::Authenticated(id)
    }

    /// Map verified token claims to a principal.
    ///
    /// Requires `role == "authenticated"`, a UUID `sub`, and `is_anonymous`
    /// absent or false.
    pub fn from_claims(claims: &Value) -> Self {
        let role = claims.get("role").and_then(Value::as_str);
        if role != Some(AUTHENTICATED_ROLE) {
            return Self::Anonymous;
        }
        if claims
            .get("is_anonymous")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            return Self::Anonymous;
        }
        Self::from_subject(claims.get("sub").and_then(Value::as_str))
    }

    /// Map a bare subject string to a principal.
    pub fn from_subject(subject: Option<&str>) -> Self {
        match subject.map(str::trim).and_then(|s| s.parse::<UserId>().ok()) {
            Some(id) => Self::Authenticated(id),
            None => Self::Anonymous,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Authenticated(id) => Some(*id),
            Self::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

impl From<Option<UserId>> for Principal {
    fn from(id: Option<UserId>) -> Self {
        id.map_or(Self::Anonymous, Self::Authenticated)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authenticated(id) => write!(f, "{}", id),
            Self::Anonymous => f.write_str("none"),
        }
    }
}
