//! Denial taxonomy.
//!
//! Every evaluation path ends in an allow or in exactly one of four denial
//! kinds. The kinds are kept apart for the audit log; callers facing users
//! should render all of them with [`AccessError::public_message`].

use crate::resolver::ResolveError;
use rowguard_common::{EntityType, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable reason codes attached to denials.
pub mod reason_codes {
    // Access denials (A_*)
    pub const A_UNAUTHENTICATED: &str = "A_UNAUTHENTICATED";
    pub const A_FORBIDDEN: &str = "A_FORBIDDEN";
    pub const A_UNREGISTERED: &str = "A_UNREGISTERED";
    pub const A_TARGET_MISMATCH: &str = "A_TARGET_MISMATCH";
    pub const A_TARGET_MISSING: &str = "A_TARGET_MISSING";

    // Store/system outcomes (S_*)
    pub const S_STORE_ERROR: &str = "S_STORE_ERROR";
    pub const S_TIMEOUT: &str = "S_TIMEOUT";
    pub const S_CANCELLED: &str = "S_CANCELLED";
}

/// The message every denial maps to at the user-facing boundary.
pub const ACCESS_DENIED: &str = "access denied";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    /// No identity, and the rule is not public.
    Unauthenticated,
    /// Identity present, predicate false.
    Forbidden,
    /// No rule for the (entity, operation) pair.
    Unregistered,
    /// A lookup failed or ran out of time.
    Indeterminate,
}

impl DenialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::Unregistered => "unregistered",
            Self::Indeterminate => "indeterminate",
        }
    }
}

/// Why an operation was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub kind: DenialKind,
    pub entity: EntityType,
    pub operation: Operation,
    /// Name of the rule that produced the denial, when one was consulted.
    pub rule: Option<&'static str>,
    pub reason_code: &'static str,
    pub detail: Option<String>,
}

impl Denial {
    fn new(
        kind: DenialKind,
        entity: EntityType,
        operation: Operation,
        rule: Option<&'static str>,
        reason_code: &'static str,
    ) -> Self {
        Self {
            kind,
            entity,
            operation,
            rule,
            reason_code,
            detail: None,
        }
    }

    pub fn unauthenticated(entity: EntityType, operation: Operation, rule: &'static str) -> Self {
        Self::new(
            DenialKind::Unauthenticated,
            entity,
            operation,
            Some(rule),
            reason_codes::A_UNAUTHENTICATED,
        )
    }

    pub fn forbidden(entity: EntityType, operation: Operation, rule: &'static str) -> Self {
        Self::new(
            DenialKind::Forbidden,
            entity,
            operation,
            Some(rule),
            reason_codes::A_FORBIDDEN,
        )
    }

    pub fn unregistered(entity: EntityType, operation: Operation) -> Self {
        Self::new(
            DenialKind::Unregistered,
            entity,
            operation,
            None,
            reason_codes::A_UNREGISTERED,
        )
    }

    pub fn indeterminate(
        entity: EntityType,
        operation: Operation,
        rule: Option<&'static str>,
        cause: &ResolveError,
    ) -> Self {
        Self::new(
            DenialKind::Indeterminate,
            entity,
            operation,
            rule,
            cause.reason_code(),
        )
        .with_detail(cause.to_string())
    }

    /// Target shape or entity does not fit the request (forged or confused
    /// identifiers end up here).
    pub fn target_mismatch(
        entity: EntityType,
        operation: Operation,
        detail: impl Into<String>,
    ) -> Self {
        Self::new(
            DenialKind::Forbidden,
            entity,
            operation,
            None,
            reason_codes::A_TARGET_MISMATCH,
        )
        .with_detail(detail)
    }

    /// Update/delete target does not exist. Reported as forbidden so the
    /// caller cannot probe for row existence.
    pub fn target_missing(entity: EntityType, operation: Operation, rule: &'static str) -> Self {
        Self::new(
            DenialKind::Forbidden,
            entity,
            operation,
            Some(rule),
            reason_codes::A_TARGET_MISSING,
        )
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// `Result`-flavoured form of a [`Denial`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("unauthenticated principal may not {operation} {entity}")]
    Unauthenticated {
        entity: EntityType,
        operation: Operation,
    },

    #[error("{operation} on {entity} forbidden ({reason_code})")]
    Forbidden {
        entity: EntityType,
        operation: Operation,
        rule: Option<&'static str>,
        reason_code: &'static str,
    },

    #[error("no policy registered for {operation} on {entity}")]
    Unregistered {
        entity: EntityType,
        operation: Operation,
    },

    #[error("{operation} on {entity} could not be decided: {detail}")]
    Indeterminate {
        entity: EntityType,
        operation: Operation,
        reason_code: &'static str,
        detail: String,
    },
}

impl AccessError {
    pub fn kind(&self) -> DenialKind {
        match self {
            Self::Unauthenticated { .. } => DenialKind::Unauthenticated,
            Self::Forbidden { .. } => DenialKind::Forbidden,
            Self::Unregistered { .. } => DenialKind::Unregistered,
            Self::Indeterminate { .. } => DenialKind::Indeterminate,
        }
    }

    /// Uniform text for responses; never distinguishes the kinds.
    pub fn public_message(&self) -> &'static str {
        ACCESS_DENIED
    }
}

impl From<Denial> for AccessError {
    fn from(d: Denial) -> Self {
        match d.kind {
            DenialKind::Unauthenticated => AccessError::Unauthenticated {
                entity: d.entity,
                operation: d.operation,
            },
            DenialKind::Forbidden => AccessError::Forbidden {
                entity: d.entity,
                operation: d.operation,
                rule: d.rule,
                reason_code: d.reason_code,
            },
            DenialKind::Unregistered => AccessError::Unregistered {
                entity: d.entity,
                operation: d.operation,
            },
            DenialKind::Indeterminate => AccessError::Indeterminate {
                entity: d.entity,
                operation: d.operation,
                reason_code: d.reason_code,
                detail: d.detail.unwrap_or_default(),
            },
        }
    }
}
