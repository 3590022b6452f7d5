//! Relationship resolution.
//!
//! Answers the graph questions predicates ask ("are these two users
//! friends", "is this user in this conversation") and re-reads the current
//! state of rows targeted by updates and deletes. Every lookup goes to the
//! store; nothing is cached across calls.

mod sqlite;

pub use sqlite::SqliteResolver;

use crate::error::reason_codes;
use rowguard_common::{ConversationId, Row, RowKey, UserId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// A lookup whose answer is unknown. Always treated as a denial.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("store lookup failed: {0}")]
    Store(String),

    #[error("lookup deadline exceeded")]
    Timeout,

    #[error("lookup cancelled by caller")]
    Cancelled,
}

impl ResolveError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Store(_) => reason_codes::S_STORE_ERROR,
            Self::Timeout => reason_codes::S_TIMEOUT,
            Self::Cancelled => reason_codes::S_CANCELLED,
        }
    }
}

impl From<rusqlite::Error> for ResolveError {
    fn from(e: rusqlite::Error) -> Self {
        ResolveError::Store(e.to_string())
    }
}

/// Membership and adjacency lookups used by predicates.
pub trait RelationshipResolver {
    /// True iff a friendship row contains both users, in either order.
    fn is_friend(&self, user: UserId, other: UserId) -> Result<bool, ResolveError>;

    /// True iff a membership row exists for exactly this pair.
    fn is_conversation_member(
        &self,
        user: UserId,
        conversation: ConversationId,
    ) -> Result<bool, ResolveError>;
}

/// Re-reads the current state of a row.
pub trait RowFetcher {
    fn fetch_row(&self, key: RowKey) -> Result<Option<Row>, ResolveError>;
}

/// Cancellation signal shared between a request and its lookups.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
