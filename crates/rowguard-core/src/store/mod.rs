//! SocialStore: SQLite-backed store for the guarded entities.
//!
//! The store itself performs no authorization. Callers either go through
//! [`crate::guarded::GuardedStore`], which checks and acts inside one
//! transaction, or use the bootstrapping helpers here (profile registration,
//! conversation setup), which correspond to privileged service operations.

pub(crate) mod rows;
mod schema;
pub mod sql;

pub use schema::SOCIAL_SCHEMA;

use rowguard_common::{ConversationId, ConversationMembership, Profile, UserId};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Default time a writer waits on a locked database.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Constraint(e.to_string())
            }
            _ => StoreError::Database(e.to_string()),
        }
    }
}

/// SQLite-backed social store.
#[derive(Clone, Debug)]
pub struct SocialStore {
    conn: Arc<Mutex<Connection>>,
}

impl SocialStore {
    /// Open a file-backed store.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::open_with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn open_with_busy_timeout(path: &Path, busy: Duration) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init_connection(&conn, busy)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store (for testing).
    pub fn memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(&conn, DEFAULT_BUSY_TIMEOUT)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_connection(conn: &Connection, busy: Duration) -> Result<(), StoreError> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        // WAL mode for file-backed DBs (no-op for in-memory)
        let _ = conn.execute_batch("PRAGMA journal_mode = WAL");
        conn.busy_timeout(busy)?;
        conn.execute_batch(SOCIAL_SCHEMA)?;
        Ok(())
    }

    /// Run `f` with the connection outside any explicit transaction.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        let conn = self.conn.lock().unwrap();
        f(&conn)
    }

    /// Run `f` inside `BEGIN IMMEDIATE`; commit on `Ok`, roll back on `Err`.
    ///
    /// Authorization checks and the guarded write share this snapshot, and the
    /// immediate write lock keeps concurrent writers from changing the
    /// relationship rows in between.
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<StoreError>,
    {
        let conn = self.conn.lock().unwrap();

        conn.execute("BEGIN IMMEDIATE", [])
            .map_err(|e| E::from(StoreError::from(e)))?;

        let result = f(&conn);

        match &result {
            Ok(_) => {
                conn.execute("COMMIT", []).map_err(|e| E::from(StoreError::from(e)))?;
            }
            Err(_) => {
                let _ = conn.execute("ROLLBACK", []);
            }
        }

        result
    }

    /// Register a profile (account creation path). The username is stored
    /// lowercase.
    pub fn create_profile(&self, id: UserId, username: &str) -> Result<Profile, StoreError> {
        let username = username.to_ascii_lowercase();
        self.with_conn(|conn| sql::insert_profile(conn, id, &username))
    }

    /// Create a conversation with its initial members.
    pub fn create_conversation(
        &self,
        is_group: bool,
        members: &[UserId],
    ) -> Result<ConversationId, StoreError> {
        self.transaction(|conn| {
            let conversation = sql::insert_conversation(conn, is_group)?;
            for member in members {
                sql::insert_member(conn, conversation.id, *member)?;
            }
            Ok(conversation.id)
        })
    }

    pub fn add_member(
        &self,
        conversation: ConversationId,
        user: UserId,
    ) -> Result<ConversationMembership, StoreError> {
        self.with_conn(|conn| sql::insert_member(conn, conversation, user))
    }

    /// Remove a membership. Returns whether a row was deleted.
    pub fn remove_member(
        &self,
        conversation: ConversationId,
        user: UserId,
    ) -> Result<bool, StoreError> {
        self.with_conn(|conn| sql::delete_member(conn, conversation, user))
            .map(|n| n > 0)
    }
}
