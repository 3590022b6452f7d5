//! SQLite-backed resolver.
//!
//! Borrows a connection, so when the caller hands in a connection that is
//! inside `BEGIN IMMEDIATE` the lookups see exactly the snapshot the guarded
//! write will run against.

use super::{CancelFlag, RelationshipResolver, ResolveError, RowFetcher};
use crate::store::rows;
use rowguard_common::{canonical_pair, ConversationId, Row, RowKey, UserId};
use rusqlite::{params, Connection, OptionalExtension, Params};
use std::time::{Duration, Instant};
use tracing::debug;

/// VM instructions between progress-handler checks.
const PROGRESS_OPS: i32 = 1_000;

pub struct SqliteResolver<'c> {
    conn: &'c Connection,
    deadline: Option<Instant>,
    cancel: Option<CancelFlag>,
}

impl<'c> SqliteResolver<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            deadline: None,
            cancel: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn check_budget(&self) -> Result<(), ResolveError> {
        if self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
            return Err(ResolveError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(ResolveError::Timeout);
        }
        Ok(())
    }

    /// Run `query` with the progress handler armed so a lookup that outlives
    /// the deadline (or is cancelled) is interrupted inside SQLite.
    fn bounded<T>(
        &self,
        query: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, ResolveError> {
        self.check_budget()?;

        let armed = self.deadline.is_some() || self.cancel.is_some();
        if armed {
            let deadline = self.deadline;
            let cancel = self.cancel.clone();
            self.conn.progress_handler(
                PROGRESS_OPS,
                Some(move || {
                    cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
                        || deadline.is_some_and(|d| Instant::now() >= d)
                }),
            );
        }

        let result = query(self.conn);

        if armed {
            self.conn.progress_handler(PROGRESS_OPS, None::<fn() -> bool>);
        }

        result.map_err(|e| {
            // An interrupted statement surfaces as a generic SQLite error;
            // report the budget that caused it.
            self.check_budget().err().unwrap_or_else(|| e.into())
        })
    }

    fn exists<P: Params>(&self, sql: &str, params: P) -> Result<bool, ResolveError> {
        self.bounded(|conn| {
            conn.query_row(sql, params, |_| Ok(()))
                .optional()
                .map(|found| found.is_some())
        })
    }
}

impl RelationshipResolver for SqliteResolver<'_> {
    fn is_friend(&self, user: UserId, other: UserId) -> Result<bool, ResolveError> {
        let Some((user1, user2)) = canonical_pair(user, other) else {
            return Ok(false);
        };
        let found = self.exists(
            "SELECT 1 FROM friendships WHERE user1_id = ?1 AND user2_id = ?2",
            params![user1.to_string(), user2.to_string()],
        )?;
        debug!(%user, %other, found, "friendship lookup");
        Ok(found)
    }

    fn is_conversation_member(
        &self,
        user: UserId,
        conversation: ConversationId,
    ) -> Result<bool, ResolveError> {
        let found = self.exists(
            "SELECT 1 FROM conversation_members WHERE conversation_id = ?1 AND user_id = ?2",
            params![conversation.to_string(), user.to_string()],
        )?;
        debug!(%user, %conversation, found, "membership lookup");
        Ok(found)
    }
}

impl RowFetcher for SqliteResolver<'_> {
    fn fetch_row(&self, key: RowKey) -> Result<Option<Row>, ResolveError> {
        self.bounded(|conn| rows::fetch(conn, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{sql, SocialStore};
    use rowguard_common::FriendRequestStatus;

    fn seeded() -> (SocialStore, UserId, UserId, UserId) {
        let store = SocialStore::memory().unwrap();
        let a = UserId::new_v4();
        let b = UserId::new_v4();
        let c = UserId::new_v4();
        store.create_profile(a, "alice").unwrap();
        store.create_profile(b, "bob").unwrap();
        store.create_profile(c, "carol").unwrap();
        (store, a, b, c)
    }

    fn befriend(store: &SocialStore, a: UserId, b: UserId) {
        store
            .transaction(|tx| -> Result<(), crate::store::StoreError> {
                let request = sql::insert_friend_request(tx, a, b)?;
                sql::set_friend_request_status(tx, request.id, FriendRequestStatus::Accepted)?;
                sql::insert_friendship(tx, a, b)?;
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_is_friend_is_symmetric() {
        let (store, a, b, c) = seeded();
        befriend(&store, b, a);
        store
            .with_conn(|conn| {
                let resolver = SqliteResolver::new(conn);
                assert!(resolver.is_friend(a, b).unwrap());
                assert!(resolver.is_friend(b, a).unwrap());
                assert!(!resolver.is_friend(a, c).unwrap());
                assert!(!resolver.is_friend(a, a).unwrap());
            });
    }

    #[test]
    fn test_membership_is_exact_pair() {
        let (store, a, b, _) = seeded();
        let conv = store.create_conversation(false, &[a]).unwrap();
        let other = store.create_conversation(false, &[b]).unwrap();
        store.with_conn(|conn| {
            let resolver = SqliteResolver::new(conn);
            assert!(resolver.is_conversation_member(a, conv).unwrap());
            assert!(!resolver.is_conversation_member(a, other).unwrap());
            assert!(!resolver.is_conversation_member(b, conv).unwrap());
        });
    }

    #[test]
    fn test_expired_deadline_is_timeout() {
        let (store, a, b, _) = seeded();
        store.with_conn(|conn| {
            let resolver = SqliteResolver::new(conn).with_deadline(Instant::now());
            assert_eq!(resolver.is_friend(a, b), Err(ResolveError::Timeout));
        });
    }

    #[test]
    fn test_cancelled_lookup() {
        let (store, a, _, _) = seeded();
        let conv = store.create_conversation(true, &[a]).unwrap();
        let flag = CancelFlag::new();
        flag.cancel();
        store.with_conn(|conn| {
            let resolver = SqliteResolver::new(conn).with_cancel(flag.clone());
            assert_eq!(
                resolver.is_conversation_member(a, conv),
                Err(ResolveError::Cancelled)
            );
        });
    }

    #[test]
    fn test_handler_is_disarmed_after_lookup() {
        let (store, a, b, _) = seeded();
        store.with_conn(|conn| {
            let resolver = SqliteResolver::new(conn).with_timeout(Duration::from_secs(30));
            assert!(!resolver.is_friend(a, b).unwrap());
            // A later unbounded query on the same connection still runs.
            let n: i64 = conn
                .query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))
                .unwrap();
            assert_eq!(n, 3);
        });
    }

    #[test]
    fn test_fetch_row_roundtrip() {
        let (store, a, _, _) = seeded();
        store.with_conn(|conn| {
            let resolver = SqliteResolver::new(conn);
            let row = resolver.fetch_row(RowKey::Profile(a)).unwrap();
            assert!(matches!(row, Some(Row::Profile(p)) if p.username == "alice"));
            let missing = resolver
                .fetch_row(RowKey::Profile(UserId::new_v4()))
                .unwrap();
            assert!(missing.is_none());
        });
    }
}
