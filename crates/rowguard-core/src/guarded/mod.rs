//! Guarded operations: authorize and act inside one transaction.
//!
//! Every operation opens `BEGIN IMMEDIATE`, builds a [`SqliteResolver`] over
//! the same connection (bounded by the configured lookup deadline and the
//! request's [`CancelFlag`]), asks the [`PolicyEngine`], and only then runs
//! the statement. The decision and the write therefore see the same
//! relationship rows, and a denial rolls the transaction back.

pub mod validate;

use crate::config::EngineConfig;
use crate::engine::PolicyEngine;
use crate::error::AccessError;
use crate::principal::Principal;
use crate::resolver::{CancelFlag, RelationshipResolver, ResolveError, RowFetcher, SqliteResolver};
use crate::store::{sql, SocialStore, StoreError};
use rowguard_common::{
    Conversation, ConversationId, EntityType, FriendRequest, FriendRequestStatus, Friendship,
    Message, Operation, Profile, Row, RowId, RowKey, UserId,
};
use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GuardError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("lookup failed: {0}")]
    Indeterminate(#[from] ResolveError),

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found")]
    NotFound,
}

impl From<rusqlite::Error> for GuardError {
    fn from(e: rusqlite::Error) -> Self {
        GuardError::Store(e.into())
    }
}

impl GuardError {
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::Access(_))
    }
}

/// Result of answering a friend request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendRequestOutcome {
    pub request: FriendRequest,
    /// Set when the request was accepted.
    pub friendship: Option<Friendship>,
}

#[derive(Clone, Debug)]
pub struct GuardedStore {
    store: SocialStore,
    engine: PolicyEngine,
    config: EngineConfig,
    cancel: Option<CancelFlag>,
}

impl GuardedStore {
    pub fn new(store: SocialStore, engine: PolicyEngine, config: EngineConfig) -> Self {
        Self {
            store,
            engine,
            config,
            cancel: None,
        }
    }

    /// Open a file-backed store with the standard policies and the configured
    /// busy timeout and denial sink.
    pub fn open(path: &Path, config: EngineConfig) -> anyhow::Result<Self> {
        config.validate().map_err(anyhow::Error::msg)?;
        let store = SocialStore::open_with_busy_timeout(path, config.busy_timeout())?;
        let engine = PolicyEngine::with_standard_policies(config.build_sink()?);
        Ok(Self::new(store, engine, config))
    }

    /// A handle whose lookups observe `cancel`.
    pub fn for_request(&self, cancel: CancelFlag) -> Self {
        Self {
            cancel: Some(cancel),
            ..self.clone()
        }
    }

    pub fn store(&self) -> &SocialStore {
        &self.store
    }

    pub fn engine(&self) -> &PolicyEngine {
        &self.engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn run<T>(
        &self,
        f: impl FnOnce(&Connection, &SqliteResolver<'_>) -> Result<T, GuardError>,
    ) -> Result<T, GuardError> {
        self.store.transaction(|conn| {
            // The lookup budget starts once the write lock is held.
            let deadline = self.config.lookup_deadline();
            let mut resolver = SqliteResolver::new(conn).with_deadline(deadline);
            if let Some(flag) = &self.cancel {
                resolver = resolver.with_cancel(flag.clone());
            }
            f(conn, &resolver)
        })
    }

    /// Filter typed rows through the read rule of `entity`.
    fn visible<T, R>(
        &self,
        principal: &Principal,
        entity: EntityType,
        rows: Vec<T>,
        resolver: &R,
    ) -> Vec<T>
    where
        T: Into<Row> + TryFrom<Row>,
        R: RelationshipResolver,
    {
        let rows = rows.into_iter().map(Into::into).collect();
        self.engine
            .filter_rows(principal, entity, rows, resolver)
            .into_rows()
            .into_iter()
            .filter_map(|row| T::try_from(row).ok())
            .collect()
    }

    // Profiles

    pub fn update_profile_username(
        &self,
        principal: &Principal,
        profile_id: UserId,
        username: &str,
    ) -> Result<Profile, GuardError> {
        let username = validate::username(username)?;
        self.run(|conn, resolver| {
            let proposed = Profile {
                id: profile_id,
                username: username.clone(),
            };
            self.engine
                .authorize_update(
                    principal,
                    RowKey::Profile(profile_id),
                    Some(proposed.clone().into()),
                    resolver,
                )
                .require()?;
            match sql::update_profile_username(conn, profile_id, &username) {
                Ok(_) => {
                    debug!(profile = %profile_id, username = %username, "username updated");
                    Ok(proposed)
                }
                Err(StoreError::Constraint(_)) => {
                    Err(GuardError::Conflict("username already taken".to_string()))
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Case-insensitive prefix search, alphabetical, at most ten results.
    pub fn search_profiles(
        &self,
        principal: &Principal,
        prefix: &str,
    ) -> Result<Vec<Profile>, GuardError> {
        let prefix = validate::search_prefix(prefix)?;
        self.run(|conn, resolver| {
            let found = sql::search_profiles(conn, prefix, validate::SEARCH_LIMIT)?;
            Ok(self.visible(principal, EntityType::Profile, found, resolver))
        })
    }

    // Friend requests and friendships

    /// Send a request from the caller to the profile named `receiver_username`.
    pub fn send_friend_request(
        &self,
        principal: &Principal,
        receiver_username: &str,
    ) -> Result<FriendRequest, GuardError> {
        let sender = self
            .engine
            .require_identity(principal, EntityType::FriendRequest, Operation::Insert)?;
        self.run(|conn, resolver| {
            let receiver_username = receiver_username.trim().to_ascii_lowercase();
            let receiver = sql::find_profile_by_username(conn, &receiver_username)?
                .ok_or(GuardError::NotFound)?;
            if receiver.id == sender {
                return Err(GuardError::Invalid(
                    "cannot send a friend request to yourself".to_string(),
                ));
            }
            if resolver.is_friend(sender, receiver.id)? {
                return Err(GuardError::Conflict("already friends".to_string()));
            }
            if sql::find_pending_request_between(conn, sender, receiver.id)?.is_some() {
                return Err(GuardError::Conflict(
                    "a friend request between these users is already pending".to_string(),
                ));
            }

            let request = FriendRequest {
                id: RowId::new_v4(),
                sender,
                receiver: receiver.id,
                status: FriendRequestStatus::Pending,
            };
            self.engine
                .authorize_insert(principal, request.clone().into(), resolver)
                .require()?;
            sql::write_friend_request(conn, &request)?;
            debug!(
                request = %request.id,
                sender = %sender,
                receiver = %receiver.id,
                "friend request sent"
            );
            Ok(request)
        })
    }

    /// Accept or decline a pending request addressed to the caller.
    ///
    /// Acceptance writes the canonical friendship in the same transaction as
    /// the status change.
    pub fn respond_to_friend_request(
        &self,
        principal: &Principal,
        request_id: RowId,
        accept: bool,
    ) -> Result<FriendRequestOutcome, GuardError> {
        let status = if accept {
            FriendRequestStatus::Accepted
        } else {
            FriendRequestStatus::Declined
        };
        self.run(|conn, resolver| {
            let key = RowKey::FriendRequest(request_id);
            let current = resolver
                .fetch_row(key)?
                .and_then(|row| FriendRequest::try_from(row).ok());
            let proposed = current.as_ref().map(|r| {
                Row::from(FriendRequest {
                    status,
                    ..r.clone()
                })
            });
            self.engine
                .authorize_update(principal, key, proposed, resolver)
                .require()?;
            // A missing row was already denied above.
            let current = current.ok_or(GuardError::NotFound)?;

            if current.status.is_terminal() {
                return Err(GuardError::Conflict(format!(
                    "friend request is already {}",
                    current.status.as_str()
                )));
            }

            sql::set_friend_request_status(conn, request_id, status)?;
            let friendship = if accept {
                Some(sql::insert_friendship(conn, current.sender, current.receiver)?)
            } else {
                None
            };
            debug!(request = %request_id, status = status.as_str(), "friend request answered");
            Ok(FriendRequestOutcome {
                request: FriendRequest { status, ..current },
                friendship,
            })
        })
    }

    /// Requests the caller sent or received, oldest first.
    pub fn list_friend_requests(
        &self,
        principal: &Principal,
    ) -> Result<Vec<FriendRequest>, GuardError> {
        let Some(user) = principal.user_id() else {
            return Ok(Vec::new());
        };
        self.run(|conn, resolver| {
            let found = sql::friend_requests_for(conn, user)?;
            Ok(self.visible(principal, EntityType::FriendRequest, found, resolver))
        })
    }

    pub fn list_friendships(&self, principal: &Principal) -> Result<Vec<Friendship>, GuardError> {
        let Some(user) = principal.user_id() else {
            return Ok(Vec::new());
        };
        self.run(|conn, resolver| {
            let found = sql::friendships_for(conn, user)?;
            Ok(self.visible(principal, EntityType::Friendship, found, resolver))
        })
    }

    pub fn delete_friendship(
        &self,
        principal: &Principal,
        friendship_id: RowId,
    ) -> Result<(), GuardError> {
        self.run(|conn, resolver| {
            self.engine
                .authorize_delete(principal, RowKey::Friendship(friendship_id), resolver)
                .require()?;
            sql::delete_friendship(conn, friendship_id)?;
            debug!(friendship = %friendship_id, "friendship deleted");
            Ok(())
        })
    }

    // Conversations and messages

    /// Conversations the caller is a member of.
    pub fn list_conversations(
        &self,
        principal: &Principal,
    ) -> Result<Vec<Conversation>, GuardError> {
        let Some(user) = principal.user_id() else {
            return Ok(Vec::new());
        };
        self.run(|conn, resolver| {
            let memberships = self.visible(
                principal,
                EntityType::ConversationMembership,
                sql::memberships_for(conn, user)?,
                resolver,
            );
            let mut conversations = Vec::with_capacity(memberships.len());
            for membership in memberships {
                let key = RowKey::Conversation(membership.conversation_id);
                if let Some(Row::Conversation(c)) = resolver.fetch_row(key)? {
                    conversations.push(c);
                }
            }
            Ok(self.visible(principal, EntityType::Conversation, conversations, resolver))
        })
    }

    /// Post a message as the caller. The sender is always the caller.
    pub fn send_message(
        &self,
        principal: &Principal,
        conversation_id: ConversationId,
        content: &str,
    ) -> Result<Message, GuardError> {
        validate::message_content(content)?;
        let sender = self
            .engine
            .require_identity(principal, EntityType::Message, Operation::Insert)?;
        self.run(|conn, resolver| {
            let message = Message {
                id: RowId::new_v4(),
                conversation_id,
                sender_id: sender,
                content: content.to_string(),
            };
            self.engine
                .authorize_insert(principal, message.clone().into(), resolver)
                .require()?;
            sql::insert_message(conn, &message)?;
            debug!(message = %message.id, conversation = %conversation_id, "message sent");
            Ok(message)
        })
    }

    /// Messages of a conversation visible to the caller, oldest first.
    pub fn list_messages(
        &self,
        principal: &Principal,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, GuardError> {
        self.run(|conn, resolver| {
            let found = sql::messages_in(conn, conversation_id)?;
            Ok(self.visible(principal, EntityType::Message, found, resolver))
        })
    }
}
