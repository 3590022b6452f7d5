//! Row shapes for the guarded entities.
//!
//! Only the attributes that authorization (or the guarded operations) read are
//! modelled; timestamps and other presentation columns stay in the store.

use crate::entity::EntityType;
use crate::ids::{ConversationId, RowId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Public profile. `id` is the owning user's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub username: String,
}

/// Unordered friendship edge, stored in canonical order (`user1 < user2`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friendship {
    pub id: RowId,
    pub user1: UserId,
    pub user2: UserId,
}

impl Friendship {
    /// Build a canonical friendship between two distinct users.
    ///
    /// Returns `None` for a self-pair.
    pub fn between(id: RowId, a: UserId, b: UserId) -> Option<Self> {
        let (user1, user2) = canonical_pair(a, b)?;
        Some(Self { id, user1, user2 })
    }

    pub fn involves(&self, user: UserId) -> bool {
        self.user1 == user || self.user2 == user
    }

    /// The other member of the pair, if `user` is one of them.
    pub fn other(&self, user: UserId) -> Option<UserId> {
        if self.user1 == user {
            Some(self.user2)
        } else if self.user2 == user {
            Some(self.user1)
        } else {
            None
        }
    }
}

/// Order two distinct user ids; `None` when they are equal.
pub fn canonical_pair(a: UserId, b: UserId) -> Option<(UserId, UserId)> {
    match a.cmp(&b) {
        std::cmp::Ordering::Less => Some((a, b)),
        std::cmp::Ordering::Greater => Some((b, a)),
        std::cmp::Ordering::Equal => None,
    }
}

/// Lifecycle of a friend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
    Declined,
    Cancelled,
}

impl FriendRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "declined" => Some(Self::Declined),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Directed friend request edge (sender -> receiver).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendRequest {
    pub id: RowId,
    pub sender: UserId,
    pub receiver: UserId,
    pub status: FriendRequestStatus,
}

/// Conversation container. Visibility derives entirely from membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub is_group: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMembership {
    pub id: RowId,
    pub conversation_id: ConversationId,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: RowId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: String,
}

/// A row of any guarded entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum Row {
    Profile(Profile),
    Friendship(Friendship),
    FriendRequest(FriendRequest),
    Conversation(Conversation),
    ConversationMembership(ConversationMembership),
    Message(Message),
}

impl Row {
    pub fn entity_type(&self) -> EntityType {
        match self {
            Row::Profile(_) => EntityType::Profile,
            Row::Friendship(_) => EntityType::Friendship,
            Row::FriendRequest(_) => EntityType::FriendRequest,
            Row::Conversation(_) => EntityType::Conversation,
            Row::ConversationMembership(_) => EntityType::ConversationMembership,
            Row::Message(_) => EntityType::Message,
        }
    }

    pub fn key(&self) -> RowKey {
        match self {
            Row::Profile(p) => RowKey::Profile(p.id),
            Row::Friendship(f) => RowKey::Friendship(f.id),
            Row::FriendRequest(r) => RowKey::FriendRequest(r.id),
            Row::Conversation(c) => RowKey::Conversation(c.id),
            Row::ConversationMembership(m) => RowKey::ConversationMembership(m.id),
            Row::Message(m) => RowKey::Message(m.id),
        }
    }
}

macro_rules! row_conversions {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Row {
                fn from(row: $variant) -> Self {
                    Row::$variant(row)
                }
            }

            impl TryFrom<Row> for $variant {
                type Error = Row;

                fn try_from(row: Row) -> Result<Self, Row> {
                    match row {
                        Row::$variant(inner) => Ok(inner),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

row_conversions!(
    Profile,
    Friendship,
    FriendRequest,
    Conversation,
    ConversationMembership,
    Message
);

/// Primary key of a row, tagged with its entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "entity", content = "id", rename_all = "snake_case")]
pub enum RowKey {
    Profile(UserId),
    Friendship(RowId),
    FriendRequest(RowId),
    Conversation(ConversationId),
    ConversationMembership(RowId),
    Message(RowId),
}

impl RowKey {
    pub fn entity_type(&self) -> EntityType {
        match self {
            RowKey::Profile(_) => EntityType::Profile,
            RowKey::Friendship(_) => EntityType::Friendship,
            RowKey::FriendRequest(_) => EntityType::FriendRequest,
            RowKey::Conversation(_) => EntityType::Conversation,
            RowKey::ConversationMembership(_) => EntityType::ConversationMembership,
            RowKey::Message(_) => EntityType::Message,
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id: &dyn fmt::Display = match self {
            RowKey::Profile(id) => id,
            RowKey::Conversation(id) => id,
            RowKey::Friendship(id)
            | RowKey::FriendRequest(id)
            | RowKey::ConversationMembership(id)
            | RowKey::Message(id) => id,
        };
        write!(f, "{}", id)
    }
}
