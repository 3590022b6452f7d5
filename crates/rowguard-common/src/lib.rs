//! Shared domain types for Rowguard.
//!
//! These types carry no storage or policy logic. They describe the fixed set
//! of entities the engine guards, the operations that can be attempted on
//! them, and the row shapes the engine evaluates predicates against.

pub mod entity;
pub mod ids;
pub mod rows;

pub use entity::{EntityType, Operation};
pub use ids::{ConversationId, RowId, UserId};
pub use rows::{
    canonical_pair, Conversation, ConversationMembership, FriendRequest, FriendRequestStatus,
    Friendship, Message, Profile, Row, RowKey,
};
