//! The policy declarations.

use crate::resolver::{RelationshipResolver, ResolveError};
use rowguard_common::{EntityType, Operation, Row, UserId};

/// Predicate over an authenticated caller and a target row.
///
/// A row of the wrong entity never satisfies a predicate.
pub type IdentityPredicate =
    fn(UserId, &Row, &dyn RelationshipResolver) -> Result<bool, ResolveError>;

#[derive(Debug, Clone, Copy)]
pub enum Access {
    /// Satisfied by every principal, anonymous included.
    Public,
    /// Requires an identity; the predicate decides.
    Identity(IdentityPredicate),
}

#[derive(Debug, Clone, Copy)]
pub struct PolicyRule {
    pub name: &'static str,
    pub access: Access,
}

impl PolicyRule {
    pub const fn public(name: &'static str) -> Self {
        Self {
            name,
            access: Access::Public,
        }
    }

    pub const fn identity(name: &'static str, predicate: IdentityPredicate) -> Self {
        Self {
            name,
            access: Access::Identity(predicate),
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self.access, Access::Public)
    }
}

/// Rule for an (entity, operation) pair, `None` when none is declared.
///
/// Each entity arm ends in an explicit `_ => None` so a new operation is a
/// visible gap rather than an implicit grant.
pub fn standard_rule(entity: EntityType, op: Operation) -> Option<PolicyRule> {
    use Operation::*;

    match entity {
        EntityType::Profile => match op {
            Read => Some(PolicyRule::public("profile_read_public")),
            Update => Some(PolicyRule::identity("profile_update_own", profile_is_own)),
            _ => None,
        },
        // No insert: friendships only come from accepting a friend request.
        EntityType::Friendship => match op {
            Read => Some(PolicyRule::identity(
                "friendship_read_member",
                friendship_has_member,
            )),
            Delete => Some(PolicyRule::identity(
                "friendship_delete_member",
                friendship_has_member,
            )),
            _ => None,
        },
        EntityType::FriendRequest => match op {
            Read => Some(PolicyRule::identity(
                "friend_request_read_endpoint",
                request_has_endpoint,
            )),
            Insert => Some(PolicyRule::identity(
                "friend_request_insert_sender",
                request_is_sender,
            )),
            Update => Some(PolicyRule::identity(
                "friend_request_update_receiver",
                request_is_receiver,
            )),
            _ => None,
        },
        EntityType::Conversation => match op {
            Read => Some(PolicyRule::identity(
                "conversation_read_member",
                conversation_has_member,
            )),
            _ => None,
        },
        EntityType::ConversationMembership => match op {
            Read => Some(PolicyRule::identity(
                "membership_read_own",
                membership_is_own,
            )),
            _ => None,
        },
        EntityType::Message => match op {
            Read => Some(PolicyRule::identity(
                "message_read_member",
                message_in_member_conversation,
            )),
            Insert => Some(PolicyRule::identity(
                "message_insert_member",
                message_in_member_conversation,
            )),
            _ => None,
        },
    }
}

fn profile_is_own(
    user: UserId,
    row: &Row,
    _: &dyn RelationshipResolver,
) -> Result<bool, ResolveError> {
    Ok(matches!(row, Row::Profile(p) if p.id == user))
}

fn friendship_has_member(
    user: UserId,
    row: &Row,
    _: &dyn RelationshipResolver,
) -> Result<bool, ResolveError> {
    Ok(matches!(row, Row::Friendship(f) if f.involves(user)))
}

fn request_has_endpoint(
    user: UserId,
    row: &Row,
    _: &dyn RelationshipResolver,
) -> Result<bool, ResolveError> {
    Ok(matches!(row, Row::FriendRequest(r) if r.sender == user || r.receiver == user))
}

fn request_is_sender(
    user: UserId,
    row: &Row,
    _: &dyn RelationshipResolver,
) -> Result<bool, ResolveError> {
    Ok(matches!(row, Row::FriendRequest(r) if r.sender == user))
}

fn request_is_receiver(
    user: UserId,
    row: &Row,
    _: &dyn RelationshipResolver,
) -> Result<bool, ResolveError> {
    Ok(matches!(row, Row::FriendRequest(r) if r.receiver == user))
}

fn conversation_has_member(
    user: UserId,
    row: &Row,
    resolver: &dyn RelationshipResolver,
) -> Result<bool, ResolveError> {
    match row {
        Row::Conversation(c) => resolver.is_conversation_member(user, c.id),
        _ => Ok(false),
    }
}

fn membership_is_own(
    user: UserId,
    row: &Row,
    _: &dyn RelationshipResolver,
) -> Result<bool, ResolveError> {
    Ok(matches!(row, Row::ConversationMembership(m) if m.user_id == user))
}

fn message_in_member_conversation(
    user: UserId,
    row: &Row,
    resolver: &dyn RelationshipResolver,
) -> Result<bool, ResolveError> {
    match row {
        Row::Message(m) => resolver.is_conversation_member(user, m.conversation_id),
        _ => Ok(false),
    }
}
