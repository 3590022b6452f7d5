//! Statement helpers over a borrowed connection.
//!
//! None of these consult the policy engine. They are the raw data access the
//! guarded operations (and store bootstrapping) build on, and they take a
//! `&Connection` so they compose inside a caller's transaction.

use super::rows::{
    self, FRIENDSHIP_COLUMNS, FRIEND_REQUEST_COLUMNS, MEMBERSHIP_COLUMNS, MESSAGE_COLUMNS,
    PROFILE_COLUMNS,
};
use super::StoreError;
use rowguard_common::{
    canonical_pair, Conversation, ConversationId, ConversationMembership, FriendRequest,
    FriendRequestStatus, Friendship, Message, Profile, RowId, UserId,
};
use rusqlite::{params, Connection, OptionalExtension};

pub fn insert_profile(
    conn: &Connection,
    id: UserId,
    username: &str,
) -> Result<Profile, StoreError> {
    conn.execute(
        "INSERT INTO profiles (id, username) VALUES (?1, ?2)",
        params![id.to_string(), username],
    )?;
    Ok(Profile {
        id,
        username: username.to_string(),
    })
}

pub fn find_profile_by_username(
    conn: &Connection,
    username: &str,
) -> Result<Option<Profile>, StoreError> {
    let sql = format!("SELECT {} FROM profiles WHERE username = ?1", PROFILE_COLUMNS);
    Ok(conn.query_row(&sql, [username], rows::profile).optional()?)
}

pub fn update_profile_username(
    conn: &Connection,
    id: UserId,
    username: &str,
) -> Result<usize, StoreError> {
    Ok(conn.execute(
        "UPDATE profiles SET username = ?1 WHERE id = ?2",
        params![username, id.to_string()],
    )?)
}

/// Case-insensitive prefix search, alphabetical.
pub fn search_profiles(
    conn: &Connection,
    prefix: &str,
    limit: usize,
) -> Result<Vec<Profile>, StoreError> {
    let pattern = format!("{}%", escape_like(&prefix.to_lowercase()));
    let sql = format!(
        "SELECT {} FROM profiles WHERE lower(username) LIKE ?1 ESCAPE '\\' \
         ORDER BY username LIMIT ?2",
        PROFILE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let found = stmt
        .query_map(params![pattern, limit as i64], rows::profile)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(found)
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn insert_friend_request(
    conn: &Connection,
    sender: UserId,
    receiver: UserId,
) -> Result<FriendRequest, StoreError> {
    let request = FriendRequest {
        id: RowId::new_v4(),
        sender,
        receiver,
        status: FriendRequestStatus::Pending,
    };
    write_friend_request(conn, &request)?;
    Ok(request)
}

pub fn write_friend_request(conn: &Connection, request: &FriendRequest) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO friend_requests (id, sender_id, receiver_id, status) VALUES (?1, ?2, ?3, ?4)",
        params![
            request.id.to_string(),
            request.sender.to_string(),
            request.receiver.to_string(),
            request.status.as_str(),
        ],
    )?;
    Ok(())
}

pub fn set_friend_request_status(
    conn: &Connection,
    id: RowId,
    status: FriendRequestStatus,
) -> Result<usize, StoreError> {
    Ok(conn.execute(
        "UPDATE friend_requests SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id.to_string()],
    )?)
}

/// The open request between two users, in either direction.
pub fn find_pending_request_between(
    conn: &Connection,
    a: UserId,
    b: UserId,
) -> Result<Option<FriendRequest>, StoreError> {
    let sql = format!(
        "SELECT {} FROM friend_requests \
         WHERE status = 'pending' \
           AND ((sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1)) \
         ORDER BY created_at DESC LIMIT 1",
        FRIEND_REQUEST_COLUMNS
    );
    Ok(conn
        .query_row(&sql, params![a.to_string(), b.to_string()], rows::friend_request)
        .optional()?)
}

pub fn friend_requests_for(
    conn: &Connection,
    user: UserId,
) -> Result<Vec<FriendRequest>, StoreError> {
    let sql = format!(
        "SELECT {} FROM friend_requests WHERE sender_id = ?1 OR receiver_id = ?1 \
         ORDER BY created_at, rowid",
        FRIEND_REQUEST_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let found = stmt
        .query_map([user.to_string()], rows::friend_request)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(found)
}

/// Write the canonical friendship row for a pair, or return the existing one.
///
/// Crate-private: friend request acceptance is the only writer.
pub(crate) fn insert_friendship(
    conn: &Connection,
    a: UserId,
    b: UserId,
) -> Result<Friendship, StoreError> {
    let (user1, user2) = canonical_pair(a, b)
        .ok_or_else(|| StoreError::Constraint("friendship with self".to_string()))?;
    conn.execute(
        "INSERT INTO friendships (id, user1_id, user2_id) VALUES (?1, ?2, ?3) \
         ON CONFLICT(user1_id, user2_id) DO NOTHING",
        params![
            RowId::new_v4().to_string(),
            user1.to_string(),
            user2.to_string()
        ],
    )?;
    let sql = format!(
        "SELECT {} FROM friendships WHERE user1_id = ?1 AND user2_id = ?2",
        FRIENDSHIP_COLUMNS
    );
    Ok(conn.query_row(
        &sql,
        params![user1.to_string(), user2.to_string()],
        rows::friendship,
    )?)
}

pub fn friendships_for(conn: &Connection, user: UserId) -> Result<Vec<Friendship>, StoreError> {
    let sql = format!(
        "SELECT {} FROM friendships WHERE user1_id = ?1 OR user2_id = ?1 ORDER BY created_at, rowid",
        FRIENDSHIP_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let found = stmt
        .query_map([user.to_string()], rows::friendship)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(found)
}

pub fn delete_friendship(conn: &Connection, id: RowId) -> Result<usize, StoreError> {
    Ok(conn.execute(
        "DELETE FROM friendships WHERE id = ?1",
        [id.to_string()],
    )?)
}

pub fn insert_conversation(conn: &Connection, is_group: bool) -> Result<Conversation, StoreError> {
    let conversation = Conversation {
        id: ConversationId::new_v4(),
        is_group,
    };
    conn.execute(
        "INSERT INTO conversations (id, is_group) VALUES (?1, ?2)",
        params![conversation.id.to_string(), is_group as i64],
    )?;
    Ok(conversation)
}

pub fn insert_member(
    conn: &Connection,
    conversation: ConversationId,
    user: UserId,
) -> Result<ConversationMembership, StoreError> {
    let membership = ConversationMembership {
        id: RowId::new_v4(),
        conversation_id: conversation,
        user_id: user,
    };
    conn.execute(
        "INSERT INTO conversation_members (id, conversation_id, user_id) VALUES (?1, ?2, ?3)",
        params![
            membership.id.to_string(),
            conversation.to_string(),
            user.to_string()
        ],
    )?;
    Ok(membership)
}

pub fn delete_member(
    conn: &Connection,
    conversation: ConversationId,
    user: UserId,
) -> Result<usize, StoreError> {
    Ok(conn.execute(
        "DELETE FROM conversation_members WHERE conversation_id = ?1 AND user_id = ?2",
        params![conversation.to_string(), user.to_string()],
    )?)
}

pub fn memberships_for(
    conn: &Connection,
    user: UserId,
) -> Result<Vec<ConversationMembership>, StoreError> {
    let sql = format!(
        "SELECT {} FROM conversation_members WHERE user_id = ?1 ORDER BY created_at, rowid",
        MEMBERSHIP_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let found = stmt
        .query_map([user.to_string()], rows::membership)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(found)
}

pub fn insert_message(conn: &Connection, message: &Message) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO messages (id, conversation_id, sender_id, content) VALUES (?1, ?2, ?3, ?4)",
        params![
            message.id.to_string(),
            message.conversation_id.to_string(),
            message.sender_id.to_string(),
            message.content,
        ],
    )?;
    Ok(())
}

/// Messages of one conversation, oldest first.
pub fn messages_in(
    conn: &Connection,
    conversation: ConversationId,
) -> Result<Vec<Message>, StoreError> {
    let sql = format!(
        "SELECT {} FROM messages WHERE conversation_id = ?1 ORDER BY created_at, rowid",
        MESSAGE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let found = stmt
        .query_map([conversation.to_string()], rows::message)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(found)
}
