//! Mapping between SQLite rows and the shared row types.

use rowguard_common::{
    Conversation, ConversationMembership, FriendRequest, FriendRequestStatus, Friendship,
    Message, Profile, Row, RowKey,
};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension};
use std::str::FromStr;

pub(crate) const PROFILE_COLUMNS: &str = "id, username";
pub(crate) const FRIENDSHIP_COLUMNS: &str = "id, user1_id, user2_id";
pub(crate) const FRIEND_REQUEST_COLUMNS: &str = "id, sender_id, receiver_id, status";
pub(crate) const CONVERSATION_COLUMNS: &str = "id, is_group";
pub(crate) const MEMBERSHIP_COLUMNS: &str = "id, conversation_id, user_id";
pub(crate) const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, content";

fn get_id<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = uuid::Error>,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: get_id(row, 0)?,
        username: row.get(1)?,
    })
}

pub(crate) fn friendship(row: &rusqlite::Row<'_>) -> rusqlite::Result<Friendship> {
    Ok(Friendship {
        id: get_id(row, 0)?,
        user1: get_id(row, 1)?,
        user2: get_id(row, 2)?,
    })
}

pub(crate) fn friend_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<FriendRequest> {
    let status: String = row.get(3)?;
    let status = FriendRequestStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Text,
            format!("unknown friend request status '{}'", status).into(),
        )
    })?;
    Ok(FriendRequest {
        id: get_id(row, 0)?,
        sender: get_id(row, 1)?,
        receiver: get_id(row, 2)?,
        status,
    })
}

pub(crate) fn conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: get_id(row, 0)?,
        is_group: row.get::<_, i64>(1)? != 0,
    })
}

pub(crate) fn membership(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationMembership> {
    Ok(ConversationMembership {
        id: get_id(row, 0)?,
        conversation_id: get_id(row, 1)?,
        user_id: get_id(row, 2)?,
    })
}

pub(crate) fn message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: get_id(row, 0)?,
        conversation_id: get_id(row, 1)?,
        sender_id: get_id(row, 2)?,
        content: row.get(3)?,
    })
}

/// Load the current state of the row behind `key`.
pub(crate) fn fetch(conn: &Connection, key: RowKey) -> rusqlite::Result<Option<Row>> {
    match key {
        RowKey::Profile(id) => fetch_one(conn, "profiles", PROFILE_COLUMNS, id, profile),
        RowKey::Friendship(id) => {
            fetch_one(conn, "friendships", FRIENDSHIP_COLUMNS, id, friendship)
        }
        RowKey::FriendRequest(id) => fetch_one(
            conn,
            "friend_requests",
            FRIEND_REQUEST_COLUMNS,
            id,
            friend_request,
        ),
        RowKey::Conversation(id) => {
            fetch_one(conn, "conversations", CONVERSATION_COLUMNS, id, conversation)
        }
        RowKey::ConversationMembership(id) => fetch_one(
            conn,
            "conversation_members",
            MEMBERSHIP_COLUMNS,
            id,
            membership,
        ),
        RowKey::Message(id) => fetch_one(conn, "messages", MESSAGE_COLUMNS, id, message),
    }
}

fn fetch_one<I, T>(
    conn: &Connection,
    table: &str,
    columns: &str,
    id: I,
    map: fn(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
) -> rusqlite::Result<Option<Row>>
where
    I: std::fmt::Display,
    T: Into<Row>,
{
    let sql = format!("SELECT {} FROM {} WHERE id = ?1", columns, table);
    let found = conn
        .query_row(&sql, [id.to_string()], map)
        .optional()?;
    Ok(found.map(Into::into))
}
