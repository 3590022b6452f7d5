//! SQLite schema for the social/messaging store.
//!
//! Tables:
//! - `profiles`: one per user, unique username
//! - `friendships`: canonical unordered pairs (`user1_id < user2_id`)
//! - `friend_requests`: directed edges with a status
//! - `conversations`, `conversation_members`, `messages`

/// DDL for the guarded tables.
///
/// Schema version: 1
pub const SOCIAL_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS profiles (
    id               TEXT PRIMARY KEY,
    username         TEXT NOT NULL UNIQUE,
    created_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

-- Friendships are only written by friend request acceptance
CREATE TABLE IF NOT EXISTS friendships (
    id               TEXT PRIMARY KEY,
    user1_id         TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    user2_id         TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    created_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    CHECK (user1_id < user2_id),
    UNIQUE (user1_id, user2_id)
);

CREATE TABLE IF NOT EXISTS friend_requests (
    id               TEXT PRIMARY KEY,
    sender_id        TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    receiver_id      TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    status           TEXT NOT NULL
                     CHECK (status IN ('pending', 'accepted', 'declined', 'cancelled')),
    created_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    CHECK (sender_id <> receiver_id)
);

-- At most one open request per direction; history is kept
CREATE UNIQUE INDEX IF NOT EXISTS idx_friend_requests_pending
    ON friend_requests(sender_id, receiver_id) WHERE status = 'pending';

CREATE TABLE IF NOT EXISTS conversations (
    id               TEXT PRIMARY KEY,
    is_group         INTEGER NOT NULL DEFAULT 0,
    created_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE IF NOT EXISTS conversation_members (
    id               TEXT PRIMARY KEY,
    conversation_id  TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
    user_id          TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    created_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    UNIQUE (conversation_id, user_id)
);

CREATE TABLE IF NOT EXISTS messages (
    id               TEXT PRIMARY KEY,
    conversation_id  TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
    sender_id        TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    content          TEXT NOT NULL,
    created_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

-- Resolver lookups are existence checks over two identifiers
CREATE INDEX IF NOT EXISTS idx_members_user
    ON conversation_members(user_id, conversation_id);
CREATE INDEX IF NOT EXISTS idx_friendships_user2
    ON friendships(user2_id);
CREATE INDEX IF NOT EXISTS idx_friend_requests_receiver
    ON friend_requests(receiver_id);
CREATE INDEX IF NOT EXISTS idx_messages_conversation
    ON messages(conversation_id, created_at);
"#;
