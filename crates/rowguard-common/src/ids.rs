//! Identifier newtypes.
//!
//! All identifiers are UUIDs. The newtypes keep a user id from being passed
//! where a conversation id is expected; the canonical text form (lowercase,
//! hyphenated) sorts the same way as the underlying bytes, which the store
//! relies on for canonical friendship ordering.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Fresh random id.
            pub fn new_v4() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.hyphenated())
            }
        }
    };
}

uuid_newtype!(
    /// Identifier of an authenticated user. Profiles share it 1:1.
    UserId
);
uuid_newtype!(
    /// Identifier of a conversation.
    ConversationId
);
uuid_newtype!(
    /// Primary key of a row that is not itself a user or a conversation
    /// (friendships, friend requests, memberships, messages).
    RowId
);
