//! Opaque identifiers for rooms, sessions and users

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw identifier
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Room identifier. Rooms have no schema; the id is only a registry key.
    RoomId
);

string_id!(
    /// Identifier of one transport connection, assigned by the server.
    SessionId
);

string_id!(
    /// Stable identity of the human behind a session; may repeat across reconnects.
    UserId
);

impl SessionId {
    /// Mint a fresh session id for a newly accepted connection
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}
