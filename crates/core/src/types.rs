//! Identifier types and session credentials
//!
//! Room, user and event identifiers are opaque strings assigned by the
//! homeserver. They are wrapped in newtypes so a room id can never be passed
//! where a user id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an identifier string.
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            /// Borrow the identifier as a string slice.
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
                $name(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                $name(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Room identifier (`!opaque:server`)
    RoomId
);

string_id!(
    /// User identifier (`@local:server`)
    UserId
);

string_id!(
    /// Event identifier (`$opaque`)
    EventId
);

/// Session credentials
///
/// Identifies the session a store belongs to. Immutable for the store's
/// lifetime; a store opened with different credentials is reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// The logged-in user
    pub user_id: UserId,
    /// Access token of the session
    pub access_token: String,
}

impl Credentials {
    /// Create credentials for a session.
    pub fn new(user_id: impl Into<UserId>, access_token: impl Into<String>) -> Self {
        Credentials {
            user_id: user_id.into(),
            access_token: access_token.into(),
        }
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
