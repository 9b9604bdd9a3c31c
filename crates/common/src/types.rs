//! Platform-neutral message and identifier types.
//!
//! The chat platform speaks in numeric snowflake ids; these newtypes keep a
//! channel id from being passed where a role id is expected.

use std::{fmt, str::FromStr};

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Deserializer, Serialize},
};

use crate::error::Error;

/// Accepts ids written either as numbers or as strings in config files.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Number(u64),
    Text(String),
}

macro_rules! platform_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|_| Error::invalid_id($kind, s))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                match IdRepr::deserialize(deserializer)? {
                    IdRepr::Number(n) => Ok(Self(n)),
                    IdRepr::Text(s) => s.parse().map_err(serde::de::Error::custom),
                }
            }
        }
    };
}

platform_id!(
    /// A text channel (a ticket lives in exactly one).
    ChannelId,
    "channel"
);
platform_id!(
    /// A channel category; ticket channels are grouped under configured ones.
    CategoryId,
    "category"
);
platform_id!(
    /// A guild role.
    RoleId,
    "role"
);
platform_id!(UserId, "user");

/// Parse a comma-separated id list such as `"123, 456"`.
///
/// Empty segments are skipped so trailing commas are harmless.
pub fn parse_id_list<T: FromStr<Err = Error>>(raw: &str) -> Result<Vec<T>, Error> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

/// The author of an inbound message, as seen by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: UserId,
    pub name: String,
    pub roles: Vec<RoleId>,
    pub is_bot: bool,
}

/// A guild text message normalized away from the platform SDK.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub channel_id: ChannelId,
    /// Parent category of the channel, if it has one.
    pub category_id: Option<CategoryId>,
    pub author: Author,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}
