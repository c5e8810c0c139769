use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Accepts a snowflake as a decimal string or a bare integer.
///
/// Anything unparseable decodes to `0` so a single bad id never drops the
/// whole event.
struct SnowflakeVisitor;

impl Visitor<'_> for SnowflakeVisitor {
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a snowflake id as a string or integer")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
        Ok(u64::try_from(v).unwrap_or(0))
    }

    fn visit_f64<E: de::Error>(self, _v: f64) -> Result<u64, E> {
        Ok(0)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
        Ok(v.trim().parse().unwrap_or(0))
    }

    fn visit_bool<E: de::Error>(self, _v: bool) -> Result<u64, E> {
        Ok(0)
    }

    fn visit_unit<E: de::Error>(self) -> Result<u64, E> {
        Ok(0)
    }

    fn visit_none<E: de::Error>(self) -> Result<u64, E> {
        Ok(0)
    }
}

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            pub const fn get(self) -> u64 {
                self.0
            }

            /// Zero is what an unparseable or missing id decodes to.
            pub const fn is_zero(self) -> bool {
                self.0 == 0
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                deserializer.deserialize_any(SnowflakeVisitor).map(Self)
            }
        }
    };
}

snowflake!(
    /// Guild id. The guild's `@everyone` role shares this id.
    GuildId
);
snowflake!(ChannelId);
snowflake!(UserId);
snowflake!(RoleId);
snowflake!(MessageId);
snowflake!(EmojiId);
snowflake!(AttachmentId);
snowflake!(
    /// Target of a permission overwrite: a role id or a user id, depending
    /// on the overwrite kind.
    TargetId
);

impl GuildId {
    /// The `@everyone` role of this guild.
    pub const fn everyone_role(self) -> RoleId {
        RoleId(self.0)
    }
}

impl TargetId {
    pub const fn is_role(self, role: RoleId) -> bool {
        self.0 == role.0
    }

    pub const fn is_user(self, user: UserId) -> bool {
        self.0 == user.0
    }
}
