use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::de as helpers;
use super::id::{ChannelId, GuildId, MessageId, TargetId};
use super::user::User;
use crate::engine::permissions::Permissions;

/// Channel kind as sent by the gateway (`type` field).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u8")]
pub enum ChannelType {
    #[default]
    GuildText,
    Dm,
    GuildVoice,
    GroupDm,
    GuildCategory,
    GuildNews,
    Other(u8),
}

impl From<u8> for ChannelType {
    fn from(raw: u8) -> Self {
        match raw {
            0 => Self::GuildText,
            1 => Self::Dm,
            2 => Self::GuildVoice,
            3 => Self::GroupDm,
            4 => Self::GuildCategory,
            5 => Self::GuildNews,
            other => Self::Other(other),
        }
    }
}

impl From<ChannelType> for u8 {
    fn from(kind: ChannelType) -> Self {
        match kind {
            ChannelType::GuildText => 0,
            ChannelType::Dm => 1,
            ChannelType::GuildVoice => 2,
            ChannelType::GroupDm => 3,
            ChannelType::GuildCategory => 4,
            ChannelType::GuildNews => 5,
            ChannelType::Other(other) => other,
        }
    }
}

impl<'de> Deserialize<'de> for ChannelType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        helpers::number(deserializer).map(|raw: u8| Self::from(raw))
    }
}

impl ChannelType {
    /// Direct and group-direct channels belong to no guild.
    pub fn is_private(self) -> bool {
        matches!(self, Self::Dm | Self::GroupDm)
    }
}

/// Whether an overwrite targets a role or a single member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OverwriteKind {
    #[default]
    Role,
    Member,
}

impl OverwriteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Role => "role",
            Self::Member => "member",
        }
    }
}

impl Serialize for OverwriteKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

struct OverwriteKindVisitor;

impl Visitor<'_> for OverwriteKindVisitor {
    type Value = OverwriteKind;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("\"role\", \"member\", 0 or 1")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<OverwriteKind, E> {
        match v {
            "member" => Ok(OverwriteKind::Member),
            _ => Ok(OverwriteKind::Role),
        }
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<OverwriteKind, E> {
        match v {
            1 => Ok(OverwriteKind::Member),
            _ => Ok(OverwriteKind::Role),
        }
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<OverwriteKind, E> {
        self.visit_u64(u64::try_from(v).unwrap_or(0))
    }
}

impl<'de> Deserialize<'de> for OverwriteKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(OverwriteKindVisitor)
    }
}

/// Channel-level allow/deny override for a role or a member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionOverwrite {
    pub id: TargetId,
    #[serde(rename = "type")]
    pub kind: OverwriteKind,
    pub allow: Permissions,
    pub deny: Permissions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Channel {
    pub id: ChannelId,
    pub guild_id: Option<GuildId>,
    #[serde(rename = "type")]
    pub kind: ChannelType,
    #[serde(deserialize_with = "helpers::null_as_default")]
    pub name: String,
    pub topic: Option<String>,
    #[serde(deserialize_with = "helpers::number")]
    pub position: i32,
    #[serde(deserialize_with = "helpers::flag")]
    pub nsfw: bool,
    pub parent_id: Option<ChannelId>,
    pub last_message_id: Option<MessageId>,
    #[serde(deserialize_with = "helpers::optional_number")]
    pub bitrate: Option<u32>,
    #[serde(deserialize_with = "helpers::optional_number")]
    pub user_limit: Option<u32>,
    pub permission_overwrites: Option<Vec<PermissionOverwrite>>,
    pub recipients: Option<Vec<User>>,
}

impl Channel {
    pub fn is_private(&self) -> bool {
        self.kind.is_private()
    }

    /// The other party of a one-to-one direct channel.
    pub fn recipient(&self) -> Option<&User> {
        if self.kind != ChannelType::Dm {
            return None;
        }
        self.recipients.as_ref().and_then(|r| r.first())
    }

    pub fn overwrites(&self) -> &[PermissionOverwrite] {
        self.permission_overwrites.as_deref().unwrap_or_default()
    }
}
