use serde::{Deserialize, Serialize};

use super::de;
use super::id::{AttachmentId, ChannelId, GuildId, MessageId, RoleId};
use super::user::User;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attachment {
    pub id: AttachmentId,
    #[serde(deserialize_with = "de::null_as_default")]
    pub filename: String,
    #[serde(deserialize_with = "de::number")]
    pub size: u64,
    #[serde(deserialize_with = "de::null_as_default")]
    pub url: String,
    #[serde(deserialize_with = "de::null_as_default")]
    pub proxy_url: String,
    #[serde(deserialize_with = "de::optional_number")]
    pub width: Option<u32>,
    #[serde(deserialize_with = "de::optional_number")]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Embed {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub timestamp: Option<String>,
    #[serde(deserialize_with = "de::optional_number")]
    pub color: Option<u32>,
}

/// Message payload. Update events carry only `id`, `channel_id` and the
/// fields that changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
    pub author: Option<User>,
    #[serde(deserialize_with = "de::null_as_default")]
    pub content: String,
    /// Creation time, ISO 8601.
    #[serde(deserialize_with = "de::null_as_default")]
    pub timestamp: String,
    #[serde(deserialize_with = "de::null_as_default")]
    pub edited_timestamp: String,
    #[serde(deserialize_with = "de::flag")]
    pub tts: bool,
    #[serde(deserialize_with = "de::flag")]
    pub mention_everyone: bool,
    pub mentions: Option<Vec<User>>,
    pub mention_roles: Option<Vec<RoleId>>,
    pub attachments: Option<Vec<Attachment>>,
    pub embeds: Option<Vec<Embed>>,
    #[serde(deserialize_with = "de::flag")]
    pub pinned: bool,
    #[serde(rename = "type", deserialize_with = "de::number")]
    pub kind: u8,
}
