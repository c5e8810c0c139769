use serde::{Deserialize, Serialize};

use super::channel::Channel;
use super::de;
use super::id::{ChannelId, EmojiId, GuildId, RoleId, UserId};
use super::user::{Presence, User};
use crate::engine::permissions::Permissions;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Role {
    pub id: RoleId,
    #[serde(deserialize_with = "de::null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "de::number")]
    pub color: u32,
    #[serde(deserialize_with = "de::flag")]
    pub hoist: bool,
    #[serde(deserialize_with = "de::number")]
    pub position: i32,
    pub permissions: Permissions,
    #[serde(deserialize_with = "de::flag")]
    pub managed: bool,
    #[serde(deserialize_with = "de::flag")]
    pub mentionable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Emoji {
    pub id: EmojiId,
    #[serde(deserialize_with = "de::null_as_default")]
    pub name: String,
    pub roles: Option<Vec<RoleId>>,
    #[serde(deserialize_with = "de::flag")]
    pub require_colons: bool,
    #[serde(deserialize_with = "de::flag")]
    pub managed: bool,
    #[serde(deserialize_with = "de::flag")]
    pub animated: bool,
}

/// A user's voice connection. An empty `channel_id` means "left voice".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceState {
    pub guild_id: Option<GuildId>,
    pub channel_id: Option<ChannelId>,
    pub user_id: UserId,
    #[serde(deserialize_with = "de::null_as_default")]
    pub session_id: String,
    #[serde(deserialize_with = "de::flag")]
    pub deaf: bool,
    #[serde(deserialize_with = "de::flag")]
    pub mute: bool,
    #[serde(deserialize_with = "de::flag")]
    pub self_deaf: bool,
    #[serde(deserialize_with = "de::flag")]
    pub self_mute: bool,
    #[serde(deserialize_with = "de::flag")]
    pub suppress: bool,
}

impl VoiceState {
    pub fn left_voice(&self) -> bool {
        self.channel_id.is_none_or(|id| id.is_zero())
    }
}

/// Guild membership payload (member add/update, guild create member list).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Member {
    pub guild_id: Option<GuildId>,
    pub user: User,
    /// Missing: not reported. `null`: nickname cleared.
    #[serde(
        deserialize_with = "de::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub nick: Option<Option<String>>,
    pub roles: Option<Vec<RoleId>>,
    #[serde(deserialize_with = "de::null_as_default")]
    pub joined_at: String,
    #[serde(deserialize_with = "de::flag")]
    pub deaf: bool,
    #[serde(deserialize_with = "de::flag")]
    pub mute: bool,
}

/// Guild payload. Collections are `None` when the event did not carry them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Guild {
    pub id: GuildId,
    #[serde(deserialize_with = "de::null_as_default")]
    pub name: String,
    pub icon: Option<String>,
    pub owner_id: UserId,
    #[serde(deserialize_with = "de::null_as_default")]
    pub region: String,
    pub afk_channel_id: Option<ChannelId>,
    #[serde(deserialize_with = "de::number")]
    pub afk_timeout: u32,
    #[serde(deserialize_with = "de::number")]
    pub verification_level: u8,
    #[serde(deserialize_with = "de::number")]
    pub member_count: u64,
    #[serde(deserialize_with = "de::flag")]
    pub large: bool,
    #[serde(deserialize_with = "de::flag")]
    pub unavailable: bool,
    pub joined_at: Option<String>,
    pub roles: Option<Vec<Role>>,
    pub emojis: Option<Vec<Emoji>>,
    pub voice_states: Option<Vec<VoiceState>>,
    pub members: Option<Vec<Member>>,
    pub presences: Option<Vec<Presence>>,
    pub channels: Option<Vec<Channel>>,
}

impl Guild {
    pub fn roles(&self) -> &[Role] {
        self.roles.as_deref().unwrap_or_default()
    }

    pub fn voice_states(&self) -> &[VoiceState] {
        self.voice_states.as_deref().unwrap_or_default()
    }
}

/// Guild delete payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnavailableGuild {
    pub id: GuildId,
    #[serde(deserialize_with = "de::flag")]
    pub unavailable: bool,
}
