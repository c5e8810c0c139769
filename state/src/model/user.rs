use serde::{Deserialize, Deserializer, Serialize};

use super::de;
use super::id::{GuildId, RoleId, UserId};

/// Global user identity. Presence payloads often carry only `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: UserId,
    #[serde(deserialize_with = "de::null_as_default")]
    pub username: String,
    #[serde(deserialize_with = "de::null_as_default")]
    pub discriminator: String,
    pub avatar: Option<String>,
    #[serde(deserialize_with = "de::flag")]
    pub bot: bool,
}

/// Online status reported by presence updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Online,
    Idle,
    Dnd,
    Invisible,
    Offline,
}

impl Status {
    /// Returns `None` for an empty or unrecognised status.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "online" => Some(Self::Online),
            "idle" => Some(Self::Idle),
            "dnd" => Some(Self::Dnd),
            "invisible" => Some(Self::Invisible),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Idle => "idle",
            Self::Dnd => "dnd",
            Self::Invisible => "invisible",
            Self::Offline => "offline",
        }
    }
}

fn lenient_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Status>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(Status::parse))
}

/// What a user is currently doing ("Playing ...").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Activity {
    #[serde(deserialize_with = "de::null_as_default")]
    pub name: String,
    #[serde(rename = "type", deserialize_with = "de::number")]
    pub kind: u8,
    pub url: Option<String>,
}

/// A presence update. Only `user.id` is guaranteed to be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Presence {
    pub user: User,
    pub guild_id: Option<GuildId>,
    #[serde(deserialize_with = "lenient_status")]
    pub status: Option<Status>,
    /// Missing: not reported. `null`: not playing anything.
    #[serde(
        deserialize_with = "de::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub game: Option<Option<Activity>>,
    pub nick: Option<String>,
    pub roles: Option<Vec<RoleId>>,
}
