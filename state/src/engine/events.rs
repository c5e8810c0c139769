use serde::{Deserialize, Serialize};

use crate::model::{
    Channel, ChannelId, Guild, GuildId, Member, Message, MessageId, Presence, Role, RoleId,
    UnavailableGuild, User, VoiceState,
};

/// A gateway dispatch the state cache understands.
///
/// Decodes from the gateway's `{"t": "GUILD_CREATE", "d": {...}}` frame.
/// Frames of any other type fail to decode and are the caller's to skip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t", content = "d", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayEvent {
    Ready(Ready),

    GuildCreate(Guild),
    GuildUpdate(Guild),
    GuildDelete(UnavailableGuild),

    GuildMemberAdd(Member),
    GuildMemberUpdate(Member),
    GuildMemberRemove(MemberRemove),

    ChannelCreate(Channel),
    ChannelUpdate(Channel),
    ChannelDelete(Channel),

    GuildRoleCreate(GuildRole),
    GuildRoleUpdate(GuildRole),
    GuildRoleDelete(GuildRoleDelete),

    MessageCreate(Message),
    MessageUpdate(Message),
    MessageDelete(MessageDelete),
    MessageDeleteBulk(MessageDeleteBulk),

    PresenceUpdate(Presence),
    VoiceStateUpdate(VoiceState),
}

impl GatewayEvent {
    /// The dispatch type as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ready(_) => "READY",
            Self::GuildCreate(_) => "GUILD_CREATE",
            Self::GuildUpdate(_) => "GUILD_UPDATE",
            Self::GuildDelete(_) => "GUILD_DELETE",
            Self::GuildMemberAdd(_) => "GUILD_MEMBER_ADD",
            Self::GuildMemberUpdate(_) => "GUILD_MEMBER_UPDATE",
            Self::GuildMemberRemove(_) => "GUILD_MEMBER_REMOVE",
            Self::ChannelCreate(_) => "CHANNEL_CREATE",
            Self::ChannelUpdate(_) => "CHANNEL_UPDATE",
            Self::ChannelDelete(_) => "CHANNEL_DELETE",
            Self::GuildRoleCreate(_) => "GUILD_ROLE_CREATE",
            Self::GuildRoleUpdate(_) => "GUILD_ROLE_UPDATE",
            Self::GuildRoleDelete(_) => "GUILD_ROLE_DELETE",
            Self::MessageCreate(_) => "MESSAGE_CREATE",
            Self::MessageUpdate(_) => "MESSAGE_UPDATE",
            Self::MessageDelete(_) => "MESSAGE_DELETE",
            Self::MessageDeleteBulk(_) => "MESSAGE_DELETE_BULK",
            Self::PresenceUpdate(_) => "PRESENCE_UPDATE",
            Self::VoiceStateUpdate(_) => "VOICE_STATE_UPDATE",
        }
    }
}

/// First dispatch of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ready {
    pub user: User,
    pub session_id: String,
    pub private_channels: Vec<Channel>,
    /// Usually unavailable stubs; full guilds follow as guild creates.
    pub guilds: Vec<Guild>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemberRemove {
    pub guild_id: GuildId,
    pub user: User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildRole {
    pub guild_id: GuildId,
    pub role: Role,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildRoleDelete {
    pub guild_id: GuildId,
    pub role_id: RoleId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageDelete {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageDeleteBulk {
    pub ids: Vec<MessageId>,
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
}
