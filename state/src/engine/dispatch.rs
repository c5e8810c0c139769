use std::sync::Arc;

use tracing::{debug, warn};

use super::channel::ChannelState;
use super::events::GatewayEvent;
use super::guild::GuildState;
use super::state::State;
use crate::model::{ChannelId, GuildId};

impl State {
    /// Apply one gateway event. Returns `false` when the event was ignored:
    /// tracking for it is turned off, its guild or channel is not cached, or
    /// it is a private message and those are thrown away.
    pub fn dispatch(&self, event: &GatewayEvent) -> bool {
        let applied = self.apply(event);
        if self.config().debug {
            debug!(event = event.kind(), applied, "dispatched event");
        }
        applied
    }

    fn apply(&self, event: &GatewayEvent) -> bool {
        let config = self.config();
        let tracking = &config.tracking;

        match event {
            GatewayEvent::Ready(ready) => {
                self.handle_ready(ready);
                true
            }

            GatewayEvent::GuildCreate(guild) => {
                self.guild_create(guild);
                true
            }
            GatewayEvent::GuildUpdate(guild) => {
                self.guild_update(guild);
                true
            }
            GatewayEvent::GuildDelete(guild) => self.guild_remove(guild.id),

            GatewayEvent::GuildMemberAdd(member) | GatewayEvent::GuildMemberUpdate(member) => {
                if !tracking.members {
                    return false;
                }
                self.with_guild(member.guild_id, event, |g| g.member_add_update(member))
            }
            GatewayEvent::GuildMemberRemove(remove) => {
                if !tracking.members {
                    return false;
                }
                self.with_guild(Some(remove.guild_id), event, |g| {
                    g.member_remove(remove.user.id);
                })
            }

            GatewayEvent::ChannelCreate(channel) | GatewayEvent::ChannelUpdate(channel) => {
                if !tracking.channels {
                    return false;
                }
                let applied = self.channel_add_update(channel).is_some();
                if !applied {
                    warn!(
                        channel_id = %channel.id,
                        guild_id = ?channel.guild_id,
                        event = event.kind(),
                        "channel event for unknown guild"
                    );
                }
                applied
            }
            GatewayEvent::ChannelDelete(channel) => {
                if !tracking.channels {
                    return false;
                }
                self.channel_remove(channel)
            }

            GatewayEvent::GuildRoleCreate(update) | GatewayEvent::GuildRoleUpdate(update) => {
                if !tracking.roles {
                    return false;
                }
                self.with_guild(Some(update.guild_id), event, |g| {
                    g.role_add_update(&update.role);
                })
            }
            GatewayEvent::GuildRoleDelete(delete) => {
                if !tracking.roles {
                    return false;
                }
                self.with_guild(Some(delete.guild_id), event, |g| {
                    g.role_remove(delete.role_id);
                })
            }

            GatewayEvent::MessageCreate(message) | GatewayEvent::MessageUpdate(message) => {
                let limits = config.message_limits();
                self.with_message_channel(message.channel_id, event, |c| {
                    c.message_add_update(message, limits)
                })
            }
            GatewayEvent::MessageDelete(delete) => {
                let mark_only = config.mark_deleted_only();
                self.with_message_channel(delete.channel_id, event, |c| {
                    c.message_remove(delete.id, mark_only);
                    true
                })
            }
            GatewayEvent::MessageDeleteBulk(delete) => {
                let mark_only = config.mark_deleted_only();
                self.with_message_channel(delete.channel_id, event, |c| {
                    c.write(|data| {
                        for id in &delete.ids {
                            data.message_remove(*id, mark_only);
                        }
                    })
                    .is_some()
                })
            }

            GatewayEvent::PresenceUpdate(presence) => {
                if !tracking.presences {
                    return false;
                }
                self.with_guild(presence.guild_id, event, |g| g.presence_add_update(presence))
            }
            GatewayEvent::VoiceStateUpdate(voice) => {
                if !tracking.voice {
                    return false;
                }
                self.with_guild(voice.guild_id, event, |g| g.voice_state_update(voice))
            }
        }
    }

    fn with_guild(
        &self,
        guild_id: Option<GuildId>,
        event: &GatewayEvent,
        f: impl FnOnce(&GuildState),
    ) -> bool {
        let Some(guild) = guild_id.and_then(|id| self.guild(id)) else {
            warn!(guild_id = ?guild_id, event = event.kind(), "event for unknown guild");
            return false;
        };
        f(&guild);
        true
    }

    /// Look up the channel of a message event, honouring the private
    /// message throw-away setting.
    fn with_message_channel(
        &self,
        channel_id: ChannelId,
        event: &GatewayEvent,
        f: impl FnOnce(&Arc<ChannelState>) -> bool,
    ) -> bool {
        let Some(channel) = self.channel(channel_id) else {
            debug!(%channel_id, event = event.kind(), "message event for uncached channel");
            return false;
        };
        if channel.is_private() && self.config().messages.throw_away_dm_messages {
            return false;
        }
        f(&channel)
    }
}
