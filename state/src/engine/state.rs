use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::channel::ChannelState;
use super::events::Ready;
use super::guild::GuildState;
use super::permissions::Permissions;
use super::reaper::OfflineReaper;
use crate::config::StateConfig;
use crate::error::StateError;
use crate::model::{Channel, ChannelId, Guild, GuildId, User, UserId};

/// The root of the cache. Thread-safe; share it behind an `Arc`.
///
/// The root lock only guards the guild map, the global channel index and
/// the current user. Guild data sits behind each guild's own lock, and
/// whenever both are needed the root lock is taken first.
#[derive(Debug)]
pub struct State {
    config: StateConfig,
    reaper: Option<OfflineReaper>,
    inner: RwLock<StateData>,
}

#[derive(Debug, Default)]
struct StateData {
    guilds: HashMap<GuildId, Arc<GuildState>>,
    /// Every cached channel, guild-owned or private, by id.
    channels: HashMap<ChannelId, Arc<ChannelState>>,
    private_channels: HashSet<ChannelId>,
    current_user: Option<User>,
}

/// Counts reported by [`State::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateStats {
    pub guilds: usize,
    pub channels: usize,
    pub private_channels: usize,
    pub members: usize,
    pub messages: usize,
}

impl State {
    /// Build an empty state. Offline member eviction needs a tokio runtime
    /// and is disabled when constructed outside one.
    pub fn new(config: StateConfig) -> Self {
        let reaper = if config.members.remove_offline_members {
            OfflineReaper::from_current(config.offline_grace())
        } else {
            None
        };
        Self {
            config,
            reaper,
            inner: RwLock::new(StateData::default()),
        }
    }

    pub fn config(&self) -> &StateConfig {
        &self.config
    }

    pub fn guild(&self, id: GuildId) -> Option<Arc<GuildState>> {
        self.inner.read().guilds.get(&id).cloned()
    }

    pub fn guild_ids(&self) -> Vec<GuildId> {
        self.inner.read().guilds.keys().copied().collect()
    }

    pub fn channel(&self, id: ChannelId) -> Option<Arc<ChannelState>> {
        self.inner.read().channels.get(&id).cloned()
    }

    pub fn private_channel_ids(&self) -> Vec<ChannelId> {
        self.inner.read().private_channels.iter().copied().collect()
    }

    /// The guild record without any of its collections.
    pub fn light_guild_copy(&self, id: GuildId) -> Option<Guild> {
        let guild = self.guild(id)?;
        Some(guild.light_copy())
    }

    pub fn channel_copy(&self, id: ChannelId) -> Option<Channel> {
        self.channel(id)?.snapshot()
    }

    pub fn channel_copy_deep(&self, id: ChannelId) -> Option<Channel> {
        self.channel(id)?.snapshot_deep()
    }

    /// The user from the last ready event.
    pub fn current_user(&self) -> Option<User> {
        self.inner.read().current_user.clone()
    }

    /// Effective permissions of a member in a guild channel.
    pub fn member_permissions(
        &self,
        channel_id: ChannelId,
        member_id: UserId,
    ) -> Result<Permissions, StateError> {
        let guild = self
            .channel(channel_id)
            .and_then(|c| c.guild())
            .ok_or(StateError::ChannelNotFound(channel_id))?;
        guild.member_permissions(channel_id, member_id)
    }

    /// Install a guild from a full snapshot, replacing any cached version.
    /// Message history of channels that survive the replacement is kept.
    pub fn guild_create(&self, guild: &Guild) {
        let mut inner = self.inner.write();
        self.create_locked(&mut inner, guild);
    }

    fn create_locked(&self, inner: &mut StateData, guild: &Guild) {
        let mut preserved = HashMap::new();
        if let Some(existing) = inner.guilds.get(&guild.id).cloned() {
            preserved = existing.write().take_message_windows();
            for id in preserved.keys() {
                inner.channels.remove(id);
            }
        }

        let state = GuildState::new(guild, self.reaper.clone());
        {
            let mut data = state.write();
            data.restore_messages(preserved);
            for channel in data.channel_handles() {
                inner.channels.insert(channel.id(), channel);
            }
            info!(
                guild_id = %guild.id,
                channels = data.channel_count(),
                members = data.member_count(),
                "guild created"
            );
        }
        inner.guilds.insert(guild.id, state);
    }

    /// Patch a cached guild, or create it when unknown.
    pub fn guild_update(&self, guild: &Guild) {
        let mut inner = self.inner.write();
        self.update_locked(&mut inner, guild);
    }

    fn update_locked(&self, inner: &mut StateData, guild: &Guild) {
        let Some(existing) = inner.guilds.get(&guild.id).cloned() else {
            self.create_locked(inner, guild);
            return;
        };

        let change = existing.update(guild);
        for id in &change.removed {
            inner.channels.remove(id);
        }
        for channel in change.added {
            inner.channels.insert(channel.id(), channel);
        }
        debug!(guild_id = %guild.id, removed = change.removed.len(), "guild updated");
    }

    /// Drop a guild and every index entry of its channels.
    pub fn guild_remove(&self, id: GuildId) -> bool {
        let mut inner = self.inner.write();
        if inner.guilds.remove(&id).is_none() {
            return false;
        }
        inner.channels.retain(|_, c| c.guild_id() != Some(id));
        info!(guild_id = %id, "guild removed");
        true
    }

    /// Create or patch a channel. Guild channels go to their guild, which
    /// must be cached; private channels are owned by the root.
    pub fn channel_add_update(&self, channel: &Channel) -> Option<Arc<ChannelState>> {
        if let Some(existing) = self.channel(channel.id) {
            if existing.update(channel) {
                return Some(existing);
            }
        }

        // A handle whose guild is gone can no longer be patched.
        let mut inner = self.inner.write();
        if let Some(existing) = inner.channels.get(&channel.id).cloned() {
            drop(inner);
            return existing.update(channel).then_some(existing);
        }

        let state = if channel.is_private() {
            inner.private_channels.insert(channel.id);
            ChannelState::new_private(channel)
        } else {
            let guild = inner.guilds.get(&channel.guild_id?)?;
            guild.channel_add_update(channel)
        };
        inner.channels.insert(channel.id, Arc::clone(&state));
        Some(state)
    }

    /// Remove a channel from the index and from its owner.
    pub fn channel_remove(&self, channel: &Channel) -> bool {
        let mut inner = self.inner.write();
        let removed = inner.channels.remove(&channel.id);
        inner.private_channels.remove(&channel.id);

        let guild_id = removed
            .as_ref()
            .and_then(|c| c.guild_id())
            .or(channel.guild_id);
        let from_guild = guild_id
            .and_then(|id| inner.guilds.get(&id))
            .is_some_and(|g| g.channel_remove(channel.id).is_some());

        removed.is_some() || from_guild
    }

    /// Apply a ready payload: remember the current user, install private
    /// channels, then create or update every listed guild.
    pub fn handle_ready(&self, ready: &Ready) {
        let mut inner = self.inner.write();
        inner.current_user = Some(ready.user.clone());

        for channel in &ready.private_channels {
            if let Some(existing) = inner.channels.get(&channel.id) {
                existing.update(channel);
                continue;
            }
            inner.private_channels.insert(channel.id);
            inner
                .channels
                .insert(channel.id, ChannelState::new_private(channel));
        }

        for guild in &ready.guilds {
            self.update_locked(&mut inner, guild);
        }

        info!(
            user_id = %ready.user.id,
            guilds = ready.guilds.len(),
            private_channels = ready.private_channels.len(),
            "ready"
        );
    }

    pub fn stats(&self) -> StateStats {
        let (guilds, channels, private_channels) = {
            let inner = self.inner.read();
            (
                inner.guilds.values().cloned().collect::<Vec<_>>(),
                inner.channels.values().cloned().collect::<Vec<_>>(),
                inner.private_channels.len(),
            )
        };

        StateStats {
            guilds: guilds.len(),
            channels: channels.len(),
            private_channels,
            members: guilds.iter().map(|g| g.member_count()).sum(),
            messages: channels.iter().map(|c| c.message_count()).sum(),
        }
    }
}
