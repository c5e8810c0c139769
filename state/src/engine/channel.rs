use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::guild::GuildState;
use super::message::{MessageLimits, MessageState, MessageWindow};
use super::patch::{self, Snapshot};
use crate::model::{Channel, ChannelId, ChannelType, GuildId, Message, MessageId, User};

/// Who guards a channel's mutable data.
#[derive(Debug)]
pub(crate) enum ChannelOwner {
    /// The data lives in the guild's channel map, behind the guild lock.
    Guild(Weak<GuildState>),
    /// Private channels have no guild; the handle carries its own lock.
    Private(RwLock<ChannelData>),
}

/// Handle to a cached channel.
///
/// The immutable fields can be read without taking any lock. Everything
/// else goes through [`ChannelState::read`] / [`ChannelState::write`], which
/// lock the owner, or through a [`ChannelData`] reached from a guard the
/// caller already holds.
#[derive(Debug)]
pub struct ChannelState {
    id: ChannelId,
    kind: ChannelType,
    is_private: bool,
    guild_id: Option<GuildId>,
    recipient: Option<User>,
    owner: ChannelOwner,
}

impl ChannelState {
    pub(crate) fn new_guild(
        guild_id: GuildId,
        guild: Weak<GuildState>,
        channel: &Channel,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: channel.id,
            kind: channel.kind,
            is_private: false,
            guild_id: Some(guild_id),
            recipient: None,
            owner: ChannelOwner::Guild(guild),
        })
    }

    pub(crate) fn new_private(channel: &Channel) -> Arc<Self> {
        Arc::new(Self {
            id: channel.id,
            kind: channel.kind,
            is_private: true,
            guild_id: None,
            recipient: channel.recipient().cloned(),
            owner: ChannelOwner::Private(RwLock::new(ChannelData::new(channel.clone()))),
        })
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn kind(&self) -> ChannelType {
        self.kind
    }

    pub fn is_private(&self) -> bool {
        self.is_private
    }

    pub fn guild_id(&self) -> Option<GuildId> {
        self.guild_id
    }

    /// The other side of a direct message channel.
    pub fn recipient(&self) -> Option<&User> {
        self.recipient.as_ref()
    }

    /// The owning guild, if this is a guild channel and the guild is still
    /// cached.
    pub fn guild(&self) -> Option<Arc<GuildState>> {
        match &self.owner {
            ChannelOwner::Guild(guild) => guild.upgrade(),
            ChannelOwner::Private(_) => None,
        }
    }

    /// Run `f` with the owner's lock held for reading.
    ///
    /// Returns `None` when the channel is no longer attached to its guild.
    /// Must not be called while holding the owner's lock.
    pub fn read<R>(&self, f: impl FnOnce(&ChannelData) -> R) -> Option<R> {
        match &self.owner {
            ChannelOwner::Private(lock) => Some(f(&lock.read())),
            ChannelOwner::Guild(guild) => {
                let guild = guild.upgrade()?;
                let data = guild.read();
                data.channel_data(self.id).map(f)
            }
        }
    }

    /// Run `f` with the owner's lock held for writing.
    pub fn write<R>(&self, f: impl FnOnce(&mut ChannelData) -> R) -> Option<R> {
        match &self.owner {
            ChannelOwner::Private(lock) => Some(f(&mut lock.write())),
            ChannelOwner::Guild(guild) => {
                let guild = guild.upgrade()?;
                let mut data = guild.write();
                data.channel_data_mut(self.id).map(f)
            }
        }
    }

    pub fn snapshot(&self) -> Option<Channel> {
        self.read(ChannelData::snapshot)
    }

    pub fn snapshot_deep(&self) -> Option<Channel> {
        self.read(ChannelData::snapshot_deep)
    }

    pub fn update(&self, channel: &Channel) -> bool {
        self.write(|data| data.update(channel)).is_some()
    }

    pub fn message_add_update(&self, message: &Message, limits: MessageLimits) -> bool {
        self.write(|data| data.message_add_update(message, limits)).is_some()
    }

    pub fn message_remove(&self, id: MessageId, mark_only: bool) -> bool {
        self.write(|data| data.message_remove(id, mark_only)).unwrap_or(false)
    }

    pub fn message(&self, id: MessageId) -> Option<MessageState> {
        self.read(|data| data.message(id)).flatten()
    }

    pub fn messages_latest(&self, n: usize) -> Vec<MessageState> {
        self.read(|data| data.messages_latest(n)).unwrap_or_default()
    }

    pub fn message_count(&self) -> usize {
        self.read(|data| data.messages().len()).unwrap_or(0)
    }
}

/// A channel's mutable data. Only reachable through the owner's guard, so
/// holding a `&ChannelData` or `&mut ChannelData` means the lock is held.
#[derive(Debug, Default)]
pub struct ChannelData {
    channel: Channel,
    messages: MessageWindow,
}

impl ChannelData {
    pub(crate) fn new(channel: Channel) -> Self {
        Self {
            channel,
            messages: MessageWindow::new(),
        }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn messages(&self) -> &MessageWindow {
        &self.messages
    }

    /// Copy without overwrites and without messages.
    pub fn snapshot(&self) -> Channel {
        self.channel.snapshot()
    }

    /// Copy with an independent overwrite list. Messages are never included.
    pub fn snapshot_deep(&self) -> Channel {
        self.channel.snapshot_deep()
    }

    pub fn update(&mut self, channel: &Channel) {
        self.channel = patch::merge_channel(&self.channel, channel);
    }

    pub fn message_add_update(&mut self, message: &Message, limits: MessageLimits) {
        self.messages.add_or_update(message, limits.max_count, limits.max_age);
    }

    pub fn message_remove(&mut self, id: MessageId, mark_only: bool) -> bool {
        self.messages.remove(id, mark_only)
    }

    pub fn message(&self, id: MessageId) -> Option<MessageState> {
        self.messages.get(id).map(MessageState::snapshot)
    }

    pub fn messages_latest(&self, n: usize) -> Vec<MessageState> {
        self.messages.latest(n)
    }

    pub(crate) fn take_messages(&mut self) -> MessageWindow {
        std::mem::take(&mut self.messages)
    }

    pub(crate) fn set_messages(&mut self, messages: MessageWindow) {
        self.messages = messages;
    }
}
