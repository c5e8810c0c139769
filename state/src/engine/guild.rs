use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::channel::{ChannelData, ChannelState};
use super::member::MemberState;
use super::message::MessageWindow;
use super::patch::{self, Snapshot};
use super::permissions::{self, Permissions};
use super::reaper::OfflineReaper;
use crate::error::StateError;
use crate::model::{
    Channel, ChannelId, Guild, GuildId, Member, Presence, Role, RoleId, Status, UserId, VoiceState,
};

/// A cached guild behind its own reader/writer lock.
///
/// Every operation comes in two forms: a locking method here, and the same
/// method on [`GuildData`] for callers already holding the guard from
/// [`GuildState::read`] or [`GuildState::write`]. The lock is not
/// re-entrant, so a locking method must never be called while holding
/// this guild's guard.
#[derive(Debug)]
pub struct GuildState {
    id: GuildId,
    data: RwLock<GuildData>,
}

/// Channel ids added or dropped by a guild update, for keeping the global
/// channel index in sync.
#[derive(Debug, Default)]
pub struct GuildChange {
    pub added: Vec<Arc<ChannelState>>,
    pub removed: Vec<ChannelId>,
}

#[derive(Debug)]
struct GuildChannel {
    state: Arc<ChannelState>,
    data: ChannelData,
}

/// Everything the guild lock protects.
#[derive(Debug)]
pub struct GuildData {
    id: GuildId,
    owner: Weak<GuildState>,
    reaper: Option<OfflineReaper>,
    /// Members, presences and channels live in their own maps, never here.
    guild: Guild,
    members: HashMap<UserId, MemberState>,
    channels: HashMap<ChannelId, GuildChannel>,
}

/// `true` when `a` ranks above `b`: higher position first, ties broken by
/// the lower (older) id.
pub fn is_role_above(a: &Role, b: &Role) -> bool {
    rank(a, b) == Ordering::Less
}

fn rank(a: &Role, b: &Role) -> Ordering {
    b.position.cmp(&a.position).then(a.id.cmp(&b.id))
}

/// The guild record as stored: member, presence and channel lists are kept
/// in their own maps.
fn canonical(guild: &Guild) -> Guild {
    Guild {
        roles: guild.roles.clone(),
        emojis: guild.emojis.clone(),
        voice_states: guild.voice_states.clone(),
        ..guild.snapshot()
    }
}

impl GuildState {
    /// Build a guild from a full snapshot, including its channels, members
    /// and presences.
    pub fn new(guild: &Guild, reaper: Option<OfflineReaper>) -> Arc<Self> {
        Arc::new_cyclic(|owner| {
            let mut data = GuildData {
                id: guild.id,
                owner: owner.clone(),
                reaper,
                guild: canonical(guild),
                members: HashMap::new(),
                channels: HashMap::new(),
            };
            data.apply_collections(guild);
            Self {
                id: guild.id,
                data: RwLock::new(data),
            }
        })
    }

    pub fn id(&self) -> GuildId {
        self.id
    }

    pub fn read(&self) -> RwLockReadGuard<'_, GuildData> {
        self.data.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, GuildData> {
        self.data.write()
    }

    pub fn update(&self, guild: &Guild) -> GuildChange {
        self.write().update(guild)
    }

    pub fn light_copy(&self) -> Guild {
        self.read().light_copy()
    }

    pub fn member_copy(&self, id: UserId) -> Option<MemberState> {
        self.read().member(id).map(MemberState::snapshot)
    }

    pub fn member_copy_deep(&self, id: UserId) -> Option<MemberState> {
        self.read().member(id).map(MemberState::snapshot_deep)
    }

    pub fn member_add_update(&self, member: &Member) {
        self.write().member_add_update(member);
    }

    pub fn member_remove(&self, id: UserId) -> bool {
        self.write().member_remove(id)
    }

    pub fn presence_add_update(&self, presence: &Presence) {
        self.write().presence_add_update(presence);
    }

    pub fn evict_if_offline(&self, id: UserId) -> bool {
        self.write().evict_if_offline(id)
    }

    pub fn channel(&self, id: ChannelId) -> Option<Arc<ChannelState>> {
        self.read().channel(id)
    }

    pub fn channel_copy(&self, id: ChannelId) -> Option<Channel> {
        self.read().channel_copy(id)
    }

    pub fn channel_copy_deep(&self, id: ChannelId) -> Option<Channel> {
        self.read().channel_copy_deep(id)
    }

    pub fn channel_add_update(&self, channel: &Channel) -> Arc<ChannelState> {
        self.write().channel_add_update(channel)
    }

    pub fn channel_remove(&self, id: ChannelId) -> Option<Arc<ChannelState>> {
        self.write().channel_remove(id)
    }

    pub fn role(&self, id: RoleId) -> Option<Role> {
        self.read().role(id).cloned()
    }

    pub fn role_add_update(&self, role: &Role) {
        self.write().role_add_update(role);
    }

    pub fn role_remove(&self, id: RoleId) -> bool {
        self.write().role_remove(id)
    }

    pub fn voice_state(&self, user_id: UserId) -> Option<VoiceState> {
        self.read().voice_state(user_id).cloned()
    }

    pub fn voice_state_update(&self, update: &VoiceState) {
        self.write().voice_state_update(update);
    }

    pub fn member_permissions(
        &self,
        channel_id: ChannelId,
        member_id: UserId,
    ) -> Result<Permissions, StateError> {
        self.read().member_permissions(channel_id, member_id)
    }

    pub fn roles_by_rank(&self) -> Vec<Role> {
        self.read().roles_by_rank()
    }

    pub fn channels_by_position(&self) -> Vec<Channel> {
        self.read().channels_by_position()
    }

    pub fn member_count(&self) -> usize {
        self.read().member_count()
    }

    pub fn channel_count(&self) -> usize {
        self.read().channel_count()
    }
}

impl GuildData {
    pub fn id(&self) -> GuildId {
        self.id
    }

    /// The stored guild record. Its member, presence and channel lists are
    /// always `None`.
    pub fn guild(&self) -> &Guild {
        &self.guild
    }

    fn apply_collections(&mut self, guild: &Guild) {
        for channel in guild.channels.iter().flatten() {
            self.channel_add_update(channel);
        }
        for member in guild.members.iter().flatten() {
            self.member_add_update(member);
        }
        for presence in guild.presences.iter().flatten() {
            self.presence_add_update(presence);
        }
    }

    /// Apply a guild update. Roles, emojis and voice states the update
    /// omits are carried over; when it reports a channel list, channels
    /// missing from that list are dropped.
    pub fn update(&mut self, guild: &Guild) -> GuildChange {
        let mut incoming = canonical(guild);
        patch::fill_guild(&self.guild, &mut incoming);
        self.guild = incoming;

        let mut change = GuildChange::default();
        if let Some(channels) = &guild.channels {
            for channel in channels {
                let known = self.channels.contains_key(&channel.id);
                let state = self.channel_add_update(channel);
                if !known {
                    change.added.push(state);
                }
            }

            let listed: HashSet<ChannelId> = channels.iter().map(|c| c.id).collect();
            self.channels.retain(|id, _| {
                let keep = listed.contains(id);
                if !keep {
                    change.removed.push(*id);
                }
                keep
            });
        }

        for member in guild.members.iter().flatten() {
            self.member_add_update(member);
        }
        for presence in guild.presences.iter().flatten() {
            self.presence_add_update(presence);
        }

        change
    }

    /// The guild record without any collections.
    pub fn light_copy(&self) -> Guild {
        self.guild.snapshot()
    }

    // ── Members ─────────────────────────────────────────────────────

    pub fn member(&self, id: UserId) -> Option<&MemberState> {
        self.members.get(&id)
    }

    pub fn members(&self) -> impl Iterator<Item = &MemberState> {
        self.members.values()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn member_add_update(&mut self, member: &Member) {
        let id = member.user.id;
        match self.members.get_mut(&id) {
            Some(existing) => existing.update_membership(member),
            None => {
                self.members.insert(id, MemberState::from_member(self.id, member));
            }
        }
    }

    pub fn member_remove(&mut self, id: UserId) -> bool {
        self.members.remove(&id).is_some()
    }

    /// Merge a presence into the member record, creating a presence-only
    /// member if needed. An offline status schedules an eviction check
    /// when offline eviction is enabled.
    pub fn presence_add_update(&mut self, presence: &Presence) {
        let id = presence.user.id;
        match self.members.get_mut(&id) {
            Some(existing) => existing.update_presence(presence),
            None => {
                self.members.insert(id, MemberState::from_presence(self.id, presence));
            }
        }

        if presence.status == Some(Status::Offline)
            && let Some(reaper) = &self.reaper
        {
            reaper.schedule(self.owner.clone(), self.id, id);
        }
    }

    /// Remove the member if it has no presence or is still offline.
    pub fn evict_if_offline(&mut self, id: UserId) -> bool {
        if self.members.get(&id).is_some_and(MemberState::is_offline) {
            self.members.remove(&id);
            return true;
        }
        false
    }

    // ── Channels ────────────────────────────────────────────────────

    pub fn channel(&self, id: ChannelId) -> Option<Arc<ChannelState>> {
        self.channels.get(&id).map(|c| Arc::clone(&c.state))
    }

    pub fn channel_data(&self, id: ChannelId) -> Option<&ChannelData> {
        self.channels.get(&id).map(|c| &c.data)
    }

    pub fn channel_data_mut(&mut self, id: ChannelId) -> Option<&mut ChannelData> {
        self.channels.get_mut(&id).map(|c| &mut c.data)
    }

    pub fn channel_copy(&self, id: ChannelId) -> Option<Channel> {
        self.channel_data(id).map(ChannelData::snapshot)
    }

    pub fn channel_copy_deep(&self, id: ChannelId) -> Option<Channel> {
        self.channel_data(id).map(ChannelData::snapshot_deep)
    }

    pub fn channel_handles(&self) -> Vec<Arc<ChannelState>> {
        self.channels.values().map(|c| Arc::clone(&c.state)).collect()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Create the channel or patch the cached one. Returns the handle,
    /// which is the same `Arc` for every update of the same channel.
    pub fn channel_add_update(&mut self, channel: &Channel) -> Arc<ChannelState> {
        if let Some(existing) = self.channels.get_mut(&channel.id) {
            existing.data.update(channel);
            return Arc::clone(&existing.state);
        }

        let mut channel = channel.clone();
        channel.guild_id = Some(self.id);
        let state = ChannelState::new_guild(self.id, self.owner.clone(), &channel);
        self.channels.insert(
            channel.id,
            GuildChannel {
                state: Arc::clone(&state),
                data: ChannelData::new(channel),
            },
        );
        state
    }

    pub fn channel_remove(&mut self, id: ChannelId) -> Option<Arc<ChannelState>> {
        self.channels.remove(&id).map(|c| c.state)
    }

    /// Detach every channel's message window, keyed by channel id.
    pub fn take_message_windows(&mut self) -> HashMap<ChannelId, MessageWindow> {
        self.channels
            .iter_mut()
            .map(|(id, c)| (*id, c.data.take_messages()))
            .collect()
    }

    /// Reattach windows to the channels that still exist. Windows of
    /// channels this guild no longer has are dropped.
    pub fn restore_messages(&mut self, mut windows: HashMap<ChannelId, MessageWindow>) {
        for (id, channel) in &mut self.channels {
            if let Some(window) = windows.remove(id) {
                channel.data.set_messages(window);
            }
        }
    }

    /// Channel snapshots ordered by position, then id.
    pub fn channels_by_position(&self) -> Vec<Channel> {
        let mut channels: Vec<Channel> =
            self.channels.values().map(|c| c.data.snapshot()).collect();
        channels.sort_by(|a, b| a.position.cmp(&b.position).then(a.id.cmp(&b.id)));
        channels
    }

    // ── Roles ───────────────────────────────────────────────────────

    pub fn role(&self, id: RoleId) -> Option<&Role> {
        self.guild.roles().iter().find(|r| r.id == id)
    }

    pub fn role_add_update(&mut self, role: &Role) {
        let roles = self.guild.roles.get_or_insert_with(Vec::new);
        match roles.iter_mut().find(|r| r.id == role.id) {
            Some(existing) => existing.clone_from(role),
            None => roles.push(role.clone()),
        }
    }

    pub fn role_remove(&mut self, id: RoleId) -> bool {
        let Some(roles) = self.guild.roles.as_mut() else {
            return false;
        };
        let Some(pos) = roles.iter().position(|r| r.id == id) else {
            return false;
        };
        roles.remove(pos);
        true
    }

    /// Roles from highest to lowest rank.
    pub fn roles_by_rank(&self) -> Vec<Role> {
        let mut roles = self.guild.roles().to_vec();
        roles.sort_by(rank);
        roles
    }

    // ── Voice ───────────────────────────────────────────────────────

    pub fn voice_state(&self, user_id: UserId) -> Option<&VoiceState> {
        self.guild
            .voice_states()
            .iter()
            .find(|v| v.user_id == user_id)
    }

    /// Upsert the user's voice state, or remove it when the update says the
    /// user left voice.
    pub fn voice_state_update(&mut self, update: &VoiceState) {
        let states = self.guild.voice_states.get_or_insert_with(Vec::new);
        if update.left_voice() {
            states.retain(|v| v.user_id != update.user_id);
            return;
        }
        match states.iter_mut().find(|v| v.user_id == update.user_id) {
            Some(existing) => existing.clone_from(update),
            None => states.push(update.clone()),
        }
    }

    // ── Permissions ─────────────────────────────────────────────────

    /// Effective permissions of a member in one of this guild's channels.
    ///
    /// The owner always gets everything. Otherwise the member must have
    /// been seen through a membership payload. Administrator skips the
    /// channel lookup entirely.
    pub fn member_permissions(
        &self,
        channel_id: ChannelId,
        member_id: UserId,
    ) -> Result<Permissions, StateError> {
        if member_id == self.guild.owner_id {
            return Ok(Permissions::all());
        }

        let member = self
            .members
            .get(&member_id)
            .filter(|m| m.member_set)
            .ok_or(StateError::MemberNotFound(member_id))?;

        let everyone = self.id.everyone_role();
        let base = permissions::base_permissions(self.guild.roles(), everyone, &member.roles);
        if base.contains(Permissions::ADMINISTRATOR) {
            return Ok(Permissions::all());
        }

        let channel = self
            .channel_data(channel_id)
            .ok_or(StateError::ChannelNotFound(channel_id))?;

        Ok(permissions::apply_overwrites(
            base,
            channel.channel().overwrites(),
            everyone,
            &member.roles,
            member_id,
        ))
    }
}
