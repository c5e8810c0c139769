//! Copy and patch primitives shared by the entity states.
//!
//! Patching follows one rule everywhere: a field that is empty in the
//! incoming payload (empty string, `None` list, unparseable timestamp) was
//! not reported by that event and must leave the cached value alone.
//! Removals are always explicit calls, never inferred from a missing field.

use chrono::{DateTime, Utc};

use crate::model::{Channel, Guild, Message};

/// Copies handed out to callers.
///
/// `snapshot()` is the cheap form used for "show info" paths: nested
/// collections are left out (`None`). `snapshot_deep()` is a fully
/// independent value that can be mutated freely.
pub trait Snapshot: Clone {
    fn snapshot(&self) -> Self;

    fn snapshot_deep(&self) -> Self {
        self.clone()
    }
}

impl Snapshot for Channel {
    /// Keeps recipients (a direct channel is meaningless without them) but
    /// drops permission overwrites.
    fn snapshot(&self) -> Self {
        Channel {
            permission_overwrites: None,
            ..self.clone()
        }
    }
}

impl Snapshot for Guild {
    fn snapshot(&self) -> Self {
        Guild {
            id: self.id,
            name: self.name.clone(),
            icon: self.icon.clone(),
            owner_id: self.owner_id,
            region: self.region.clone(),
            afk_channel_id: self.afk_channel_id,
            afk_timeout: self.afk_timeout,
            verification_level: self.verification_level,
            member_count: self.member_count,
            large: self.large,
            unavailable: self.unavailable,
            joined_at: self.joined_at.clone(),
            roles: None,
            emojis: None,
            voice_states: None,
            members: None,
            presences: None,
            channels: None,
        }
    }
}

impl Snapshot for Message {
    fn snapshot(&self) -> Self {
        Message {
            mentions: None,
            mention_roles: None,
            attachments: None,
            embeds: None,
            ..self.clone()
        }
    }
}

/// Parse a gateway timestamp. Empty or malformed input yields `None`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map(|ts| ts.with_timezone(&Utc))
        .ok()
}

pub(crate) fn patch_string(dst: &mut String, src: &str) {
    if !src.is_empty() {
        src.clone_into(dst);
    }
}

pub(crate) fn patch_list<T: Clone>(dst: &mut Option<Vec<T>>, src: &Option<Vec<T>>) {
    if let Some(list) = src {
        *dst = Some(list.clone());
    }
}

pub(crate) fn patch_option<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
    if let Some(value) = src {
        *dst = Some(value.clone());
    }
}

/// Patch a cached message with an update payload.
pub fn patch_message(existing: &mut Message, incoming: &Message) {
    patch_string(&mut existing.content, &incoming.content);
    patch_string(&mut existing.timestamp, &incoming.timestamp);
    patch_string(&mut existing.edited_timestamp, &incoming.edited_timestamp);
    patch_list(&mut existing.mentions, &incoming.mentions);
    patch_list(&mut existing.mention_roles, &incoming.mention_roles);
    patch_list(&mut existing.embeds, &incoming.embeds);
    patch_list(&mut existing.attachments, &incoming.attachments);
    patch_option(&mut existing.author, &incoming.author);
    patch_option(&mut existing.guild_id, &incoming.guild_id);
}

/// Merge a channel update into the cached snapshot.
///
/// Overwrites and recipients carry over when the update omits them;
/// everything else is taken from the update as-is.
pub fn merge_channel(existing: &Channel, incoming: &Channel) -> Channel {
    let mut merged = incoming.clone();
    if merged.permission_overwrites.is_none() {
        merged
            .permission_overwrites
            .clone_from(&existing.permission_overwrites);
    }
    if merged.is_private() && merged.recipients.is_none() {
        merged.recipients.clone_from(&existing.recipients);
    }
    if merged.guild_id.is_none() {
        merged.guild_id = existing.guild_id;
    }
    merged
}

/// Fill the collections a guild update omitted from the cached snapshot.
pub fn fill_guild(existing: &Guild, incoming: &mut Guild) {
    if incoming.roles.is_none() {
        incoming.roles.clone_from(&existing.roles);
    }
    if incoming.emojis.is_none() {
        incoming.emojis.clone_from(&existing.emojis);
    }
    if incoming.voice_states.is_none() {
        incoming.voice_states.clone_from(&existing.voice_states);
    }
}
