use std::fmt;

use bitflags::bitflags;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::model::{OverwriteKind, PermissionOverwrite, Role, RoleId, UserId};

bitflags! {
    /// Permission bitfield for roles and channel overwrites.
    /// Bit positions match the gateway's integer encoding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u64 {
        // ── General ──
        const CREATE_INSTANT_INVITE = 1 << 0;
        const KICK_MEMBERS          = 1 << 1;
        const BAN_MEMBERS           = 1 << 2;
        const ADMINISTRATOR         = 1 << 3;
        const MANAGE_CHANNELS       = 1 << 4;
        const MANAGE_SERVER         = 1 << 5;
        const ADD_REACTIONS         = 1 << 6;
        const VIEW_AUDIT_LOG        = 1 << 7;

        // ── Channel text ──
        const READ_MESSAGES         = 1 << 10;
        const SEND_MESSAGES         = 1 << 11;
        const SEND_TTS_MESSAGES     = 1 << 12;
        const MANAGE_MESSAGES       = 1 << 13;
        const EMBED_LINKS           = 1 << 14;
        const ATTACH_FILES          = 1 << 15;
        const READ_MESSAGE_HISTORY  = 1 << 16;
        const MENTION_EVERYONE      = 1 << 17;
        const USE_EXTERNAL_EMOJIS   = 1 << 18;

        // ── Voice ──
        const CONNECT               = 1 << 20;
        const SPEAK                 = 1 << 21;
        const MUTE_MEMBERS          = 1 << 22;
        const DEAFEN_MEMBERS        = 1 << 23;
        const MOVE_MEMBERS          = 1 << 24;
        const USE_VAD               = 1 << 25;

        // ── Management ──
        const CHANGE_NICKNAME       = 1 << 26;
        const MANAGE_NICKNAMES      = 1 << 27;
        const MANAGE_ROLES          = 1 << 28;
        const MANAGE_WEBHOOKS       = 1 << 29;
        const MANAGE_EMOJIS         = 1 << 30;
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::empty()
    }
}

/// Every text-channel permission.
pub const ALL_TEXT: Permissions = Permissions::READ_MESSAGES
    .union(Permissions::SEND_MESSAGES)
    .union(Permissions::SEND_TTS_MESSAGES)
    .union(Permissions::MANAGE_MESSAGES)
    .union(Permissions::EMBED_LINKS)
    .union(Permissions::ATTACH_FILES)
    .union(Permissions::READ_MESSAGE_HISTORY)
    .union(Permissions::MENTION_EVERYONE)
    .union(Permissions::USE_EXTERNAL_EMOJIS)
    .union(Permissions::ADD_REACTIONS);

/// Every voice-channel permission.
pub const ALL_VOICE: Permissions = Permissions::CONNECT
    .union(Permissions::SPEAK)
    .union(Permissions::MUTE_MEMBERS)
    .union(Permissions::DEAFEN_MEMBERS)
    .union(Permissions::MOVE_MEMBERS)
    .union(Permissions::USE_VAD);

/// Everything that can be granted by a channel overwrite.
pub const ALL_CHANNEL: Permissions = ALL_TEXT
    .union(ALL_VOICE)
    .union(Permissions::CREATE_INSTANT_INVITE)
    .union(Permissions::MANAGE_ROLES)
    .union(Permissions::MANAGE_CHANNELS)
    .union(Permissions::MANAGE_WEBHOOKS);

// The gateway sends permission bits either as an integer or, in newer
// payloads, as a decimal string. Unknown bits are kept.

impl Serialize for Permissions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.bits())
    }
}

struct PermissionsVisitor;

impl Visitor<'_> for PermissionsVisitor {
    type Value = Permissions;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a permission bitfield as an integer or decimal string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Permissions, E> {
        Ok(Permissions::from_bits_retain(v))
    }

    // A negative bitfield is malformed, not "every bit set".
    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Permissions, E> {
        Ok(u64::try_from(v).map_or(Permissions::empty(), Permissions::from_bits_retain))
    }

    fn visit_f64<E: de::Error>(self, _v: f64) -> Result<Permissions, E> {
        Ok(Permissions::empty())
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Permissions, E> {
        Ok(Permissions::from_bits_retain(v.trim().parse().unwrap_or(0)))
    }

    fn visit_bool<E: de::Error>(self, _v: bool) -> Result<Permissions, E> {
        Ok(Permissions::empty())
    }

    fn visit_unit<E: de::Error>(self) -> Result<Permissions, E> {
        Ok(Permissions::empty())
    }
}

impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PermissionsVisitor)
    }
}

/// Guild-level permissions of a member: the `@everyone` role OR'd with every
/// role the member holds. Roles the guild no longer has are ignored.
pub fn base_permissions(
    roles: &[Role],
    everyone_role_id: RoleId,
    member_roles: &[RoleId],
) -> Permissions {
    let mut perms = Permissions::empty();
    for role in roles {
        if role.id == everyone_role_id || member_roles.contains(&role.id) {
            perms |= role.permissions;
        }
    }
    perms
}

/// Apply a channel's overwrites on top of guild-level permissions.
///
/// Order:
///   1. `@everyone` overwrite (deny, then allow).
///   2. Overwrites of every role the member holds. Denies and allows are
///      collected across all roles first, then applied deny-then-allow, so
///      one role's allow always beats another role's deny.
///   3. The member's own overwrite (deny, then allow).
///
/// Administrator granted through an overwrite unlocks every channel
/// permission.
pub fn apply_overwrites(
    base: Permissions,
    overwrites: &[PermissionOverwrite],
    everyone_role_id: RoleId,
    member_roles: &[RoleId],
    member_id: UserId,
) -> Permissions {
    let mut perms = base;

    if let Some(ov) = overwrites.iter().find(|ov| ov.id.is_role(everyone_role_id)) {
        perms &= !ov.deny;
        perms |= ov.allow;
    }

    let mut role_allow = Permissions::empty();
    let mut role_deny = Permissions::empty();
    for ov in overwrites {
        if ov.kind == OverwriteKind::Role
            && !ov.id.is_role(everyone_role_id)
            && member_roles.iter().any(|r| ov.id.is_role(*r))
        {
            role_allow |= ov.allow;
            role_deny |= ov.deny;
        }
    }
    perms &= !role_deny;
    perms |= role_allow;

    if let Some(ov) = overwrites
        .iter()
        .find(|ov| ov.kind == OverwriteKind::Member && ov.id.is_user(member_id))
    {
        perms &= !ov.deny;
        perms |= ov.allow;
    }

    if perms.contains(Permissions::ADMINISTRATOR) {
        perms |= ALL_CHANNEL;
    }

    perms
}
