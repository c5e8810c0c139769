use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::patch;
use crate::model::{Activity, GuildId, Member, Presence, RoleId, Status, User, UserId};

/// A guild member: the membership half (roles, nick, join date) and the
/// presence half (status, activity) merged into one record.
///
/// A member can exist with only one half observed. `member_set` and
/// `presence_set` record which halves have arrived so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberState {
    pub id: UserId,
    pub guild_id: GuildId,

    pub member_set: bool,
    pub joined_at: Option<DateTime<Utc>>,
    pub nick: Option<String>,
    /// Shared with light copies; replaced wholesale on update.
    pub roles: Arc<[RoleId]>,

    pub presence_set: bool,
    pub status: Option<Status>,
    pub activity: Option<Activity>,

    pub username: String,
    pub discriminator: u16,
    /// Avatar hash with the `a_` prefix stripped.
    pub avatar: Option<String>,
    pub animated_avatar: bool,
    pub bot: bool,
}

impl MemberState {
    pub fn from_member(guild_id: GuildId, member: &Member) -> Self {
        let mut state = Self {
            id: member.user.id,
            guild_id,
            ..Default::default()
        };
        state.update_membership(member);
        state
    }

    pub fn from_presence(guild_id: GuildId, presence: &Presence) -> Self {
        let mut state = Self {
            id: presence.user.id,
            guild_id,
            ..Default::default()
        };
        state.update_presence(presence);
        state
    }

    /// Patch the membership half. Fields the payload does not carry are
    /// left as they are; an explicit `null` nick clears the nickname.
    pub fn update_membership(&mut self, member: &Member) {
        self.member_set = true;
        if let Some(joined) = patch::parse_timestamp(&member.joined_at) {
            self.joined_at = Some(joined);
        }
        if let Some(nick) = &member.nick {
            self.nick = nick.clone().filter(|n| !n.is_empty());
        }
        if let Some(roles) = &member.roles {
            self.roles = roles.as_slice().into();
        }
        self.update_identity(&member.user);
    }

    /// Patch the presence half.
    ///
    /// The nickname is taken from presence payloads only until a membership
    /// payload has been seen.
    pub fn update_presence(&mut self, presence: &Presence) {
        self.presence_set = true;
        if presence.status.is_some() {
            self.status = presence.status;
        }
        if let Some(game) = &presence.game {
            self.activity.clone_from(game);
        }
        if !self.member_set
            && let Some(nick) = presence.nick.as_ref().filter(|n| !n.is_empty())
        {
            self.nick = Some(nick.clone());
        }
        self.update_identity(&presence.user);
    }

    fn update_identity(&mut self, user: &User) {
        patch::patch_string(&mut self.username, &user.username);
        if let Ok(discriminator) = user.discriminator.parse::<u16>() {
            self.discriminator = discriminator;
        }
        if let Some(avatar) = user.avatar.as_deref().filter(|a| !a.is_empty()) {
            match avatar.strip_prefix("a_") {
                Some(hash) => {
                    self.avatar = Some(hash.to_owned());
                    self.animated_avatar = true;
                }
                None => {
                    self.avatar = Some(avatar.to_owned());
                    self.animated_avatar = false;
                }
            }
        }
        if user.bot {
            self.bot = true;
        }
    }

    /// True when no presence has been seen or the last one said offline.
    pub fn is_offline(&self) -> bool {
        !self.presence_set || self.status == Some(Status::Offline)
    }

    pub fn display_name(&self) -> &str {
        self.nick.as_deref().unwrap_or(&self.username)
    }

    /// The avatar hash as the platform reports it, prefix included.
    pub fn avatar_hash(&self) -> Option<String> {
        self.avatar.as_ref().map(|hash| {
            if self.animated_avatar {
                format!("a_{hash}")
            } else {
                hash.clone()
            }
        })
    }

    pub fn user(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
            discriminator: format!("{:04}", self.discriminator),
            avatar: self.avatar_hash(),
            bot: self.bot,
        }
    }

    /// Light copy: the role list stays shared with the cached member.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Fully independent copy, including its own role list.
    pub fn snapshot_deep(&self) -> Self {
        Self {
            roles: self.roles.iter().copied().collect(),
            ..self.clone()
        }
    }
}
