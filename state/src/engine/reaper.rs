use std::sync::Weak;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::guild::GuildState;
use crate::model::{GuildId, UserId};

/// Removes members that went offline once a grace period has passed.
///
/// Each offline presence schedules one fire-and-forget task. The task only
/// holds a weak reference to the guild and re-checks the member when it
/// fires, so it never needs to be cancelled.
#[derive(Debug, Clone)]
pub struct OfflineReaper {
    runtime: Handle,
    grace: Duration,
}

impl OfflineReaper {
    pub fn new(runtime: Handle, grace: Duration) -> Self {
        Self { runtime, grace }
    }

    /// Use the runtime the caller is running on. Returns `None` (eviction
    /// disabled) when called outside a tokio runtime.
    pub fn from_current(grace: Duration) -> Option<Self> {
        match Handle::try_current() {
            Ok(runtime) => Some(Self::new(runtime, grace)),
            Err(e) => {
                warn!(error = %e, "no tokio runtime, offline member eviction disabled");
                None
            }
        }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    pub(crate) fn schedule(&self, guild: Weak<GuildState>, guild_id: GuildId, user_id: UserId) {
        let grace = self.grace;
        self.runtime.spawn(async move {
            tokio::time::sleep(grace).await;
            let Some(guild) = guild.upgrade() else {
                return;
            };
            if guild.evict_if_offline(user_id) {
                debug!(%guild_id, %user_id, "evicted offline member");
            }
        });
    }
}
