use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::engine::message::MessageLimits;
use crate::error::ConfigError;

/// State cache configuration, loaded from guild-state.toml.
///
/// Read once at construction; the state never changes it afterwards.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StateConfig {
    pub messages: MessagesSection,
    pub tracking: TrackingSection,
    pub members: MembersSection,
    /// Log every dispatched event at debug level.
    pub debug: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MessagesSection {
    /// Messages kept per channel. -1 keeps everything.
    pub max_channel_messages: i64,
    /// Max message age in seconds, checked when a message arrives. 0 disables.
    pub max_message_age: u64,
    /// Delete events drop the message; when false it stays with `deleted` set.
    pub remove_deleted_messages: bool,
    /// Don't cache messages from private channels.
    pub throw_away_dm_messages: bool,
}

impl Default for MessagesSection {
    fn default() -> Self {
        Self {
            max_channel_messages: 100,
            max_message_age: 0,
            remove_deleted_messages: true,
            throw_away_dm_messages: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackingSection {
    pub channels: bool,
    pub members: bool,
    pub roles: bool,
    pub voice: bool,
    pub presences: bool,
}

impl Default for TrackingSection {
    fn default() -> Self {
        Self {
            channels: true,
            members: true,
            roles: true,
            voice: true,
            presences: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MembersSection {
    /// Drop members that stay offline for `offline_grace` seconds.
    pub remove_offline_members: bool,
    pub offline_grace: u64,
}

impl Default for MembersSection {
    fn default() -> Self {
        Self {
            remove_offline_members: false,
            offline_grace: 60,
        }
    }
}

impl StateConfig {
    /// Load config from a TOML file. Falls back to defaults if the file doesn't exist.
    /// Environment variables override TOML values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            Self::parse(&contents)?
        } else {
            info!("No config file found at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = lookup("STATE_MAX_CHANNEL_MESSAGES") {
            self.messages.max_channel_messages = parse_var("STATE_MAX_CHANNEL_MESSAGES", v)?;
        }
        if let Some(v) = lookup("STATE_MAX_MESSAGE_AGE") {
            self.messages.max_message_age = parse_var("STATE_MAX_MESSAGE_AGE", v)?;
        }
        if let Some(v) = lookup("STATE_REMOVE_DELETED_MESSAGES") {
            self.messages.remove_deleted_messages = parse_flag("STATE_REMOVE_DELETED_MESSAGES", v)?;
        }
        if let Some(v) = lookup("STATE_THROW_AWAY_DM_MESSAGES") {
            self.messages.throw_away_dm_messages = parse_flag("STATE_THROW_AWAY_DM_MESSAGES", v)?;
        }
        if let Some(v) = lookup("STATE_TRACK_CHANNELS") {
            self.tracking.channels = parse_flag("STATE_TRACK_CHANNELS", v)?;
        }
        if let Some(v) = lookup("STATE_TRACK_MEMBERS") {
            self.tracking.members = parse_flag("STATE_TRACK_MEMBERS", v)?;
        }
        if let Some(v) = lookup("STATE_TRACK_ROLES") {
            self.tracking.roles = parse_flag("STATE_TRACK_ROLES", v)?;
        }
        if let Some(v) = lookup("STATE_TRACK_VOICE") {
            self.tracking.voice = parse_flag("STATE_TRACK_VOICE", v)?;
        }
        if let Some(v) = lookup("STATE_TRACK_PRESENCES") {
            self.tracking.presences = parse_flag("STATE_TRACK_PRESENCES", v)?;
        }
        if let Some(v) = lookup("STATE_REMOVE_OFFLINE_MEMBERS") {
            self.members.remove_offline_members = parse_flag("STATE_REMOVE_OFFLINE_MEMBERS", v)?;
        }
        if let Some(v) = lookup("STATE_OFFLINE_GRACE") {
            self.members.offline_grace = parse_var("STATE_OFFLINE_GRACE", v)?;
        }
        if let Some(v) = lookup("STATE_DEBUG") {
            self.debug = parse_flag("STATE_DEBUG", v)?;
        }
        Ok(())
    }

    /// Count and age bounds for message windows. Any negative count means
    /// unbounded.
    pub fn message_limits(&self) -> MessageLimits {
        MessageLimits {
            max_count: usize::try_from(self.messages.max_channel_messages).ok(),
            max_age: (self.messages.max_message_age > 0)
                .then(|| Duration::from_secs(self.messages.max_message_age)),
        }
    }

    pub fn offline_grace(&self) -> Duration {
        Duration::from_secs(self.members.offline_grace)
    }

    /// Whether delete events only set the tombstone flag.
    pub fn mark_deleted_only(&self) -> bool {
        !self.messages.remove_deleted_messages
    }
}

fn parse_var<T: FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}

fn parse_flag(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = StateConfig::default();
        assert_eq!(config.messages.max_channel_messages, 100);
        assert!(config.messages.remove_deleted_messages);
        assert!(config.messages.throw_away_dm_messages);
        assert!(config.tracking.channels && config.tracking.presences);
        assert!(!config.members.remove_offline_members);
        assert_eq!(config.offline_grace(), Duration::from_secs(60));

        let limits = config.message_limits();
        assert_eq!(limits.max_count, Some(100));
        assert_eq!(limits.max_age, None);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = StateConfig::parse(
            r#"
            debug = true

            [messages]
            max_channel_messages = -1
            max_message_age = 3600

            [tracking]
            voice = false
            "#,
        )
        .unwrap();
        assert!(config.debug);
        assert_eq!(config.message_limits().max_count, None);
        assert_eq!(
            config.message_limits().max_age,
            Some(Duration::from_secs(3600))
        );
        assert!(!config.tracking.voice);
        assert!(config.tracking.roles);
        assert!(config.messages.remove_deleted_messages);
    }

    #[test]
    fn test_parse_rejects_bad_toml() {
        assert!(matches!(
            StateConfig::parse("[messages]\nmax_channel_messages = \"lots\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = StateConfig::default();
        config
            .apply_overrides(env(&[
                ("STATE_MAX_CHANNEL_MESSAGES", "25"),
                ("STATE_TRACK_MEMBERS", "false"),
                ("STATE_REMOVE_OFFLINE_MEMBERS", "1"),
                ("STATE_OFFLINE_GRACE", " 5 "),
            ]))
            .unwrap();
        assert_eq!(config.message_limits().max_count, Some(25));
        assert!(!config.tracking.members);
        assert!(config.members.remove_offline_members);
        assert_eq!(config.offline_grace(), Duration::from_secs(5));
    }

    #[test]
    fn test_env_override_invalid_value() {
        let mut config = StateConfig::default();
        let err = config
            .apply_overrides(env(&[("STATE_TRACK_ROLES", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "STATE_TRACK_ROLES", .. }));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = StateConfig::load("/nonexistent/guild-state.toml").unwrap();
        assert_eq!(config.messages.max_channel_messages, 100);
    }

    #[test]
    fn test_mark_deleted_only() {
        let mut config = StateConfig::default();
        assert!(!config.mark_deleted_only());
        config.messages.remove_deleted_messages = false;
        assert!(config.mark_deleted_only());
    }
}
