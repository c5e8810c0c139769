use std::path::PathBuf;

use thiserror::Error;

use crate::model::{ChannelId, UserId};

/// Lookup failures from permission resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("member {0} not found")]
    MemberNotFound(UserId),
    #[error("channel {0} not found")]
    ChannelNotFound(ChannelId),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value {value:?} for {var}")]
    Env { var: &'static str, value: String },
}
