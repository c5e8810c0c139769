//! In-memory cache of a chat platform's guild graph.
//!
//! A [`State`] is fed gateway events through [`State::dispatch`] and keeps
//! guilds, channels, members, presences, roles, voice states and a bounded
//! window of recent messages per channel. Each guild has its own lock, so
//! work on one guild never blocks another.

pub mod config;
pub mod engine;
pub mod error;
pub mod model;

#[cfg(test)]
mod integration_tests;

pub use config::StateConfig;
pub use engine::{GatewayEvent, State};
pub use error::{ConfigError, StateError};
