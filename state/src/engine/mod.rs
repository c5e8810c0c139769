//! The state-tracking engine: entity states, their locking, and the event
//! dispatcher that keeps them current.

pub mod channel;
mod dispatch;
pub mod events;
pub mod guild;
pub mod member;
pub mod message;
pub mod patch;
pub mod permissions;
pub mod reaper;
pub mod state;

pub use channel::{ChannelData, ChannelState};
pub use events::GatewayEvent;
pub use guild::{GuildChange, GuildData, GuildState, is_role_above};
pub use member::MemberState;
pub use message::{MessageLimits, MessageState, MessageWindow};
pub use patch::Snapshot;
pub use permissions::Permissions;
pub use reaper::OfflineReaper;
pub use state::{State, StateStats};
