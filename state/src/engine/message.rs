use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use super::patch::{self, Snapshot};
use crate::model::{Message, MessageId};

/// A cached message plus its tombstone flag and pre-parsed timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageState {
    pub message: Message,
    /// Set when a delete event arrived and tombstoning is configured.
    pub deleted: bool,
    pub parsed_created: Option<DateTime<Utc>>,
    pub parsed_edited: Option<DateTime<Utc>>,
}

impl MessageState {
    pub fn new(message: Message) -> Self {
        let mut state = Self {
            message,
            deleted: false,
            parsed_created: None,
            parsed_edited: None,
        };
        state.parse_times();
        state
    }

    pub fn id(&self) -> MessageId {
        self.message.id
    }

    /// Re-derive the cached timestamps. A timestamp that is missing or
    /// malformed keeps whatever was parsed before.
    pub fn parse_times(&mut self) {
        if let Some(created) = patch::parse_timestamp(&self.message.timestamp) {
            self.parsed_created = Some(created);
        }
        if let Some(edited) = patch::parse_timestamp(&self.message.edited_timestamp) {
            self.parsed_edited = Some(edited);
        }
    }

    /// Light copy: the message without mentions, embeds or attachments.
    pub fn snapshot(&self) -> Self {
        Self {
            message: self.message.snapshot(),
            ..self.clone()
        }
    }
}

/// Count and age bounds applied to every message window.
///
/// `None` disables the respective limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageLimits {
    pub max_count: Option<usize>,
    pub max_age: Option<Duration>,
}

/// Per-channel bounded log of cached messages, oldest first.
///
/// Order is arrival order, which is not necessarily creation order.
#[derive(Debug, Default)]
pub struct MessageWindow {
    messages: VecDeque<MessageState>,
}

impl MessageWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: MessageId) -> Option<&MessageState> {
        self.messages.iter().find(|m| m.id() == id)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &MessageState> {
        self.messages.iter()
    }

    /// The `n` most recently inserted messages, oldest first.
    pub fn latest(&self, n: usize) -> Vec<MessageState> {
        let skip = self.messages.len().saturating_sub(n);
        self.messages.iter().skip(skip).cloned().collect()
    }

    /// Insert a new message or patch the cached one with the same id, then
    /// apply the count and age limits.
    ///
    /// `max_count: None` and `max_age: None` disable the respective limit.
    pub fn add_or_update(
        &mut self,
        msg: &Message,
        max_count: Option<usize>,
        max_age: Option<Duration>,
    ) {
        self.add_or_update_at(msg, max_count, max_age, Utc::now());
    }

    pub(crate) fn add_or_update_at(
        &mut self,
        msg: &Message,
        max_count: Option<usize>,
        max_age: Option<Duration>,
        now: DateTime<Utc>,
    ) {
        if let Some(existing) = self.messages.iter_mut().find(|m| m.id() == msg.id) {
            patch::patch_message(&mut existing.message, msg);
            existing.parse_times();
        } else {
            self.messages.push_back(MessageState::new(msg.clone()));
            if let Some(max) = max_count {
                while self.messages.len() > max {
                    self.messages.pop_front();
                }
            }
        }

        if let Some(max_age) = max_age {
            self.evict_older_than(max_age, now);
        }
    }

    /// Scan newest to oldest; the first message created before the cutoff
    /// becomes the new head and everything before it is dropped.
    ///
    /// This assumes arrival order follows creation order. When it does not,
    /// messages are evicted by position rather than by their own age.
    fn evict_older_than(&mut self, max_age: Duration, now: DateTime<Utc>) {
        let Ok(max_age) = TimeDelta::from_std(max_age) else {
            return;
        };
        let Some(cutoff) = now.checked_sub_signed(max_age) else {
            return;
        };

        let head = self
            .messages
            .iter()
            .rposition(|m| m.parsed_created.is_some_and(|ts| ts < cutoff));
        if let Some(head) = head {
            self.messages.drain(..head);
        }
    }

    /// Delete a message. With `mark_only` the entry stays cached with its
    /// tombstone set.
    pub fn remove(&mut self, id: MessageId, mark_only: bool) -> bool {
        let Some(pos) = self.messages.iter().position(|m| m.id() == id) else {
            return false;
        };
        if mark_only {
            if let Some(m) = self.messages.get_mut(pos) {
                m.deleted = true;
            }
        } else {
            self.messages.remove(pos);
        }
        true
    }
}
