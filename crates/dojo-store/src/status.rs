//! Per-row save indicators and page-level notices.

use std::time::Duration;

use crate::expiring::ExpiringMap;

/// Save indicator shown next to a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Success,
    Error,
}

/// Row id → [`SaveStatus`]. Rows without an entry are idle.
///
/// `saving` persists until settled; `success` and `error` flash for a fixed
/// delay and then revert to idle.
#[derive(Clone, Default)]
pub struct StatusBoard {
    entries: ExpiringMap<String, SaveStatus>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, id: &str) -> SaveStatus {
        self.entries.get(&id.to_string()).unwrap_or_default()
    }

    /// Mark a write as in flight. Cancels any pending revert on the row.
    pub fn begin(&self, id: &str) {
        self.entries.set(id.to_string(), SaveStatus::Saving);
    }

    /// Show the outcome of a write, reverting to idle after `show_for`.
    pub fn settle(&self, id: &str, outcome: SaveStatus, show_for: Duration) {
        match outcome {
            SaveStatus::Idle => self.reset(id),
            SaveStatus::Saving => self.begin(id),
            SaveStatus::Success | SaveStatus::Error => {
                self.entries.set_for(id.to_string(), outcome, show_for)
            }
        }
    }

    pub fn reset(&self, id: &str) {
        self.entries.remove(&id.to_string());
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Rows with a non-idle indicator.
    pub fn active(&self) -> Vec<(String, SaveStatus)> {
        self.entries.snapshot()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A page-level banner message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// One banner slot per level, so a partial bulk save can show its success
/// and error summaries side by side.
#[derive(Clone, Default)]
pub struct NoticeBoard {
    slots: ExpiringMap<NoticeLevel, Notice>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post a notice. `dismiss_after: None` keeps it until replaced or
    /// dismissed.
    pub fn post(&self, notice: Notice, dismiss_after: Option<Duration>) {
        let level = notice.level;
        match dismiss_after {
            Some(ttl) => self.slots.set_for(level, notice, ttl),
            None => self.slots.set(level, notice),
        }
    }

    pub fn current(&self, level: NoticeLevel) -> Option<Notice> {
        self.slots.get(&level)
    }

    pub fn dismiss(&self, level: NoticeLevel) {
        self.slots.remove(&level);
    }

    pub fn clear(&self) {
        self.slots.clear();
    }
}
