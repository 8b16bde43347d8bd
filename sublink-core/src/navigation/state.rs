//! Navigation session state

use serde::Serialize;

use crate::api::ContentId;

/// Lifecycle of a navigation session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavPhase {
    /// First batch and saved state not reconciled yet
    Loading,
    /// Showing an alignment, accepting navigation
    Ready,
    /// A navigation is waiting for a batch
    Navigating,
    /// Torn down, every operation is rejected
    Closed,
}

impl NavPhase {
    /// Whether navigation and playback commands are accepted
    pub fn is_interactive(&self) -> bool {
        matches!(self, NavPhase::Ready | NavPhase::Navigating)
    }
}

/// Result of a navigation command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOutcome {
    /// The visible index changed
    Moved { index: u64 },
    /// Target is the visible index already
    Unchanged,
    /// Target outside `[0, total - 1]`, nothing happened
    OutOfRange,
}

impl NavOutcome {
    pub fn moved(&self) -> bool {
        matches!(self, NavOutcome::Moved { .. })
    }
}

/// Point-in-time view of a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavSnapshot {
    pub content_id: ContentId,
    pub phase: NavPhase,
    /// `None` before loading and for an empty sequence
    pub current_index: Option<u64>,
    pub total_count: u64,
    pub completion_percentage: f64,
    pub is_playing: bool,
    pub speed_ms: u64,
    pub online: bool,
    /// Writes waiting in the offline queue
    pub pending_writes: usize,
    pub unsaved_changes: bool,
}

impl NavSnapshot {
    /// Whether the visible index is the last one
    pub fn at_end(&self) -> bool {
        match self.current_index {
            Some(index) => index + 1 >= self.total_count,
            None => true,
        }
    }
}
