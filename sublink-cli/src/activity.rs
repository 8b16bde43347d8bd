//! Session activity log
//!
//! Collects navigation events with timestamps and echoes the interesting
//! ones to the terminal.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use sublink_core::navigation::{NavigationEvent, NavigationListener};

/// Maximum number of entries to keep
const MAX_ENTRIES: usize = 100;

#[derive(Clone, Copy, PartialEq)]
pub enum Kind {
    Position,
    Playback,
    Sync,
    Error,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Position => "POS",
            Kind::Playback => "PLAY",
            Kind::Sync => "SYNC",
            Kind::Error => "ERROR",
        }
    }
}

#[derive(Clone)]
pub struct Entry {
    pub timestamp: DateTime<Local>,
    pub kind: Kind,
    pub message: String,
}

/// Recent activity, oldest first
#[derive(Default)]
pub struct Activity {
    entries: VecDeque<Entry>,
}

impl Activity {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(MAX_ENTRIES),
        }
    }

    pub fn log(&mut self, kind: Kind, message: impl Into<String>) {
        if self.entries.len() >= MAX_ENTRIES {
            self.entries.pop_front();
        }
        self.entries.push_back(Entry {
            timestamp: Local::now(),
            kind,
            message: message.into(),
        });
    }

    /// Last `n` entries
    pub fn tail(&self, n: usize) -> impl Iterator<Item = &Entry> {
        self.entries.iter().skip(self.entries.len().saturating_sub(n))
    }
}

/// Listener that records events and prints them
pub struct Printer {
    activity: Arc<RwLock<Activity>>,
}

impl Printer {
    pub fn new(activity: Arc<RwLock<Activity>>) -> Self {
        Self { activity }
    }
}

impl NavigationListener for Printer {
    fn on_event(&self, event: &NavigationEvent) {
        let Some((kind, message)) = describe(event) else {
            return;
        };

        match event {
            // Logged only, the command loop reports these
            NavigationEvent::ProgressCommitted { .. } | NavigationEvent::QueueReplayed(_) => {}
            _ => println!("{}", message),
        }
        self.activity.write().log(kind, message);
    }
}

fn describe(event: &NavigationEvent) -> Option<(Kind, String)> {
    let described = match event {
        NavigationEvent::PhaseChanged(_) => return None,
        NavigationEvent::PositionChanged {
            index,
            total,
            alignment,
        } => {
            let mut text = format!("[{}/{}]", index + 1, total);
            if let Some(alignment) = alignment {
                text.push_str(&format!("\n  {}\n  {}", alignment.source_text(), alignment.target_text()));
            }
            (Kind::Position, text)
        }
        NavigationEvent::PlaybackChanged { is_playing, speed_ms } => (
            Kind::Playback,
            format!(
                "{} ({:.1}s per line)",
                if *is_playing { "Playing" } else { "Paused" },
                *speed_ms as f64 / 1000.0
            ),
        ),
        NavigationEvent::PlaybackCompleted => (Kind::Playback, "Reached the end".to_string()),
        NavigationEvent::LoadFailed { index, error } => {
            (Kind::Error, format!("Could not load line {}: {}", index + 1, error))
        }
        NavigationEvent::ProgressCommitted { index } => (Kind::Sync, format!("Saved position {}", index + 1)),
        NavigationEvent::ProgressQueued { pending, .. } => {
            (Kind::Sync, format!("Offline, {} write(s) waiting", pending))
        }
        NavigationEvent::QueueReplayed(report) => (
            Kind::Sync,
            format!(
                "Replayed queue: {} delivered, {} waiting",
                report.delivered, report.retained
            ),
        ),
        NavigationEvent::ProgressDropped(letter) => (Kind::Error, letter.to_error().to_string()),
        NavigationEvent::ConnectivityChanged { online } => (
            Kind::Sync,
            (if *online { "Server reachable" } else { "Server unreachable" }).to_string(),
        ),
    };
    Some(described)
}
