//! Session events and listener registry

use std::sync::Arc;

use parking_lot::RwLock;

use super::state::NavPhase;
use crate::alignment::Alignment;
use crate::progress::{DeadLetter, ReplayReport};

/// Everything a display layer can react to
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationEvent {
    PhaseChanged(NavPhase),
    PositionChanged {
        index: u64,
        total: u64,
        alignment: Option<Alignment>,
    },
    PlaybackChanged {
        is_playing: bool,
        speed_ms: u64,
    },
    /// Auto-advance reached the last alignment
    PlaybackCompleted,
    LoadFailed {
        index: u64,
        error: String,
    },
    ProgressCommitted {
        index: u64,
    },
    ProgressQueued {
        sequence: u64,
        pending: usize,
    },
    QueueReplayed(ReplayReport),
    /// A queued write was given up on
    ProgressDropped(DeadLetter),
    ConnectivityChanged {
        online: bool,
    },
}

/// Receives session events. Called on the thread that produced the event,
/// so implementations should return quickly.
pub trait NavigationListener: Send + Sync {
    fn on_event(&self, event: &NavigationEvent);
}

impl<F> NavigationListener for F
where
    F: Fn(&NavigationEvent) + Send + Sync,
{
    fn on_event(&self, event: &NavigationEvent) {
        self(event)
    }
}

#[derive(Default)]
pub struct EventHub {
    listeners: RwLock<Vec<Arc<dyn NavigationListener>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn NavigationListener>) {
        self.listeners.write().push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    pub fn emit(&self, event: NavigationEvent) {
        // Listeners may register others from inside a callback
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.on_event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_emit_reaches_every_listener() {
        let hub = EventHub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..2 {
            let seen = seen.clone();
            hub.add(Arc::new(move |event: &NavigationEvent| {
                seen.lock().push(event.clone());
            }));
        }

        hub.emit(NavigationEvent::PlaybackCompleted);
        assert_eq!(hub.len(), 2);
        assert_eq!(
            *seen.lock(),
            vec![NavigationEvent::PlaybackCompleted, NavigationEvent::PlaybackCompleted]
        );
    }
}
