//! Sublink Core Library
//!
//! Navigation and progress synchronization for aligned subtitle pairs:
//! batched loading of alignments, timed auto-advance, throttled progress
//! writes with an offline queue, and validated local session state.

pub mod alignment;
pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod navigation;
pub mod playback;
pub mod progress;
pub mod storage;

// Re-exports for convenience
pub use alignment::{Alignment, Line, Window};
pub use api::{ApiClient, ApiError, ContentId, ProgressRecord};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use navigation::{Backends, NavOutcome, NavPhase, NavSnapshot, NavigationController, NavigationEvent, NavigationListener};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
