//! Navigation Session
//!
//! The controller that ties batch loading, playback and progress sync
//! together for one content item, plus its state and event types.

mod controller;
mod events;
mod state;

pub use controller::{Backends, NavigationController};
pub use events::{EventHub, NavigationEvent, NavigationListener};
pub use state::{NavOutcome, NavPhase, NavSnapshot};
