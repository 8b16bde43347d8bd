//! Progress synchronization
//!
//! Throttled server writes with an offline queue, plus the connectivity
//! probe that tells the synchronizer when to replay it.

mod probe;
mod queue;
mod synchronizer;

pub use probe::{ConnectivityListener, ConnectivityProbe};
pub use queue::{queue_key, DeadLetter, DropReason, OfflineQueue, OfflineQueueItem, DEAD_LETTER_CAPACITY};
pub use synchronizer::{CommitOutcome, Prepared, ProgressSynchronizer, ReplayReport};
