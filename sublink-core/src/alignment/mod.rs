//! Alignment Data
//!
//! Alignment types, window arithmetic, batch fetching and caching.

mod cache;
pub mod indexer;
mod loader;
mod types;

pub use cache::BatchCache;
pub use indexer::{FetchPlan, Window};
pub use loader::{BatchLoader, LoadedBatch};
pub use types::*;
