//! In-memory cache of loaded batches for one viewing session

use std::num::NonZeroUsize;

use lru::LruCache;

use super::indexer::Window;
use super::types::{Alignment, Batch};

/// Recently loaded batches, least recently used evicted first
pub struct BatchCache {
    batches: LruCache<u64, Batch>,
}

impl BatchCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            batches: LruCache::new(capacity),
        }
    }

    /// Store a batch, keyed by its first index
    pub fn insert(&mut self, batch: Batch) {
        if batch.is_empty() {
            return;
        }
        if let Some((start, evicted)) = self.batches.push(batch.window().start, batch) {
            tracing::debug!("Evicted batch at {} ({} alignments)", start, evicted.len());
        }
    }

    /// Window of the batch holding `index`, marking it recently used
    pub fn window_for(&mut self, index: u64) -> Option<Window> {
        let start = self
            .batches
            .iter()
            .find(|(_, batch)| batch.window().contains(index))
            .map(|(start, _)| *start)?;
        self.batches.get(&start).map(Batch::window)
    }

    /// Alignment at `index` from any resident batch
    pub fn alignment(&self, index: u64) -> Option<&Alignment> {
        self.batches.iter().find_map(|(_, batch)| batch.get(index))
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn clear(&mut self) {
        self.batches.clear();
    }
}
