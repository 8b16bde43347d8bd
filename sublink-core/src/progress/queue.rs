//! Offline write queue
//!
//! Progress writes that could not be delivered wait here in FIFO order.
//! The queue is mirrored to the key-value store after every mutation so
//! pending writes survive a restart. Items are identified by the sequence
//! number of their payload.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::{ContentId, ProgressUpdate};
use crate::error::EngineError;
use crate::storage::KeyValueStore;

/// Dead letters kept for inspection
pub const DEAD_LETTER_CAPACITY: usize = 32;

pub fn queue_key(content_id: &ContentId) -> String {
    format!("queue/{}", content_id)
}

/// A progress write waiting for connectivity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineQueueItem {
    pub content_id: ContentId,
    pub payload: ProgressUpdate,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
}

impl OfflineQueueItem {
    pub fn sequence(&self) -> u64 {
        self.payload.sequence
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Replay attempts used up
    RetriesExhausted,
    /// Pushed out by newer writes when the queue was full
    Overflow,
}

/// A write that was given up on
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    pub item: OfflineQueueItem,
    pub reason: DropReason,
    pub last_error: Option<String>,
    pub dropped_at: DateTime<Utc>,
}

impl DeadLetter {
    /// The failure this letter stands for
    pub fn to_error(&self) -> EngineError {
        let cause = match self.reason {
            DropReason::RetriesExhausted => format!("gave up after {} attempts", self.item.retry_count),
            DropReason::Overflow => "pushed out of a full queue".to_string(),
        };
        let mut message = format!(
            "write #{} for index {} {}",
            self.item.sequence(),
            self.item.payload.current_alignment_index,
            cause
        );
        if let Some(last) = &self.last_error {
            message.push_str(&format!(" ({})", last));
        }
        EngineError::SyncFailure(message)
    }
}

pub struct OfflineQueue {
    content_id: ContentId,
    items: VecDeque<OfflineQueueItem>,
    max_len: usize,
    dead_letters: VecDeque<DeadLetter>,
    kv: Arc<dyn KeyValueStore>,
}

impl OfflineQueue {
    /// Open the queue for `content_id`, restoring persisted items
    pub fn restore(content_id: ContentId, kv: Arc<dyn KeyValueStore>, max_len: usize) -> Self {
        let key = queue_key(&content_id);
        let items = match kv.get(&key) {
            Ok(Some(raw)) => match parse_items(&content_id, &raw) {
                Ok(items) => {
                    debug!("Restored {} queued writes for {}", items.len(), content_id);
                    items
                }
                Err(reason) => {
                    warn!("{}", EngineError::StorageCorruption { key: key.clone(), reason });
                    if let Err(e) = kv.remove(&key) {
                        warn!("Failed to discard {}: {}", key, e);
                    }
                    VecDeque::new()
                }
            },
            Ok(None) => VecDeque::new(),
            Err(e) => {
                warn!("Failed to read {}: {}", key, e);
                VecDeque::new()
            }
        };

        Self {
            content_id,
            items,
            max_len: max_len.max(1),
            dead_letters: VecDeque::new(),
            kv,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Copy of the queued items, oldest first
    pub fn snapshot(&self) -> Vec<OfflineQueueItem> {
        self.items.iter().cloned().collect()
    }

    /// Most recently queued item
    pub fn newest(&self) -> Option<&OfflineQueueItem> {
        self.items.back()
    }

    /// Highest sequence number held, used to resume numbering
    pub fn max_sequence(&self) -> Option<u64> {
        self.items.iter().map(OfflineQueueItem::sequence).max()
    }

    /// Append a write. Returns the item pushed out if the queue was full.
    pub fn push(&mut self, payload: ProgressUpdate) -> Option<DeadLetter> {
        let mut overflowed = None;
        if self.items.len() >= self.max_len {
            if let Some(oldest) = self.items.pop_front() {
                overflowed = Some(self.bury(oldest, DropReason::Overflow, None));
            }
        }

        debug!(
            "Queued write #{} (index {})",
            payload.sequence, payload.current_alignment_index
        );
        self.items.push_back(OfflineQueueItem {
            content_id: self.content_id.clone(),
            payload,
            enqueued_at: Utc::now(),
            retry_count: 0,
        });
        self.persist();
        overflowed
    }

    /// Remove the item carrying `sequence`
    pub fn remove(&mut self, sequence: u64) -> Option<OfflineQueueItem> {
        let pos = self.items.iter().position(|i| i.sequence() == sequence)?;
        let item = self.items.remove(pos);
        self.persist();
        item
    }

    /// Count a failed attempt. Returns the new retry count.
    pub fn record_failure(&mut self, sequence: u64) -> Option<u32> {
        let item = self.items.iter_mut().find(|i| i.sequence() == sequence)?;
        item.retry_count += 1;
        let count = item.retry_count;
        self.persist();
        Some(count)
    }

    /// Remove the item carrying `sequence` and keep it as a dead letter
    pub fn dead_letter(&mut self, sequence: u64, error: impl Into<String>) -> Option<DeadLetter> {
        let pos = self.items.iter().position(|i| i.sequence() == sequence)?;
        let item = self.items.remove(pos)?;
        let letter = self.bury(item, DropReason::RetriesExhausted, Some(error.into()));
        self.persist();
        Some(letter)
    }

    /// Most recent dead letters, oldest first
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.iter().cloned().collect()
    }

    fn bury(&mut self, item: OfflineQueueItem, reason: DropReason, last_error: Option<String>) -> DeadLetter {
        warn!(
            "Dropping write #{} (index {}, {} retries): {:?}",
            item.sequence(),
            item.payload.current_alignment_index,
            item.retry_count,
            reason
        );
        let letter = DeadLetter {
            item,
            reason,
            last_error,
            dropped_at: Utc::now(),
        };
        if self.dead_letters.len() >= DEAD_LETTER_CAPACITY {
            self.dead_letters.pop_front();
        }
        self.dead_letters.push_back(letter.clone());
        letter
    }

    fn persist(&self) {
        let key = queue_key(&self.content_id);
        let result = if self.items.is_empty() {
            self.kv.remove(&key)
        } else {
            match serde_json::to_string(&self.items) {
                Ok(json) => self.kv.set(&key, &json),
                Err(e) => {
                    warn!("Failed to encode queue: {}", e);
                    return;
                }
            }
        };
        if let Err(e) = result {
            warn!("Failed to persist queue for {}: {}", self.content_id, e);
        }
    }
}

fn parse_items(content_id: &ContentId, raw: &str) -> Result<VecDeque<OfflineQueueItem>, String> {
    let items: VecDeque<OfflineQueueItem> = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    if let Some(foreign) = items.iter().find(|i| &i.content_id != content_id) {
        return Err(format!("holds a write for content {}", foreign.content_id));
    }
    Ok(items)
}
