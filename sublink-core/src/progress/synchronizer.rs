//! Progress synchronizer
//!
//! Turns the stream of position changes into a throttled sequence of
//! server writes. A write goes out when it is forced, when enough advances
//! have accumulated, or when the last write is old enough. Writes that fail
//! land in the offline queue and are replayed when connectivity returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::queue::{DeadLetter, OfflineQueue, OfflineQueueItem};
use crate::api::{ContentId, ProgressBackend, ProgressRecord, ProgressUpdate};
use crate::config::SyncConfig;
use crate::storage::KeyValueStore;

/// What `record_position` did with a position
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// Below the commit threshold, nothing sent
    Deferred,
    /// Written to the server
    Committed(ProgressRecord),
    /// Handed to the offline queue. `dropped` is set when that pushed out
    /// the oldest queued write.
    Queued {
        sequence: u64,
        dropped: Option<DeadLetter>,
    },
}

/// Result of [`ProgressSynchronizer::prepare`]
#[derive(Debug, Clone, PartialEq)]
pub enum Prepared {
    /// Handled locally, nothing to send
    Settled(CommitOutcome),
    /// A write is due and should be delivered
    Due(ProgressUpdate),
}

/// Summary of one replay pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayReport {
    pub delivered: usize,
    pub retained: usize,
    pub superseded: usize,
    pub dropped: Vec<DeadLetter>,
}

/// Active study time, reported in whole minutes
#[derive(Debug)]
struct MinuteMeter {
    active_since: Option<Instant>,
    accumulated: Duration,
    reported_minutes: u64,
}

impl MinuteMeter {
    fn new() -> Self {
        Self {
            active_since: Some(Instant::now()),
            accumulated: Duration::ZERO,
            reported_minutes: 0,
        }
    }

    fn set_active(&mut self, active: bool) {
        match (active, self.active_since) {
            (true, None) => self.active_since = Some(Instant::now()),
            (false, Some(since)) => {
                self.accumulated += since.elapsed();
                self.active_since = None;
            }
            _ => {}
        }
    }

    /// Whole minutes not reported yet. The remainder carries over.
    fn take_minutes(&mut self) -> u64 {
        let total = self.accumulated + self.active_since.map(|s| s.elapsed()).unwrap_or_default();
        let minutes = total.as_secs() / 60;
        let due = minutes.saturating_sub(self.reported_minutes);
        self.reported_minutes = minutes;
        due
    }
}

struct SyncState {
    online: bool,
    pending_advances: u32,
    last_commit: Instant,
    last_index: Option<u64>,
    unsaved: bool,
    next_sequence: u64,
    last_acked_sequence: Option<u64>,
    /// Minutes from writes that were superseded before delivery
    carried_minutes: u64,
    meter: MinuteMeter,
    queue: OfflineQueue,
}

impl SyncState {
    fn next_update(&mut self, index: u64) -> ProgressUpdate {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let minutes = self.meter.take_minutes() + std::mem::take(&mut self.carried_minutes);
        ProgressUpdate {
            current_alignment_index: index,
            session_duration_minutes: minutes,
            sequence,
        }
    }

    fn acknowledge(&mut self, update: &ProgressUpdate) {
        self.last_acked_sequence = Some(
            self.last_acked_sequence
                .map_or(update.sequence, |acked| acked.max(update.sequence)),
        );
        if self.last_index == Some(update.current_alignment_index) {
            self.unsaved = false;
        }
    }

    fn is_superseded(&self, item: &OfflineQueueItem) -> bool {
        self.last_acked_sequence
            .map_or(false, |acked| item.sequence() < acked)
    }
}

/// Per-content progress writer
pub struct ProgressSynchronizer {
    content_id: ContentId,
    backend: Arc<dyn ProgressBackend>,
    config: SyncConfig,
    state: Mutex<SyncState>,
    replaying: AtomicBool,
}

impl ProgressSynchronizer {
    /// Create a synchronizer, restoring any writes queued by an earlier run
    pub fn new(
        content_id: ContentId,
        backend: Arc<dyn ProgressBackend>,
        config: SyncConfig,
        kv: Arc<dyn KeyValueStore>,
    ) -> Self {
        let queue = OfflineQueue::restore(content_id.clone(), kv, config.max_queue_len);
        let next_sequence = queue.max_sequence().map_or(0, |s| s + 1);
        if !queue.is_empty() {
            info!("{} queued writes pending for {}", queue.len(), content_id);
        }

        Self {
            content_id,
            backend,
            config,
            state: Mutex::new(SyncState {
                online: true,
                pending_advances: 0,
                last_commit: Instant::now(),
                last_index: None,
                unsaved: false,
                next_sequence,
                last_acked_sequence: None,
                carried_minutes: 0,
                meter: MinuteMeter::new(),
                queue,
            }),
            replaying: AtomicBool::new(false),
        }
    }

    pub fn content_id(&self) -> &ContentId {
        &self.content_id
    }

    /// Note a position change and write it if a commit is due
    pub async fn record_position(&self, index: u64, force: bool) -> CommitOutcome {
        match self.prepare(index, force) {
            Prepared::Settled(outcome) => outcome,
            Prepared::Due(update) => self.deliver(update).await,
        }
    }

    /// Note a position change without touching the network
    ///
    /// Sequence numbers are handed out here, so calling this in production
    /// order keeps writes ordered even when delivery happens later.
    pub fn prepare(&self, index: u64, force: bool) -> Prepared {
        let mut state = self.state.lock();
        state.last_index = Some(index);
        state.unsaved = true;
        state.pending_advances = state.pending_advances.saturating_add(1);

        let due = force
            || state.pending_advances >= self.config.commit_every
            || state.last_commit.elapsed() >= self.config.commit_ceiling();
        if !due {
            return Prepared::Settled(CommitOutcome::Deferred);
        }

        // The write owns these advances from here on, delivered or queued
        state.pending_advances = 0;
        state.last_commit = Instant::now();
        let update = state.next_update(index);

        if !state.online {
            debug!("Offline, queueing write #{}", update.sequence);
            let sequence = update.sequence;
            let dropped = state.queue.push(update);
            return Prepared::Settled(CommitOutcome::Queued { sequence, dropped });
        }
        Prepared::Due(update)
    }

    /// Send a write produced by [`prepare`](Self::prepare). A failed write is queued.
    #[instrument(skip(self, update), fields(content = %self.content_id, sequence = update.sequence))]
    pub async fn deliver(&self, update: ProgressUpdate) -> CommitOutcome {
        match self.backend.put_progress(&self.content_id, &update).await {
            Ok(record) => {
                debug!("Committed index {} (#{})", update.current_alignment_index, update.sequence);
                self.state.lock().acknowledge(&update);
                CommitOutcome::Committed(record)
            }
            Err(e) => {
                warn!("Progress write failed, queueing: {}", e);
                self.enqueue(update)
            }
        }
    }

    /// Put a write straight into the offline queue
    pub fn enqueue(&self, update: ProgressUpdate) -> CommitOutcome {
        let sequence = update.sequence;
        let dropped = self.state.lock().queue.push(update);
        CommitOutcome::Queued { sequence, dropped }
    }

    /// Force a final write of the last position if it was never written
    ///
    /// Nothing is sent when that position is already waiting in the queue.
    pub async fn flush(&self) -> Option<CommitOutcome> {
        let index = {
            let state = self.state.lock();
            let index = state.last_index.filter(|_| state.unsaved)?;
            let queued = state
                .queue
                .newest()
                .map_or(false, |item| item.payload.current_alignment_index == index);
            if queued {
                debug!("Index {} already queued, nothing to flush", index);
                return None;
            }
            index
        };
        Some(self.record_position(index, true).await)
    }

    /// Deliver queued writes, oldest first
    ///
    /// Only items queued before the pass began are attempted. Returns `None`
    /// when another replay is already running.
    #[instrument(skip(self), fields(content = %self.content_id))]
    pub async fn replay(&self) -> Option<ReplayReport> {
        if self.replaying.swap(true, Ordering::AcqRel) {
            debug!("Replay already in progress");
            return None;
        }
        let _guard = ReplayGuard(&self.replaying);

        let snapshot = self.state.lock().queue.snapshot();
        if snapshot.is_empty() {
            return Some(ReplayReport::default());
        }
        info!("Replaying {} queued writes", snapshot.len());

        let mut report = ReplayReport::default();
        let mut items = snapshot.into_iter();

        while let Some(item) = items.next() {
            let sequence = item.sequence();
            {
                let mut state = self.state.lock();
                if state.is_superseded(&item) {
                    debug!("Write #{} superseded by a newer one", sequence);
                    if state.queue.remove(sequence).is_some() {
                        state.carried_minutes += item.payload.session_duration_minutes;
                        report.superseded += 1;
                    }
                    continue;
                }
            }

            match self.backend.put_progress(&self.content_id, &item.payload).await {
                Ok(_) => {
                    let mut state = self.state.lock();
                    state.queue.remove(sequence);
                    state.acknowledge(&item.payload);
                    report.delivered += 1;
                }
                Err(e) => {
                    let unreachable = e.is_unreachable();
                    let mut state = self.state.lock();
                    match state.queue.record_failure(sequence) {
                        Some(retries) if retries >= self.config.max_retries => {
                            if let Some(letter) = state.queue.dead_letter(sequence, e.to_string()) {
                                report.dropped.push(letter);
                            }
                        }
                        Some(_) => report.retained += 1,
                        None => {}
                    }

                    if unreachable {
                        // Later items would fail the same way
                        let rest = items.len();
                        warn!("Server unreachable, {} writes left for the next pass", rest);
                        report.retained += rest;
                        break;
                    }
                }
            }
        }

        info!(
            "Replay done: {} delivered, {} retained, {} superseded, {} dropped",
            report.delivered,
            report.retained,
            report.superseded,
            report.dropped.len()
        );
        Some(report)
    }

    /// Update the connectivity flag. Returns whether it changed.
    pub fn set_online(&self, online: bool) -> bool {
        let mut state = self.state.lock();
        let changed = state.online != online;
        state.online = online;
        if changed {
            info!("Connectivity: {}", if online { "online" } else { "offline" });
        }
        changed
    }

    /// Mark the connection as restored and replay the queue
    pub async fn on_connectivity_restored(&self) -> Option<ReplayReport> {
        self.set_online(true);
        self.replay().await
    }

    /// Pause or resume the study-time meter
    pub fn set_meter_active(&self, active: bool) {
        self.state.lock().meter.set_active(active);
    }

    pub fn is_online(&self) -> bool {
        self.state.lock().online
    }

    pub fn is_replaying(&self) -> bool {
        self.replaying.load(Ordering::Acquire)
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.state.lock().unsaved
    }

    /// Number of queued writes
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn queued_items(&self) -> Vec<OfflineQueueItem> {
        self.state.lock().queue.snapshot()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().queue.dead_letters()
    }

    pub fn last_acked_sequence(&self) -> Option<u64> {
        self.state.lock().last_acked_sequence
    }
}

/// Clears the replay flag when a pass ends, even if it is cancelled
struct ReplayGuard<'a>(&'a AtomicBool);

impl Drop for ReplayGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
