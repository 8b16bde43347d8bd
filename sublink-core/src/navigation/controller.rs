//! Navigation controller
//!
//! One controller per open content item. It owns the batch cache, the
//! playback scheduler and the progress synchronizer for that item, and is
//! the only place that changes the visible index.
//!
//! Navigation is serialized by an async mutex held across batch fetches. A
//! scheduler tick that lands while a fetch is in flight waits its turn and
//! then finds the window resident instead of issuing an overlapping fetch.
//!
//! Progress writes never run under that mutex. Navigation prepares the
//! write and hands it to a per-session writer task that delivers writes
//! one at a time in sequence order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use parking_lot::RwLock;
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::{debug, info, instrument, warn};

use super::events::{EventHub, NavigationEvent, NavigationListener};
use super::state::{NavOutcome, NavPhase, NavSnapshot};
use crate::alignment::{indexer, Alignment, BatchCache, BatchLoader, FetchPlan, Window};
use crate::api::{
    completion_percentage, AlignmentSource, ApiClient, ContentId, ProgressBackend, ProgressRecord, ProgressUpdate,
};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::playback::{PlaybackScheduler, StepOutcome, Stepper, StopReason};
use crate::progress::{
    CommitOutcome, ConnectivityListener, ConnectivityProbe, DeadLetter, Prepared, ProgressSynchronizer,
    ReplayReport,
};
use crate::storage::{KeyValueStore, PlaybackPreferences, SessionState, SessionStateStore};

/// Remote services a controller talks to
#[derive(Clone)]
pub struct Backends {
    pub alignments: Arc<dyn AlignmentSource>,
    pub progress: Arc<dyn ProgressBackend>,
}

impl Backends {
    /// Use one HTTP client for both
    pub fn from_client(client: ApiClient) -> Self {
        let client = Arc::new(client);
        Self {
            alignments: client.clone(),
            progress: client,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Next,
    Previous,
    Index(i64),
    /// Scheduler tick from a run, dropped if that run ended while it waited
    Tick(u64),
}

/// Where to resume, after weighing server and local state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Resume {
    index: u64,
    speed_ms: u64,
    was_playing: bool,
}

impl Resume {
    /// The server owns the position. Local state fills in the rest, and the
    /// position only when the server has no record.
    fn reconcile(
        server: Option<&ProgressRecord>,
        local: Option<&SessionState>,
        prefs: Option<&PlaybackPreferences>,
        default_speed_ms: u64,
    ) -> Self {
        Self {
            index: server
                .map(|r| r.current_index)
                .or_else(|| local.map(|s| s.current_index))
                .unwrap_or(0),
            speed_ms: local
                .map(|s| s.speed_ms)
                .or_else(|| prefs.map(|p| p.speed_ms))
                .unwrap_or(default_speed_ms),
            was_playing: local.map_or(false, |s| s.is_playing),
        }
    }
}

/// Guarded by the navigation mutex
struct NavState {
    cache: BatchCache,
    active: Option<Window>,
    current: Option<u64>,
    total: u64,
}

/// Readable without waiting for navigation
struct View {
    phase: NavPhase,
    current: Option<u64>,
    total: u64,
    alignment: Option<Alignment>,
}

impl View {
    fn at_end(&self) -> bool {
        if !self.phase.is_interactive() {
            return true;
        }
        self.current.map_or(true, |index| index + 1 >= self.total)
    }
}

struct Inner {
    content_id: ContentId,
    config: EngineConfig,
    loader: BatchLoader,
    progress: Arc<dyn ProgressBackend>,
    sync: ProgressSynchronizer,
    session: SessionStateStore,
    scheduler: PlaybackScheduler,
    probe: ConnectivityProbe,
    events: EventHub,
    nav: Mutex<NavState>,
    view: RwLock<View>,
    writes: mpsc::UnboundedSender<ProgressUpdate>,
    writer: parking_lot::Mutex<Option<mpsc::UnboundedReceiver<ProgressUpdate>>>,
    writes_in_flight: AtomicUsize,
    writes_idle: Notify,
}

/// Handle to a navigation session. Clones share the session.
#[derive(Clone)]
pub struct NavigationController {
    inner: Arc<Inner>,
}

impl NavigationController {
    /// Create a session in the `Loading` phase. Call [`open`](Self::open) to load it.
    pub fn new(
        content_id: ContentId,
        config: EngineConfig,
        backends: Backends,
        kv: Arc<dyn KeyValueStore>,
    ) -> Self {
        let session = SessionStateStore::new(kv.clone(), &config.storage, &config.playback);
        let sync = ProgressSynchronizer::new(
            content_id.clone(),
            backends.progress.clone(),
            config.sync.clone(),
            kv,
        );

        let (writes, writer) = mpsc::unbounded_channel();

        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let stepper = Arc::new(AutoAdvance {
                inner: weak.clone(),
            });
            Inner {
                scheduler: PlaybackScheduler::new(stepper, &config.playback, config.playback.default_speed_ms),
                loader: BatchLoader::new(backends.alignments),
                progress: backends.progress,
                sync,
                session,
                probe: ConnectivityProbe::new(),
                events: EventHub::new(),
                nav: Mutex::new(NavState {
                    cache: BatchCache::new(config.batch.cached_batches),
                    active: None,
                    current: None,
                    total: 0,
                }),
                view: RwLock::new(View {
                    phase: NavPhase::Loading,
                    current: None,
                    total: 0,
                    alignment: None,
                }),
                writes,
                writer: parking_lot::Mutex::new(Some(writer)),
                writes_in_flight: AtomicUsize::new(0),
                writes_idle: Notify::new(),
                content_id,
                config,
            }
        });

        Self { inner }
    }

    pub fn content_id(&self) -> &ContentId {
        &self.inner.content_id
    }

    pub fn add_listener(&self, listener: Arc<dyn NavigationListener>) {
        self.inner.events.add(listener);
    }

    /// Load the first batch and reconcile saved state, then enter `Ready`
    ///
    /// On a load failure the session stays in `Loading` and `open` can be
    /// called again.
    #[instrument(skip(self), fields(content = %self.inner.content_id))]
    pub async fn open(&self) -> Result<NavSnapshot> {
        let inner = &self.inner;
        let mut nav = inner.nav.lock().await;
        match inner.phase() {
            NavPhase::Loading => {}
            NavPhase::Closed => return Err(EngineError::SessionClosed),
            _ => {
                drop(nav);
                return Ok(self.snapshot());
            }
        }
        inner.spawn_writer();

        let server = match inner.progress.get_progress(&inner.content_id).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Server progress unavailable, using local state: {}", e);
                None
            }
        };
        let local = inner.session.load(&inner.content_id);
        let prefs = inner.session.load_preferences();
        let resume = Resume::reconcile(
            server.as_ref(),
            local.as_ref(),
            prefs.as_ref(),
            inner.config.playback.default_speed_ms,
        );
        debug!("Resuming at {:?}", resume);

        let batch_size = inner.config.batch.batch_size;
        let first = indexer::centered_window(resume.index, batch_size, u64::MAX);
        inner.fetch(&mut nav, first, resume.index).await?;

        let total = nav.total;
        let current = if total == 0 {
            None
        } else {
            let index = resume.index.min(total - 1);
            if nav.cache.window_for(index).is_none() {
                let window = indexer::centered_window(index, batch_size, total);
                inner.fetch(&mut nav, window, index).await?;
            }
            let window = Inner::resident(&mut nav, index)?;
            nav.active = Some(window);
            Some(index)
        };
        nav.current = current;

        inner.scheduler.set_speed(resume.speed_ms);
        inner.set_phase(NavPhase::Ready);
        if let Some(index) = current {
            let alignment = nav.cache.alignment(index).cloned();
            inner.show(index, nav.total, alignment);
        }
        info!("Session ready at {:?} of {}", current, nav.total);
        drop(nav);

        if resume.was_playing {
            self.start_playback().await?;
        }

        if inner.sync.pending() > 0 && inner.sync.is_online() {
            let controller = self.clone();
            tokio::spawn(async move {
                if let Err(e) = controller.replay_queue().await {
                    debug!("Startup replay skipped: {}", e);
                }
            });
        }

        Ok(self.snapshot())
    }

    /// Step forward one alignment
    pub async fn next(&self) -> Result<NavOutcome> {
        self.navigate(Target::Next).await
    }

    /// Step back one alignment
    pub async fn previous(&self) -> Result<NavOutcome> {
        self.navigate(Target::Previous).await
    }

    /// Jump to an arbitrary index. Out-of-range targets are ignored.
    pub async fn jump_to(&self, index: i64) -> Result<NavOutcome> {
        self.navigate(Target::Index(index)).await
    }

    #[instrument(skip(self), fields(content = %self.inner.content_id))]
    async fn navigate(&self, target: Target) -> Result<NavOutcome> {
        let inner = &self.inner;
        let mut nav = inner.nav.lock().await;
        inner.ensure_interactive()?;
        if let Target::Tick(generation) = target {
            if !inner.scheduler.is_current(generation) {
                debug!("Dropping tick from ended run {}", generation);
                return Ok(NavOutcome::Unchanged);
            }
        }

        let Some(current) = nav.current else {
            return Ok(NavOutcome::OutOfRange);
        };
        let index = match target {
            Target::Next | Target::Tick(_) => current.checked_add(1),
            Target::Previous => current.checked_sub(1),
            Target::Index(n) => u64::try_from(n).ok(),
        };
        let Some(index) = index.filter(|i| *i < nav.total) else {
            debug!("{:?} is outside 0..{}", target, nav.total);
            return Ok(NavOutcome::OutOfRange);
        };
        if index == current {
            return Ok(NavOutcome::Unchanged);
        }

        if nav.cache.window_for(index).is_none() {
            let batch_size = inner.config.batch.batch_size;
            let window = match indexer::plan(index, nav.active, batch_size, nav.total) {
                FetchPlan::Fetch(window) => window,
                // Active window was evicted
                FetchPlan::Resident { .. } => indexer::centered_window(index, batch_size, nav.total),
            };

            inner.set_phase(NavPhase::Navigating);
            let fetched = inner.fetch(&mut nav, window, index).await;
            inner.set_phase(NavPhase::Ready);
            fetched?;

            if index >= nav.total {
                debug!("Sequence shrank to {}, ignoring {}", nav.total, index);
                return Ok(NavOutcome::OutOfRange);
            }
        }

        let window = Inner::resident(&mut nav, index)?;
        nav.active = Some(window);
        nav.current = Some(index);
        let alignment = nav.cache.alignment(index).cloned();
        inner.show(index, nav.total, alignment);

        let force = matches!(target, Target::Index(_));
        match inner.sync.prepare(index, force) {
            Prepared::Settled(outcome) => inner.report_commit(outcome),
            Prepared::Due(update) => inner.hand_off(update),
        }
        inner.save_session(index, inner.scheduler.is_running());

        if index + 1 >= nav.total && inner.scheduler.stop() {
            inner.playback_finished(StopReason::Completed);
        }

        Ok(NavOutcome::Moved { index })
    }

    /// Start auto-advance. Returns `false` when already playing or at the end.
    pub async fn start_playback(&self) -> Result<bool> {
        let inner = &self.inner;
        let nav = inner.nav.lock().await;
        inner.ensure_interactive()?;

        let started = inner.scheduler.start();
        if started {
            if let Some(index) = nav.current {
                inner.save_session(index, true);
            }
            inner.emit_playback();
        }
        Ok(started)
    }

    /// Stop auto-advance. Returns whether it was playing.
    pub async fn pause(&self) -> Result<bool> {
        let inner = &self.inner;
        let nav = inner.nav.lock().await;
        inner.ensure_interactive()?;

        let stopped = inner.scheduler.stop();
        if stopped {
            if let Some(index) = nav.current {
                inner.save_session(index, false);
            }
            inner.emit_playback();
        }
        Ok(stopped)
    }

    /// Change the auto-advance interval. Returns the applied (clamped) speed.
    pub async fn set_speed(&self, speed_ms: u64) -> Result<u64> {
        let inner = &self.inner;
        let nav = inner.nav.lock().await;
        inner.ensure_interactive()?;

        let applied = inner.scheduler.set_speed(speed_ms);
        if let Err(e) = inner.session.save_preferences(applied) {
            warn!("Failed to save preferences: {}", e);
        }
        if let Some(index) = nav.current {
            inner.save_session(index, inner.scheduler.is_running());
        }
        inner.emit_playback();
        Ok(applied)
    }

    /// Hidden sessions stop playing, stop metering study time and write
    /// their position
    pub async fn on_visibility_changed(&self, hidden: bool) -> Result<()> {
        let inner = &self.inner;
        let nav = inner.nav.lock().await;
        if inner.phase() == NavPhase::Closed {
            return Err(EngineError::SessionClosed);
        }

        inner.sync.set_meter_active(!hidden);
        if !hidden {
            return Ok(());
        }

        debug!("Session hidden");
        if inner.scheduler.stop() {
            inner.emit_playback();
        }
        if let Some(index) = nav.current {
            inner.save_session(index, false);
        }
        drop(nav);
        inner.flush().await;
        Ok(())
    }

    /// Report connectivity. Coming back online replays the offline queue.
    pub async fn set_online(&self, online: bool) -> Result<Option<ReplayReport>> {
        self.inner.ensure_open()?;
        if !self.inner.sync.set_online(online) {
            return Ok(None);
        }
        self.inner
            .events
            .emit(NavigationEvent::ConnectivityChanged { online });

        if online {
            return self.replay_queue().await;
        }
        Ok(None)
    }

    /// Replay the offline queue now. `None` when a replay is already running.
    pub async fn replay_queue(&self) -> Result<Option<ReplayReport>> {
        let inner = &self.inner;
        inner.ensure_open()?;

        let Some(report) = inner.sync.replay().await else {
            return Ok(None);
        };
        for letter in &report.dropped {
            inner
                .events
                .emit(NavigationEvent::ProgressDropped(letter.clone()));
        }
        inner
            .events
            .emit(NavigationEvent::QueueReplayed(report.clone()));
        Ok(Some(report))
    }

    /// Poll the server health endpoint in the background and feed the
    /// result into [`set_online`](Self::set_online)
    pub fn start_probe(&self) -> Result<()> {
        let inner = &self.inner;
        inner.ensure_open()?;
        let bridge = Arc::new(ProbeBridge {
            inner: Arc::downgrade(inner),
        });
        inner
            .probe
            .start(inner.progress.clone(), inner.config.sync.probe_interval(), bridge);
        Ok(())
    }

    pub fn stop_probe(&self) {
        self.inner.probe.stop();
    }

    /// Stop playback, save state and write the final position
    ///
    /// The final write is bounded by the configured flush timeout. Every
    /// later operation fails with `SessionClosed`.
    #[instrument(skip(self), fields(content = %self.inner.content_id))]
    pub async fn close(&self) -> Result<()> {
        let inner = &self.inner;
        let mut nav = inner.nav.lock().await;
        if inner.phase() == NavPhase::Closed {
            return Ok(());
        }

        inner.probe.stop();
        let was_playing = inner.scheduler.stop();
        if let Some(index) = nav.current {
            inner.save_session(index, was_playing);
        }
        inner.flush().await;

        nav.cache.clear();
        nav.active = None;
        inner.set_phase(NavPhase::Closed);
        info!("Session closed");
        Ok(())
    }

    pub fn snapshot(&self) -> NavSnapshot {
        let inner = &self.inner;
        let (phase, current, total) = {
            let view = inner.view.read();
            (view.phase, view.current, view.total)
        };
        NavSnapshot {
            content_id: inner.content_id.clone(),
            phase,
            current_index: current,
            total_count: total,
            completion_percentage: current.map_or(0.0, |index| completion_percentage(index, total)),
            is_playing: inner.scheduler.is_running(),
            speed_ms: inner.scheduler.speed_ms(),
            online: inner.sync.is_online(),
            pending_writes: inner.sync.pending(),
            unsaved_changes: inner.sync.has_unsaved_changes(),
        }
    }

    /// Wait until every progress write handed off so far has been
    /// delivered or queued
    pub async fn settle(&self) {
        self.inner.settle().await;
    }

    /// Alignment at the visible index
    pub fn current_alignment(&self) -> Option<Alignment> {
        self.inner.view.read().alignment.clone()
    }

    /// Writes given up on during this session
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.inner.sync.dead_letters()
    }
}

impl Inner {
    fn phase(&self) -> NavPhase {
        self.view.read().phase
    }

    fn ensure_open(&self) -> Result<()> {
        match self.phase() {
            NavPhase::Closed => Err(EngineError::SessionClosed),
            _ => Ok(()),
        }
    }

    fn ensure_interactive(&self) -> Result<()> {
        match self.phase() {
            NavPhase::Closed => Err(EngineError::SessionClosed),
            NavPhase::Loading => Err(EngineError::InvalidArgument(
                "session is still loading".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn set_phase(&self, phase: NavPhase) {
        {
            let mut view = self.view.write();
            if view.phase == phase || view.phase == NavPhase::Closed {
                return;
            }
            view.phase = phase;
        }
        self.events.emit(NavigationEvent::PhaseChanged(phase));
    }

    fn show(&self, index: u64, total: u64, alignment: Option<Alignment>) {
        {
            let mut view = self.view.write();
            view.current = Some(index);
            view.total = total;
            view.alignment = alignment.clone();
        }
        self.events.emit(NavigationEvent::PositionChanged {
            index,
            total,
            alignment,
        });
    }

    /// Load `window` into the cache. `index` is the navigation target,
    /// reported if the load fails.
    async fn fetch(&self, nav: &mut NavState, window: Window, index: u64) -> Result<()> {
        let start = i64::try_from(window.start).map_err(|_| {
            EngineError::InvalidArgument(format!("window start {} is out of range", window.start))
        })?;

        match self.loader.load(&self.content_id, start, window.limit()).await {
            Ok(loaded) => {
                nav.total = loaded.total_count;
                nav.cache.insert(loaded.batch);
                Ok(())
            }
            Err(e) => {
                self.events.emit(NavigationEvent::LoadFailed {
                    index,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn resident(nav: &mut NavState, index: u64) -> Result<Window> {
        nav.cache
            .window_for(index)
            .ok_or_else(|| EngineError::LoadFailure {
                status: None,
                body: format!("alignment {} missing from the loaded batch", index),
            })
    }

    fn save_session(&self, index: u64, is_playing: bool) {
        let state = SessionState::new(
            self.content_id.clone(),
            index,
            is_playing,
            self.scheduler.speed_ms(),
        );
        if let Err(e) = self.session.save(&self.content_id, &state) {
            warn!("Failed to save session state: {}", e);
        }
    }

    /// Start the writer task once per session
    fn spawn_writer(self: &Arc<Self>) {
        let Some(mut rx) = self.writer.lock().take() else {
            return;
        };
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let outcome = inner.sync.deliver(update).await;
                inner.report_commit(outcome);
                inner.write_done();
            }
            debug!("Progress writer stopped");
        });
    }

    /// Pass a due write to the writer task, or queue it if the task is gone
    fn hand_off(&self, update: ProgressUpdate) {
        self.writes_in_flight.fetch_add(1, Ordering::AcqRel);
        if let Err(mpsc::error::SendError(update)) = self.writes.send(update) {
            warn!("Progress writer unavailable, queueing write #{}", update.sequence);
            self.write_done();
            let outcome = self.sync.enqueue(update);
            self.report_commit(outcome);
        }
    }

    fn write_done(&self) {
        if self.writes_in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.writes_idle.notify_waiters();
        }
    }

    async fn settle(&self) {
        loop {
            // Registered before the check so a wakeup in between is not lost
            let idle = self.writes_idle.notified();
            if self.writes_in_flight.load(Ordering::Acquire) == 0 {
                return;
            }
            idle.await;
        }
    }

    /// Best-effort final write within the flush timeout
    async fn flush(&self) {
        let final_write = async {
            self.settle().await;
            self.sync.flush().await
        };
        match tokio::time::timeout(self.config.sync.flush_timeout(), final_write).await {
            Ok(Some(outcome)) => self.report_commit(outcome),
            Ok(None) => {}
            Err(_) => warn!("Final progress write timed out"),
        }
    }

    fn report_commit(&self, outcome: CommitOutcome) {
        match outcome {
            CommitOutcome::Deferred => {}
            CommitOutcome::Committed(record) => {
                self.events.emit(NavigationEvent::ProgressCommitted {
                    index: record.current_index,
                });
            }
            CommitOutcome::Queued { sequence, dropped } => {
                if let Some(letter) = dropped {
                    self.events.emit(NavigationEvent::ProgressDropped(letter));
                }
                self.events.emit(NavigationEvent::ProgressQueued {
                    sequence,
                    pending: self.sync.pending(),
                });
            }
        }
    }

    fn emit_playback(&self) {
        self.events.emit(NavigationEvent::PlaybackChanged {
            is_playing: self.scheduler.is_running(),
            speed_ms: self.scheduler.speed_ms(),
        });
    }

    fn playback_finished(&self, reason: StopReason) {
        let current = self.view.read().current;
        if let Some(index) = current {
            self.save_session(index, false);
        }
        self.emit_playback();
        if reason == StopReason::Completed {
            info!("Reached the last alignment");
            self.events.emit(NavigationEvent::PlaybackCompleted);
        }
    }
}

/// Drives navigation from scheduler ticks
struct AutoAdvance {
    inner: Weak<Inner>,
}

impl Stepper for AutoAdvance {
    fn at_end(&self) -> bool {
        self.inner
            .upgrade()
            .map_or(true, |inner| inner.view.read().at_end())
    }

    fn step(&self, generation: u64) -> BoxFuture<'static, StepOutcome> {
        let weak = self.inner.clone();
        Box::pin(async move {
            let Some(inner) = weak.upgrade() else {
                return StepOutcome::AtEnd;
            };
            match (NavigationController { inner }).navigate(Target::Tick(generation)).await {
                Ok(NavOutcome::Moved { .. }) => StepOutcome::Advanced,
                Ok(_) => StepOutcome::AtEnd,
                Err(e) => StepOutcome::Failed(e.to_string()),
            }
        })
    }

    fn finished(&self, reason: StopReason) {
        if let Some(inner) = self.inner.upgrade() {
            inner.playback_finished(reason);
        }
    }
}

/// Feeds probe results back into the session
struct ProbeBridge {
    inner: Weak<Inner>,
}

impl ConnectivityListener for ProbeBridge {
    fn connectivity_changed(&self, online: bool) -> BoxFuture<'static, ()> {
        let weak = self.inner.clone();
        Box::pin(async move {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if let Err(e) = (NavigationController { inner }).set_online(online).await {
                debug!("Ignoring connectivity change: {}", e);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(index: u64) -> ProgressRecord {
        ProgressRecord {
            content_id: None,
            current_index: index,
            total_count: 100,
            total_alignments_completed: None,
            session_duration: 0,
            last_accessed: None,
        }
    }

    fn local(index: u64, is_playing: bool, speed_ms: u64) -> SessionState {
        SessionState::new(ContentId::from(1), index, is_playing, speed_ms)
    }

    #[test]
    fn test_server_position_wins() {
        let resume = Resume::reconcile(Some(&record(40)), Some(&local(12, true, 2_000)), None, 3_000);
        assert_eq!(
            resume,
            Resume {
                index: 40,
                speed_ms: 2_000,
                was_playing: true
            }
        );
    }

    #[test]
    fn test_local_position_without_server_record() {
        let resume = Resume::reconcile(None, Some(&local(12, false, 4_000)), None, 3_000);
        assert_eq!(resume.index, 12);
        assert_eq!(resume.speed_ms, 4_000);
    }

    #[test]
    fn test_preferences_fill_speed() {
        let prefs = PlaybackPreferences {
            speed_ms: 1_500,
            updated_at: Utc::now(),
        };
        let resume = Resume::reconcile(None, None, Some(&prefs), 3_000);
        assert_eq!(
            resume,
            Resume {
                index: 0,
                speed_ms: 1_500,
                was_playing: false
            }
        );

        assert_eq!(Resume::reconcile(None, None, None, 3_000).speed_ms, 3_000);
    }
}
