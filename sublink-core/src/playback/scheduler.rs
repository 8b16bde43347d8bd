//! Auto-advance scheduler
//!
//! A small state machine around one spawned tick loop. Every start or
//! reschedule bumps a generation counter; a loop only steps while its
//! generation is current, and a oneshot wakes it out of its sleep so a
//! cancelled loop never outlives `stop()`.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::PlaybackConfig;

/// Result of one scheduled step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Advanced,
    /// Nothing left to advance to
    AtEnd,
    Failed(String),
}

/// Why the scheduler stopped on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Completed,
    Failed(String),
}

/// What the scheduler drives
pub trait Stepper: Send + Sync + 'static {
    /// Whether the position is already the last one
    fn at_end(&self) -> bool;

    /// Advance by one position on behalf of the run `generation`.
    /// A step that had to wait should confirm with
    /// [`PlaybackScheduler::is_current`] before moving.
    fn step(&self, generation: u64) -> BoxFuture<'static, StepOutcome>;

    /// Called once when the loop stops itself
    fn finished(&self, reason: StopReason);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

struct Inner {
    state: SchedulerState,
    speed_ms: u64,
    generation: u64,
    cancel: Option<oneshot::Sender<()>>,
    started_at: Option<Instant>,
}

/// Cancelable fixed-interval ticker
///
/// `start`, `stop` and `set_speed` spawn onto the current Tokio runtime and
/// must be called from within one.
pub struct PlaybackScheduler {
    inner: Arc<Mutex<Inner>>,
    stepper: Arc<dyn Stepper>,
    min_speed_ms: u64,
    max_speed_ms: u64,
}

impl PlaybackScheduler {
    pub fn new(stepper: Arc<dyn Stepper>, config: &PlaybackConfig, speed_ms: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: SchedulerState::Stopped,
                speed_ms: config.clamp_speed(speed_ms),
                generation: 0,
                cancel: None,
                started_at: None,
            })),
            stepper,
            min_speed_ms: config.min_speed_ms,
            max_speed_ms: config.max_speed_ms,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.inner.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    pub fn speed_ms(&self) -> u64 {
        self.inner.lock().speed_ms
    }

    /// Whether `generation` is the run that is currently ticking
    pub fn is_current(&self, generation: u64) -> bool {
        is_current(&self.inner, generation)
    }

    /// When the current run began, `None` while stopped
    pub fn running_since(&self) -> Option<Instant> {
        self.inner.lock().started_at
    }

    /// Start ticking. Returns `false` when already running or at the end.
    pub fn start(&self) -> bool {
        // Asked before locking, the stepper may consult its own locks
        if self.stepper.at_end() {
            debug!("Not starting playback, already at the last alignment");
            return false;
        }

        let mut inner = self.inner.lock();
        if inner.state == SchedulerState::Running {
            return false;
        }

        inner.state = SchedulerState::Running;
        inner.started_at = Some(Instant::now());
        self.spawn_loop(&mut inner);
        info!("Playback started ({}ms)", inner.speed_ms);
        true
    }

    /// Stop ticking. Returns whether it was running.
    ///
    /// Once this returns no further step begins.
    pub fn stop(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == SchedulerState::Stopped {
            return false;
        }
        Self::cancel(&mut inner);
        inner.state = SchedulerState::Stopped;
        inner.started_at = None;
        info!("Playback stopped");
        true
    }

    /// Change the interval, clamped to the configured range
    ///
    /// While running the pending tick is replaced by exactly one tick at the
    /// new interval. Returns the applied speed.
    pub fn set_speed(&self, speed_ms: u64) -> u64 {
        let speed_ms = speed_ms.clamp(self.min_speed_ms, self.max_speed_ms);
        let mut inner = self.inner.lock();
        inner.speed_ms = speed_ms;
        if inner.state == SchedulerState::Running {
            Self::cancel(&mut inner);
            self.spawn_loop(&mut inner);
            debug!("Rescheduled playback at {}ms", speed_ms);
        }
        speed_ms
    }

    fn cancel(inner: &mut Inner) {
        inner.generation = inner.generation.wrapping_add(1);
        if let Some(tx) = inner.cancel.take() {
            let _ = tx.send(());
        }
    }

    fn spawn_loop(&self, inner: &mut Inner) {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        inner.generation = inner.generation.wrapping_add(1);
        inner.cancel = Some(cancel_tx);

        tokio::spawn(run_loop(
            Arc::clone(&self.inner),
            Arc::clone(&self.stepper),
            inner.generation,
            Duration::from_millis(inner.speed_ms),
            cancel_rx,
        ));
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        Self::cancel(&mut self.inner.lock());
    }
}

fn is_current(inner: &Mutex<Inner>, generation: u64) -> bool {
    let inner = inner.lock();
    inner.state == SchedulerState::Running && inner.generation == generation
}

/// Move to `Stopped` if `generation` still owns the scheduler.
/// Returns whether this loop made the transition.
fn finish(inner: &Mutex<Inner>, generation: u64) -> bool {
    let mut inner = inner.lock();
    if inner.state != SchedulerState::Running || inner.generation != generation {
        return false;
    }
    inner.state = SchedulerState::Stopped;
    inner.started_at = None;
    inner.cancel = None;
    true
}

async fn run_loop(
    inner: Arc<Mutex<Inner>>,
    stepper: Arc<dyn Stepper>,
    generation: u64,
    interval: Duration,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    debug!("Tick loop {} started", generation);

    loop {
        tokio::select! {
            _ = &mut cancel_rx => {
                debug!("Tick loop {} cancelled", generation);
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        if !is_current(&inner, generation) {
            return;
        }

        let reason = match stepper.step(generation).await {
            StepOutcome::Advanced if stepper.at_end() => StopReason::Completed,
            StepOutcome::Advanced => continue,
            StepOutcome::AtEnd => StopReason::Completed,
            StepOutcome::Failed(e) => {
                warn!("Auto-advance failed: {}", e);
                StopReason::Failed(e)
            }
        };

        if finish(&inner, generation) {
            info!("Playback stopped: {:?}", reason);
            stepper.finished(reason);
        }
        return;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct Counter {
        position: AtomicU64,
        last: u64,
        fail_at: Option<u64>,
        finished: Mutex<Vec<StopReason>>,
    }

    impl Counter {
        fn new(last: u64) -> Arc<Self> {
            Self::failing(last, None)
        }

        fn failing(last: u64, fail_at: Option<u64>) -> Arc<Self> {
            Arc::new(Self {
                position: AtomicU64::new(0),
                last,
                fail_at,
                finished: Mutex::new(Vec::new()),
            })
        }

        fn steps(&self) -> u64 {
            self.position.load(Ordering::SeqCst)
        }
    }

    impl Stepper for Counter {
        fn at_end(&self) -> bool {
            self.steps() >= self.last
        }

        fn step(&self, _generation: u64) -> BoxFuture<'static, StepOutcome> {
            let outcome = if Some(self.steps()) == self.fail_at {
                StepOutcome::Failed("boom".to_string())
            } else {
                self.position.fetch_add(1, Ordering::SeqCst);
                StepOutcome::Advanced
            };
            Box::pin(async move { outcome })
        }

        fn finished(&self, reason: StopReason) {
            self.finished.lock().push(reason);
        }
    }

    fn scheduler(stepper: Arc<Counter>, speed_ms: u64) -> PlaybackScheduler {
        PlaybackScheduler::new(stepper, &PlaybackConfig::default(), speed_ms)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_at_interval() {
        let counter = Counter::new(100);
        let scheduler = scheduler(counter.clone(), 1_000);

        assert!(scheduler.start());
        assert!(!scheduler.start());
        assert!(scheduler.running_since().is_some());

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(counter.steps(), 3);
        assert!(scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_immediate_and_idempotent() {
        let counter = Counter::new(100);
        let scheduler = scheduler(counter.clone(), 1_000);

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(scheduler.stop());
        assert!(!scheduler.stop());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.steps(), 1);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert!(counter.finished.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_speed_change_replaces_pending_tick() {
        let counter = Counter::new(100);
        let scheduler = scheduler(counter.clone(), 3_000);

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert_eq!(scheduler.set_speed(1_000), 1_000);

        // One tick from the new loop; the old 3000ms tick must not also fire
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(counter.steps(), 1);

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(counter.steps(), 2);
    }

    /// Records the generation each step ran for
    struct Tracker {
        generations: Mutex<Vec<u64>>,
    }

    impl Stepper for Tracker {
        fn at_end(&self) -> bool {
            false
        }

        fn step(&self, generation: u64) -> BoxFuture<'static, StepOutcome> {
            self.generations.lock().push(generation);
            Box::pin(async { StepOutcome::Advanced })
        }

        fn finished(&self, _reason: StopReason) {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_retires_old_generation() {
        let tracker = Arc::new(Tracker {
            generations: Mutex::new(Vec::new()),
        });
        let scheduler = PlaybackScheduler::new(tracker.clone(), &PlaybackConfig::default(), 1_000);

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        let first = tracker.generations.lock()[0];
        assert!(scheduler.is_current(first));

        scheduler.stop();
        assert!(!scheduler.is_current(first));
        scheduler.start();
        assert!(!scheduler.is_current(first));

        scheduler.set_speed(2_000);
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        let latest = *tracker.generations.lock().last().unwrap();
        assert_ne!(latest, first);
        assert!(scheduler.is_current(latest));
    }

    #[tokio::test(start_paused = true)]
    async fn test_speed_is_clamped() {
        let scheduler = scheduler(Counter::new(10), 3_000);
        assert_eq!(scheduler.set_speed(100), 1_000);
        assert_eq!(scheduler.set_speed(60_000), 5_000);
        assert_eq!(scheduler.speed_ms(), 5_000);
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_and_reports_at_last_position() {
        let counter = Counter::new(2);
        let scheduler = scheduler(counter.clone(), 1_000);

        scheduler.start();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(counter.steps(), 2);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert_eq!(*counter.finished.lock(), vec![StopReason::Completed]);

        // Already at the end
        assert!(!scheduler.start());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_step_stops_playback() {
        let counter = Counter::failing(10, Some(1));
        let scheduler = scheduler(counter.clone(), 1_000);

        scheduler.start();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(counter.steps(), 1);
        assert!(!scheduler.is_running());
        assert_eq!(
            *counter.finished.lock(),
            vec![StopReason::Failed("boom".to_string())]
        );
    }
}
