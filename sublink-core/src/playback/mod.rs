//! Timed auto-advance

mod scheduler;

pub use scheduler::{PlaybackScheduler, SchedulerState, StepOutcome, Stepper, StopReason};
