//! Training runs
//!
//! This module provides:
//! - `TrainingQueue`: the user-ordered list of phrases to train on
//! - `TrainingScheduler`: plays the queue in timed repetitions and logs sessions
//! - `TrainingEvent`: progress notifications for subscribers

mod clock;
mod events;
mod options;
mod queue;
mod scheduler;

pub use clock::{Clock, SystemClock};
pub use events::{Termination, TrainingEvent};
pub use options::TrainingOptions;
pub use queue::TrainingQueue;
pub use scheduler::{
    RunHandle, RunReport, SchedulerState, TrainingScheduler, TrainingStatus,
};
