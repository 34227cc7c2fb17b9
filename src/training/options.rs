use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TrainingError;

/// Parameters of a training run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingOptions {
    /// How many times the whole queue is played (at least 1)
    pub repetitions: u32,

    /// Pause between consecutive plays
    pub interval: Duration,

    /// Draw a fresh permutation of the queue for every repetition
    pub random_order: bool,
}

impl TrainingOptions {
    pub fn new(repetitions: u32, interval: Duration, random_order: bool) -> Self {
        Self {
            repetitions,
            interval,
            random_order,
        }
    }

    pub fn validate(&self) -> Result<(), TrainingError> {
        if self.repetitions == 0 {
            return Err(TrainingError::InvalidOptions(
                "repetitions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            repetitions: 1,
            interval: Duration::from_millis(1000),
            random_order: false,
        }
    }
}
