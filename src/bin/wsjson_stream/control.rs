use std::time::{Duration, Instant};

use crate::cli::Config;

#[derive(Debug, Clone, Copy)]
pub(crate) struct StopCondition {
    started_at: Instant,
    max_updates: Option<u64>,
    max_duration: Option<Duration>,
}

impl StopCondition {
    pub(crate) fn from_config(config: &Config) -> Self {
        Self {
            started_at: Instant::now(),
            max_updates: config.iterations,
            max_duration: config.duration_secs.map(Duration::from_secs),
        }
    }

    pub(crate) fn reached(&self, updates: u64) -> bool {
        if self.max_updates.is_some_and(|max| updates >= max) {
            return true;
        }

        self.max_duration
            .is_some_and(|limit| self.started_at.elapsed() >= limit)
    }
}
