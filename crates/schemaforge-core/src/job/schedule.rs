use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_POLL_SCHEDULE_SECS: [u64; 5] = [10, 15, 15, 10, 15];

/// Fixed sequence of waits before each poll. Not derived from attempt
/// count: the delays are taken exactly as configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<u64>", into = "Vec<u64>")]
pub struct PollSchedule {
    delays: Vec<Duration>,
}

impl PollSchedule {
    #[must_use]
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    #[must_use]
    pub fn from_secs(secs: &[u64]) -> Self {
        Self::new(secs.iter().copied().map(Duration::from_secs).collect())
    }

    #[must_use]
    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.delays.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }

    /// Length of the whole polling window.
    #[must_use]
    pub fn total(&self) -> Duration {
        self.delays.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = Duration> + '_ {
        self.delays.iter().copied()
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self::from_secs(&DEFAULT_POLL_SCHEDULE_SECS)
    }
}

impl From<Vec<u64>> for PollSchedule {
    fn from(secs: Vec<u64>) -> Self {
        Self::from_secs(&secs)
    }
}

impl From<PollSchedule> for Vec<u64> {
    fn from(schedule: PollSchedule) -> Self {
        schedule.delays.iter().map(Duration::as_secs).collect()
    }
}
