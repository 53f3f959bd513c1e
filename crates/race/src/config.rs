use std::time::Duration;

/// Default delay between candidate launches.
pub const DEFAULT_STAGGER: Duration = Duration::from_millis(300);

/// Default overall deadline for a race.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(60);

/// Timing parameters for a [`Race`](crate::Race).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaceConfig {
    /// Head start each candidate gets before the next one is launched.
    pub stagger: Duration,
    /// Wall-clock budget for the whole race, measured from its start.
    pub deadline: Duration,
}

impl RaceConfig {
    pub fn new(stagger: Duration, deadline: Duration) -> Self {
        Self { stagger, deadline }
    }

    #[must_use]
    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self::new(DEFAULT_STAGGER, DEFAULT_DEADLINE)
    }
}
