use chrono::{DateTime, Duration, Utc};

use crate::domain::analytics::UserAnalyticsRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheState {
    /// No analytics record exists for the user.
    Absent,
    Fresh,
    Stale,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StalenessPolicy {
    window: Duration,
}

impl StalenessPolicy {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn classify(&self, record: Option<&UserAnalyticsRecord>, now: DateTime<Utc>) -> CacheState {
        match record {
            None => CacheState::Absent,
            Some(record) if self.is_fresh(record.last_trained, now) => CacheState::Fresh,
            Some(_) => CacheState::Stale,
        }
    }

    /// A record that was never trained is never fresh. A training time ahead
    /// of `now` counts as age zero.
    pub fn is_fresh(&self, last_trained: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_trained {
            Some(trained_at) => (now - trained_at).max(Duration::zero()) < self.window,
            None => false,
        }
    }
}
