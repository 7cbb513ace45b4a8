use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::model::sample::Readings;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSnapshot {
    pub timestamp: Option<DateTime<Utc>>,
    pub readings: Readings,
}

impl MeasurementSnapshot {
    pub fn is_ready(&self) -> bool {
        self.timestamp.is_some()
    }

    pub fn age_at(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        self.timestamp.map(|ts| now - ts)
    }

    pub fn is_stale_at(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        let threshold = TimeDelta::from_std(threshold).unwrap_or(TimeDelta::MAX);
        self.age_at(now).is_some_and(|age| age > threshold)
    }
}
