use std::time::Duration;

use chrono::{DateTime, Utc};
use tibber_exporter_core::field::{Field, FieldGroup};
use tibber_exporter_core::model::metric::{FeedState, MetricSample};
use tibber_exporter_core::model::snapshot::MeasurementSnapshot;

use crate::MeasurementStore;

#[derive(Clone)]
pub struct MetricProjector {
    store: MeasurementStore,
    staleness: Duration,
}

impl MetricProjector {
    pub fn new(store: MeasurementStore, staleness: Duration) -> Self {
        Self { store, staleness }
    }

    pub fn staleness(&self) -> Duration {
        self.staleness
    }

    pub fn store(&self) -> &MeasurementStore {
        &self.store
    }

    pub fn project(&self) -> Vec<MetricSample> {
        self.project_at(Utc::now())
    }

    pub fn project_at(&self, now: DateTime<Utc>) -> Vec<MetricSample> {
        project_snapshot(&self.store.read(), now, self.staleness)
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> FeedState {
        feed_state(&self.store.read(), now, self.staleness)
    }
}

pub fn feed_state(
    snapshot: &MeasurementSnapshot,
    now: DateTime<Utc>,
    staleness: Duration,
) -> FeedState {
    if !snapshot.is_ready() {
        FeedState::NotReady
    } else if snapshot.is_stale_at(now, staleness) {
        FeedState::Stale
    } else {
        FeedState::Ready
    }
}

pub fn project_snapshot(
    snapshot: &MeasurementSnapshot,
    now: DateTime<Utc>,
    staleness: Duration,
) -> Vec<MetricSample> {
    match feed_state(snapshot, now, staleness) {
        FeedState::Ready => {}
        FeedState::NotReady => return Vec::new(),
        FeedState::Stale => {
            tracing::debug!(ts = ?snapshot.timestamp, "snapshot is stale, exporting nothing");
            return Vec::new();
        }
    }

    let readings = &snapshot.readings;
    let voltage = readings.any_nonzero(&Field::VOLTAGE);
    let current = readings.any_nonzero(&Field::CURRENT);

    Field::EXPORT_ORDER
        .into_iter()
        .filter(|field| match field.group() {
            FieldGroup::Core => true,
            FieldGroup::Voltage => voltage,
            FieldGroup::Current => current,
        })
        .map(|field| MetricSample {
            name: field.metric_name(),
            help: field.help(),
            value: readings.get(field),
        })
        .collect()
}
