use tibber_exporter_core::error::{ExporterError, Result};
use tibber_exporter_core::model::sample::TelemetrySample;
use tibber_exporter_store::MeasurementStore;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::source::TelemetrySource;

#[derive(Clone)]
pub struct StreamIngestor {
    store: MeasurementStore,
    channel_capacity: usize,
}

impl StreamIngestor {
    pub fn new(store: MeasurementStore, channel_capacity: usize) -> Self {
        Self {
            store,
            channel_capacity: channel_capacity.max(1),
        }
    }

    pub async fn run<S: TelemetrySource>(&self, source: S) -> Result<()> {
        let name = source.name();
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        info!(source = name, "telemetry ingestor started");

        let (feed, applied) = tokio::join!(source.run(tx), self.consume(rx));
        match feed {
            Ok(()) => {
                error!(source = name, applied, "telemetry feed ended");
                Err(ExporterError::Ingest(format!(
                    "telemetry feed {name} ended after {applied} samples"
                )))
            }
            Err(err) => {
                error!(source = name, applied, error = %err, "telemetry feed failed");
                Err(err)
            }
        }
    }

    pub async fn consume(&self, mut rx: mpsc::Receiver<TelemetrySample>) -> u64 {
        let mut applied = 0u64;
        while let Some(sample) = rx.recv().await {
            self.store.apply(&sample);
            applied += 1;
            debug!(ts = %sample.timestamp, power = sample.readings.power, "live measurement");
        }
        applied
    }
}
