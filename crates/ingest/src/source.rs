use std::future::Future;

use tibber_exporter_core::error::Result;
use tibber_exporter_core::model::sample::TelemetrySample;
use tokio::sync::mpsc;

pub trait TelemetrySource {
    fn name(&self) -> &'static str;

    fn run(self, tx: mpsc::Sender<TelemetrySample>) -> impl Future<Output = Result<()>> + Send;
}
