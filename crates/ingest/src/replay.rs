use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tibber_exporter_core::error::{ExporterError, Result};
use tibber_exporter_core::model::sample::TelemetrySample;
use tokio::sync::mpsc;

use crate::source::TelemetrySource;

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    pub interval: Option<Duration>,
    pub restamp: bool,
    pub hold_open: bool,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            interval: None,
            restamp: false,
            hold_open: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplaySource {
    path: PathBuf,
    options: ReplayOptions,
}

impl ReplaySource {
    pub fn new(path: impl Into<PathBuf>, options: ReplayOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Vec<TelemetrySample>> {
        let path = self.path.display();
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ExporterError::Io(format!("failed reading {path}: {e}")))?;
        parse_lines(&raw).map_err(|e| ExporterError::Parse(format!("{path}: {e}")))
    }
}

pub fn parse_lines(raw: &str) -> std::result::Result<Vec<TelemetrySample>, String> {
    let mut samples: Vec<TelemetrySample> = Vec::new();
    for (i, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let sample = serde_json::from_str(line).map_err(|e| format!("line {}: {e}", i + 1))?;
        samples.push(sample);
    }
    Ok(samples)
}

impl TelemetrySource for ReplaySource {
    fn name(&self) -> &'static str {
        "replay"
    }

    async fn run(self, tx: mpsc::Sender<TelemetrySample>) -> Result<()> {
        let samples = self.load().await?;
        tracing::info!(path = %self.path.display(), count = samples.len(), "replaying samples");

        for mut sample in samples {
            if self.options.restamp {
                sample.timestamp = Utc::now();
            }
            if tx.send(sample).await.is_err() {
                return Ok(());
            }
            if let Some(interval) = self.options.interval {
                tokio::time::sleep(interval).await;
            }
        }

        if self.options.hold_open {
            tracing::info!("replay finished, holding feed open");
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}
