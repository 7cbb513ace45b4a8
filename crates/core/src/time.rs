use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{ExporterError, Result};

pub fn parse_duration_str(input: &str) -> Result<Duration> {
    humantime::parse_duration(input.trim())
        .map_err(|e| ExporterError::Parse(format!("invalid duration {input}: {e}")))
}

pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(input.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| ExporterError::Parse(format!("invalid RFC3339 timestamp {input}: {e}")))
}

pub fn format_duration(duration: Duration) -> String {
    humantime::format_duration(duration).to_string()
}
