use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ExporterError, Result};
use crate::field::Field;
use crate::policy::{DEFAULT_SPARSE_FIELDS, PolicyTable};
use crate::time::parse_duration_str;

pub const DEFAULT_API_ENDPOINT: &str = "https://api.tibber.com/v1-beta/gql";

pub const RESERVED_PATHS: [&str; 2] = ["/", "/status"];

const ROUTE_SYNTAX: [char; 4] = [':', '{', '}', '*'];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub access_token: Option<String>,
    pub home_id: Option<String>,
    pub api_endpoint: String,
    pub listen_addr: String,
    pub metrics_path: String,
    pub staleness_threshold: Duration,
    pub sparse_fields: Vec<Field>,
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
    pub max_reconnect_attempts: u32,
    pub idle_timeout: Duration,
    pub channel_capacity: usize,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            access_token: None,
            home_id: None,
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            listen_addr: "0.0.0.0:8080".to_string(),
            metrics_path: "/metrics".to_string(),
            staleness_threshold: Duration::from_secs(5 * 60),
            sparse_fields: DEFAULT_SPARSE_FIELDS.to_vec(),
            reconnect_initial: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(60),
            max_reconnect_attempts: 10,
            idle_timeout: Duration::from_secs(90),
            channel_capacity: 64,
            user_agent: format!("tibber-exporter/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        let config_path = config_file_path();
        if let Some(file_overrides) = load_file_overrides(&config_path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides()?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.staleness_threshold.is_zero() {
            return Err(ExporterError::Config(
                "staleness_threshold must be greater than zero".to_string(),
            ));
        }
        if !self.metrics_path.starts_with('/') {
            return Err(ExporterError::Config(format!(
                "metrics_path must start with '/' (value={})",
                self.metrics_path
            )));
        }
        if let Some(c) = self
            .metrics_path
            .chars()
            .find(|c| ROUTE_SYNTAX.contains(c))
        {
            return Err(ExporterError::Config(format!(
                "metrics_path must be a literal path, found '{c}' (value={})",
                self.metrics_path
            )));
        }
        if RESERVED_PATHS.contains(&self.metrics_path.as_str()) {
            return Err(ExporterError::Config(format!(
                "metrics_path {} is already served by the exporter",
                self.metrics_path
            )));
        }
        if self.reconnect_initial > self.reconnect_max {
            return Err(ExporterError::Config(
                "reconnect_initial must not exceed reconnect_max".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(ExporterError::Config(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn policy_table(&self) -> PolicyTable {
        PolicyTable::with_sparse(&self.sparse_fields)
    }

    pub fn credentials(&self) -> Result<(&str, &str)> {
        let token = self
            .access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ExporterError::Config("TIBBER_ACCESS_TOKEN is not set".to_string()))?;
        let home = self
            .home_id
            .as_deref()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ExporterError::Config("TIBBER_HOME_ID is not set".to_string()))?;
        Ok((token, home))
    }

    pub fn redacted(&self) -> Self {
        let mut out = self.clone();
        if out.access_token.is_some() {
            out.access_token = Some("<redacted>".to_string());
        }
        out
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FieldList {
    Csv(String),
    List(Vec<String>),
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    access_token: Option<String>,
    home_id: Option<String>,
    api_endpoint: Option<String>,
    listen_addr: Option<String>,
    metrics_path: Option<String>,
    staleness_threshold: Option<String>,
    sparse_fields: Option<FieldList>,
    reconnect_initial: Option<String>,
    reconnect_max: Option<String>,
    max_reconnect_attempts: Option<u32>,
    idle_timeout: Option<String>,
    channel_capacity: Option<usize>,
    user_agent: Option<String>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("TIBBER_EXPORTER_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("tibber-exporter/config.toml")
}

fn load_file_overrides(path: &PathBuf) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| ExporterError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed = parse_file_overrides(&raw)
        .map_err(|e| ExporterError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn parse_file_overrides(raw: &str) -> std::result::Result<ConfigOverrides, toml::de::Error> {
    toml::from_str(raw)
}

fn load_env_overrides() -> Result<ConfigOverrides> {
    let max_reconnect_attempts = match env::var("TIBBER_EXPORTER_MAX_RECONNECT_ATTEMPTS") {
        Ok(v) => Some(v.parse::<u32>().map_err(|e| {
            ExporterError::Config(format!(
                "bad TIBBER_EXPORTER_MAX_RECONNECT_ATTEMPTS in environment: {e}"
            ))
        })?),
        Err(_) => None,
    };

    Ok(ConfigOverrides {
        access_token: env::var("TIBBER_ACCESS_TOKEN").ok(),
        home_id: env::var("TIBBER_HOME_ID").ok(),
        api_endpoint: env::var("TIBBER_API_ENDPOINT").ok(),
        listen_addr: env::var("TIBBER_EXPORTER_LISTEN_ADDR").ok(),
        metrics_path: env::var("TIBBER_EXPORTER_METRICS_PATH").ok(),
        staleness_threshold: env::var("TIBBER_EXPORTER_STALENESS").ok(),
        sparse_fields: env::var("TIBBER_EXPORTER_SPARSE_FIELDS")
            .ok()
            .map(FieldList::Csv),
        reconnect_initial: env::var("TIBBER_EXPORTER_RECONNECT_INITIAL").ok(),
        reconnect_max: env::var("TIBBER_EXPORTER_RECONNECT_MAX").ok(),
        max_reconnect_attempts,
        idle_timeout: env::var("TIBBER_EXPORTER_IDLE_TIMEOUT").ok(),
        channel_capacity: None,
        user_agent: None,
    })
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.access_token {
        cfg.access_token = Some(v);
    }
    if let Some(v) = overrides.home_id {
        cfg.home_id = Some(v);
    }
    if let Some(v) = overrides.api_endpoint {
        cfg.api_endpoint = v;
    }
    if let Some(v) = overrides.listen_addr {
        cfg.listen_addr = v;
    }
    if let Some(v) = overrides.metrics_path {
        cfg.metrics_path = v;
    }
    if let Some(v) = overrides.staleness_threshold {
        cfg.staleness_threshold = parse_duration(&v, "staleness_threshold", source)?;
    }
    if let Some(v) = overrides.sparse_fields {
        cfg.sparse_fields = parse_field_list(v)
            .map_err(|e| ExporterError::Config(format!("bad sparse_fields in {source}: {e}")))?;
    }
    if let Some(v) = overrides.reconnect_initial {
        cfg.reconnect_initial = parse_duration(&v, "reconnect_initial", source)?;
    }
    if let Some(v) = overrides.reconnect_max {
        cfg.reconnect_max = parse_duration(&v, "reconnect_max", source)?;
    }
    if let Some(v) = overrides.max_reconnect_attempts {
        cfg.max_reconnect_attempts = v;
    }
    if let Some(v) = overrides.idle_timeout {
        cfg.idle_timeout = parse_duration(&v, "idle_timeout", source)?;
    }
    if let Some(v) = overrides.channel_capacity {
        cfg.channel_capacity = v;
    }
    if let Some(v) = overrides.user_agent {
        cfg.user_agent = v;
    }
    Ok(())
}

fn parse_duration(value: &str, key: &str, source: &str) -> Result<Duration> {
    parse_duration_str(value)
        .map_err(|e| ExporterError::Config(format!("bad {key} in {source}: {e}")))
}

fn parse_field_list(list: FieldList) -> Result<Vec<Field>> {
    match list {
        FieldList::Csv(raw) => Field::parse_list(&raw),
        FieldList::List(names) => names.iter().map(|n| Field::parse(n)).collect(),
    }
}
