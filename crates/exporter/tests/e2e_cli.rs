use std::net::TcpListener;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serial_test::serial;
use testkit::{full_sample, replay_lines, sample_with};
use tibber_exporter_core::field::Field;

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_tibber-exporter")
}

fn command() -> Command {
    let mut cmd = Command::new(bin());
    cmd.env("TIBBER_EXPORTER_CONFIG", "/nonexistent/config.toml")
        .env_remove("TIBBER_ACCESS_TOKEN")
        .env_remove("TIBBER_HOME_ID")
        .env_remove("OTEL_EXPORTER_OTLP_ENDPOINT");
    cmd
}

fn spawn_replay(replay: &Path, extra: &[&str]) -> (Child, u16) {
    let port = free_port();
    let child = command()
        .arg("run")
        .arg("--listen-addr")
        .arg(format!("127.0.0.1:{port}"))
        .arg("--replay")
        .arg(replay)
        .args(extra)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    (child, port)
}

async fn wait_http_ready(port: u16, child: &mut Child) {
    let client = reqwest::Client::new();
    let mut ready = false;
    for _ in 0..100 {
        let exited = child.try_wait().unwrap();
        assert!(exited.is_none(), "tibber-exporter exited early: {exited:?}");
        if client
            .get(format!("http://127.0.0.1:{port}/"))
            .send()
            .await
            .is_ok()
        {
            ready = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(ready, "metrics endpoint not ready");
}

async fn scrape(port: u16, path: &str) -> String {
    reqwest::get(format!("http://127.0.0.1:{port}{path}"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap()
}

async fn scrape_until(port: u16, path: &str, needle: &str) -> String {
    let mut body = String::new();
    for _ in 0..50 {
        body = scrape(port, path).await;
        if body.contains(needle) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    body
}

fn stop(mut child: Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[tokio::test]
#[serial]
async fn e2e_restamped_replay_is_exported() {
    let temp = tempfile::tempdir().unwrap();
    let replay = temp.path().join("feed.jsonl");
    let old = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut first = full_sample(old);
    first.readings.power = 2100.0;
    let second = sample_with(old, &[(Field::Power, 2150.0)]);
    std::fs::write(&replay, replay_lines(&[first, second])).unwrap();

    let (mut child, port) = spawn_replay(&replay, &["--replay-restamp"]);
    wait_http_ready(port, &mut child).await;

    let body = scrape_until(port, "/metrics", "tibber_power 2150").await;
    assert!(body.contains("# TYPE tibber_power gauge"), "{body}");
    assert!(body.contains("tibber_power 2150"), "{body}");
    // Sparse phase values survive the second sample's zeros.
    assert!(body.contains("tibber_current_line_1"), "{body}");
    assert!(body.contains("tibber_voltage_phase_1"), "{body}");

    let body = scrape(port, "/status").await;
    let status: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(status["state"], "ready");
    assert_eq!(status["store"]["samples_applied"], 2);

    stop(child);
}

#[tokio::test]
#[serial]
async fn e2e_old_replay_is_stale_and_scrapes_empty() {
    let temp = tempfile::tempdir().unwrap();
    let replay = temp.path().join("old.jsonl");
    let old = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    std::fs::write(&replay, replay_lines(&[full_sample(old)])).unwrap();

    let (mut child, port) = spawn_replay(&replay, &[]);
    wait_http_ready(port, &mut child).await;

    let mut status = serde_json::Value::Null;
    for _ in 0..50 {
        status = serde_json::from_str(&scrape(port, "/status").await).unwrap();
        if status["store"]["samples_applied"] == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(status["state"], "stale");

    let body = scrape(port, "/metrics").await;
    assert!(!body.contains("tibber_"), "{body}");

    let landing = scrape(port, "/").await;
    assert!(landing.contains("href=\"/metrics\""));

    stop(child);
}

#[tokio::test]
#[serial]
async fn e2e_custom_metrics_path() {
    let temp = tempfile::tempdir().unwrap();
    let replay = temp.path().join("feed.jsonl");
    std::fs::write(&replay, replay_lines(&[full_sample(Utc::now())])).unwrap();

    let args = ["--replay-restamp", "--metrics-path", "/tibber"];
    let (mut child, port) = spawn_replay(&replay, &args);
    wait_http_ready(port, &mut child).await;

    let body = scrape_until(port, "/tibber", "tibber_power").await;
    assert!(body.contains("tibber_power"), "{body}");

    stop(child);
}

#[test]
#[serial]
fn e2e_missing_credentials_exit_non_zero() {
    let output = command()
        .arg("run")
        .arg("--listen-addr")
        .arg(format!("127.0.0.1:{}", free_port()))
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("TIBBER_ACCESS_TOKEN"), "{stderr}");
}

#[test]
#[serial]
fn e2e_unreadable_replay_file_exit_non_zero() {
    let output = command()
        .arg("run")
        .arg("--listen-addr")
        .arg(format!("127.0.0.1:{}", free_port()))
        .arg("--replay")
        .arg("/nonexistent/feed.jsonl")
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
#[serial]
fn e2e_config_redacts_token() {
    let output = command()
        .env("TIBBER_ACCESS_TOKEN", "very-secret")
        .env("TIBBER_EXPORTER_STALENESS", "2m")
        .arg("config")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("very-secret"));
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["access_token"], "<redacted>");
    assert_eq!(value["staleness_threshold"], "2m");
}

#[test]
#[serial]
fn e2e_fields_lists_catalogue() {
    let output = command().arg("fields").arg("--json").output().unwrap();
    assert!(output.status.success());
    let rows: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows.len(), Field::COUNT);
    assert_eq!(rows[0]["metric"], "tibber_power");
    let current = rows.iter().find(|r| r["field"] == "currentL1").unwrap();
    assert_eq!(current["policy"], "IgnoreZero");
}
