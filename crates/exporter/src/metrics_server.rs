use std::collections::HashMap;

use axum::Router;
use axum::extract::State;
use axum::http::{Method, StatusCode, header};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::get;
use chrono::{DateTime, Utc};
use prometheus::core::{Collector, Desc};
#[cfg(target_os = "linux")]
use prometheus::process_collector::ProcessCollector;
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, Opts, Registry, TEXT_FORMAT, TextEncoder};
use serde::Serialize;
use tibber_exporter_core::field::Field;
use tibber_exporter_core::model::metric::FeedState;
use tibber_exporter_core::time::format_duration;
use tibber_exporter_store::project::{feed_state, project_snapshot};
use tibber_exporter_store::{MetricProjector, StoreStatus};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Level;

pub struct LiveCollector {
    projector: MetricProjector,
    descs: Vec<Desc>,
}

impl LiveCollector {
    pub fn new(projector: MetricProjector) -> prometheus::Result<Self> {
        let descs = Field::EXPORT_ORDER
            .iter()
            .map(|field| {
                Desc::new(
                    field.metric_name().to_string(),
                    field.help().to_string(),
                    Vec::new(),
                    HashMap::new(),
                )
            })
            .collect::<prometheus::Result<Vec<_>>>()?;
        Ok(Self { projector, descs })
    }
}

impl Collector for LiveCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let mut families = Vec::new();
        for sample in self.projector.project() {
            match Gauge::with_opts(Opts::new(sample.name, sample.help)) {
                Ok(gauge) => {
                    gauge.set(sample.value);
                    families.extend(gauge.collect());
                }
                Err(err) => tracing::warn!(metric = sample.name, error = %err, "skipping metric"),
            }
        }
        families
    }
}

#[derive(Clone)]
pub struct MetricsState {
    registry: Registry,
    projector: MetricProjector,
    metrics_path: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: FeedState,
    pub staleness_threshold: String,
    pub age_seconds: Option<f64>,
    pub exported_metrics: usize,
    pub store: StoreStatus,
}

pub fn router(projector: MetricProjector, metrics_path: &str) -> prometheus::Result<Router> {
    let registry = Registry::new();
    registry.register(Box::new(LiveCollector::new(projector.clone())?))?;
    #[cfg(target_os = "linux")]
    registry.register(Box::new(ProcessCollector::for_self()))?;

    let state = MetricsState {
        registry,
        projector,
        metrics_path: metrics_path.to_string(),
    };
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Ok(Router::new()
        .route("/", get(index))
        .route(metrics_path, get(metrics))
        .route("/status", get(status))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .on_request(tower_http::trace::DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(tower_http::trace::DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .with_state(state))
}

async fn index(State(state): State<MetricsState>) -> Html<String> {
    Html(format!(
        "<html>\n<head><title>Tibber Exporter</title></head>\n<body>\n<h1>Tibber Exporter</h1>\n<p><a href=\"{path}\">Metrics</a></p>\n</body>\n</html>\n",
        path = state.metrics_path
    ))
}

async fn metrics(State(state): State<MetricsState>) -> Response {
    let families = state.registry.gather();
    let mut body = String::new();
    match TextEncoder::new().encode_utf8(&families, &mut body) {
        Ok(()) => ([(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "metrics encoding failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

async fn status(State(state): State<MetricsState>) -> Json<StatusResponse> {
    Json(status_at(&state.projector, Utc::now()))
}

fn status_at(projector: &MetricProjector, now: DateTime<Utc>) -> StatusResponse {
    let staleness = projector.staleness();
    let (snapshot, store) = projector.store().read_with_status();
    StatusResponse {
        state: feed_state(&snapshot, now, staleness),
        staleness_threshold: format_duration(staleness),
        age_seconds: snapshot
            .age_at(now)
            .map(|age| age.num_milliseconds() as f64 / 1000.0),
        exported_metrics: project_snapshot(&snapshot, now, staleness).len(),
        store,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use testkit::{full_sample, sample_with};
    use tibber_exporter_store::MeasurementStore;
    use tower::ServiceExt;

    use super::*;

    fn projector() -> MetricProjector {
        MetricProjector::new(MeasurementStore::default(), Duration::from_secs(300))
    }

    async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn empty_scrape_before_first_sample() {
        let app = router(projector(), "/metrics").unwrap();
        let (status, body) = get_text(app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body.contains("tibber_"), "{body}");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn process_metrics_are_exposed_without_a_feed() {
        let app = router(projector(), "/metrics").unwrap();
        let (status, body) = get_text(app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("process_resident_memory_bytes"), "{body}");
        assert!(!body.contains("tibber_"), "{body}");
    }

    #[tokio::test]
    async fn fresh_sample_is_exposed_as_gauges() {
        let p = projector();
        p.store().apply(&full_sample(Utc::now()));
        let app = router(p, "/metrics").unwrap();

        let (status, body) = get_text(app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(
            body.contains("# HELP tibber_power Consumption at the moment (Watt)"),
            "{body}"
        );
        assert!(body.contains("# TYPE tibber_power gauge"));
        assert!(body.contains("tibber_currency 578"));
        assert!(body.contains("tibber_current_line_1"));
    }

    #[tokio::test]
    async fn phase_groups_follow_the_snapshot() {
        let p = projector();
        let values = [(Field::Power, 900.0), (Field::VoltagePhase2, 229.5)];
        p.store().apply(&sample_with(Utc::now(), &values));
        let app = router(p, "/metrics").unwrap();

        let (_, body) = get_text(app, "/metrics").await;
        assert!(body.contains("tibber_power 900"));
        assert!(body.contains("tibber_voltage_phase_1 0"));
        assert!(body.contains("tibber_voltage_phase_2 229.5"));
        assert!(!body.contains("tibber_current_line"));
    }

    #[tokio::test]
    async fn stale_snapshot_scrapes_empty() {
        let p = projector();
        p.store()
            .apply(&full_sample(Utc::now() - chrono::Duration::minutes(10)));
        let app = router(p, "/metrics").unwrap();

        let (_, body) = get_text(app, "/metrics").await;
        assert!(!body.contains("tibber_"));
    }

    #[tokio::test]
    async fn custom_metrics_path_and_landing_page() {
        let app = router(projector(), "/probe").unwrap();
        let (status, body) = get_text(app.clone(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<a href=\"/probe\">Metrics</a>"));

        let (status, _) = get_text(app.clone(), "/probe").await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = get_text(app, "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn status_reports_feed_state() {
        let p = projector();
        let app = router(p.clone(), "/metrics").unwrap();
        let (_, body) = get_text(app.clone(), "/status").await;
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["state"], "not_ready");
        assert_eq!(value["staleness_threshold"], "5m");
        assert!(value["age_seconds"].is_null());

        p.store().apply(&full_sample(Utc::now()));
        let (_, body) = get_text(app, "/status").await;
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["state"], "ready");
        assert_eq!(value["exported_metrics"], Field::COUNT);
        assert_eq!(value["store"]["samples_applied"], 1);
    }

    #[test]
    fn status_fields_describe_one_snapshot() {
        let p = projector();
        let now = Utc::now();
        let ts = now - chrono::Duration::minutes(10);
        p.store().apply(&full_sample(ts));

        let status = status_at(&p, now);
        assert_eq!(status.state, FeedState::Stale);
        assert_eq!(status.exported_metrics, 0);
        assert_eq!(status.age_seconds, Some(600.0));
        assert_eq!(status.store.last_sample_ts, Some(ts));
        assert_eq!(status.store.samples_applied, 1);

        p.store().apply(&full_sample(now));
        let status = status_at(&p, now);
        assert_eq!(status.state, FeedState::Ready);
        assert_eq!(status.exported_metrics, Field::COUNT);
        assert_eq!(status.age_seconds, Some(0.0));
        assert_eq!(status.store.last_sample_ts, Some(now));
    }
}
