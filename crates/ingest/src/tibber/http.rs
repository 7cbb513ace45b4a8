use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tibber_exporter_core::error::{ExporterError, Result};

use super::protocol::{GraphqlError, join_errors};

const VIEWER_QUERY: &str = "query Viewer($homeId: ID!) {
  viewer {
    websocketSubscriptionUrl
    home(id: $homeId) {
      id
      features { realTimeConsumptionEnabled }
    }
  }
}";

#[derive(Debug)]
pub enum ResolveError {
    Retry(String),
    Fatal(ExporterError),
}

pub type Resolved<T> = std::result::Result<T, ResolveError>;

#[derive(Clone)]
pub struct GraphqlClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ViewerResponse {
    data: Option<ViewerData>,
    #[serde(default)]
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
struct ViewerData {
    viewer: Option<Viewer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Viewer {
    websocket_subscription_url: Option<String>,
    home: Option<Home>,
}

#[derive(Debug, Deserialize)]
struct Home {
    features: Option<HomeFeatures>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HomeFeatures {
    real_time_consumption_enabled: Option<bool>,
}

impl GraphqlClient {
    pub fn new(endpoint: &str, token: &str, user_agent: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ExporterError::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            token: token.to_string(),
        })
    }

    pub async fn subscription_url(&self, home_id: &str) -> Resolved<String> {
        let body = json!({
            "query": VIEWER_QUERY,
            "variables": { "homeId": home_id },
        });
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ResolveError::Retry(format!("graphql request failed: {e}")))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ResolveError::Fatal(ExporterError::Transport(format!(
                "access token rejected ({status})"
            ))));
        }
        if !status.is_success() {
            let reason = format!("graphql endpoint returned {status}");
            return Err(ResolveError::Retry(reason));
        }

        let parsed: ViewerResponse = resp
            .json()
            .await
            .map_err(|e| ResolveError::Retry(format!("invalid graphql response: {e}")))?;
        if let Some(errors) = parsed.errors.filter(|e| !e.is_empty()) {
            return Err(ResolveError::Fatal(ExporterError::Transport(format!(
                "graphql query failed: {}",
                join_errors(&errors)
            ))));
        }

        let viewer = parsed
            .data
            .and_then(|d| d.viewer)
            .ok_or_else(|| fatal_transport("graphql response has no viewer"))?;
        let home = viewer.home.ok_or_else(|| {
            ResolveError::Fatal(ExporterError::Config(format!(
                "home {home_id} is not visible to this access token"
            )))
        })?;
        let enabled = home
            .features
            .and_then(|f| f.real_time_consumption_enabled)
            .unwrap_or(false);
        if !enabled {
            return Err(ResolveError::Fatal(ExporterError::Config(format!(
                "real-time consumption is not enabled for home {home_id}"
            ))));
        }

        viewer
            .websocket_subscription_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| fatal_transport("graphql response has no websocket subscription url"))
    }
}

fn fatal_transport(msg: &str) -> ResolveError {
    ResolveError::Fatal(ExporterError::Transport(msg.to_string()))
}
