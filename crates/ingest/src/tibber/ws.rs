use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tibber_exporter_core::config::Config;
use tibber_exporter_core::error::{ExporterError, Result};
use tibber_exporter_core::model::sample::TelemetrySample;
use tibber_exporter_core::time::format_duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::{SEC_WEBSOCKET_PROTOCOL, USER_AGENT};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::decode::{LiveMeasurementData, subscription_query};
use super::http::{GraphqlClient, ResolveError};
use super::protocol::{
    ClientMessage, InitPayload, SUBPROTOCOL, ServerMessage, SubscribePayload, join_errors,
};
use crate::backoff::Backoff;
use crate::source::TelemetrySource;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Step<T> = std::result::Result<T, Interrupt>;

const CLOSE_UNAUTHORIZED: u16 = 4401;
const CLOSE_FORBIDDEN: u16 = 4403;

enum Endpoint {
    Resolve(GraphqlClient),
    Fixed(String),
}

enum Interrupt {
    Retry(String),
    Fatal(ExporterError),
    ReceiverClosed,
}

impl From<ResolveError> for Interrupt {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Retry(reason) => Interrupt::Retry(reason),
            ResolveError::Fatal(err) => Interrupt::Fatal(err),
        }
    }
}

impl From<ExporterError> for Interrupt {
    fn from(err: ExporterError) -> Self {
        Interrupt::Fatal(err)
    }
}

pub struct TibberSource {
    endpoint: Endpoint,
    token: String,
    home_id: String,
    user_agent: String,
    idle_timeout: Duration,
    reconnect_initial: Duration,
    reconnect_max: Duration,
    max_reconnect_attempts: u32,
}

impl TibberSource {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let (token, home_id) = cfg.credentials()?;
        let graphql = GraphqlClient::new(&cfg.api_endpoint, token, &cfg.user_agent)?;
        Ok(Self {
            endpoint: Endpoint::Resolve(graphql),
            token: token.to_string(),
            home_id: home_id.to_string(),
            user_agent: cfg.user_agent.clone(),
            idle_timeout: cfg.idle_timeout,
            reconnect_initial: cfg.reconnect_initial,
            reconnect_max: cfg.reconnect_max,
            max_reconnect_attempts: cfg.max_reconnect_attempts,
        })
    }

    pub fn with_subscription_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Endpoint::Fixed(url.into());
        self
    }

    pub fn home_id(&self) -> &str {
        &self.home_id
    }

    async fn session(&self, tx: &mpsc::Sender<TelemetrySample>, delivered: &mut u64) -> Interrupt {
        let url = match &self.endpoint {
            Endpoint::Fixed(url) => url.clone(),
            Endpoint::Resolve(graphql) => match graphql.subscription_url(&self.home_id).await {
                Ok(url) => url,
                Err(err) => return err.into(),
            },
        };

        let mut socket = match self.open(&url).await {
            Ok(socket) => socket,
            Err(interrupt) => return interrupt,
        };
        let id = Uuid::new_v4().to_string();
        if let Err(interrupt) = self.start(&mut socket, &id).await {
            let _ = socket.close(None).await;
            return interrupt;
        }
        info!(home_id = %self.home_id, subscription = %id, "live measurement subscription started");

        let interrupt = self.pump(&mut socket, &id, tx, delivered).await;
        let _ = send(&mut socket, &ClientMessage::Complete { id: &id }).await;
        let _ = socket.close(None).await;
        interrupt
    }

    async fn open(&self, url: &str) -> Step<Socket> {
        let mut request = url
            .into_client_request()
            .map_err(|e| ExporterError::Config(format!("invalid websocket url {url}: {e}")))?;
        let user_agent = HeaderValue::from_str(&self.user_agent)
            .map_err(|e| ExporterError::Config(format!("invalid user agent: {e}")))?;
        let protocol = HeaderValue::from_static(SUBPROTOCOL);
        let headers = request.headers_mut();
        headers.insert(SEC_WEBSOCKET_PROTOCOL, protocol);
        headers.insert(USER_AGENT, user_agent);

        let connect = tokio_tungstenite::connect_async(request);
        match tokio::time::timeout(self.idle_timeout, connect).await {
            Ok(Ok((socket, _))) => {
                debug!(url, "websocket connected");
                Ok(socket)
            }
            Ok(Err(e)) => Err(Interrupt::Retry(format!("websocket connect failed: {e}"))),
            Err(_) => Err(Interrupt::Retry(format!(
                "websocket connect timed out after {}",
                format_duration(self.idle_timeout)
            ))),
        }
    }

    async fn start(&self, socket: &mut Socket, id: &str) -> Step<()> {
        send(
            socket,
            &ClientMessage::ConnectionInit {
                payload: InitPayload { token: &self.token },
            },
        )
        .await?;

        loop {
            match self.next_message(socket).await? {
                ServerMessage::ConnectionAck => break,
                ServerMessage::Ping => send(socket, &ClientMessage::Pong).await?,
                other => debug!(message = ?other, "ignoring message before connection_ack"),
            }
        }

        let query = subscription_query();
        send(
            socket,
            &ClientMessage::Subscribe {
                id,
                payload: SubscribePayload {
                    query: &query,
                    variables: json!({ "homeId": self.home_id }),
                    operation_name: "LiveMeasurement",
                },
            },
        )
        .await
    }

    async fn pump(
        &self,
        socket: &mut Socket,
        id: &str,
        tx: &mpsc::Sender<TelemetrySample>,
        delivered: &mut u64,
    ) -> Interrupt {
        loop {
            let message = match self.next_message(socket).await {
                Ok(message) => message,
                Err(interrupt) => return interrupt,
            };
            match message {
                ServerMessage::Next { id: got, payload } if got == id => {
                    if let Some(errors) = payload.errors.filter(|e| !e.is_empty()) {
                        let errors = join_errors(&errors);
                        warn!(%errors, "live measurement payload carried errors");
                    }
                    let Some(sample) = payload.data.and_then(decode_payload) else {
                        continue;
                    };
                    if tx.send(sample).await.is_err() {
                        return Interrupt::ReceiverClosed;
                    }
                    *delivered += 1;
                }
                ServerMessage::Error { id: got, payload } if got == id => {
                    return Interrupt::Retry(format!("subscription error: {payload}"));
                }
                ServerMessage::Complete { id: got } if got == id => {
                    return Interrupt::Retry("server completed the subscription".to_string());
                }
                ServerMessage::Ping => {
                    if let Err(interrupt) = send(socket, &ClientMessage::Pong).await {
                        return interrupt;
                    }
                }
                other => debug!(message = ?other, "ignoring message"),
            }
        }
    }

    async fn next_message(&self, socket: &mut Socket) -> Step<ServerMessage> {
        loop {
            let frame = match tokio::time::timeout(self.idle_timeout, socket.next()).await {
                Ok(Some(Ok(frame))) => frame,
                Ok(Some(Err(e))) => return Err(Interrupt::Retry(format!("websocket error: {e}"))),
                Ok(None) => return Err(Interrupt::Retry("websocket closed".to_string())),
                Err(_) => {
                    return Err(Interrupt::Retry(format!(
                        "no message for {}",
                        format_duration(self.idle_timeout)
                    )));
                }
            };
            match frame {
                Message::Text(text) => match serde_json::from_str::<ServerMessage>(text.as_str()) {
                    Ok(message) => return Ok(message),
                    Err(e) => warn!(error = %e, "undecodable protocol message"),
                },
                Message::Close(Some(close)) => {
                    let code = u16::from(close.code);
                    return Err(close_interrupt(code, close.reason.to_string()));
                }
                Message::Close(None) => {
                    return Err(Interrupt::Retry("closed by server".to_string()));
                }
                _ => {}
            }
        }
    }
}

impl TelemetrySource for TibberSource {
    fn name(&self) -> &'static str {
        "tibber"
    }

    async fn run(self, tx: mpsc::Sender<TelemetrySample>) -> Result<()> {
        let mut backoff = Backoff::new(self.reconnect_initial, self.reconnect_max);
        loop {
            let mut delivered = 0u64;
            match self.session(&tx, &mut delivered).await {
                Interrupt::ReceiverClosed => return Ok(()),
                Interrupt::Fatal(err) => return Err(err),
                Interrupt::Retry(reason) => {
                    if delivered > 0 {
                        backoff.reset();
                    }
                    if backoff.failures() >= self.max_reconnect_attempts {
                        return Err(ExporterError::Transport(format!(
                            "live feed lost after {} reconnect attempts: {reason}",
                            backoff.failures()
                        )));
                    }
                    let delay = backoff.next_delay();
                    warn!(
                        %reason,
                        delivered,
                        attempt = backoff.failures(),
                        delay = %format_duration(delay),
                        "live feed interrupted, reconnecting"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

async fn send(socket: &mut Socket, message: &ClientMessage<'_>) -> Step<()> {
    let text = message.to_text()?;
    socket
        .send(Message::text(text))
        .await
        .map_err(|e| Interrupt::Retry(format!("websocket send failed: {e}")))
}

fn decode_payload(data: serde_json::Value) -> Option<TelemetrySample> {
    let data: LiveMeasurementData = match serde_json::from_value(data) {
        Ok(data) => data,
        Err(e) => {
            warn!(error = %e, "undecodable live measurement");
            return None;
        }
    };
    match data.live_measurement?.into_sample() {
        Ok(sample) => Some(sample),
        Err(e) => {
            warn!(error = %e, "dropping live measurement");
            None
        }
    }
}

fn close_interrupt(code: u16, reason: String) -> Interrupt {
    if code == CLOSE_UNAUTHORIZED || code == CLOSE_FORBIDDEN {
        Interrupt::Fatal(ExporterError::Transport(format!(
            "live feed refused by server: {code} {reason}"
        )))
    } else {
        Interrupt::Retry(format!("closed by server: {code} {reason}"))
    }
}
