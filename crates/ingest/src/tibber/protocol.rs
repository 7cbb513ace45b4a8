use serde::{Deserialize, Serialize};
use serde_json::Value;
use tibber_exporter_core::error::{ExporterError, Result};

pub const SUBPROTOCOL: &str = "graphql-transport-ws";

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage<'a> {
    ConnectionInit { payload: InitPayload<'a> },
    Subscribe {
        id: &'a str,
        payload: SubscribePayload<'a>,
    },
    Complete { id: &'a str },
    Ping,
    Pong,
}

#[derive(Debug, Serialize)]
pub struct InitPayload<'a> {
    pub token: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribePayload<'a> {
    pub query: &'a str,
    pub variables: Value,
    pub operation_name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ConnectionAck,
    Next {
        id: String,
        payload: ExecutionResult,
    },
    Error { id: String, payload: Value },
    Complete { id: String },
    Ping,
    Pong,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct ExecutionResult {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlError {
    pub message: String,
}

pub fn join_errors(errors: &[GraphqlError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ClientMessage<'_> {
    pub fn to_text(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| ExporterError::Internal(format!("encode protocol message: {e}")))
    }
}
