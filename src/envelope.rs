use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const PROTOCOL_VERSION: &str = "27.*.*";
pub const PAYLOAD_FORMAT: &str = "json-patches-structured";
pub const HEARTBEAT_INTERVAL: &str = "2s";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub service: String,
    pub id: String,
    #[serde(default)]
    pub ver: u64,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl Header {
    pub fn request(service: &str, id: &str) -> Self {
        Self {
            service: service.to_string(),
            id: id.to_string(),
            ver: 0,
            kind: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub header: Header,
    #[serde(default)]
    pub body: Value,
}

impl Envelope {
    pub fn correlation_key(&self) -> CorrelationKey {
        CorrelationKey {
            service: self.header.service.clone(),
            id: self.header.id.clone(),
            version: self.header.ver,
        }
    }

    pub fn kind(&self) -> FrameKind {
        FrameKind::from_header(self.header.kind.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationKey {
    pub service: String,
    pub id: String,
    pub version: u64,
}

impl CorrelationKey {
    pub fn new(service: impl Into<String>, id: impl Into<String>, version: u64) -> Self {
        Self {
            service: service.into(),
            id: id.into(),
            version,
        }
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|v{}", self.service, self.id, self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    Snapshot,
    Patch,
    Other(String),
}

impl FrameKind {
    // A missing type is treated as a full document.
    pub fn from_header(kind: Option<&str>) -> Self {
        let Some(raw) = kind else {
            return Self::Snapshot;
        };

        match raw.trim().to_ascii_lowercase().as_str() {
            "snapshot" => Self::Snapshot,
            "patch" | "patches" => Self::Patch,
            _ => Self::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Patch => "patch",
            Self::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionAck {
    pub session: Option<String>,
    pub build: Option<String>,
    pub ver: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    ConnectionAck(ConnectionAck),
    Heartbeat(Option<u64>),
    Payload(Vec<Envelope>),
    Unrecognized(Value),
}

pub fn parse_inbound_frame(payload: &str) -> Result<InboundFrame, serde_json::Error> {
    let value = serde_json::from_str::<Value>(payload)?;

    let Some(object) = value.as_object() else {
        return Ok(InboundFrame::Unrecognized(value));
    };

    if let Some(items) = object.get("payload").and_then(Value::as_array) {
        let mut envelopes = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<Envelope>(item.clone()) {
                Ok(envelope) => envelopes.push(envelope),
                Err(err) => {
                    tracing::warn!(error = %err, "dropping malformed envelope from payload batch");
                }
            }
        }
        return Ok(InboundFrame::Payload(envelopes));
    }

    if object.contains_key("header") {
        let envelope = serde_json::from_value::<Envelope>(value)?;
        return Ok(InboundFrame::Payload(vec![envelope]));
    }

    if object.contains_key("heartbeat") {
        let timestamp = object.get("heartbeat").and_then(Value::as_u64);
        return Ok(InboundFrame::Heartbeat(timestamp));
    }

    if object.contains_key("session") || object.contains_key("build") {
        let ack = serde_json::from_value::<ConnectionAck>(value)?;
        return Ok(InboundFrame::ConnectionAck(ack));
    }

    Ok(InboundFrame::Unrecognized(value))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestEnvelope {
    pub header: Header,
    pub params: Value,
}

impl RequestEnvelope {
    pub fn new(service: &str, id: &str, params: Value) -> Self {
        Self {
            header: Header::request(service, id),
            params,
        }
    }
}

#[derive(Serialize)]
struct RequestBatch<'a> {
    payload: &'a [RequestEnvelope],
}

pub fn encode_connection_frame() -> String {
    json!({
        "ver": PROTOCOL_VERSION,
        "fmt": PAYLOAD_FORMAT,
        "heartbeat": HEARTBEAT_INTERVAL,
    })
    .to_string()
}

pub fn encode_requests(requests: &[RequestEnvelope]) -> Result<String, serde_json::Error> {
    serde_json::to_string(&RequestBatch { payload: requests })
}
