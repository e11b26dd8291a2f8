//! HTTP seam to the chat backend and response classification.

use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use tokio::time::Duration;

use crate::config::Config;

/// Body of `POST {base}/api/chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub text: String,
    #[serde(rename = "clientId")]
    pub client_id: String,
    pub language: String,
    pub role: String,
}

impl ChatRequest {
    pub fn new(text: String, client_id: String, language: String) -> Self {
        Self {
            text,
            client_id,
            language,
            role: "user".to_string(),
        }
    }
}

/// Raw response before classification: status plus verbatim body.
#[derive(Debug, Clone)]
pub struct RawReply {
    pub status: u16,
    pub body: String,
}

/// Failure before any HTTP status was received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Could not reach the backend at all
    Offline,
    /// Request timed out in flight
    Timeout,
    /// Anything else on the wire
    Other(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Offline => write!(f, "offline"),
            TransportError::Timeout => write!(f, "request timed out"),
            TransportError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

/// The seam the controller talks through; tests script it, production uses
/// [`HttpTransport`].
pub trait ChatTransport {
    fn send_chat(
        &self,
        request: &ChatRequest,
    ) -> impl Future<Output = Result<RawReply, TransportError>> + Send;
}

/// reqwest-backed transport for the chat endpoint.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    client_id: String,
}

impl HttpTransport {
    pub fn new(config: &Config, client_id: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        let endpoint = format!("{}/api/chat", config.base_url.trim_end_matches('/'));

        Self {
            client,
            endpoint,
            client_id,
        }
    }
}

impl ChatTransport for HttpTransport {
    async fn send_chat(&self, request: &ChatRequest) -> Result<RawReply, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("X-Client-Id", &self.client_id)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    TransportError::Offline
                } else if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Other(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Other(e.to_string()))?;

        Ok(RawReply { status, body })
    }
}

/// What a single attempt's response means to the retry state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Usable reply text (may be HTML)
    Reply(String),
    /// Success status whose body delivered nothing usable
    SoftFailure,
    /// 502/404: the backend's unstable-network signature
    NetworkUnstable,
    /// Any other non-2xx, with the server-provided message when present
    HttpError { status: u16, message: Option<String> },
    /// Body was not JSON; kept verbatim for error reporting
    BadPayload(String),
}

/// Classify a raw response. Pure; the controller decides what to do with it.
pub fn classify(reply: &RawReply) -> Classification {
    if reply.status == 502 || reply.status == 404 {
        return Classification::NetworkUnstable;
    }

    let payload: Option<Value> = serde_json::from_str(&reply.body).ok();

    if !(200..300).contains(&reply.status) {
        // A server-provided message surfaces immediately; only an error
        // status that delivered nothing usable joins the soft-failure
        // policy.
        if let Some(message) = payload.as_ref().and_then(server_message) {
            return Classification::HttpError {
                status: reply.status,
                message: Some(message),
            };
        }
        if payload.as_ref().is_none_or(is_empty_payload) {
            return Classification::SoftFailure;
        }
        return Classification::HttpError {
            status: reply.status,
            message: None,
        };
    }

    let Some(payload) = payload else {
        return Classification::BadPayload(reply.body.clone());
    };

    extract_reply(&payload)
}

/// True when the payload signals "success but nothing delivered".
fn is_empty_payload(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty() || !map.get("error").is_none_or(Value::is_null),
        _ => false,
    }
}

/// Pull a human-readable message out of an error payload, if the server
/// provided one.
fn server_message(payload: &Value) -> Option<String> {
    for field in ["message", "error"] {
        if let Some(text) = payload.get(field).and_then(Value::as_str) {
            if !text.trim().is_empty() {
                return Some(text.to_string());
            }
        }
    }
    None
}

/// Extract the reply text from a 2xx payload.
///
/// `text` wins over `message`; a present-but-empty field counts as a soft
/// failure, and a non-empty payload with neither field is dumped verbatim.
fn extract_reply(payload: &Value) -> Classification {
    if is_empty_payload(payload) {
        return Classification::SoftFailure;
    }

    match payload {
        Value::String(s) => Classification::Reply(s.clone()),
        Value::Object(map) => {
            let mut saw_blank_field = false;
            for field in ["text", "message"] {
                match map.get(field).and_then(Value::as_str) {
                    Some(text) if !text.trim().is_empty() => {
                        return Classification::Reply(text.to_string());
                    }
                    Some(_) => saw_blank_field = true,
                    None => {}
                }
            }
            if saw_blank_field {
                Classification::SoftFailure
            } else {
                Classification::Reply(payload.to_string())
            }
        }
        other => Classification::Reply(other.to_string()),
    }
}
