//! Request-scoped values flowing through dispatch

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Request, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One inbound HTTP request with its body fully collected
pub type IncomingRequest = Request<Bytes>;

/// The single response produced for every dispatched request
pub type OutgoingResponse = Response<Full<Bytes>>;

/// A chat message as commonly sent by chat clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Parsed body of a chat request
///
/// Holds the decoded JSON as-is. The shape of `messages` is not checked here;
/// the inference backend is trusted to reject what it cannot handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatRequestPayload(Value);

impl ChatRequestPayload {
    /// Decode a request body. Fails only when the bytes are not JSON.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body).map(Self)
    }

    /// Build a `{ "messages": [...] }` payload
    pub fn from_messages(messages: impl IntoIterator<Item = ChatMessage>) -> Self {
        let messages = messages
            .into_iter()
            .map(|m| {
                let mut entry = Map::new();
                entry.insert("role".to_string(), Value::String(m.role));
                entry.insert("content".to_string(), Value::String(m.content));
                Value::Object(entry)
            })
            .collect();

        let mut body = Map::new();
        body.insert("messages".to_string(), Value::Array(messages));
        Self(Value::Object(body))
    }

    /// Typed view of `messages`, if it has the common `{role, content}` shape
    pub fn messages(&self) -> Option<Vec<ChatMessage>> {
        let raw = self.0.get("messages")?;
        serde_json::from_value(raw.clone()).ok()
    }

    /// Number of entries in `messages` when it is an array
    pub fn message_count(&self) -> Option<usize> {
        self.0.get("messages")?.as_array().map(Vec::len)
    }

    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}
