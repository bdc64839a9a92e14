//! Message envelope
//!
//! Wire shape:
//!
//! ```json
//! { "id": "string", "type": "METHOD_CALL", "payload": {}, "layer": "background" }
//! ```

use crate::layer::Layer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Envelope type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// Request expecting a reply with the same id
    MethodCall,
    /// State change pushed from the background thread
    StateUpdate,
    /// Render instruction for the main thread
    Render,
    /// Runtime initialization
    Init,
    /// Error report
    Error,
}

impl MessageKind {
    /// Whether this kind must carry a correlation id
    pub fn requires_id(self) -> bool {
        matches!(self, MessageKind::MethodCall)
    }
}

/// Errors raised while decoding an incoming envelope
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Not JSON, or a required field is missing or mistyped
    #[error("Invalid envelope: {0}")]
    Invalid(#[from] serde_json::Error),

    /// A request-shaped message without a correlation id
    #[error("{0:?} envelope without an id")]
    MissingId(MessageKind),
}

/// Envelope exchanged between layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMessage {
    /// Correlation token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Type tag
    #[serde(rename = "type")]
    pub kind: MessageKind,

    /// Arbitrary structured data
    ///
    /// Older runtimes put response data under `data`; both are accepted.
    #[serde(default, alias = "data")]
    pub payload: Value,

    /// Layer the message targets
    pub layer: Layer,
}

impl ThreadMessage {
    /// Create a message with a fresh correlation id
    pub fn new(kind: MessageKind, payload: Value, layer: Layer) -> Self {
        Self {
            id: Some(fresh_id()),
            kind,
            payload,
            layer,
        }
    }

    /// Create a message with a caller-chosen id
    pub fn with_id(id: impl Into<String>, kind: MessageKind, payload: Value, layer: Layer) -> Self {
        Self {
            id: Some(id.into()),
            kind,
            payload,
            layer,
        }
    }

    /// Build the reply to `self`, echoing its id back to the sender's layer
    pub fn reply(&self, kind: MessageKind, payload: Value) -> Self {
        Self {
            id: self.id.clone(),
            kind,
            payload,
            layer: self.layer.peer(),
        }
    }

    /// Serialize to the JSON wire form
    pub fn to_wire(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and validate the JSON wire form
    pub fn from_wire(raw: &str) -> Result<Self, EnvelopeError> {
        let message: ThreadMessage = serde_json::from_str(raw)?;
        if message.kind.requires_id() && message.id.as_deref().map_or(true, str::is_empty) {
            return Err(EnvelopeError::MissingId(message.kind));
        }
        Ok(message)
    }
}

/// Generate a correlation id
pub(crate) fn fresh_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let msg = ThreadMessage::with_id(
            "x1",
            MessageKind::MethodCall,
            json!({ "method": "increment" }),
            Layer::Background,
        );
        let wire: Value = serde_json::from_str(&msg.to_wire().unwrap()).unwrap();
        assert_eq!(
            wire,
            json!({
                "id": "x1",
                "type": "METHOD_CALL",
                "payload": { "method": "increment" },
                "layer": "background",
            })
        );
    }

    #[test]
    fn test_from_wire_accepts_legacy_data_field() {
        let msg = ThreadMessage::from_wire(
            r#"{"id":"a","type":"STATE_UPDATE","data":{"count":2},"layer":"main-thread"}"#,
        )
        .unwrap();
        assert_eq!(msg.payload, json!({ "count": 2 }));
        assert_eq!(msg.kind, MessageKind::StateUpdate);
    }

    #[test]
    fn test_from_wire_rejects_malformed() {
        assert!(matches!(
            ThreadMessage::from_wire("not json"),
            Err(EnvelopeError::Invalid(_))
        ));
        assert!(matches!(
            ThreadMessage::from_wire(r#"{"id":"a","payload":{},"layer":"background"}"#),
            Err(EnvelopeError::Invalid(_))
        ));
        assert!(matches!(
            ThreadMessage::from_wire(r#"{"type":"METHOD_CALL","payload":{},"layer":"background"}"#),
            Err(EnvelopeError::MissingId(MessageKind::MethodCall))
        ));
        assert!(matches!(
            ThreadMessage::from_wire(r#"{"id":"","type":"METHOD_CALL","layer":"background"}"#),
            Err(EnvelopeError::MissingId(_))
        ));
        assert!(matches!(
            ThreadMessage::from_wire(r#"{"id":"a","type":"PING","layer":"background"}"#),
            Err(EnvelopeError::Invalid(_))
        ));
    }

    #[test]
    fn test_non_request_messages_may_omit_id() {
        let msg =
            ThreadMessage::from_wire(r#"{"type":"RENDER","payload":[1,2],"layer":"main-thread"}"#)
                .unwrap();
        assert_eq!(msg.id, None);
        assert_eq!(msg.payload, json!([1, 2]));
    }

    #[test]
    fn test_reply_echoes_id() {
        let call = ThreadMessage::new(MessageKind::MethodCall, Value::Null, Layer::Background);
        let reply = call.reply(MessageKind::StateUpdate, json!({ "count": 1 }));
        assert_eq!(reply.id, call.id);
        assert_eq!(reply.layer, Layer::MainThread);
    }

    #[test]
    fn test_fresh_ids_are_unique() {
        let a = ThreadMessage::new(MessageKind::Init, Value::Null, Layer::MainThread);
        let b = ThreadMessage::new(MessageKind::Init, Value::Null, Layer::MainThread);
        assert_ne!(a.id, b.id);
    }
}
