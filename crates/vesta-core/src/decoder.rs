//! Push-envelope decoding.
//!
//! A push request looks like:
//!
//! ```json
//! {
//!     "message": { "data": "<base64 notification>", "messageId": "..." },
//!     "subscription": "...",
//!     "indexName": "optional override",
//!     "indexConfig": { "optional": "settings override" }
//! }
//! ```
//!
//! The base64 data is a product message from the catalog. Two payload shapes are in use:
//! message notifications (`{"type": "ProductPublished", "resource": {"id": ...}}`) and
//! projection payloads (`{"productProjection": {"id": ..., "published": true}}`).

use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use serde_json::Value;

use crate::config::UntypedEventPolicy;
use crate::error::{DecodeError, IndexError};
use crate::models::{ChangeEvent, ChangeType, IndexConfig};

const PRODUCT_PUBLISHED: &str = "ProductPublished";
const PRODUCT_UNPUBLISHED: &str = "ProductUnpublished";

/// The outer push request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEnvelope {
    message: Option<PushMessage>,
    index_name: Option<String>,
    index_config: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushMessage {
    data: Option<String>,
    message_id: Option<String>,
}

impl PushEnvelope {
    /// Parses a raw request body.
    ///
    /// An empty body or a JSON `null` counts as a missing envelope; anything that is not a JSON
    /// object is malformed.
    pub fn parse(body: &[u8]) -> Result<Self, DecodeError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(DecodeError::MissingEnvelope);
        }
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| DecodeError::MalformedPayload(format!("request body is not JSON: {e}")))?;
        if value.is_null() {
            return Err(DecodeError::MissingEnvelope);
        }
        serde_json::from_value(value)
            .map_err(|e| DecodeError::MalformedPayload(format!("unexpected envelope shape: {e}")))
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message.as_ref().and_then(|m| m.message_id.as_deref())
    }

    /// Resolves the index this notification writes to.
    ///
    /// `indexName` and `indexConfig` from the envelope override `default` field by field.
    /// `indexConfig` may be an object or a string holding a JSON object.
    pub fn index_config(&self, default: &IndexConfig) -> Result<IndexConfig, IndexError> {
        let name = self
            .index_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&default.name)
            .to_string();

        match &self.index_config {
            None | Some(Value::Null) => Ok(IndexConfig::new(name, default.settings.clone())),
            Some(Value::String(raw)) => IndexConfig::from_json(name, raw),
            Some(value) => IndexConfig::from_value(name, value.clone()),
        }
    }

    /// Returns the base64-decoded notification bytes.
    fn payload(&self) -> Result<Vec<u8>, DecodeError> {
        let data = self
            .message
            .as_ref()
            .and_then(|m| m.data.as_deref())
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or(DecodeError::MissingEnvelope)?;

        let bytes = general_purpose::STANDARD
            .decode(data)
            .map_err(|e| {
                DecodeError::MalformedPayload(format!("message data is not base64: {e}"))
            })?;

        // Whitespace-only payloads are treated like an absent one.
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(DecodeError::MissingEnvelope);
        }
        Ok(bytes)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationPayload {
    #[serde(rename = "type")]
    kind: Option<String>,
    resource: Option<IdRef>,
    product_projection: Option<ProjectionRef>,
    published: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct IdRef {
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProjectionRef {
    id: Option<String>,
    published: Option<bool>,
}

impl NotificationPayload {
    fn entity_id(&self) -> Option<&str> {
        let resource_id = self.resource.as_ref().and_then(|r| r.id.as_deref());
        let projection_id = self.product_projection.as_ref().and_then(|p| p.id.as_deref());
        [resource_id, projection_id]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|id| !id.is_empty())
    }

    fn published_flag(&self) -> Option<bool> {
        self.published
            .or_else(|| self.product_projection.as_ref().and_then(|p| p.published))
    }

    fn change_type(&self, untyped: UntypedEventPolicy) -> ChangeType {
        match self.kind.as_deref() {
            Some(PRODUCT_PUBLISHED) => ChangeType::Published,
            Some(PRODUCT_UNPUBLISHED) => ChangeType::Unpublished,
            Some(_) => ChangeType::Unknown,
            None => match self.published_flag() {
                Some(true) => ChangeType::Published,
                Some(false) => ChangeType::Unpublished,
                None => match untyped {
                    UntypedEventPolicy::Ignore => ChangeType::Unknown,
                    UntypedEventPolicy::Publish => ChangeType::Published,
                },
            },
        }
    }
}

/// Turns push requests into [`ChangeEvent`]s. Pure: no I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventDecoder {
    untyped: UntypedEventPolicy,
}

impl EventDecoder {
    pub fn new(untyped: UntypedEventPolicy) -> Self {
        Self { untyped }
    }

    /// Decodes a raw request body.
    pub fn decode(&self, body: &[u8]) -> Result<ChangeEvent, DecodeError> {
        let envelope = PushEnvelope::parse(body)?;
        self.decode_envelope(&envelope)
    }

    /// Decodes the notification carried by an already-parsed envelope.
    pub fn decode_envelope(&self, envelope: &PushEnvelope) -> Result<ChangeEvent, DecodeError> {
        let payload = envelope.payload()?;

        let text = std::str::from_utf8(&payload)
            .map_err(|e| DecodeError::MalformedPayload(format!("message data is not UTF-8: {e}")))?;

        let notification: NotificationPayload = serde_json::from_str(text.trim())
            .map_err(|e| {
                DecodeError::MalformedPayload(format!("message data is not valid JSON: {e}"))
            })?;

        let entity_id = notification
            .entity_id()
            .ok_or(DecodeError::MissingEntityId)?
            .to_string();
        let change_type = notification.change_type(self.untyped);

        Ok(ChangeEvent::new(entity_id, change_type, payload))
    }
}

/// Decodes a raw request body with the default policies.
pub fn decode(body: &[u8]) -> Result<ChangeEvent, DecodeError> {
    EventDecoder::default().decode(body)
}
