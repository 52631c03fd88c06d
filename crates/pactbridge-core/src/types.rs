// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types shared by the gateway, the queue workers and the Pact client.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

use crate::error::RelayError;

/// Health status reported by component health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Component is fully operational.
    Healthy,
    /// Component is operational but experiencing issues.
    Degraded(String),
    /// Component is not operational.
    Unhealthy(String),
}

/// Identifies the kind of component behind a [`PluginAdapter`](crate::PluginAdapter).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Broker,
    ConversationApi,
}

/// Treats an explicit JSON `null` as the type's default value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// --- Broker events ---

/// Canonical envelope for every event pushed to the receive queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackEvent {
    /// Event family, e.g. `message` or `account`. Absent or `null` reads as `""`.
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    /// Event name within the family, e.g. `created`. Absent or `null` reads as `""`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub event: String,
    /// Schema-free payload, key order preserved.
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Map<String, Value>,
}

impl CallbackEvent {
    /// Event type used for identifier-resolution results.
    pub const ACCOUNT: &'static str = "account";
    /// Event name used for identifier-resolution results.
    pub const UPDATE: &'static str = "update";

    /// Wraps resolved conversation data as an `account`/`update` event.
    pub fn account_update(data: Map<String, Value>) -> Self {
        Self {
            kind: Self::ACCOUNT.to_string(),
            event: Self::UPDATE.to_string(),
            data,
        }
    }

    /// Parses a JSON body into an event.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, RelayError> {
        serde_json::from_slice(bytes).map_err(|e| RelayError::decode("invalid callback event", e))
    }

    /// Canonical JSON encoding: `type`, `event`, `data` in that order.
    pub fn to_vec(&self) -> Result<Vec<u8>, RelayError> {
        serde_json::to_vec(self)
            .map_err(|e| RelayError::Internal(format!("failed to encode callback event: {e}")))
    }
}

// --- Queue requests ---

/// A file to upload, carried inline as a data URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// File name presented to the platform.
    pub name: String,
    /// `data:<mime>;base64,<payload>`.
    pub src: String,
    /// Declared MIME type.
    #[serde(rename = "type", default)]
    pub mime_type: String,
}

/// Request consumed from the send queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessageRequest {
    #[serde(rename = "conversationId")]
    pub conversation_id: i64,
    #[serde(default)]
    pub message: String,
    /// Uploaded in this order; the posted id list keeps it.
    #[serde(default, deserialize_with = "null_as_default")]
    pub attachments: Vec<Attachment>,
}

/// Request consumed from the identifier queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierRequest {
    #[serde(rename = "conversationId")]
    pub conversation_id: i64,
}

/// Decodes a queue payload, mapping failures to [`RelayError::Decode`].
pub fn decode_payload<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, RelayError> {
    serde_json::from_slice(bytes).map_err(|e| {
        let type_name = std::any::type_name::<T>();
        let short = type_name.rsplit("::").next().unwrap_or(type_name);
        RelayError::decode(format!("malformed {short} payload"), e)
    })
}

// --- Pact API payloads ---

/// Conversation as returned by the fetch-conversation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMetadata {
    pub external_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub channel_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub channel_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub avatar: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sender_external_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub meta: Map<String, Value>,
}

impl ConversationMetadata {
    /// Flattens the metadata into a one-level mapping for [`CallbackEvent::data`].
    ///
    /// Only scalar `meta` entries are carried over; nested objects and
    /// arrays are dropped.
    pub fn into_event_data(self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("external_id".into(), self.external_id.into());
        data.insert("name".into(), self.name.into());
        data.insert("channel_id".into(), self.channel_id.into());
        data.insert("channel_type".into(), self.channel_type.into());
        data.insert("created_at".into(), self.created_at.into());
        data.insert("avatar".into(), self.avatar.into());
        data.insert("sender_external_id".into(), self.sender_external_id.into());
        let meta = self
            .meta
            .into_iter()
            .filter(|(_, value)| !matches!(value, Value::Object(_) | Value::Array(_)))
            .collect();
        data.insert("meta".into(), Value::Object(meta));
        data
    }
}

/// Result of one attachment upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedAttachmentRef {
    pub external_id: i64,
}

/// Channel reference inside a [`SentMessageResult`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelRef {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
}

/// Result of the post-message call. Logged, not relayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentMessageResult {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub company_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub channel: ChannelRef,
    #[serde(default, deserialize_with = "null_as_default")]
    pub conversation_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: String,
    #[serde(default)]
    pub message_id: Value,
    #[serde(default)]
    pub details: Value,
    #[serde(default)]
    pub created_at: Value,
}

/// Decoded attachment ready for a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Form body of the post-message call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageForm {
    pub message: String,
    pub attachment_ids: Vec<i64>,
}

impl MessageForm {
    /// Form field name repeated once per attachment id.
    pub const ATTACHMENT_IDS_FIELD: &'static str = "attachments_ids[]";

    /// `message` first, then one `attachments_ids[]` per id in order.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(self.attachment_ids.len() + 1);
        pairs.push(("message", self.message.clone()));
        pairs.extend(
            self.attachment_ids
                .iter()
                .map(|id| (Self::ATTACHMENT_IDS_FIELD, id.to_string())),
        );
        pairs
    }
}
