// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response envelopes of the Pact REST API.

use pactbridge_core::ConversationMetadata;
use serde::Deserialize;

/// Every Pact response wraps its payload as `{"status": .., "data": ..}`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub status: String,
    pub data: T,
}

/// `data` of the fetch-conversation call.
#[derive(Debug, Deserialize)]
pub struct ConversationData {
    pub conversation: ConversationMetadata,
}

/// Media type sent for an upload whose declared type is unusable.
pub const FALLBACK_MIME: &str = "application/octet-stream";

#[cfg(test)]
mod tests {
    use pactbridge_core::{SentMessageResult, UploadedAttachmentRef};

    use super::*;

    #[test]
    fn conversation_envelope_decodes_with_nulls() {
        let body = r#"{
            "status": "ok",
            "data": {"conversation": {
                "external_id": 42,
                "name": "Jane",
                "channel_id": 7,
                "channel_type": "whatsapp",
                "created_at": "2026-01-01T00:00:00Z",
                "avatar": null,
                "sender_external_id": "79990001122",
                "meta": {}
            }}
        }"#;
        let envelope: Envelope<ConversationData> = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.status, "ok");
        let conversation = envelope.data.conversation;
        assert_eq!(conversation.external_id, 42);
        assert_eq!(conversation.avatar, "");
        assert_eq!(conversation.channel_type, "whatsapp");
    }

    #[test]
    fn upload_envelope_decodes() {
        let body = r#"{"status":"ok","data":{"external_id":777}}"#;
        let envelope: Envelope<UploadedAttachmentRef> = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.data.external_id, 777);
    }

    #[test]
    fn sent_message_envelope_keeps_opaque_fields() {
        let body = r#"{"status":"ok","data":{
            "id": 1, "company_id": 2, "channel": {"id": 3, "type": "telegram"},
            "conversation_id": 42, "state": "in_progress",
            "message_id": null, "details": {"x": 1}, "created_at": 1767225600
        }}"#;
        let envelope: Envelope<SentMessageResult> = serde_json::from_str(body).unwrap();
        let sent = envelope.data;
        assert_eq!(sent.channel.kind, "telegram");
        assert_eq!(sent.state, "in_progress");
        assert!(sent.message_id.is_null());
        assert_eq!(sent.created_at, serde_json::json!(1767225600));
    }
}
