// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identifier resolution: turns a conversation id into an `account`/`update`
//! event on the receive queue, shaped like any other platform webhook.

use std::sync::Arc;

use async_trait::async_trait;
use pactbridge_core::types::decode_payload;
use pactbridge_core::{CallbackEvent, ConversationApi, IdentifierRequest, MessageBroker, RelayError};
use tracing::info;

use crate::worker::DeliveryHandler;

pub struct IdentifierResolver {
    api: Arc<dyn ConversationApi>,
    broker: Arc<dyn MessageBroker>,
    receive_queue: String,
}

impl IdentifierResolver {
    pub fn new(
        api: Arc<dyn ConversationApi>,
        broker: Arc<dyn MessageBroker>,
        receive_queue: impl Into<String>,
    ) -> Self {
        Self {
            api,
            broker,
            receive_queue: receive_queue.into(),
        }
    }

    /// Fetches the conversation and publishes the synthesized event.
    pub async fn resolve(&self, payload: &[u8]) -> Result<CallbackEvent, RelayError> {
        let request: IdentifierRequest = decode_payload(payload)?;
        let conversation = self.api.fetch_conversation(request.conversation_id).await?;

        let event = CallbackEvent::account_update(conversation.into_event_data());
        self.broker
            .publish(&self.receive_queue, &event.to_vec()?)
            .await?;

        info!(
            conversation_id = request.conversation_id,
            queue = %self.receive_queue,
            "conversation resolved"
        );
        Ok(event)
    }
}

#[async_trait]
impl DeliveryHandler for IdentifierResolver {
    fn name(&self) -> &'static str {
        "resolver"
    }

    async fn handle(&self, payload: &[u8]) -> Result<(), RelayError> {
        self.resolve(payload).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use pactbridge_test_utils::{ApiCall, MemoryBroker, MockConversationApi, sample_conversation};
    use serde_json::json;

    use super::*;

    const RECEIVE: &str = "pact_receive_callback";

    fn resolver(api: &Arc<MockConversationApi>, broker: &MemoryBroker) -> IdentifierResolver {
        IdentifierResolver::new(api.clone(), Arc::new(broker.clone()), RECEIVE)
    }

    #[tokio::test]
    async fn publishes_account_update_with_flattened_metadata() {
        let api = Arc::new(MockConversationApi::new());
        let broker = MemoryBroker::new();

        resolver(&api, &broker)
            .resolve(br#"{"conversationId":42}"#)
            .await
            .unwrap();

        assert_eq!(api.calls(), vec![ApiCall::Fetch(42)]);
        let published = broker.published_json(RECEIVE);
        assert_eq!(published.len(), 1);
        let expected = sample_conversation(42);
        assert_eq!(
            published[0],
            json!({
                "type": "account",
                "event": "update",
                "data": {
                    "external_id": 42,
                    "name": expected.name,
                    "channel_id": expected.channel_id,
                    "channel_type": expected.channel_type,
                    "created_at": expected.created_at,
                    "avatar": expected.avatar,
                    "sender_external_id": expected.sender_external_id,
                    "meta": {"source": "test"}
                }
            })
        );
    }

    #[tokio::test]
    async fn every_resolution_is_account_update() {
        let api = Arc::new(MockConversationApi::new());
        let broker = MemoryBroker::new();
        let resolver = resolver(&api, &broker);

        for id in [1, 42, -5, i64::MAX] {
            let event = resolver
                .resolve(format!(r#"{{"conversationId":{id}}}"#).as_bytes())
                .await
                .unwrap();
            assert_eq!(event.kind, CallbackEvent::ACCOUNT);
            assert_eq!(event.event, CallbackEvent::UPDATE);
        }
        assert!(
            broker
                .published_json(RECEIVE)
                .iter()
                .all(|e| e["type"] == "account" && e["event"] == "update")
        );
    }

    #[tokio::test]
    async fn malformed_request_is_decode_error() {
        let api = Arc::new(MockConversationApi::new());
        let broker = MemoryBroker::new();
        let err = resolver(&api, &broker)
            .resolve(br#"{"conversationId":"abc"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Decode { .. }));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_publishes_nothing() {
        let api = Arc::new(MockConversationApi::new());
        api.fail_next_fetches(1);
        let broker = MemoryBroker::new();

        let err = resolver(&api, &broker)
            .resolve(br#"{"conversationId":42}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::ExternalApi { .. }));
        assert!(broker.published(RECEIVE).is_empty());
    }

    #[tokio::test]
    async fn publish_failure_is_retryable() {
        let api = Arc::new(MockConversationApi::new());
        let broker = MemoryBroker::new();
        broker.set_fail_publish(true);

        let err = resolver(&api, &broker)
            .resolve(br#"{"conversationId":42}"#)
            .await
            .unwrap_err();
        assert_eq!(err.disposition(), pactbridge_core::Disposition::Retry);
    }
}
