// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound message dispatch: send-queue payload to a posted Pact message.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use pactbridge_core::types::decode_payload;
use pactbridge_core::{
    ConversationApi, MessageForm, OutboundMessageRequest, RelayError, SentMessageResult,
};
use tracing::{debug, info};

use crate::attachment;
use crate::upload_cache::{UploadCache, upload_key};
use crate::worker::DeliveryHandler;

/// Uploads a request's attachments in order, then posts the message that
/// references them.
pub struct MessageDispatcher {
    api: Arc<dyn ConversationApi>,
    uploads: Mutex<UploadCache>,
}

impl MessageDispatcher {
    /// `cache_capacity` bounds the number of remembered uploads.
    pub fn new(api: Arc<dyn ConversationApi>, cache_capacity: usize) -> Self {
        Self {
            api,
            uploads: Mutex::new(UploadCache::new(cache_capacity)),
        }
    }

    fn uploads(&self) -> MutexGuard<'_, UploadCache> {
        self.uploads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs the whole pipeline for one send-queue payload.
    ///
    /// Every attachment is decoded before anything is uploaded, so a bad
    /// data URI never leaves stray uploads behind.
    pub async fn dispatch(&self, payload: &[u8]) -> Result<SentMessageResult, RelayError> {
        let request: OutboundMessageRequest = decode_payload(payload)?;
        let conversation_id = request.conversation_id;

        let uploads = request
            .attachments
            .iter()
            .map(attachment::to_upload)
            .collect::<Result<Vec<_>, _>>()?;

        let mut attachment_ids = Vec::with_capacity(uploads.len());
        let mut keys = Vec::with_capacity(uploads.len());
        for (position, upload) in uploads.into_iter().enumerate() {
            let key = upload_key(conversation_id, position, &upload);
            let cached = self.uploads().get(&key);
            let external_id = match cached {
                Some(id) => {
                    debug!(conversation_id, file = %upload.file_name, external_id = id, "reusing earlier upload");
                    id
                }
                None => {
                    let file_name = upload.file_name.clone();
                    let uploaded = self.api.upload_attachment(conversation_id, upload).await?;
                    info!(conversation_id, file = %file_name, external_id = uploaded.external_id, "attachment uploaded");
                    self.uploads().insert(key.clone(), uploaded.external_id);
                    uploaded.external_id
                }
            };
            attachment_ids.push(external_id);
            keys.push(key);
        }

        let form = MessageForm {
            message: request.message,
            attachment_ids,
        };
        let sent = self.api.post_message(conversation_id, &form).await?;

        let mut cache = self.uploads();
        for key in &keys {
            cache.remove(key);
        }
        drop(cache);

        info!(
            conversation_id,
            message_id = sent.id,
            attachments = form.attachment_ids.len(),
            state = %sent.state,
            "message posted"
        );
        Ok(sent)
    }

    #[cfg(test)]
    fn cached_uploads(&self) -> usize {
        self.uploads().len()
    }
}

#[async_trait]
impl DeliveryHandler for MessageDispatcher {
    fn name(&self) -> &'static str {
        "dispatcher"
    }

    async fn handle(&self, payload: &[u8]) -> Result<(), RelayError> {
        self.dispatch(payload).await.map(|_| ())
    }
}
