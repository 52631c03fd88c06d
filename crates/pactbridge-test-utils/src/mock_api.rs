// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted conversation API for deterministic testing.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use pactbridge_core::traits::{ConversationApi, PluginAdapter};
use pactbridge_core::types::{
    AdapterType, AttachmentUpload, ChannelRef, ConversationMetadata, HealthStatus, MessageForm,
    SentMessageResult, UploadedAttachmentRef,
};
use pactbridge_core::RelayError;

/// One call received by [`MockConversationApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Fetch(i64),
    Upload {
        conversation_id: i64,
        upload: AttachmentUpload,
    },
    Post {
        conversation_id: i64,
        form: MessageForm,
    },
}

#[derive(Default)]
struct Script {
    conversations: HashMap<i64, ConversationMetadata>,
    upload_ids: HashMap<String, i64>,
    upload_delays: HashMap<String, Duration>,
    next_upload_id: i64,
    failing_fetches: usize,
    failing_uploads: usize,
    failing_posts: usize,
    calls: Vec<ApiCall>,
}

/// A mock conversation API for testing.
///
/// Unknown conversations are synthesized with [`sample_conversation`].
/// Uploads return the id registered for the file name, or the next id of a
/// sequence starting at 1000. Failures are scripted per call kind and
/// returned as HTTP 500 `ExternalApi` errors.
pub struct MockConversationApi {
    script: Mutex<Script>,
}

impl MockConversationApi {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script {
                next_upload_id: 1000,
                ..Script::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Serve `conversation` for its `external_id`.
    pub fn with_conversation(self, conversation: ConversationMetadata) -> Self {
        self.lock()
            .conversations
            .insert(conversation.external_id, conversation);
        self
    }

    /// Return `id` for every upload of `file_name`.
    pub fn with_upload_id(self, file_name: &str, id: i64) -> Self {
        self.lock().upload_ids.insert(file_name.to_string(), id);
        self
    }

    /// Delay the upload response for `file_name`.
    pub fn with_upload_delay(self, file_name: &str, delay: Duration) -> Self {
        self.lock()
            .upload_delays
            .insert(file_name.to_string(), delay);
        self
    }

    /// The next `n` fetch calls fail.
    pub fn fail_next_fetches(&self, n: usize) {
        self.lock().failing_fetches = n;
    }

    /// The next `n` upload calls fail.
    pub fn fail_next_uploads(&self, n: usize) {
        self.lock().failing_uploads = n;
    }

    /// The next `n` post calls fail.
    pub fn fail_next_posts(&self, n: usize) {
        self.lock().failing_posts = n;
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    /// Just the upload calls.
    pub fn uploads(&self) -> Vec<AttachmentUpload> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::Upload { upload, .. } => Some(upload),
                _ => None,
            })
            .collect()
    }

    /// Just the posted forms.
    pub fn posts(&self) -> Vec<MessageForm> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::Post { form, .. } => Some(form),
                _ => None,
            })
            .collect()
    }
}

impl Default for MockConversationApi {
    fn default() -> Self {
        Self::new()
    }
}

fn scripted_failure(call: &str) -> RelayError {
    RelayError::ExternalApi {
        message: format!("{call} returned 500 Internal Server Error: scripted"),
        status: Some(500),
        source: None,
    }
}

/// Decrements a failure budget; true when this call should fail.
fn take_failure(budget: &mut usize) -> bool {
    if *budget > 0 {
        *budget -= 1;
        true
    } else {
        false
    }
}

/// A conversation with every field populated.
pub fn sample_conversation(external_id: i64) -> ConversationMetadata {
    let mut meta = serde_json::Map::new();
    meta.insert("source".into(), "test".into());
    ConversationMetadata {
        external_id,
        name: format!("Conversation {external_id}"),
        channel_id: 7,
        channel_type: "whatsapp".into(),
        created_at: "2026-01-01T00:00:00.000Z".into(),
        avatar: "https://cdn.example/avatar.png".into(),
        sender_external_id: "79990001122".into(),
        meta,
    }
}

#[async_trait]
impl PluginAdapter for MockConversationApi {
    fn name(&self) -> &str {
        "mock-conversation-api"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::ConversationApi
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

#[async_trait]
impl ConversationApi for MockConversationApi {
    async fn fetch_conversation(
        &self,
        conversation_id: i64,
    ) -> Result<ConversationMetadata, RelayError> {
        let mut script = self.lock();
        script.calls.push(ApiCall::Fetch(conversation_id));
        if take_failure(&mut script.failing_fetches) {
            return Err(scripted_failure("fetch conversation"));
        }
        Ok(script
            .conversations
            .get(&conversation_id)
            .cloned()
            .unwrap_or_else(|| sample_conversation(conversation_id)))
    }

    async fn upload_attachment(
        &self,
        conversation_id: i64,
        upload: AttachmentUpload,
    ) -> Result<UploadedAttachmentRef, RelayError> {
        let (delay, result) = {
            let mut script = self.lock();
            let delay = script.upload_delays.get(&upload.file_name).copied();
            let result = if take_failure(&mut script.failing_uploads) {
                Err(scripted_failure("upload attachment"))
            } else {
                let external_id = match script.upload_ids.get(&upload.file_name) {
                    Some(id) => *id,
                    None => {
                        script.next_upload_id += 1;
                        script.next_upload_id
                    }
                };
                Ok(UploadedAttachmentRef { external_id })
            };
            script.calls.push(ApiCall::Upload {
                conversation_id,
                upload,
            });
            (delay, result)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn post_message(
        &self,
        conversation_id: i64,
        form: &MessageForm,
    ) -> Result<SentMessageResult, RelayError> {
        let mut script = self.lock();
        script.calls.push(ApiCall::Post {
            conversation_id,
            form: form.clone(),
        });
        if take_failure(&mut script.failing_posts) {
            return Err(scripted_failure("post message"));
        }
        Ok(SentMessageResult {
            id: script.calls.len() as i64,
            company_id: 1,
            channel: ChannelRef {
                id: 7,
                kind: "whatsapp".into(),
            },
            conversation_id,
            state: "in_progress".into(),
            message_id: serde_json::Value::Null,
            details: serde_json::Value::Null,
            created_at: serde_json::json!(1767225600),
        })
    }
}
