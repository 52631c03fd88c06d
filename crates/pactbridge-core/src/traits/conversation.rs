// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seam over the messaging platform's conversation REST API.

use async_trait::async_trait;

use crate::error::RelayError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    AttachmentUpload, ConversationMetadata, MessageForm, SentMessageResult, UploadedAttachmentRef,
};

/// The three platform calls the relay depends on.
#[async_trait]
pub trait ConversationApi: PluginAdapter {
    /// Fetches a conversation's metadata.
    async fn fetch_conversation(
        &self,
        conversation_id: i64,
    ) -> Result<ConversationMetadata, RelayError>;

    /// Uploads one attachment to a conversation.
    async fn upload_attachment(
        &self,
        conversation_id: i64,
        upload: AttachmentUpload,
    ) -> Result<UploadedAttachmentRef, RelayError>;

    /// Posts a message referencing previously uploaded attachments.
    async fn post_message(
        &self,
        conversation_id: i64,
        form: &MessageForm,
    ) -> Result<SentMessageResult, RelayError>;
}
