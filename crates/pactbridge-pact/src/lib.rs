// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pact conversation API adapter for the Pactbridge relay.
//!
//! This crate implements [`ConversationApi`] over the Pact REST API:
//! fetching a conversation, uploading an attachment and posting a message.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use pactbridge_config::model::PactConfig;
use pactbridge_core::traits::{ConversationApi, PluginAdapter};
use pactbridge_core::types::{
    AdapterType, AttachmentUpload, ConversationMetadata, HealthStatus, MessageForm,
    SentMessageResult, UploadedAttachmentRef,
};
use pactbridge_core::RelayError;
use tracing::{debug, info};

use crate::client::PactClient;

/// Pact adapter implementing [`ConversationApi`].
pub struct PactAdapter {
    client: PactClient,
}

impl PactAdapter {
    /// Creates the adapter from the `[pact]` section.
    ///
    /// Fails with [`RelayError::Config`] when the company id or token is absent.
    pub fn new(config: &PactConfig) -> Result<Self, RelayError> {
        let company_id = config
            .company_id
            .ok_or_else(|| RelayError::Config("pact.company_id is not set".into()))?;
        let api_token = config
            .api_token
            .as_deref()
            .ok_or_else(|| RelayError::Config("pact.api_token is not set".into()))?;

        let client = PactClient::new(
            &config.base_url,
            company_id,
            api_token,
            Duration::from_secs(config.timeout_secs),
        )?;
        info!(base_url = %config.base_url, company_id, "pact client ready");
        Ok(Self { client })
    }
}

#[async_trait]
impl PluginAdapter for PactAdapter {
    fn name(&self) -> &str {
        "pact"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::ConversationApi
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        // No side-effect-free endpoint to check against.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        debug!("pact client shutting down");
        Ok(())
    }
}

#[async_trait]
impl ConversationApi for PactAdapter {
    async fn fetch_conversation(
        &self,
        conversation_id: i64,
    ) -> Result<ConversationMetadata, RelayError> {
        self.client.fetch_conversation(conversation_id).await
    }

    async fn upload_attachment(
        &self,
        conversation_id: i64,
        upload: AttachmentUpload,
    ) -> Result<UploadedAttachmentRef, RelayError> {
        self.client.upload_attachment(conversation_id, upload).await
    }

    async fn post_message(
        &self,
        conversation_id: i64,
        form: &MessageForm,
    ) -> Result<SentMessageResult, RelayError> {
        self.client.post_message(conversation_id, form).await
    }
}
