// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Pactbridge relay.
//!
//! This crate provides the wire types, the error taxonomy, and the traits
//! at the two seams of the relay: the message broker and the conversation
//! REST API. Every other crate in the workspace builds on these.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{Disposition, RelayError};
pub use types::{
    AdapterType, Attachment, AttachmentUpload, CallbackEvent, ConversationMetadata, HealthStatus,
    IdentifierRequest, MessageForm, OutboundMessageRequest, SentMessageResult,
    UploadedAttachmentRef,
};

pub use traits::{Acknowledger, ConversationApi, Delivery, DeliveryStream, MessageBroker, PluginAdapter};
