// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for the seams between relay components.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod broker;
pub mod conversation;

pub use adapter::PluginAdapter;
pub use broker::{Acknowledger, Delivery, DeliveryStream, MessageBroker};
pub use conversation::ConversationApi;
