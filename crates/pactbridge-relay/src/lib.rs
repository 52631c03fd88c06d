// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue workers for the Pactbridge relay.
//!
//! Two sequential consumers run on top of the shared broker handle:
//! - [`MessageDispatcher`] on the send queue: uploads attachments, posts
//!   the message, acks only once the post succeeded
//! - [`IdentifierResolver`] on the identifier queue: fetches conversation
//!   metadata and republishes it to the receive queue as an
//!   `account`/`update` event
//!
//! Both are driven by a [`QueueWorker`], which owns ordering, settlement,
//! backoff and shutdown.

pub mod attachment;
pub mod backoff;
pub mod dispatcher;
pub mod resolver;
pub mod shutdown;
pub mod upload_cache;
pub mod worker;

use std::sync::Arc;

use pactbridge_config::PactbridgeConfig;
use pactbridge_core::{ConversationApi, MessageBroker};

pub use backoff::Backoff;
pub use dispatcher::MessageDispatcher;
pub use resolver::IdentifierResolver;
pub use worker::{DeliveryHandler, QueueWorker};

/// Builds the send-queue and identifier-queue workers from configuration.
pub fn build_workers(
    config: &PactbridgeConfig,
    broker: Arc<dyn MessageBroker>,
    api: Arc<dyn ConversationApi>,
) -> [QueueWorker; 2] {
    let backoff = Backoff::from_config(&config.worker);

    let dispatcher = MessageDispatcher::new(api.clone(), config.worker.upload_cache_capacity);
    let resolver = IdentifierResolver::new(api, broker.clone(), config.broker.receive_queue.clone());

    [
        QueueWorker::new(
            broker.clone(),
            config.broker.send_queue.clone(),
            Arc::new(dispatcher),
            backoff.clone(),
        ),
        QueueWorker::new(
            broker,
            config.broker.identifier_queue.clone(),
            Arc::new(resolver),
            backoff,
        ),
    ]
}
