// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message broker seam: publish to a named queue, consume deliveries from one.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::RelayError;
use crate::traits::adapter::PluginAdapter;

/// Stream of deliveries from one queue. Ends when the consumer is cancelled
/// or the underlying channel closes.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Result<Delivery, RelayError>> + Send>>;

/// Settles a delivery with the broker.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// Positive acknowledgement; the broker forgets the message.
    async fn ack(&self) -> Result<(), RelayError>;

    /// Negative acknowledgement. `requeue = false` discards the message.
    async fn reject(&self, requeue: bool) -> Result<(), RelayError>;
}

/// One message pulled from a queue.
///
/// `ack` and `reject` consume the delivery, so it is settled at most once.
pub struct Delivery {
    /// Broker-assigned tag, unique per channel.
    pub tag: u64,
    /// Set when the broker has handed this message out before.
    pub redelivered: bool,
    /// Raw message body.
    pub payload: Vec<u8>,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    /// Wraps a payload together with the handle that settles it.
    pub fn new(
        tag: u64,
        redelivered: bool,
        payload: Vec<u8>,
        acker: Box<dyn Acknowledger>,
    ) -> Self {
        Self {
            tag,
            redelivered,
            payload,
            acker,
        }
    }

    pub async fn ack(self) -> Result<(), RelayError> {
        self.acker.ack().await
    }

    pub async fn reject(self, requeue: bool) -> Result<(), RelayError> {
        self.acker.reject(requeue).await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("tag", &self.tag)
            .field("redelivered", &self.redelivered)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// Owner of the broker connection.
///
/// Implementations must serialize `publish` calls: the channel underneath is
/// not safe for concurrent publishers.
#[async_trait]
pub trait MessageBroker: PluginAdapter {
    /// Declares a durable queue. Idempotent.
    async fn declare(&self, queue: &str) -> Result<(), RelayError>;

    /// Publishes a transient JSON message to `queue`, declaring it first if
    /// this broker has not declared it yet.
    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), RelayError>;

    /// Starts consuming `queue` with manual acknowledgement.
    async fn consume(&self, queue: &str) -> Result<DeliveryStream, RelayError>;
}
