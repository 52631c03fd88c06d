// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection-owning [`MessageBroker`] over lapin.

use std::collections::HashSet;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, ConfirmSelectOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties};
use pactbridge_config::model::BrokerConfig;
use pactbridge_core::{
    AdapterType, Delivery, DeliveryStream, HealthStatus, MessageBroker, PluginAdapter, RelayError,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::acker::LapinAcker;
use crate::properties::publish_properties;

/// Reply code for a normal close.
const REPLY_SUCCESS: u16 = 200;

/// The publishing channel and the queues already declared through it.
struct Publisher {
    channel: Channel,
    declared: DeclaredQueues,
}

/// Queue names declared on a channel, so each is declared once per process.
#[derive(Debug, Default)]
struct DeclaredQueues(HashSet<String>);

impl DeclaredQueues {
    fn contains(&self, queue: &str) -> bool {
        self.0.contains(queue)
    }

    /// Records `queue`; returns `false` if it was already recorded.
    fn insert(&mut self, queue: &str) -> bool {
        self.0.insert(queue.to_string())
    }
}

fn require_connected(connected: bool) -> Result<(), RelayError> {
    if connected {
        Ok(())
    } else {
        Err(RelayError::BrokerUnavailable {
            message: "connection is closed".into(),
            source: None,
        })
    }
}

fn consumer_tag(queue: &str) -> String {
    format!("pactbridge-{queue}-{}", uuid::Uuid::new_v4())
}

/// AMQP implementation of [`MessageBroker`].
pub struct AmqpBroker {
    connection: Connection,
    publisher: Mutex<Publisher>,
    consumers: StdMutex<Vec<Channel>>,
    prefetch: u16,
}

impl AmqpBroker {
    /// Connects to the broker and opens the publishing channel in confirm mode.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, RelayError> {
        let uri = config
            .amqp_uri()
            .map_err(|e| RelayError::Config(format!("invalid broker URI: {e}")))?;

        let connection = Connection::connect(&uri, ConnectionProperties::default())
            .await
            .map_err(|e| RelayError::broker("failed to connect to broker", e))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| RelayError::broker("failed to open publish channel", e))?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| RelayError::broker("failed to enable publisher confirms", e))?;

        info!(host = %config.host, vhost = %config.vhost, "connected to broker");

        Ok(Self {
            connection,
            publisher: Mutex::new(Publisher {
                channel,
                declared: DeclaredQueues::default(),
            }),
            consumers: StdMutex::new(Vec::new()),
            prefetch: config.prefetch,
        })
    }

    fn ensure_connected(&self) -> Result<(), RelayError> {
        require_connected(self.connection.status().connected())
    }
}

async fn declare_on(channel: &Channel, queue: &str) -> Result<(), RelayError> {
    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| RelayError::broker(format!("failed to declare queue `{queue}`"), e))?;
    Ok(())
}

#[async_trait]
impl PluginAdapter for AmqpBroker {
    fn name(&self) -> &str {
        "amqp"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Broker
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        if !self.connection.status().connected() {
            return Ok(HealthStatus::Unhealthy("connection closed".into()));
        }
        let publisher = self.publisher.lock().await;
        if publisher.channel.status().connected() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Degraded("publish channel closed".into()))
        }
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        let consumers: Vec<Channel> = match self.consumers.lock() {
            Ok(mut guard) => guard.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        for channel in consumers {
            if channel.status().connected()
                && let Err(e) = channel.close(REPLY_SUCCESS, "shutdown").await
            {
                warn!(error = %e, "failed to close consumer channel");
            }
        }

        let publisher = self.publisher.lock().await;
        if publisher.channel.status().connected()
            && let Err(e) = publisher.channel.close(REPLY_SUCCESS, "shutdown").await
        {
            warn!(error = %e, "failed to close publish channel");
        }

        if self.connection.status().connected() {
            self.connection
                .close(REPLY_SUCCESS, "shutdown")
                .await
                .map_err(|e| RelayError::broker("failed to close connection", e))?;
        }
        info!("broker connection closed");
        Ok(())
    }
}

#[async_trait]
impl MessageBroker for AmqpBroker {
    async fn declare(&self, queue: &str) -> Result<(), RelayError> {
        self.ensure_connected()?;
        let mut publisher = self.publisher.lock().await;
        if publisher.declared.contains(queue) {
            return Ok(());
        }
        declare_on(&publisher.channel, queue).await?;
        publisher.declared.insert(queue);
        debug!(queue, "queue declared");
        Ok(())
    }

    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), RelayError> {
        self.ensure_connected()?;
        // Held across the confirm so publishes never interleave on the channel.
        let mut publisher = self.publisher.lock().await;
        if !publisher.declared.contains(queue) {
            declare_on(&publisher.channel, queue).await?;
            publisher.declared.insert(queue);
        }

        let confirmation = publisher
            .channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                payload,
                publish_properties(chrono::Utc::now()),
            )
            .await
            .map_err(|e| RelayError::broker(format!("failed to publish to `{queue}`"), e))?
            .await
            .map_err(|e| RelayError::broker(format!("no publisher confirm from `{queue}`"), e))?;

        if confirmation.is_nack() {
            return Err(RelayError::BrokerUnavailable {
                message: format!("broker refused message for `{queue}`"),
                source: None,
            });
        }

        debug!(queue, bytes = payload.len(), "message published");
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream, RelayError> {
        self.ensure_connected()?;
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| RelayError::broker("failed to open consumer channel", e))?;
        channel
            .basic_qos(self.prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| RelayError::broker("failed to set prefetch", e))?;
        declare_on(&channel, queue).await?;

        let consumer = channel
            .basic_consume(
                queue,
                &consumer_tag(queue),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| RelayError::broker(format!("failed to consume `{queue}`"), e))?;

        match self.consumers.lock() {
            Ok(mut guard) => guard.push(channel),
            Err(poisoned) => poisoned.into_inner().push(channel),
        }
        info!(queue, prefetch = self.prefetch, "consumer started");

        let queue = queue.to_string();
        let stream = consumer.map(move |item| {
            item.map(|d| {
                Delivery::new(
                    d.delivery_tag,
                    d.redelivered,
                    d.data,
                    Box::new(LapinAcker(d.acker)),
                )
            })
            .map_err(|e| RelayError::broker(format!("consumer on `{queue}` failed"), e))
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use pactbridge_core::Disposition;

    use super::*;

    #[test]
    fn declared_queues_record_each_name_once() {
        let mut declared = DeclaredQueues::default();
        assert!(!declared.contains("erp_send_message"));

        assert!(declared.insert("erp_send_message"));
        assert!(!declared.insert("erp_send_message"));
        assert!(declared.contains("erp_send_message"));
        assert!(!declared.contains("pact_receive_callback"));
    }

    #[test]
    fn closed_connection_is_retryable_broker_error() {
        assert!(require_connected(true).is_ok());

        let err = require_connected(false).unwrap_err();
        assert!(matches!(err, RelayError::BrokerUnavailable { .. }));
        assert_eq!(err.disposition(), Disposition::Retry);
    }

    #[test]
    fn consumer_tags_name_the_queue_and_are_unique() {
        let a = consumer_tag("erp_send_message");
        let b = consumer_tag("erp_send_message");
        assert!(a.starts_with("pactbridge-erp_send_message-"), "{a}");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn unreachable_broker_fails_to_connect() {
        let config = BrokerConfig {
            host: "127.0.0.1".into(),
            port: 1,
            ..BrokerConfig::default()
        };
        let err = match AmqpBroker::connect(&config).await {
            Ok(_) => panic!("connected to a closed port"),
            Err(e) => e,
        };
        assert!(matches!(err, RelayError::BrokerUnavailable { .. }), "{err}");
    }
}
