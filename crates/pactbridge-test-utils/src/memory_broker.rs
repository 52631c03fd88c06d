// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory broker for deterministic testing.
//!
//! `MemoryBroker` implements `MessageBroker` with named in-process queues,
//! captured publishes, and a log of how every delivery was settled.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use pactbridge_core::traits::{Acknowledger, Delivery, DeliveryStream, MessageBroker, PluginAdapter};
use pactbridge_core::types::{AdapterType, HealthStatus};
use pactbridge_core::RelayError;

/// How a delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Acked,
    /// Rejected with `requeue = true`; the payload is back at the queue head.
    Requeued,
    /// Rejected with `requeue = false`.
    Dropped,
}

struct Pending {
    payload: Vec<u8>,
    redelivered: bool,
}

#[derive(Default)]
struct State {
    queues: HashMap<String, VecDeque<Pending>>,
    wakers: HashMap<String, Arc<Notify>>,
    declared: HashSet<String>,
    published: Vec<(String, Vec<u8>)>,
    outcomes: Vec<(u64, Outcome)>,
    next_tag: u64,
    fail_publish: bool,
    closed: bool,
}

impl State {
    fn waker(&mut self, queue: &str) -> Arc<Notify> {
        self.wakers
            .entry(queue.to_string())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    fn enqueue(&mut self, queue: &str, pending: Pending, front: bool) -> Arc<Notify> {
        let messages = self.queues.entry(queue.to_string()).or_default();
        if front {
            messages.push_front(pending);
        } else {
            messages.push_back(pending);
        }
        self.waker(queue)
    }
}

/// A mock message broker for testing.
///
/// Provides:
/// - **queues**: payloads added via `push()` or `publish()` are handed out by `consume()`
/// - **published**: every successful `publish()` is captured per queue
/// - **outcomes**: every ack/reject, in settle order
///
/// One consumer per queue is supported.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<State>>,
}

impl MemoryBroker {
    /// Create a broker with no queues.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Enqueue a payload without recording it as published.
    pub fn push(&self, queue: &str, payload: impl Into<Vec<u8>>) {
        let waker = self.lock().enqueue(
            queue,
            Pending {
                payload: payload.into(),
                redelivered: false,
            },
            false,
        );
        waker.notify_one();
    }

    /// Payloads published to `queue`, in publish order.
    pub fn published(&self, queue: &str) -> Vec<Vec<u8>> {
        self.lock()
            .published
            .iter()
            .filter(|(q, _)| q == queue)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// Published payloads of `queue` decoded as JSON.
    pub fn published_json(&self, queue: &str) -> Vec<serde_json::Value> {
        self.published(queue)
            .iter()
            .filter_map(|payload| serde_json::from_slice(payload).ok())
            .collect()
    }

    /// Every settle call so far as `(delivery tag, outcome)`.
    pub fn outcomes(&self) -> Vec<(u64, Outcome)> {
        self.lock().outcomes.clone()
    }

    /// Number of payloads waiting in `queue`.
    pub fn pending(&self, queue: &str) -> usize {
        self.lock().queues.get(queue).map_or(0, VecDeque::len)
    }

    /// Whether `queue` has been declared.
    pub fn is_declared(&self, queue: &str) -> bool {
        self.lock().declared.contains(queue)
    }

    /// Make every subsequent `publish()` fail with `BrokerUnavailable`.
    pub fn set_fail_publish(&self, fail: bool) {
        self.lock().fail_publish = fail;
    }

    /// End every consumer stream once its queue has no payload to hand out.
    pub fn close(&self) {
        let wakers: Vec<Arc<Notify>> = {
            let mut state = self.lock();
            state.closed = true;
            state.wakers.values().cloned().collect()
        };
        for waker in wakers {
            waker.notify_one();
        }
    }

    /// Poll until at least `count` settle calls were recorded.
    ///
    /// Panics after five seconds so a hung worker fails the test instead of
    /// stalling the suite.
    pub async fn wait_for_outcomes(&self, count: usize) -> Vec<(u64, Outcome)> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let outcomes = self.outcomes();
            if outcomes.len() >= count {
                return outcomes;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {count} outcomes, have {outcomes:?}"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn next_delivery(&self, queue: &str) -> Result<Option<Delivery>, Arc<Notify>> {
        let mut state = self.lock();
        match state.queues.get_mut(queue).and_then(VecDeque::pop_front) {
            Some(pending) => {
                state.next_tag += 1;
                let tag = state.next_tag;
                let acker = MemoryAcker {
                    broker: self.clone(),
                    queue: queue.to_string(),
                    tag,
                    payload: pending.payload.clone(),
                };
                Ok(Some(Delivery::new(
                    tag,
                    pending.redelivered,
                    pending.payload,
                    Box::new(acker),
                )))
            }
            None if state.closed => Ok(None),
            None => Err(state.waker(queue)),
        }
    }
}

struct MemoryAcker {
    broker: MemoryBroker,
    queue: String,
    tag: u64,
    payload: Vec<u8>,
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(&self) -> Result<(), RelayError> {
        self.broker.lock().outcomes.push((self.tag, Outcome::Acked));
        Ok(())
    }

    async fn reject(&self, requeue: bool) -> Result<(), RelayError> {
        let waker = {
            let mut state = self.broker.lock();
            if requeue {
                state.outcomes.push((self.tag, Outcome::Requeued));
                Some(state.enqueue(
                    &self.queue,
                    Pending {
                        payload: self.payload.clone(),
                        redelivered: true,
                    },
                    true,
                ))
            } else {
                state.outcomes.push((self.tag, Outcome::Dropped));
                None
            }
        };
        if let Some(waker) = waker {
            waker.notify_one();
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for MemoryBroker {
    fn name(&self) -> &str {
        "memory-broker"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Broker
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        if self.lock().closed {
            Ok(HealthStatus::Unhealthy("closed".into()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        self.close();
        Ok(())
    }
}

#[async_trait]
impl MessageBroker for MemoryBroker {
    async fn declare(&self, queue: &str) -> Result<(), RelayError> {
        self.lock().declared.insert(queue.to_string());
        Ok(())
    }

    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), RelayError> {
        let waker = {
            let mut state = self.lock();
            if state.fail_publish || state.closed {
                return Err(RelayError::BrokerUnavailable {
                    message: format!("publish to `{queue}` refused"),
                    source: None,
                });
            }
            state.declared.insert(queue.to_string());
            state.published.push((queue.to_string(), payload.to_vec()));
            state.enqueue(
                queue,
                Pending {
                    payload: payload.to_vec(),
                    redelivered: false,
                },
                false,
            )
        };
        waker.notify_one();
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream, RelayError> {
        self.lock().declared.insert(queue.to_string());
        let broker = self.clone();
        let queue = queue.to_string();
        let stream = futures::stream::unfold((broker, queue), |(broker, queue)| async move {
            loop {
                match broker.next_delivery(&queue) {
                    Ok(Some(delivery)) => return Some((Ok(delivery), (broker, queue))),
                    Ok(None) => return None,
                    // A push between the check and this await leaves a stored permit.
                    Err(waker) => waker.notified().await,
                }
            }
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    #[tokio::test]
    async fn consume_returns_pushed_payloads_in_order() {
        let broker = MemoryBroker::new();
        broker.push("q", "first");
        broker.push("q", "second");

        let mut stream = broker.consume("q").await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(first.payload, b"first");
        assert_eq!(second.payload, b"second");
        assert!(first.tag < second.tag);
    }

    #[tokio::test]
    async fn publish_is_captured_and_consumable() {
        let broker = MemoryBroker::new();
        broker.publish("out", br#"{"a":1}"#).await.unwrap();

        assert!(broker.is_declared("out"));
        assert_eq!(broker.published_json("out"), vec![serde_json::json!({"a": 1})]);
        assert_eq!(broker.pending("out"), 1);
        assert!(broker.published("other").is_empty());
    }

    #[tokio::test]
    async fn failing_publish_records_nothing() {
        let broker = MemoryBroker::new();
        broker.set_fail_publish(true);
        let err = broker.publish("out", b"x").await.unwrap_err();
        assert!(matches!(err, RelayError::BrokerUnavailable { .. }));
        assert!(broker.published("out").is_empty());
    }

    #[tokio::test]
    async fn requeue_puts_payload_back_at_head_as_redelivered() {
        let broker = MemoryBroker::new();
        broker.push("q", "a");
        broker.push("q", "b");

        let mut stream = broker.consume("q").await.unwrap();
        let a = stream.next().await.unwrap().unwrap();
        let tag = a.tag;
        a.reject(true).await.unwrap();

        let again = stream.next().await.unwrap().unwrap();
        assert_eq!(again.payload, b"a");
        assert!(again.redelivered);
        assert_ne!(again.tag, tag);
        again.ack().await.unwrap();

        assert_eq!(
            broker.outcomes(),
            vec![(tag, Outcome::Requeued), (tag + 1, Outcome::Acked)]
        );
    }

    #[tokio::test]
    async fn drop_discards_payload() {
        let broker = MemoryBroker::new();
        broker.push("q", "poison");

        let mut stream = broker.consume("q").await.unwrap();
        let delivery = stream.next().await.unwrap().unwrap();
        delivery.reject(false).await.unwrap();

        assert_eq!(broker.pending("q"), 0);
        assert_eq!(broker.outcomes()[0].1, Outcome::Dropped);
    }

    #[tokio::test]
    async fn consume_waits_for_push() {
        let broker = MemoryBroker::new();
        let mut stream = broker.consume("q").await.unwrap();

        let producer = broker.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            producer.push("q", "delayed");
        });

        let delivery = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("consume timed out")
            .unwrap()
            .unwrap();
        assert_eq!(delivery.payload, b"delayed");
    }

    #[tokio::test]
    async fn close_ends_idle_stream() {
        let broker = MemoryBroker::new();
        let mut stream = broker.consume("q").await.unwrap();

        let closer = broker.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            closer.close();
        });

        let next = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("stream did not end");
        assert!(next.is_none());
        assert!(matches!(
            broker.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
    }
}
