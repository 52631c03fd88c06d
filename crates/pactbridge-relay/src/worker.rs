// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The sequential consume loop shared by both queue workers.
//!
//! One [`QueueWorker`] owns one queue: it pulls a delivery, hands the payload
//! to its [`DeliveryHandler`], and settles the delivery from the outcome
//! before pulling the next one.
//!
//! | Outcome | Settlement |
//! |---|---|
//! | success | ack, backoff reset |
//! | [`Disposition::Drop`] | reject without requeue |
//! | [`Disposition::Retry`] | sleep the backoff, then reject with requeue |

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use pactbridge_core::{Delivery, Disposition, MessageBroker, RelayError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backoff::Backoff;

/// Bytes of a dropped payload copied into the log record.
const PAYLOAD_PREVIEW_BYTES: usize = 512;

/// Processes one queue payload. Returning `Ok` means every external call
/// the payload triggered has completed.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    /// Short label for log records.
    fn name(&self) -> &'static str;

    async fn handle(&self, payload: &[u8]) -> Result<(), RelayError>;
}

/// One dedicated consume loop for one queue.
pub struct QueueWorker {
    broker: Arc<dyn MessageBroker>,
    queue: String,
    handler: Arc<dyn DeliveryHandler>,
    backoff: Backoff,
}

impl QueueWorker {
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        queue: impl Into<String>,
        handler: Arc<dyn DeliveryHandler>,
        backoff: Backoff,
    ) -> Self {
        Self {
            broker,
            queue: queue.into(),
            handler,
            backoff,
        }
    }

    /// Consumes until `cancel` fires or the delivery stream ends.
    ///
    /// A delivery already being handled when `cancel` fires is finished and
    /// settled first. Fails only if the queue cannot be consumed at all or
    /// the stream reports a broker error.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), RelayError> {
        let mut deliveries = self.broker.consume(&self.queue).await?;
        info!(queue = %self.queue, worker = self.handler.name(), "queue worker started");

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(queue = %self.queue, "shutdown requested, queue worker stopping");
                    break;
                }
                next = deliveries.next() => next,
            };

            match next {
                Some(Ok(delivery)) => self.process(delivery, &cancel).await,
                Some(Err(e)) => {
                    error!(queue = %self.queue, error = %e, "delivery stream failed");
                    return Err(e);
                }
                None => {
                    info!(queue = %self.queue, "delivery stream closed");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn process(&mut self, delivery: Delivery, cancel: &CancellationToken) {
        let tag = delivery.tag;
        debug!(
            queue = %self.queue,
            delivery_tag = tag,
            redelivered = delivery.redelivered,
            bytes = delivery.payload.len(),
            "delivery received"
        );

        let outcome = self.handler.handle(&delivery.payload).await;

        let settled = match outcome {
            Ok(()) => {
                self.backoff.reset();
                delivery.ack().await
            }
            Err(e) => match e.disposition() {
                Disposition::Drop => {
                    let preview = String::from_utf8_lossy(
                        &delivery.payload[..delivery.payload.len().min(PAYLOAD_PREVIEW_BYTES)],
                    )
                    .into_owned();
                    error!(
                        queue = %self.queue,
                        delivery_tag = tag,
                        error = %e,
                        payload_preview = %preview,
                        "dropping undeliverable message"
                    );
                    delivery.reject(false).await
                }
                Disposition::Retry => {
                    let delay = self.backoff.next_delay();
                    warn!(
                        queue = %self.queue,
                        delivery_tag = tag,
                        error = %e,
                        attempt = self.backoff.failures(),
                        delay_ms = delay.as_millis() as u64,
                        "processing failed, requeueing after backoff"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            debug!(queue = %self.queue, delivery_tag = tag, "backoff cut short by shutdown");
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    delivery.reject(true).await
                }
            },
        };

        if let Err(e) = settled {
            // The broker redelivers anything left unsettled when the channel closes.
            warn!(queue = %self.queue, delivery_tag = tag, error = %e, "failed to settle delivery");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use pactbridge_test_utils::{MemoryBroker, Outcome};
    use tracing_test::traced_test;

    use super::*;

    /// Fails the first `failures` payloads it sees with the given error kind.
    struct Scripted {
        seen: Mutex<Vec<Vec<u8>>>,
        failures: Mutex<usize>,
        drop: bool,
    }

    impl Scripted {
        fn new(failures: usize, drop: bool) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                failures: Mutex::new(failures),
                drop,
            })
        }
    }

    #[async_trait]
    impl DeliveryHandler for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn handle(&self, payload: &[u8]) -> Result<(), RelayError> {
            self.seen.lock().unwrap().push(payload.to_vec());
            let mut failures = self.failures.lock().unwrap();
            if *failures == 0 {
                return Ok(());
            }
            *failures -= 1;
            if self.drop {
                Err(RelayError::Decode {
                    message: "bad".into(),
                    source: None,
                })
            } else {
                Err(RelayError::ExternalApi {
                    message: "500".into(),
                    status: Some(500),
                    source: None,
                })
            }
        }
    }

    fn worker(broker: &MemoryBroker, handler: Arc<Scripted>) -> QueueWorker {
        QueueWorker::new(
            Arc::new(broker.clone()),
            "q",
            handler,
            Backoff::new(Duration::from_millis(10), Duration::from_millis(40)),
        )
    }

    #[tokio::test]
    async fn acks_in_arrival_order() {
        let broker = MemoryBroker::new();
        broker.push("q", "1");
        broker.push("q", "2");
        broker.push("q", "3");
        broker.close();

        let handler = Scripted::new(0, false);
        worker(&broker, handler.clone())
            .run(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(*handler.seen.lock().unwrap(), [b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]);
        assert!(broker.outcomes().iter().all(|(_, o)| *o == Outcome::Acked));
        assert_eq!(broker.outcomes().len(), 3);
    }

    #[tokio::test]
    async fn transient_failure_requeues_then_succeeds() {
        let broker = MemoryBroker::new();
        broker.push("q", "x");

        let handler = Scripted::new(2, false);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(worker(&broker, handler.clone()).run(cancel.clone()));

        let outcomes = broker.wait_for_outcomes(3).await;
        cancel.cancel();
        task.await.unwrap().unwrap();

        let kinds: Vec<Outcome> = outcomes.iter().map(|(_, o)| *o).collect();
        assert_eq!(kinds, [Outcome::Requeued, Outcome::Requeued, Outcome::Acked]);
        assert_eq!(handler.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    #[traced_test]
    async fn poison_message_is_dropped_and_next_processed() {
        let broker = MemoryBroker::new();
        broker.push("q", "poison");
        broker.push("q", "good");
        broker.close();

        let handler = Scripted::new(1, true);
        worker(&broker, handler).run(CancellationToken::new()).await.unwrap();

        let kinds: Vec<Outcome> = broker.outcomes().iter().map(|(_, o)| *o).collect();
        assert_eq!(kinds, [Outcome::Dropped, Outcome::Acked]);
        assert!(logs_contain("dropping undeliverable message"));
        assert!(logs_contain("poison"));
    }

    #[tokio::test]
    async fn shutdown_during_backoff_requeues_immediately() {
        let broker = MemoryBroker::new();
        broker.push("q", "x");

        let handler = Scripted::new(usize::MAX, false);
        let cancel = CancellationToken::new();
        let slow = QueueWorker::new(
            Arc::new(broker.clone()),
            "q",
            handler,
            Backoff::new(Duration::from_secs(3600), Duration::from_secs(3600)),
        );
        let task = tokio::spawn(slow.run(cancel.clone()));

        // Give the worker time to fail once and enter its hour-long backoff.
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("worker did not stop")
            .unwrap()
            .unwrap();
        assert_eq!(broker.outcomes().len(), 1);
        assert_eq!(broker.outcomes()[0].1, Outcome::Requeued);
        assert_eq!(broker.pending("q"), 1);
    }

    #[tokio::test]
    async fn cancelled_idle_worker_exits() {
        let broker = MemoryBroker::new();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(worker(&broker, Scripted::new(0, false)).run(cancel.clone()));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("worker did not stop")
            .unwrap()
            .unwrap();
        assert!(broker.outcomes().is_empty());
    }
}
