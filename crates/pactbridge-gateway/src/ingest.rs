// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook ingestion: validate a callback body and enqueue it.

use std::error::Error as _;
use std::sync::Arc;

use axum::http::StatusCode;
use pactbridge_core::{CallbackEvent, MessageBroker, RelayError};
use tracing::{error, info, warn};

use crate::handlers::ErrorResponse;

/// Turns platform webhook bodies into receive-queue messages.
///
/// Holds no state beyond the shared broker handle, so one instance serves
/// every concurrent request.
pub struct WebhookIngestor {
    broker: Arc<dyn MessageBroker>,
    receive_queue: String,
}

impl WebhookIngestor {
    pub fn new(broker: Arc<dyn MessageBroker>, receive_queue: impl Into<String>) -> Self {
        Self {
            broker,
            receive_queue: receive_queue.into(),
        }
    }

    /// Parses, re-encodes and publishes one webhook body.
    ///
    /// Returns the HTTP status and the JSON response body: the canonical
    /// event on success, an `{"error": ..}` object otherwise.
    pub async fn handle(&self, body: &[u8]) -> (StatusCode, Vec<u8>) {
        let event = match CallbackEvent::from_slice(body) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %describe(&e), bytes = body.len(), "rejected webhook body");
                return failure(StatusCode::BAD_REQUEST, &e);
            }
        };

        let canonical = match event.to_vec() {
            Ok(bytes) => bytes,
            Err(e) => return failure(StatusCode::INTERNAL_SERVER_ERROR, &e),
        };

        if let Err(e) = self.broker.publish(&self.receive_queue, &canonical).await {
            error!(
                error = %describe(&e),
                queue = %self.receive_queue,
                kind = %event.kind,
                event = %event.event,
                "failed to enqueue webhook"
            );
            return failure(publish_status(&e), &e);
        }

        info!(
            queue = %self.receive_queue,
            kind = %event.kind,
            event = %event.event,
            "webhook enqueued"
        );
        (StatusCode::OK, canonical)
    }
}

fn publish_status(err: &RelayError) -> StatusCode {
    match err {
        RelayError::BrokerUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        RelayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error text including the underlying cause, if any.
fn describe(err: &RelayError) -> String {
    match err.source() {
        Some(source) => format!("{err}: {source}"),
        None => err.to_string(),
    }
}

fn failure(status: StatusCode, err: &RelayError) -> (StatusCode, Vec<u8>) {
    let body = ErrorResponse {
        error: describe(err),
    };
    // Serializing a single string field cannot fail.
    (status, serde_json::to_vec(&body).unwrap_or_default())
}
