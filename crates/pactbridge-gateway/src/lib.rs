// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP front door for platform webhooks.
//!
//! Every request other than `GET /health` is treated as a callback: the body
//! is parsed as a [`CallbackEvent`](pactbridge_core::CallbackEvent),
//! re-encoded canonically and published to the receive queue. The caller
//! gets 200 with the canonical body once the publish succeeded, 400 for a
//! body that is not JSON or has a wrongly typed field, 413 when it exceeds
//! the configured limit and a 5xx when the broker refused it.

pub mod handlers;
pub mod ingest;
pub mod server;

pub use ingest::WebhookIngestor;
pub use server::{GatewayState, bind, build_router, serve};
