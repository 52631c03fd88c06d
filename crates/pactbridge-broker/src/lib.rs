// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AMQP 0-9-1 broker gateway for the Pactbridge relay.
//!
//! [`AmqpBroker`] is the sole owner of the broker connection. It is built
//! once at startup and shared by handle with the webhook gateway and the
//! queue workers. Publishes go through one confirm-mode channel guarded by
//! a mutex; each consumer gets its own channel with basic QoS applied.

mod acker;
mod amqp;
mod properties;

pub use amqp::AmqpBroker;
pub use properties::publish_properties;
