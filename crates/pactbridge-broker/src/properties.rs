// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use lapin::BasicProperties;

/// AMQP delivery mode for messages the broker may drop on restart.
pub(crate) const TRANSIENT: u8 = 1;

/// Content type stamped on every relayed message.
pub(crate) const JSON_CONTENT_TYPE: &str = "application/json";

/// Properties for one outgoing message: JSON, transient, stamped with the
/// send time in whole seconds since the epoch.
pub fn publish_properties(sent_at: chrono::DateTime<chrono::Utc>) -> BasicProperties {
    let timestamp = u64::try_from(sent_at.timestamp()).unwrap_or_default();
    BasicProperties::default()
        .with_content_type(JSON_CONTENT_TYPE.into())
        .with_delivery_mode(TRANSIENT)
        .with_timestamp(timestamp)
}
