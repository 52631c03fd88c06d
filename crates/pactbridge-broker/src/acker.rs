// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;
use lapin::acker::Acker;
use lapin::options::{BasicAckOptions, BasicRejectOptions};
use pactbridge_core::{Acknowledger, RelayError};

/// Settles a lapin delivery on the channel it arrived on.
pub(crate) struct LapinAcker(pub(crate) Acker);

#[async_trait]
impl Acknowledger for LapinAcker {
    async fn ack(&self) -> Result<(), RelayError> {
        self.0
            .ack(BasicAckOptions::default())
            .await
            .map_err(|e| RelayError::broker("ack failed", e))
    }

    async fn reject(&self, requeue: bool) -> Result<(), RelayError> {
        self.0
            .reject(BasicRejectOptions { requeue })
            .await
            .map_err(|e| RelayError::broker("reject failed", e))
    }
}
