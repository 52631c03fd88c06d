// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Pactbridge integration tests.
//!
//! Provides mock adapters for fast, deterministic, CI-runnable tests
//! without a running broker or the Pact API.
//!
//! # Components
//!
//! - [`MemoryBroker`] - In-process queues with publish capture and settle log
//! - [`MockConversationApi`] - Scripted conversation API with a call log

pub mod memory_broker;
pub mod mock_api;

pub use memory_broker::{MemoryBroker, Outcome};
pub use mock_api::{sample_conversation, ApiCall, MockConversationApi};
