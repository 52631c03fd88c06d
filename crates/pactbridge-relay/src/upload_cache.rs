// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remembers attachment uploads whose message was never posted.
//!
//! When a delivery fails after some of its attachments were uploaded, the
//! redelivered copy reuses those external ids instead of uploading the same
//! files again. Entries go away once the message is posted, or when the
//! cache is full and they are the oldest.

use std::collections::{HashMap, VecDeque};

use pactbridge_core::AttachmentUpload;
use sha2::{Digest, Sha256};

/// Identity of one attachment within one outbound message.
pub fn upload_key(conversation_id: i64, position: usize, upload: &AttachmentUpload) -> String {
    let mut hasher = Sha256::new();
    hasher.update(conversation_id.to_be_bytes());
    hasher.update((position as u64).to_be_bytes());
    hasher.update((upload.file_name.len() as u64).to_be_bytes());
    hasher.update(upload.file_name.as_bytes());
    hasher.update(&upload.bytes);
    hex::encode(hasher.finalize())
}

/// Bounded map from [`upload_key`] to the platform's external id.
#[derive(Debug)]
pub struct UploadCache {
    capacity: usize,
    ids: HashMap<String, i64>,
    order: VecDeque<String>,
}

impl UploadCache {
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ids: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        self.ids.get(key).copied()
    }

    pub fn insert(&mut self, key: String, external_id: i64) {
        if self.capacity == 0 {
            return;
        }
        if self.ids.insert(key.clone(), external_id).is_none() {
            self.order.push_back(key);
        }
        while self.ids.len() > self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.ids.remove(&oldest);
                }
                None => break,
            }
        }
    }

    pub fn remove(&mut self, key: &str) {
        if self.ids.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
