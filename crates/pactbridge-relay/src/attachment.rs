// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data URI decoding for outbound attachments.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use pactbridge_core::{Attachment, AttachmentUpload, RelayError};

/// Decodes the base64 payload of a `data:<mime>;base64,<payload>` string.
///
/// Everything after the first comma is the payload. A string without a
/// comma is decoded whole.
pub fn decode_data_uri(src: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let payload = src.split_once(',').map_or(src, |(_, payload)| payload);
    STANDARD.decode(payload.trim())
}

/// Turns a queued attachment into an upload, keeping its declared name and type.
pub fn to_upload(attachment: &Attachment) -> Result<AttachmentUpload, RelayError> {
    let bytes = decode_data_uri(&attachment.src).map_err(|e| RelayError::AttachmentDecode {
        name: attachment.name.clone(),
        source: Box::new(e),
    })?;
    Ok(AttachmentUpload {
        file_name: attachment.name.clone(),
        mime_type: attachment.mime_type.clone(),
        bytes,
    })
}
