// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Pactbridge relay.

use strum::Display;
use thiserror::Error;

/// The primary error type used across all Pactbridge components.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Malformed inbound JSON or queue payload.
    #[error("decode error: {message}")]
    Decode {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An attachment `src` that is not valid base64 after the data URI prefix.
    #[error("attachment `{name}` could not be decoded: {source}")]
    AttachmentDecode {
        name: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Broker connection or channel failure.
    #[error("broker unavailable: {message}")]
    BrokerUnavailable {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Non-2xx response or network failure from the messaging platform.
    #[error("external API error: {message}")]
    ExternalApi {
        message: String,
        /// HTTP status, when the platform answered at all.
        status: Option<u16>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// What a queue worker does with a delivery whose processing failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Disposition {
    /// Reject without requeue; reprocessing can never succeed.
    Drop,
    /// Back off, then hand the delivery back to the broker for redelivery.
    Retry,
}

impl RelayError {
    /// Shorthand for a [`RelayError::Decode`] from any error source.
    pub fn decode(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Decode {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Shorthand for a [`RelayError::BrokerUnavailable`] from any error source.
    pub fn broker(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::BrokerUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Classifies the error for the queue workers.
    ///
    /// Payload-level failures are deterministic and would loop forever if
    /// requeued; everything else is assumed transient.
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::Decode { .. } | Self::AttachmentDecode { .. } => Disposition::Drop,
            _ => Disposition::Retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_errors_are_dropped() {
        let err = RelayError::Decode {
            message: "bad json".into(),
            source: None,
        };
        assert_eq!(err.disposition(), Disposition::Drop);

        let err = RelayError::AttachmentDecode {
            name: "a.png".into(),
            source: Box::new(std::io::Error::other("invalid byte")),
        };
        assert_eq!(err.disposition(), Disposition::Drop);
    }

    #[test]
    fn transport_errors_are_retried() {
        let errors = [
            RelayError::BrokerUnavailable {
                message: "connection reset".into(),
                source: None,
            },
            RelayError::ExternalApi {
                message: "500".into(),
                status: Some(500),
                source: None,
            },
            RelayError::Timeout {
                duration: std::time::Duration::from_secs(30),
            },
            RelayError::Internal("oops".into()),
        ];
        for err in &errors {
            assert_eq!(err.disposition(), Disposition::Retry, "{err}");
        }
    }

    #[test]
    fn disposition_display() {
        assert_eq!(Disposition::Drop.to_string(), "drop");
        assert_eq!(Disposition::Retry.to_string(), "retry");
    }

    #[test]
    fn attachment_error_names_the_file() {
        let err = RelayError::AttachmentDecode {
            name: "invoice.pdf".into(),
            source: Box::new(std::io::Error::other("invalid padding")),
        };
        let msg = err.to_string();
        assert!(msg.contains("invoice.pdf"));
        assert!(msg.contains("invalid padding"));
    }
}
