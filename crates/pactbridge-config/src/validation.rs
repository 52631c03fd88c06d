// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as required credentials, distinct queue names, and sane retry bounds.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::PactbridgeConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &PactbridgeConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // Pact credentials have no sensible default
    if config.pact.company_id.is_none() {
        errors.push(ConfigError::MissingKey {
            key: "pact.company_id".to_string(),
        });
    }

    match config.pact.api_token.as_deref() {
        None => errors.push(ConfigError::MissingKey {
            key: "pact.api_token".to_string(),
        }),
        Some(token) if token.trim().is_empty() => errors.push(ConfigError::Validation {
            message: "pact.api_token must not be empty".to_string(),
        }),
        Some(_) => {}
    }

    match url::Url::parse(&config.pact.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ConfigError::Validation {
            message: format!(
                "pact.base_url must use http or https, got `{}`",
                url.scheme()
            ),
        }),
        Err(e) => errors.push(ConfigError::Validation {
            message: format!("pact.base_url `{}` is not a valid URL: {e}", config.pact.base_url),
        }),
    }

    // An unbounded timeout lets one stalled upstream call block a worker forever
    if config.pact.timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "pact.timeout_secs must be greater than 0".to_string(),
        });
    }

    // Queue names: non-empty and pairwise distinct
    let queues = [
        ("broker.send_queue", &config.broker.send_queue),
        ("broker.identifier_queue", &config.broker.identifier_queue),
        ("broker.receive_queue", &config.broker.receive_queue),
    ];
    let mut seen = HashSet::new();
    for (key, name) in queues {
        if name.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("{key} must not be empty"),
            });
        } else if !seen.insert(name.as_str()) {
            errors.push(ConfigError::Validation {
                message: format!("{key} `{name}` is already used by another queue"),
            });
        }
    }

    if config.broker.prefetch == 0 {
        errors.push(ConfigError::Validation {
            message: "broker.prefetch must be at least 1".to_string(),
        });
    }

    if config.broker.url.is_none() {
        if config.broker.host.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: "broker.host must not be empty".to_string(),
            });
        } else if let Err(e) = config.broker.amqp_uri() {
            errors.push(ConfigError::Validation {
                message: format!("broker connection settings do not form a valid URI: {e}"),
            });
        }
    }

    if config.gateway.host.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "gateway.host must not be empty".to_string(),
        });
    }

    if config.gateway.max_body_bytes == 0 {
        errors.push(ConfigError::Validation {
            message: "gateway.max_body_bytes must be greater than 0".to_string(),
        });
    }

    if config.worker.initial_backoff_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "worker.initial_backoff_ms must be greater than 0".to_string(),
        });
    }

    if config.worker.initial_backoff_ms > config.worker.max_backoff_ms {
        errors.push(ConfigError::Validation {
            message: format!(
                "worker.initial_backoff_ms ({}) must not exceed worker.max_backoff_ms ({})",
                config.worker.initial_backoff_ms, config.worker.max_backoff_ms
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
