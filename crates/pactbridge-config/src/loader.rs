// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./pactbridge.toml` > `~/.config/pactbridge/pactbridge.toml`
//! > `/etc/pactbridge/pactbridge.toml`, with environment variable overrides via the
//! `PACTBRIDGE_` prefix and the variable names of the deployment this replaces.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::PactbridgeConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/pactbridge/pactbridge.toml";

/// Config file in the working directory.
pub const LOCAL_CONFIG_PATH: &str = "pactbridge.toml";

/// Top-level sections reachable through `PACTBRIDGE_<SECTION>_<KEY>`.
const SECTIONS: &[&str] = &["log", "broker", "pact", "gateway", "worker"];

/// Unprefixed variable names still honoured, and the key each one sets.
pub const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("RABBITMQ_ERP_LOGIN", "broker.login"),
    ("RABBITMQ_ERP_PASS", "broker.password"),
    ("RABBITMQ_ERP_HOST", "broker.host"),
    ("RABBITMQ_ERP_PORT", "broker.port"),
    ("RABBITMQ_ERP_VHOST", "broker.vhost"),
    ("PACT_COMPANY_ID", "pact.company_id"),
    ("PACT_API_KEY", "pact.api_token"),
    ("PACT_LISTEN_PORT", "gateway.port"),
];

/// Path of the per-user config file, if the platform has a config dir.
pub fn user_config_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|d| d.join("pactbridge").join("pactbridge.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/pactbridge/pactbridge.toml` (system-wide)
/// 3. `~/.config/pactbridge/pactbridge.toml` (user XDG config)
/// 4. `./pactbridge.toml` (local directory)
/// 5. Legacy unprefixed variables (`RABBITMQ_ERP_*`, `PACT_*`)
/// 6. `PACTBRIDGE_*` environment variables
pub fn load_config() -> Result<PactbridgeConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no environment).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<PactbridgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PactbridgeConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PactbridgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PactbridgeConfig::default()))
        .merge(Toml::file(path))
        .merge(legacy_env_provider())
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new()
        .merge(Serialized::defaults(PactbridgeConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH));
    if let Some(user) = user_config_path() {
        figment = figment.merge(Toml::file(user));
    }
    figment
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(legacy_env_provider())
        .merge(env_provider())
}

/// Maps `PACTBRIDGE_<SECTION>_<KEY>` to `<section>.<key>`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `PACTBRIDGE_BROKER_SEND_QUEUE` maps to `broker.send_queue`.
fn env_provider() -> Env {
    Env::prefixed("PACTBRIDGE_").map(|key| section_key(key.as_str()).into())
}

fn section_key(key: &str) -> String {
    let lower = key.to_ascii_lowercase();
    SECTIONS
        .iter()
        .find_map(|section| {
            lower
                .strip_prefix(section)
                .and_then(|rest| rest.strip_prefix('_'))
                .map(|field| format!("{section}.{field}"))
        })
        .unwrap_or(lower)
}

/// Environment provider for the legacy unprefixed variable names.
fn legacy_env_provider() -> Env {
    let names: Vec<&str> = LEGACY_ENV_KEYS.iter().map(|(name, _)| *name).collect();
    Env::raw().only(&names).map(|key| {
        LEGACY_ENV_KEYS
            .iter()
            .find(|(name, _)| key.as_str().eq_ignore_ascii_case(name))
            .map(|(_, target)| (*target).to_string())
            .unwrap_or_else(|| key.as_str().to_ascii_lowercase())
            .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_key_splits_on_first_underscore_only() {
        assert_eq!(section_key("BROKER_SEND_QUEUE"), "broker.send_queue");
        assert_eq!(section_key("pact_api_token"), "pact.api_token");
        assert_eq!(section_key("WORKER_MAX_BACKOFF_MS"), "worker.max_backoff_ms");
        assert_eq!(section_key("LOG_JSON"), "log.json");
    }

    #[test]
    fn section_key_leaves_unknown_sections_alone() {
        assert_eq!(section_key("UNKNOWN_THING"), "unknown_thing");
    }

    #[test]
    fn every_legacy_key_targets_a_known_section() {
        for (_, target) in LEGACY_ENV_KEYS {
            let section = target.split('.').next().unwrap();
            assert!(SECTIONS.contains(&section), "{target}");
        }
    }
}
