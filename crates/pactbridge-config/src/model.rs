// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Pactbridge relay.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Deserializer, Serialize};

/// Top-level Pactbridge configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// Every section except the Pact credentials has a usable default.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PactbridgeConfig {
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,

    /// RabbitMQ connection and queue topology.
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Pact REST API settings.
    #[serde(default)]
    pub pact: PactConfig,

    /// Webhook HTTP listener settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Queue worker retry settings.
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Accepts a string, or a number/bool rendered as a string.
///
/// Environment values such as `RABBITMQ_ERP_PASS=1234` reach serde as
/// integers, so plain `String` fields would reject them.
fn string_like<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        Uint(u64),
        Float(f64),
        Bool(bool),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Uint(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
        Raw::Bool(b) => b.to_string(),
    })
}

fn opt_string_like<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "string_like")] String);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|Wrapper(s)| s))
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit one JSON object per line instead of the human format.
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// RabbitMQ connection and queue configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BrokerConfig {
    /// Full AMQP URI. Takes precedence over the individual connection fields.
    #[serde(default, deserialize_with = "opt_string_like")]
    pub url: Option<String>,

    #[serde(default = "default_broker_host", deserialize_with = "string_like")]
    pub host: String,

    #[serde(default = "default_broker_port")]
    pub port: u16,

    #[serde(default = "default_broker_credential", deserialize_with = "string_like")]
    pub login: String,

    #[serde(default = "default_broker_credential", deserialize_with = "string_like")]
    pub password: String,

    #[serde(default = "default_vhost", deserialize_with = "string_like")]
    pub vhost: String,

    /// Outbound message requests.
    #[serde(default = "default_send_queue")]
    pub send_queue: String,

    /// Identifier-resolution requests.
    #[serde(default = "default_identifier_queue")]
    pub identifier_queue: String,

    /// Relayed webhooks and synthesized account events.
    #[serde(default = "default_receive_queue")]
    pub receive_queue: String,

    /// Unacknowledged deliveries the broker may hand each consumer.
    #[serde(default = "default_prefetch")]
    pub prefetch: u16,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: default_broker_host(),
            port: default_broker_port(),
            login: default_broker_credential(),
            password: default_broker_credential(),
            vhost: default_vhost(),
            send_queue: default_send_queue(),
            identifier_queue: default_identifier_queue(),
            receive_queue: default_receive_queue(),
            prefetch: default_prefetch(),
        }
    }
}

impl std::fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("url", &self.url.as_ref().map(|_| "[redacted]"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("login", &self.login)
            .field("password", &"[redacted]")
            .field("vhost", &self.vhost)
            .field("send_queue", &self.send_queue)
            .field("identifier_queue", &self.identifier_queue)
            .field("receive_queue", &self.receive_queue)
            .field("prefetch", &self.prefetch)
            .finish()
    }
}

impl BrokerConfig {
    /// The AMQP URI to connect to.
    ///
    /// Built from the individual fields unless `url` is set. Credentials and
    /// the vhost are percent-encoded, so the default vhost `/` becomes `%2F`.
    pub fn amqp_uri(&self) -> Result<String, url::ParseError> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }

        let mut uri = url::Url::parse(&format!("amqp://{}:{}", self.host, self.port))?;
        // Both setters only fail for cannot-be-a-base URLs, which `amqp://host` is not.
        let _ = uri.set_username(&self.login);
        let _ = uri.set_password(Some(&self.password));
        uri.set_path(&format!("/{}", self.vhost.replace('/', "%2F")));
        Ok(uri.to_string())
    }

    /// Queue names in declaration order.
    pub fn queues(&self) -> [&str; 3] {
        [&self.send_queue, &self.identifier_queue, &self.receive_queue]
    }
}

fn default_broker_host() -> String {
    "127.0.0.1".to_string()
}

fn default_broker_port() -> u16 {
    5672
}

fn default_broker_credential() -> String {
    "guest".to_string()
}

fn default_vhost() -> String {
    "/".to_string()
}

fn default_send_queue() -> String {
    "erp_send_message".to_string()
}

fn default_identifier_queue() -> String {
    "erp_send_identifier".to_string()
}

fn default_receive_queue() -> String {
    "pact_receive_callback".to_string()
}

fn default_prefetch() -> u16 {
    1
}

/// Pact REST API configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PactConfig {
    /// API origin; `/p1/companies/{company_id}` is appended per call.
    #[serde(default = "default_pact_base_url")]
    pub base_url: String,

    /// Company the deployment acts for. Required.
    #[serde(default)]
    pub company_id: Option<u64>,

    /// Sent as `X-Private-Api-Token`. Required.
    #[serde(default, deserialize_with = "opt_string_like")]
    pub api_token: Option<String>,

    /// Per-request timeout for every Pact call.
    #[serde(default = "default_pact_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PactConfig {
    fn default() -> Self {
        Self {
            base_url: default_pact_base_url(),
            company_id: None,
            api_token: None,
            timeout_secs: default_pact_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for PactConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PactConfig")
            .field("base_url", &self.base_url)
            .field("company_id", &self.company_id)
            .field("api_token", &self.api_token.as_ref().map(|_| "[redacted]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_pact_base_url() -> String {
    "https://api.pact.im".to_string()
}

fn default_pact_timeout_secs() -> u64 {
    30
}

/// Webhook HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Largest webhook body accepted, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_gateway_host() -> String {
    "0.0.0.0".to_string()
}

fn default_gateway_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

/// Queue worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// First delay after a transient failure.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Cap for the doubling backoff.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Uploaded attachments remembered across redeliveries.
    #[serde(default = "default_upload_cache_capacity")]
    pub upload_cache_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            upload_cache_capacity: default_upload_cache_capacity(),
        }
    }
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_upload_cache_capacity() -> usize {
    1024
}
