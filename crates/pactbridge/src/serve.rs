// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `pactbridge serve` command implementation.
//!
//! Connects to the broker, declares the three queues, then runs the webhook
//! gateway and both queue workers until a shutdown signal arrives or one of
//! them fails.

use std::sync::Arc;

use pactbridge_broker::AmqpBroker;
use pactbridge_config::PactbridgeConfig;
use pactbridge_config::model::LogConfig;
use pactbridge_core::{ConversationApi, MessageBroker, PluginAdapter, RelayError};
use pactbridge_gateway::{GatewayState, WebhookIngestor};
use pactbridge_pact::PactAdapter;
use pactbridge_relay::{build_workers, shutdown};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Runs the `pactbridge serve` command.
pub async fn run_serve(config: PactbridgeConfig) -> Result<(), RelayError> {
    init_tracing(&config.log);

    info!(version = env!("CARGO_PKG_VERSION"), "starting pactbridge serve");

    let cancel = shutdown::install_signal_handler();

    let api: Arc<dyn ConversationApi> = Arc::new(PactAdapter::new(&config.pact)?);

    let broker = Arc::new(AmqpBroker::connect(&config.broker).await?);
    for queue in config.broker.queues() {
        broker.declare(queue).await?;
    }
    info!(queues = ?config.broker.queues(), "queues declared");

    for adapter in [broker.as_ref() as &dyn PluginAdapter, api.as_ref()] {
        let health = adapter.health_check().await?;
        info!(
            adapter = adapter.name(),
            kind = ?adapter.adapter_type(),
            version = %adapter.version(),
            ?health,
            "adapter ready"
        );
    }

    let result = match pactbridge_gateway::bind(&config.gateway).await {
        Ok(listener) => run_relay(&config, broker.clone(), api, listener, cancel).await,
        Err(e) => Err(e),
    };

    if let Err(e) = broker.shutdown().await {
        warn!(error = %e, "broker shutdown failed");
    }

    info!("pactbridge serve shutdown complete");
    result
}

/// Runs the gateway and both workers until `cancel` fires.
///
/// The first task to fail, or to stop on its own, cancels the others; its
/// error is returned once every task has drained.
pub async fn run_relay(
    config: &PactbridgeConfig,
    broker: Arc<dyn MessageBroker>,
    api: Arc<dyn ConversationApi>,
    listener: TcpListener,
    cancel: CancellationToken,
) -> Result<(), RelayError> {
    let mut tasks: JoinSet<(&'static str, Result<(), RelayError>)> = JoinSet::new();

    let ingestor = WebhookIngestor::new(broker.clone(), config.broker.receive_queue.clone());
    let app = pactbridge_gateway::build_router(
        GatewayState::new(ingestor),
        config.gateway.max_body_bytes,
    );
    let gateway_cancel = cancel.clone();
    tasks.spawn(async move {
        (
            "gateway",
            pactbridge_gateway::serve(listener, app, gateway_cancel).await,
        )
    });

    let [send, identifier] = build_workers(config, broker, api);
    for (name, worker) in [("send-worker", send), ("identifier-worker", identifier)] {
        let worker_cancel = cancel.clone();
        tasks.spawn(async move { (name, worker.run(worker_cancel).await) });
    }

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let (task, result) = match joined {
            Ok(outcome) => outcome,
            Err(e) => ("task", Err(RelayError::Internal(format!("relay task aborted: {e}")))),
        };
        let result = match result {
            Ok(()) if !cancel.is_cancelled() => Err(RelayError::Internal(format!(
                "{task} stopped before shutdown"
            ))),
            other => other,
        };
        if let Err(e) = result {
            error!(task, error = %e, "relay task failed, shutting down");
            cancel.cancel();
            first_error.get_or_insert(e);
        }
    }

    first_error.map_or(Ok(()), Err)
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
fn init_tracing(log: &LogConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pactbridge={},warn", log.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false);

    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
