//! Process wiring: store, transport, gateway, scheduler and the engine worker.
//!
//! Every producer (transport adapter, webhook gateway, scheduler) feeds one
//! bounded queue. A single worker owns the [`ChoreEngine`] and handles the
//! queued events strictly one after another.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::channels::{self, InboundMessage, Outbox};
use crate::config::{ChoreConfig, ValidationSeverity};
use crate::engine::{ChoreEngine, EngineEvent};
use crate::scheduler::TriggerScheduler;
use crate::store::{ChoreStore, SqliteChoreStore};

/// Handle queued events until every sender is gone. Handler errors are
/// logged and the loop continues.
pub async fn run_worker(mut engine: ChoreEngine, mut events_rx: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events_rx.recv().await {
        let at = event.at();
        if let Err(e) = engine.handle_event(event).await {
            error!(%at, "event handling failed: {e}");
        }
    }
    debug!("engine queue closed, worker stopping");
}

/// Stamp inbound messages with their arrival time and queue them for the engine.
async fn forward_inbound(
    mut inbound_rx: mpsc::Receiver<InboundMessage>,
    events_tx: mpsc::Sender<EngineEvent>,
) {
    while let Some(message) = inbound_rx.recv().await {
        debug!(sender = %message.sender, "inbound message queued");
        let event = EngineEvent::Inbound {
            message,
            at: Utc::now(),
        };
        if events_tx.send(event).await.is_err() {
            debug!("engine queue closed, inbound forwarder stopping");
            return;
        }
    }
}

/// Log validation issues. Fails when any issue is an error.
pub fn check_config(config: &ChoreConfig) -> anyhow::Result<()> {
    let issues = config.validate();
    let has_error = issues
        .iter()
        .any(|issue| issue.severity == ValidationSeverity::Error);
    for issue in issues {
        match issue.severity {
            ValidationSeverity::Warning => warn!("{}: {}", issue.id, issue.summary),
            ValidationSeverity::Error => error!("{}: {}", issue.id, issue.summary),
        }
    }
    if has_error {
        anyhow::bail!("configuration has blocking errors");
    }
    Ok(())
}

/// Run the service until interrupted.
pub async fn run(config: ChoreConfig) -> anyhow::Result<()> {
    check_config(&config)?;

    let store: Arc<dyn ChoreStore> = Arc::new(SqliteChoreStore::open(&config.store.path)?);
    info!(path = %config.store.path.display(), "store opened");

    let (gateway, whatsapp) = channels::build_transport(&config.messaging);
    let outbox = Arc::new(Outbox::new(
        gateway.clone(),
        config.messaging.rate_limit_per_minute,
        config.messaging.group.clone(),
    ));

    let queue_size = config.messaging.queue_size.max(1);
    let (events_tx, events_rx) = mpsc::channel::<EngineEvent>(queue_size);
    let (inbound_tx, inbound_rx) = mpsc::channel::<InboundMessage>(queue_size);

    let mut workers = JoinSet::new();

    {
        let gateway = gateway.clone();
        let tx = inbound_tx.clone();
        workers.spawn(async move {
            let mut backoff_secs = 2u64;
            loop {
                match gateway.run(tx.clone()).await {
                    Ok(()) => {
                        // Push-based transports return at once and receive via the webhook gateway.
                        debug!(transport = gateway.id(), "transport receive loop returned");
                        return;
                    }
                    Err(e) => {
                        warn!(
                            transport = gateway.id(),
                            "transport failed: {e}; retrying in {backoff_secs}s"
                        );
                    }
                }
                tokio::time::sleep(std::time::Duration::from_secs(backoff_secs)).await;
                backoff_secs = backoff_secs.saturating_mul(2).min(60);
            }
        });
    }

    if config.messaging.gateway.enabled {
        let gateway_cfg = config.messaging.gateway.clone();
        let tx = inbound_tx.clone();
        workers.spawn(async move {
            if let Err(e) = channels::gateway::run_gateway(gateway_cfg, whatsapp, tx).await {
                error!("webhook gateway stopped: {e}");
            }
        });
    }
    drop(inbound_tx);

    {
        let tx = events_tx.clone();
        workers.spawn(forward_inbound(inbound_rx, tx));
    }

    let scheduler_handle = if config.schedule.enabled {
        let scheduler = TriggerScheduler::new(config.schedule.triggers(), events_tx.clone())
            .with_tick_secs(config.schedule.tick_secs);
        Some(scheduler.run())
    } else {
        info!("automatic triggers disabled");
        None
    };
    drop(events_tx);

    match gateway.health_check().await {
        Ok(true) => info!(transport = gateway.id(), "transport healthy"),
        Ok(false) => warn!(transport = gateway.id(), "transport reports unhealthy"),
        Err(e) => warn!(transport = gateway.id(), "transport health check failed: {e}"),
    }

    let engine = ChoreEngine::new(store, outbox, &config);
    let worker = tokio::spawn(run_worker(engine, events_rx));
    info!(transport = gateway.id(), "chorewheel running");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("cannot listen for shutdown signal: {e}");
            }
            info!("shutdown requested");
        }
        result = worker => {
            if let Err(e) = result {
                error!("engine worker ended abnormally: {e}");
            }
        }
    }

    if let Some(handle) = scheduler_handle {
        handle.abort();
    }
    workers.shutdown().await;
    Ok(())
}
