// DANS : src/bin/pool_listener.rs

use anyhow::{Context, Result};
use sol_listener::{
    config::Config,
    listener::{ListenerSettings, SubscriptionManager},
    monitoring::{PipelineStats, logging, stats::log_stats_periodically},
    pipeline::{PipelineContext, run_dispatcher},
};
use std::{sync::Arc, time::Duration};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Taille du tampon entre le listener et le dispatcher.
const EVENT_CHANNEL_CAPACITY: usize = 1024;
/// Temps laissé aux tâches en cours après l'arrêt du listener.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    logging::setup_logging(config.log_path.as_deref())?;

    info!(
        program = %config.raydium_pool_address,
        commitment = config.commitment.as_str(),
        "[Main] Démarrage du listener de nouveaux pools..."
    );

    let stats = Arc::new(PipelineStats::new()?);
    let ctx = Arc::new(PipelineContext::from_config(&config, stats.clone())?);

    tokio::spawn(log_stats_periodically(stats.clone(), config.stats_interval()));

    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let dispatcher = tokio::spawn(run_dispatcher(ctx, event_rx, config.max_concurrent_events));
    let listener = tokio::spawn(
        SubscriptionManager::new(ListenerSettings::from_config(&config), stats.clone(), event_tx).run(shutdown_rx),
    );

    tokio::signal::ctrl_c()
        .await
        .context("Impossible d'écouter le signal d'arrêt")?;
    info!("[Main] Ctrl-C reçu, arrêt en cours...");
    let _ = shutdown_tx.send(true);

    match listener.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = ?e, "[Main] Le listener s'est arrêté en erreur."),
        Err(e) => error!(error = %e, "[Main] Tâche du listener interrompue."),
    }
    if tokio::time::timeout(DRAIN_TIMEOUT, dispatcher).await.is_err() {
        warn!("[Main] Des événements étaient encore en cours à l'arrêt.");
    }

    match stats.encode_text() {
        Ok(text) => debug!(metrics = %text, "[Main] Compteurs finaux."),
        Err(e) => warn!(error = ?e, "[Main] Compteurs finaux illisibles."),
    }
    info!("[Main] Arrêt terminé.");
    Ok(())
}
