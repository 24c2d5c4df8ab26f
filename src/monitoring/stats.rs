// DANS : src/monitoring/stats.rs

use crate::filtering::Gate;
use anyhow::{Context, Result};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::{sync::Arc, time::Duration};
use tracing::info;

/// Compteurs du processus. Une seule instance, créée dans `main` et partagée
/// via le `PipelineContext`. Chaque instance porte son propre `Registry`
/// (aucun enregistrement global).
pub struct PipelineStats {
    registry: Registry,
    pub notifications_seen: IntCounter,
    pub duplicates_skipped: IntCounter,
    pub events_dispatched: IntCounter,
    pub resolution_exhausted: IntCounter,
    pub no_pool_instruction: IntCounter,
    pub enrichment_failed: IntCounter,
    pub unfiltered_written: IntCounter,
    pub reported: IntCounter,
    pub persistence_failures: IntCounter,
    pub notification_failures: IntCounter,
    /// Rejets, étiquetés par `Gate::as_str()`.
    pub rejections: IntCounterVec,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub notifications_seen: u64,
    pub duplicates_skipped: u64,
    pub events_dispatched: u64,
    pub resolution_exhausted: u64,
    pub no_pool_instruction: u64,
    pub enrichment_failed: u64,
    pub rejected_name: u64,
    pub rejected_fdv: u64,
    pub rejected_liquidity: u64,
    pub rejected_mc_to_liq: u64,
    pub rejected_risk: u64,
    pub unfiltered_written: u64,
    pub reported: u64,
    pub persistence_failures: u64,
    pub notification_failures: u64,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter> {
    let counter = IntCounter::new(name, help).with_context(|| format!("Compteur {name} invalide"))?;
    registry
        .register(Box::new(counter.clone()))
        .with_context(|| format!("Enregistrement du compteur {name} échoué"))?;
    Ok(counter)
}

impl PipelineStats {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let rejections = IntCounterVec::new(
            Opts::new("sol_listener_rejections_total", "Tokens écartés, par porte"),
            &["gate"],
        )
        .context("Compteur des rejets invalide")?;
        registry
            .register(Box::new(rejections.clone()))
            .context("Enregistrement du compteur des rejets échoué")?;

        Ok(Self {
            notifications_seen: counter(
                &registry,
                "sol_listener_notifications_seen_total",
                "Notifications de logs reçues",
            )?,
            duplicates_skipped: counter(
                &registry,
                "sol_listener_duplicates_skipped_total",
                "Signatures déjà vues ignorées",
            )?,
            events_dispatched: counter(
                &registry,
                "sol_listener_events_dispatched_total",
                "Événements pris en charge par le dispatcher",
            )?,
            resolution_exhausted: counter(
                &registry,
                "sol_listener_resolution_exhausted_total",
                "Transactions jamais résolues",
            )?,
            no_pool_instruction: counter(
                &registry,
                "sol_listener_no_pool_instruction_total",
                "Transactions sans instruction de création de pool",
            )?,
            enrichment_failed: counter(
                &registry,
                "sol_listener_enrichment_failed_total",
                "Enrichissements en échec",
            )?,
            unfiltered_written: counter(
                &registry,
                "sol_listener_unfiltered_written_total",
                "Lignes écrites dans le flux non filtré",
            )?,
            reported: counter(&registry, "sol_listener_reported_total", "Tokens signalés")?,
            persistence_failures: counter(
                &registry,
                "sol_listener_persistence_failures_total",
                "Écritures d'audit en échec",
            )?,
            notification_failures: counter(
                &registry,
                "sol_listener_notification_failures_total",
                "Notifications en échec",
            )?,
            rejections,
            registry,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_rejection(&self, gate: Gate) {
        self.rejections.with_label_values(&[gate.as_str()]).inc();
    }

    pub fn rejected(&self, gate: Gate) -> u64 {
        self.rejections.with_label_values(&[gate.as_str()]).get()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            notifications_seen: self.notifications_seen.get(),
            duplicates_skipped: self.duplicates_skipped.get(),
            events_dispatched: self.events_dispatched.get(),
            resolution_exhausted: self.resolution_exhausted.get(),
            no_pool_instruction: self.no_pool_instruction.get(),
            enrichment_failed: self.enrichment_failed.get(),
            rejected_name: self.rejected(Gate::NameCheck),
            rejected_fdv: self.rejected(Gate::FdvFloor),
            rejected_liquidity: self.rejected(Gate::LiquidityFloor),
            rejected_mc_to_liq: self.rejected(Gate::McToLiqFloor),
            rejected_risk: self.rejected(Gate::RiskGate),
            unfiltered_written: self.unfiltered_written.get(),
            reported: self.reported.get(),
            persistence_failures: self.persistence_failures.get(),
            notification_failures: self.notification_failures.get(),
        }
    }

    /// Exposition texte de Prometheus, pour le dernier résumé à l'arrêt.
    pub fn encode_text(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .context("Encodage des métriques échoué")?;
        String::from_utf8(buffer).context("Métriques non UTF-8")
    }
}

/// Tâche de fond : publie un résumé des compteurs à intervalle régulier,
/// uniquement si quelque chose a bougé depuis le dernier résumé.
pub async fn log_stats_periodically(stats: Arc<PipelineStats>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    // Le premier tick est immédiat, on le consomme.
    interval.tick().await;
    let mut last = StatsSnapshot::default();
    loop {
        interval.tick().await;
        let current = stats.snapshot();
        if current == last {
            continue;
        }
        info!(
            notifications = current.notifications_seen,
            duplicates = current.duplicates_skipped,
            dispatched = current.events_dispatched,
            exhausted = current.resolution_exhausted,
            no_pool = current.no_pool_instruction,
            enrichment_failed = current.enrichment_failed,
            rejected_name = current.rejected_name,
            rejected_fdv = current.rejected_fdv,
            rejected_liquidity = current.rejected_liquidity,
            rejected_mc_to_liq = current.rejected_mc_to_liq,
            rejected_risk = current.rejected_risk,
            unfiltered = current.unfiltered_written,
            reported = current.reported,
            persistence_failures = current.persistence_failures,
            notification_failures = current.notification_failures,
            "[Stats] Résumé du pipeline"
        );
        last = current;
    }
}
