// DANS : src/pipeline.rs

use crate::{
    config::Config,
    data_pipeline::{
        Enricher, PairMetadataProvider, TokenInfoProvider,
        api_connectors::{DefinedFiClient, RugCheckClient},
        metadata_source::build_metadata_source,
    },
    decoders::parse_pool_creation,
    filtering::{FilterPipeline, FilterThresholds, NameCheck, Rejection, RiskGate, RiskRules},
    listener::PoolEvent,
    monitoring::PipelineStats,
    output::{AuditLog, AuditStream, Notifier, OutputRecord, TelegramNotifier},
    rpc::{ResilientRpcClient, TransactionResolver},
};
use anyhow::{Context, Result};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tokio::{
    sync::{Semaphore, mpsc},
    task::JoinSet,
};
use tracing::{error, info, instrument, warn};

/// Issue d'un événement, une fois le pipeline terminé.
#[derive(Debug)]
pub enum PipelineOutcome {
    NoPoolInstruction,
    ResolutionFailed,
    EnrichmentFailed,
    Rejected(Rejection),
    Reported,
}

/// Tout ce dont un événement a besoin, construit une fois dans `main`
/// puis partagé en lecture seule entre les tâches.
pub struct PipelineContext {
    pub pool_program: Pubkey,
    pub resolver: TransactionResolver,
    pub enricher: Enricher,
    pub filters: FilterPipeline,
    pub risk_gate: RiskGate,
    pub audit: AuditLog,
    pub notifier: Arc<dyn Notifier>,
    pub stats: Arc<PipelineStats>,
}

impl PipelineContext {
    pub fn from_config(config: &Config, stats: Arc<PipelineStats>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .context("Construction du client HTTP échouée")?;

        let rpc = ResilientRpcClient::new(
            config.solana_rpc_client.clone(),
            config.commitment.to_config(),
            config.rpc_max_retries,
            config.retry_base_ms,
        );
        let resolver = TransactionResolver::new(Arc::new(rpc.clone()), config.resolve_max_attempts, config.retry_base());

        let definedfi = Arc::new(DefinedFiClient::new(
            http.clone(),
            config.definedfi_url.clone(),
            config.definedfi_api_key.clone(),
            config.definedfi_network_id,
        ));
        let token_info: Arc<dyn TokenInfoProvider> = definedfi.clone();
        let pairs: Arc<dyn PairMetadataProvider> = definedfi;
        let metadata = build_metadata_source(config.metadata_source, rpc, http.clone(), token_info);
        let enricher = Enricher::new(metadata, pairs, config.sol_token_address);

        let filters = FilterPipeline::new(
            NameCheck::new(config.name_check_enabled, &config.ban_words),
            FilterThresholds {
                min_fdv: config.min_fdv,
                max_fdv: config.max_fdv,
                min_liq: config.min_liq,
                min_mc_to_liq: config.min_mc_to_liq,
            },
        );
        let risk_gate = RiskGate::new(
            Arc::new(RugCheckClient::new(http.clone(), config.rug_checker_url.clone())),
            RiskRules {
                policy: config.risk_policy,
                max_top_holders_pct: config.max_top_holders_pct,
                excluded_holders: config.excluded_holders.iter().cloned().collect(),
            },
        );
        let notifier = Arc::new(TelegramNotifier::new(
            http,
            config.telegram_base_url.clone(),
            config.telegram_bot_token.clone(),
            config.telegram_chat_id.clone(),
        ));

        info!(
            metadata_source = ?config.metadata_source,
            risk_policy = ?config.risk_policy,
            name_check = config.name_check_enabled,
            "[Pipeline] Contexte initialisé."
        );

        Ok(Self {
            pool_program: config.raydium_pool_address,
            resolver,
            enricher,
            filters,
            risk_gate,
            audit: AuditLog::new(config.unfiltered_data_path.clone(), config.filtered_data_path.clone()),
            notifier,
            stats,
        })
    }

    /// Résolution → décodage → enrichissement → portes → sortie.
    /// Aucune erreur ne remonte : chaque issue est journalisée et comptée.
    #[instrument(name = "pipeline_process_event", skip_all, fields(signature = %event.signature))]
    pub async fn process_event(&self, event: PoolEvent) -> PipelineOutcome {
        let stats = &self.stats;
        stats.events_dispatched.inc();
        let signature = event.signature;
        let observed_at = event.observed_at;

        let transaction = match self.resolver.resolve(&signature).await {
            Ok(transaction) => transaction,
            Err(e) => {
                stats.resolution_exhausted.inc();
                warn!(%signature, error = %e, "[Pipeline] Transaction introuvable, événement abandonné.");
                return PipelineOutcome::ResolutionFailed;
            }
        };

        let pool = match parse_pool_creation(&transaction, &self.pool_program) {
            Ok(Some(pool)) => pool,
            Ok(None) => {
                stats.no_pool_instruction.inc();
                info!(%signature, "[Pipeline] Aucune instruction du programme de pool.");
                return PipelineOutcome::NoPoolInstruction;
            }
            Err(e) => {
                stats.no_pool_instruction.inc();
                warn!(%signature, error = %e, "[Pipeline] Instruction de pool inexploitable.");
                return PipelineOutcome::NoPoolInstruction;
            }
        };

        let enriched = match self.enricher.enrich(&pool).await {
            Ok(enriched) => enriched,
            Err(e) => {
                stats.enrichment_failed.inc();
                warn!(%signature, pair = %pool.pair_id, error = ?e, "[Pipeline] Enrichissement échoué, événement abandonné.");
                return PipelineOutcome::EnrichmentFailed;
            }
        };
        let token = enriched.token_address;

        let screen = match self.filters.screen(&enriched.token, &enriched.pair) {
            Ok(screen) => screen,
            Err(rejection) => return self.reject(&signature.to_string(), &token, rejection),
        };
        info!(%signature, %token, mc_to_liq = screen.mc_to_liq, "[Pipeline] Seuils de marché franchis.");

        let record = OutputRecord::new(observed_at, signature, &enriched);
        match self.audit.append(AuditStream::Unfiltered, &record).await {
            Ok(_) => stats.unfiltered_written.inc(),
            Err(e) => {
                stats.persistence_failures.inc();
                error!(%signature, %token, error = ?e, "[Pipeline] Écriture du fichier non filtré échouée.");
            }
        }

        let assessment = match self.risk_gate.check(&token).await {
            Ok(assessment) => assessment,
            Err(failure) => return self.reject(&signature.to_string(), &token, Rejection::from(failure)),
        };

        let record = record.with_risk(assessment);
        if let Err(e) = self.audit.append(AuditStream::Filtered, &record).await {
            stats.persistence_failures.inc();
            error!(%signature, %token, error = ?e, "[Pipeline] Écriture du fichier filtré échouée.");
        }
        if let Err(e) = self.notifier.notify(&record).await {
            stats.notification_failures.inc();
            warn!(%signature, %token, error = ?e, "[Pipeline] Notification échouée.");
        }

        stats.reported.inc();
        info!(%signature, %token, symbol = %record.token.symbol, "[Pipeline] Token retenu et signalé.");
        PipelineOutcome::Reported
    }

    fn reject(&self, signature: &str, token: &Pubkey, rejection: Rejection) -> PipelineOutcome {
        let gate = rejection.gate();
        self.stats.record_rejection(gate);
        info!(signature, %token, gate = gate.as_str(), reason = %rejection, "[Pipeline] Token rejeté.");
        PipelineOutcome::Rejected(rejection)
    }
}

/// Consomme les événements du listener, chacun dans sa propre tâche,
/// au plus `max_concurrent` à la fois. Se termine quand le canal est fermé
/// et que les tâches en cours sont finies.
pub async fn run_dispatcher(ctx: Arc<PipelineContext>, mut events: mpsc::Receiver<PoolEvent>, max_concurrent: usize) {
    let permits = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let mut tasks = JoinSet::new();

    while let Some(event) = events.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let ctx = ctx.clone();
        tasks.spawn(async move {
            let _permit = permit;
            ctx.process_event(event).await
        });
        while let Some(result) = tasks.try_join_next() {
            if let Err(e) = result {
                error!(error = %e, "[Dispatcher] Tâche de pipeline interrompue.");
            }
        }
    }

    info!(in_flight = tasks.len(), "[Dispatcher] Canal fermé, attente des tâches en cours.");
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            error!(error = %e, "[Dispatcher] Tâche de pipeline interrompue.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data_pipeline::{MetadataSource, PairQuote, TokenMetadata},
        decoders::{PoolAccounts, QuoteSide},
        filtering::{
            Gate, RiskFailure, RiskPolicy, RiskProvider,
            risk::{RiskEntry, RiskReport, TopHolder},
        },
        rpc::{ResolvedInstruction, ResolvedTransaction, TransactionSource},
    };
    use anyhow::{anyhow, bail};
    use async_trait::async_trait;
    use chrono::{Local, TimeZone};
    use solana_sdk::signature::Signature;
    use std::{
        path::Path,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };
    use tempfile::TempDir;

    const NATIVE_MINT: Pubkey = crate::config::WRAPPED_SOL_MINT;

    struct ScriptedSource {
        pool_program: Pubkey,
        with_pool_instruction: bool,
        fail: bool,
    }

    #[async_trait]
    impl TransactionSource for ScriptedSource {
        async fn fetch_transaction(&self, signature: &Signature) -> anyhow::Result<ResolvedTransaction> {
            if self.fail {
                bail!("transaction pas encore finalisée");
            }
            let program_id = if self.with_pool_instruction { self.pool_program } else { Pubkey::new_unique() };
            let mut accounts: Vec<Pubkey> = (0..21).map(|_| Pubkey::new_unique()).collect();
            accounts[9] = NATIVE_MINT;
            Ok(ResolvedTransaction {
                signature: *signature,
                instructions: vec![ResolvedInstruction { program_id, accounts }],
            })
        }
    }

    struct FixedMetadata {
        total_supply: String,
    }

    #[async_trait]
    impl MetadataSource for FixedMetadata {
        async fn token_metadata(&self, pool: &PoolAccounts, _token: &Pubkey) -> anyhow::Result<TokenMetadata> {
            Ok(TokenMetadata {
                symbol: "FOO".into(),
                name: "Foo".into(),
                total_supply: self.total_supply.clone(),
                creator_address: pool.deployer.to_string(),
                ..Default::default()
            })
        }
    }

    struct FixedPair {
        liquidity: Option<f64>,
    }

    #[async_trait]
    impl PairMetadataProvider for FixedPair {
        async fn pair_metadata(&self, pair_id: &Pubkey, quote: QuoteSide) -> anyhow::Result<PairQuote> {
            assert_eq!(quote, QuoteSide::Token0);
            let liquidity = self.liquidity.ok_or_else(|| anyhow!("pairMetadata nul"))?;
            Ok(PairQuote {
                pair_address: pair_id.to_string(),
                price: 0.004,
                liquidity,
            })
        }
    }

    struct CountingRisk {
        report: Result<RiskReport, RiskFailure>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RiskProvider for CountingRisk {
        async fn risk_report(&self, _token: &Pubkey) -> Result<RiskReport, RiskFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.report.clone()
        }
    }

    struct RecordingNotifier {
        sent: Mutex<Vec<OutputRecord>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, record: &OutputRecord) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(record.clone());
            if self.fail {
                bail!("Telegram a répondu 502");
            }
            Ok(())
        }
    }

    fn clean_report() -> RiskReport {
        RiskReport {
            risks: vec![RiskEntry {
                name: "Low amount of LP Providers".into(),
                description: "Only a few users are providing liquidity".into(),
            }],
            top_holders: vec![TopHolder { owner: "abc".into(), pct: 12.0 }],
        }
    }

    fn mint_authority_report() -> RiskReport {
        RiskReport {
            risks: vec![RiskEntry {
                name: "Mint Authority still enabled".into(),
                description: "More tokens can be minted by the owner".into(),
            }],
            top_holders: vec![],
        }
    }

    struct Scenario {
        with_pool_instruction: bool,
        resolve_fails: bool,
        total_supply: &'static str,
        liquidity: Option<f64>,
        report: Result<RiskReport, RiskFailure>,
        notify_fails: bool,
    }

    impl Default for Scenario {
        fn default() -> Self {
            // prix 0.004 × 1 000 000 = FDV 4000, liquidité 2500 → ratio 1.6
            Self {
                with_pool_instruction: true,
                resolve_fails: false,
                total_supply: "1000000",
                liquidity: Some(2500.0),
                report: Ok(clean_report()),
                notify_fails: false,
            }
        }
    }

    struct Harness {
        ctx: PipelineContext,
        risk: Arc<CountingRisk>,
        notifier: Arc<RecordingNotifier>,
        dir: TempDir,
    }

    impl Harness {
        fn new(scenario: Scenario) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let pool_program = Pubkey::new_unique();
            let risk = Arc::new(CountingRisk {
                report: scenario.report,
                calls: AtomicUsize::new(0),
            });
            let notifier = Arc::new(RecordingNotifier {
                sent: Mutex::new(Vec::new()),
                fail: scenario.notify_fails,
            });
            let ctx = PipelineContext {
                pool_program,
                resolver: TransactionResolver::new(
                    Arc::new(ScriptedSource {
                        pool_program,
                        with_pool_instruction: scenario.with_pool_instruction,
                        fail: scenario.resolve_fails,
                    }),
                    2,
                    Duration::ZERO,
                ),
                enricher: Enricher::new(
                    Arc::new(FixedMetadata {
                        total_supply: scenario.total_supply.into(),
                    }),
                    Arc::new(FixedPair {
                        liquidity: scenario.liquidity,
                    }),
                    NATIVE_MINT,
                ),
                filters: FilterPipeline::new(
                    NameCheck::new(false, &[]),
                    FilterThresholds {
                        min_fdv: 2000.0,
                        max_fdv: None,
                        min_liq: 1000.0,
                        min_mc_to_liq: 1.5,
                    },
                ),
                risk_gate: RiskGate::new(
                    risk.clone(),
                    RiskRules {
                        policy: RiskPolicy::MintAuthority,
                        max_top_holders_pct: 50.0,
                        excluded_holders: Default::default(),
                    },
                ),
                audit: AuditLog::new(dir.path().join("unfiltered"), dir.path().join("filtered")),
                notifier: notifier.clone(),
                stats: Arc::new(PipelineStats::new().unwrap()),
            };
            Self { ctx, risk, notifier, dir }
        }

        fn rows(&self, stream: &str) -> usize {
            rows_in(&self.dir.path().join(stream))
        }

        fn notifications(&self) -> usize {
            self.notifier.sent.lock().unwrap().len()
        }
    }

    fn rows_in(dir: &Path) -> usize {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return 0;
        };
        entries
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "csv"))
            .map(|path| csv::Reader::from_path(path).unwrap().records().count())
            .sum()
    }

    fn event() -> PoolEvent {
        PoolEvent {
            signature: Signature::new_unique(),
            observed_at: Local::now(),
        }
    }

    #[tokio::test]
    async fn a_clean_token_is_persisted_then_notified() {
        let harness = Harness::new(Scenario::default());

        let outcome = harness.ctx.process_event(event()).await;

        assert!(matches!(outcome, PipelineOutcome::Reported));
        assert_eq!(harness.rows("unfiltered"), 1);
        assert_eq!(harness.rows("filtered"), 1);
        assert_eq!(harness.notifications(), 1);
        let sent = harness.notifier.sent.lock().unwrap()[0].clone();
        assert_eq!(sent.token.symbol, "FOO");
        assert!(sent.risk.is_some());
        assert_eq!(harness.ctx.stats.snapshot().reported, 1);
    }

    #[tokio::test]
    async fn records_carry_the_observation_time_of_the_event() {
        let harness = Harness::new(Scenario::default());
        let observed_at = Local.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        let event = PoolEvent {
            signature: Signature::new_unique(),
            observed_at,
        };

        let outcome = harness.ctx.process_event(event).await;

        assert!(matches!(outcome, PipelineOutcome::Reported));
        let sent = harness.notifier.sent.lock().unwrap()[0].clone();
        assert_eq!(sent.timestamp, observed_at);
        // Le fichier du jour est celui de l'observation, pas celui du traitement.
        let date = observed_at.date_naive();
        assert!(harness.ctx.audit.path_for(AuditStream::Unfiltered, date).exists());
        assert!(harness.ctx.audit.path_for(AuditStream::Filtered, date).exists());
    }

    #[tokio::test]
    async fn fdv_below_floor_writes_nothing_and_skips_the_risk_service() {
        // FDV 400
        let harness = Harness::new(Scenario {
            total_supply: "100000",
            ..Default::default()
        });

        let outcome = harness.ctx.process_event(event()).await;

        assert!(matches!(outcome, PipelineOutcome::Rejected(Rejection::FdvBelowFloor { .. })));
        assert_eq!(harness.rows("unfiltered"), 0);
        assert_eq!(harness.rows("filtered"), 0);
        assert_eq!(harness.risk.calls.load(Ordering::SeqCst), 0);
        assert_eq!(harness.ctx.stats.snapshot().rejected_fdv, 1);
    }

    #[tokio::test]
    async fn risk_failure_keeps_the_single_unfiltered_row() {
        let harness = Harness::new(Scenario {
            report: Ok(mint_authority_report()),
            ..Default::default()
        });

        let outcome = harness.ctx.process_event(event()).await;

        let PipelineOutcome::Rejected(rejection) = outcome else {
            panic!("rejet attendu");
        };
        assert_eq!(rejection.gate(), Gate::RiskGate);
        assert_eq!(harness.rows("unfiltered"), 1);
        assert_eq!(harness.rows("filtered"), 0);
        assert_eq!(harness.notifications(), 0);
    }

    #[tokio::test]
    async fn risk_service_errors_fail_closed() {
        let harness = Harness::new(Scenario {
            report: Err(RiskFailure::ServiceUnavailable("code 500".into())),
            ..Default::default()
        });

        let outcome = harness.ctx.process_event(event()).await;

        assert!(matches!(
            outcome,
            PipelineOutcome::Rejected(Rejection::Risk(RiskFailure::ServiceUnavailable(_)))
        ));
        assert_eq!(harness.rows("filtered"), 0);
        assert_eq!(harness.notifications(), 0);
    }

    #[tokio::test]
    async fn zero_liquidity_is_rejected_without_division() {
        let harness = Harness::new(Scenario {
            liquidity: Some(0.0),
            ..Default::default()
        });

        let outcome = harness.ctx.process_event(event()).await;

        assert!(matches!(outcome, PipelineOutcome::Rejected(_)));
        assert_eq!(harness.rows("unfiltered"), 0);
        assert_eq!(harness.risk.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_pool_instruction_and_unresolvable_transactions_stop_early() {
        let harness = Harness::new(Scenario {
            with_pool_instruction: false,
            ..Default::default()
        });
        assert!(matches!(
            harness.ctx.process_event(event()).await,
            PipelineOutcome::NoPoolInstruction
        ));

        let harness = Harness::new(Scenario {
            resolve_fails: true,
            ..Default::default()
        });
        assert!(matches!(
            harness.ctx.process_event(event()).await,
            PipelineOutcome::ResolutionFailed
        ));
        assert_eq!(harness.ctx.stats.snapshot().resolution_exhausted, 1);
    }

    #[tokio::test]
    async fn missing_pair_quote_abandons_the_event() {
        let harness = Harness::new(Scenario {
            liquidity: None,
            ..Default::default()
        });
        assert!(matches!(
            harness.ctx.process_event(event()).await,
            PipelineOutcome::EnrichmentFailed
        ));
        assert_eq!(harness.rows("unfiltered"), 0);
    }

    #[tokio::test]
    async fn notification_failure_does_not_undo_persistence() {
        let harness = Harness::new(Scenario {
            notify_fails: true,
            ..Default::default()
        });

        let outcome = harness.ctx.process_event(event()).await;

        assert!(matches!(outcome, PipelineOutcome::Reported));
        assert_eq!(harness.rows("filtered"), 1);
        assert_eq!(harness.ctx.stats.snapshot().notification_failures, 1);
    }

    #[tokio::test]
    async fn dispatcher_drains_every_event_then_stops() {
        let harness = Harness::new(Scenario::default());
        let Harness { ctx, notifier, dir, .. } = harness;
        let ctx = Arc::new(ctx);
        let (tx, rx) = mpsc::channel(8);

        let dispatcher = tokio::spawn(run_dispatcher(ctx.clone(), rx, 2));
        for _ in 0..5 {
            tx.send(event()).await.unwrap();
        }
        drop(tx);
        dispatcher.await.unwrap();

        assert_eq!(ctx.stats.snapshot().events_dispatched, 5);
        assert_eq!(notifier.sent.lock().unwrap().len(), 5);
        assert_eq!(rows_in(&dir.path().join("filtered")), 5);
    }
}
