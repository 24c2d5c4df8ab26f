// DANS : src/listener/subscription.rs

use super::{
    PoolEvent,
    messages::{LogsNotification, StreamMessage, parse_message, subscribe_request, unsubscribe_request},
    seen::SeenSignatures,
};
use crate::{
    config::{Commitment, Config},
    monitoring::PipelineStats,
};
use anyhow::{Context, Result, bail};
use chrono::Local;
use futures_util::{SinkExt, StreamExt};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::{
    str::FromStr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch},
    time::sleep,
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct ListenerSettings {
    pub ws_url: String,
    pub program: Pubkey,
    pub commitment: Commitment,
    pub marker: String,
    pub reconnect_delay: Duration,
    pub seen_ttl: Duration,
    pub seen_limit: usize,
}

impl ListenerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ws_url: config.solana_websocket_client.clone(),
            program: config.raydium_pool_address,
            commitment: config.commitment,
            marker: config.log_instruction.clone(),
            reconnect_delay: config.reconnect_delay(),
            seen_ttl: config.seen_signatures_ttl(),
            seen_limit: config.seen_signatures_limit,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Shutdown,
    Disconnected,
    DispatcherGone,
}

/// Maintient l'abonnement `logsSubscribe` et pousse chaque nouvelle création
/// de pool dans le canal du dispatcher. Seul propriétaire de `SeenSignatures`.
pub struct SubscriptionManager {
    settings: ListenerSettings,
    seen: SeenSignatures,
    stats: Arc<PipelineStats>,
    events: mpsc::Sender<PoolEvent>,
    next_request_id: u64,
}

impl SubscriptionManager {
    pub fn new(settings: ListenerSettings, stats: Arc<PipelineStats>, events: mpsc::Sender<PoolEvent>) -> Self {
        let seen = SeenSignatures::new(settings.seen_ttl, settings.seen_limit);
        Self {
            settings,
            seen,
            stats,
            events,
            next_request_id: 0,
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_request_id += 1;
        self.next_request_id
    }

    /// Boucle connexion → abonnement → lecture, relancée indéfiniment après
    /// chaque coupure. Ne se termine que sur demande d'arrêt.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            match self.session(&mut shutdown).await {
                Ok(SessionEnd::Shutdown) => {
                    info!("[Listener] Arrêt demandé, écoute terminée.");
                    return Ok(());
                }
                Ok(SessionEnd::DispatcherGone) => {
                    warn!("[Listener] Canal du dispatcher fermé, écoute terminée.");
                    return Ok(());
                }
                Ok(SessionEnd::Disconnected) => {
                    warn!("[Listener] Connexion websocket fermée, reconnexion.");
                }
                Err(e) => {
                    error!(error = ?e, "[Listener] Erreur websocket, reconnexion.");
                }
            }

            tokio::select! {
                _ = sleep(self.settings.reconnect_delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn session(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<SessionEnd> {
        let (mut ws, _response) = connect_async(self.settings.ws_url.as_str())
            .await
            .with_context(|| format!("Connexion à {} échouée", self.settings.ws_url))?;

        let subscribe_id = self.next_id();
        let request = subscribe_request(subscribe_id, &self.settings.program, self.settings.commitment);
        ws.send(Message::Text(request.into()))
            .await
            .context("Envoi de logsSubscribe échoué")?;
        info!(
            program = %self.settings.program,
            commitment = self.settings.commitment.as_str(),
            "[Listener] Connecté, abonnement envoyé."
        );

        let mut subscription: Option<u64> = None;
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        self.unsubscribe(&mut ws, subscription).await;
                        return Ok(SessionEnd::Shutdown);
                    }
                }
                message = ws.next() => match message {
                    Some(Ok(Message::Text(text))) => match parse_message(&text) {
                        StreamMessage::Ack { id, subscription: sub } if id == subscribe_id => {
                            info!(subscription = sub, "[Listener] Abonnement réussi.");
                            subscription = Some(sub);
                        }
                        StreamMessage::Error { message, .. } if subscription.is_none() => {
                            bail!("Abonnement refusé : {}", message);
                        }
                        StreamMessage::Error { message, .. } => {
                            warn!(message = %message, "[Listener] Erreur renvoyée par le nœud.");
                        }
                        StreamMessage::Logs(notification) => {
                            if let Some(event) = self.admit(&notification, Instant::now()) {
                                match forward(&self.events, event, shutdown).await {
                                    Forwarded::Delivered => {}
                                    Forwarded::DispatcherGone => return Ok(SessionEnd::DispatcherGone),
                                    Forwarded::Shutdown => {
                                        warn!("[Listener] Arrêt pendant que le dispatcher était saturé, événement abandonné.");
                                        self.unsubscribe(&mut ws, subscription).await;
                                        return Ok(SessionEnd::Shutdown);
                                    }
                                }
                            }
                        }
                        StreamMessage::Ack { .. } | StreamMessage::Other => {}
                    },
                    Some(Ok(Message::Ping(payload))) => {
                        ws.send(Message::Pong(payload)).await.context("Envoi du pong échoué")?;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        warn!(?frame, "[Listener] Le nœud a fermé la connexion.");
                        return Ok(SessionEnd::Disconnected);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e).context("Flux websocket en erreur"),
                    None => return Ok(SessionEnd::Disconnected),
                },
            }
        }
    }

    async fn unsubscribe(&mut self, ws: &mut WsStream, subscription: Option<u64>) {
        if let Some(subscription) = subscription {
            let id = self.next_id();
            match ws.send(Message::Text(unsubscribe_request(id, subscription).into())).await {
                Ok(()) => info!(subscription, "[Listener] Désabonnement envoyé."),
                Err(e) => warn!(error = %e, "[Listener] Désabonnement impossible."),
            }
        }
        let _ = ws.close(None).await;
    }

    /// Règle d'admission : transaction réussie, marqueur présent dans les logs,
    /// signature valide et jamais vue.
    fn admit(&mut self, notification: &LogsNotification, now: Instant) -> Option<PoolEvent> {
        self.stats.notifications_seen.inc();
        if notification.failed || !notification.mentions(&self.settings.marker) {
            return None;
        }
        let signature = match Signature::from_str(&notification.signature) {
            Ok(signature) => signature,
            Err(e) => {
                warn!(signature = %notification.signature, error = %e, "[Listener] Signature illisible.");
                return None;
            }
        };
        if !self.seen.check_and_insert(signature, now) {
            self.stats.duplicates_skipped.inc();
            debug!(%signature, "[Listener] Signature déjà traitée, ignorée.");
            return None;
        }
        info!(%signature, tx = %format!("https://solscan.io/tx/{}", signature), "[Listener] Nouveau pool détecté.");
        Some(PoolEvent {
            signature,
            observed_at: Local::now(),
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Forwarded {
    Delivered,
    DispatcherGone,
    Shutdown,
}

/// Remise au dispatcher. Un canal plein ne doit pas masquer l'arrêt.
async fn forward(
    events: &mpsc::Sender<PoolEvent>,
    event: PoolEvent,
    shutdown: &mut watch::Receiver<bool>,
) -> Forwarded {
    let send = events.send(event);
    tokio::pin!(send);
    loop {
        tokio::select! {
            sent = &mut send => {
                return if sent.is_ok() { Forwarded::Delivered } else { Forwarded::DispatcherGone };
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return Forwarded::Shutdown;
                }
            }
        }
    }
}
