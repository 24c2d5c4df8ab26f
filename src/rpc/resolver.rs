// DANS : src/rpc/resolver.rs

use super::transaction::ResolvedTransaction;
use async_trait::async_trait;
use solana_sdk::signature::Signature;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::time::sleep;
use tracing::warn;

/// Tout ce qui sait récupérer une transaction complète par sa signature.
/// Implémenté par `ResilientRpcClient` ; remplacé par des doublures en test.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    async fn fetch_transaction(&self, signature: &Signature) -> anyhow::Result<ResolvedTransaction>;
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("résolution épuisée pour {signature} après {attempts} tentatives : {last_error}")]
    Exhausted {
        signature: Signature,
        attempts: u32,
        last_error: String,
    },
}

/// Récupère une transaction avec un backoff exponentiel :
/// la tentative `i` (à partir de 0) attend `2^i` unités avant de recommencer.
pub struct TransactionResolver {
    source: Arc<dyn TransactionSource>,
    max_attempts: u32,
    base_delay: Duration,
}

impl TransactionResolver {
    pub fn new(source: Arc<dyn TransactionSource>, max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            source,
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(20))
    }

    /// Toute erreur (réseau, transaction pas encore finalisée, rate limit) est retentée.
    /// L'attente suit aussi le dernier échec, le temps total avant abandon vaut donc
    /// `2^0 + ... + 2^(n-1)` unités.
    pub async fn resolve(&self, signature: &Signature) -> Result<ResolvedTransaction, ResolveError> {
        let mut last_error = String::new();
        for attempt in 0..self.max_attempts {
            match self.source.fetch_transaction(signature).await {
                Ok(transaction) => return Ok(transaction),
                Err(e) => {
                    let wait = self.backoff_delay(attempt);
                    warn!(
                        signature = %signature,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "[Resolver] Récupération de la transaction échouée, nouvel essai après backoff"
                    );
                    last_error = format!("{:#}", e);
                    sleep(wait).await;
                }
            }
        }
        Err(ResolveError::Exhausted {
            signature: *signature,
            attempts: self.max_attempts,
            last_error,
        })
    }
}
