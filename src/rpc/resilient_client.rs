// DANS : src/rpc/resilient_client.rs

use super::{resolver::TransactionSource, transaction::ResolvedTransaction};
use anyhow::{Context, Result};
use async_trait::async_trait;
use solana_account_decoder::parse_token::UiTokenAmount;
use solana_client::{
    client_error::{ClientError, ClientErrorKind},
    nonblocking::rpc_client::RpcClient,
    rpc_config::RpcTransactionConfig,
};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey, signature::Signature};
use solana_transaction_status::UiTransactionEncoding;
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::debug;

/// Un "wrapper" autour du RpcClient de Solana qui ajoute une logique de
/// ré-essai automatique pour les appels RPC qui échouent à cause d'erreurs réseau temporaires.
#[derive(Clone)]
pub struct ResilientRpcClient {
    client: Arc<RpcClient>,
    max_retries: u8,
    delay_ms: u64,
}

impl ResilientRpcClient {
    pub fn new(rpc_url: String, commitment: CommitmentConfig, max_retries: u8, delay_ms: u64) -> Self {
        Self {
            client: Arc::new(RpcClient::new_with_commitment(rpc_url, commitment)),
            max_retries,
            delay_ms,
        }
    }

    pub fn commitment(&self) -> CommitmentConfig {
        self.client.commitment()
    }

    /// Détermine si une erreur du client est temporaire et si une nouvelle tentative doit être effectuée.
    fn is_retryable(error: &ClientError) -> bool {
        matches!(
            error.kind,
            ClientErrorKind::Reqwest(_) | ClientErrorKind::RpcError(_) | ClientErrorKind::Io(_)
        )
    }

    /// Récupère les données brutes d'un compte, `None` s'il n'existe pas
    /// (PDA de métadonnées jamais créé par exemple).
    pub async fn get_account_data(&self, pubkey: &Pubkey) -> Result<Option<Vec<u8>>> {
        for attempt in 0..=self.max_retries {
            match self.client.get_account_with_commitment(pubkey, self.commitment()).await {
                Ok(response) => return Ok(response.value.map(|account| account.data)),
                Err(e) => {
                    if Self::is_retryable(&e) && attempt < self.max_retries {
                        debug!(%pubkey, attempt, error = %e, "[RPC] get_account_data en échec, nouvel essai");
                        sleep(Duration::from_millis(self.delay_ms)).await;
                    } else {
                        return Err(e).with_context(|| format!("Échec final de get_account_data pour {}", pubkey));
                    }
                }
            }
        }
        unreachable!()
    }

    /// Offre totale d'un mint, déjà ajustée des décimales par le nœud.
    pub async fn get_token_supply(&self, mint: &Pubkey) -> Result<UiTokenAmount> {
        for attempt in 0..=self.max_retries {
            match self.client.get_token_supply(mint).await {
                Ok(amount) => return Ok(amount),
                Err(e) => {
                    if Self::is_retryable(&e) && attempt < self.max_retries {
                        debug!(%mint, attempt, error = %e, "[RPC] get_token_supply en échec, nouvel essai");
                        sleep(Duration::from_millis(self.delay_ms)).await;
                    } else {
                        return Err(e).with_context(|| format!("Échec final de get_token_supply pour {}", mint));
                    }
                }
            }
        }
        unreachable!()
    }

    /// Un seul appel `getTransaction` en `jsonParsed` (v0 acceptées).
    /// Pas de ré-essai ici : c'est le `TransactionResolver` qui porte le backoff.
    pub async fn get_transaction(&self, signature: &Signature) -> Result<ResolvedTransaction> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::JsonParsed),
            commitment: Some(self.commitment()),
            max_supported_transaction_version: Some(0),
        };
        let encoded = self
            .client
            .get_transaction_with_config(signature, config)
            .await
            .with_context(|| format!("getTransaction a échoué pour {}", signature))?;
        ResolvedTransaction::from_encoded(*signature, &encoded)
    }
}

#[async_trait]
impl TransactionSource for ResilientRpcClient {
    async fn fetch_transaction(&self, signature: &Signature) -> Result<ResolvedTransaction> {
        self.get_transaction(signature).await
    }
}
