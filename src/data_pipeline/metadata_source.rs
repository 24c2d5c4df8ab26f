// src/data_pipeline/metadata_source.rs

use crate::{
    data_pipeline::{TokenInfoProvider, TokenMetadata},
    decoders::{DecodedMetadata, PoolAccounts, SocialLinks, decode_metadata, metadata_address, socials},
    rpc::ResilientRpcClient,
};
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::{debug, warn};

/// Origine des métadonnées d'un token, choisie par configuration.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MetadataSourceKind {
    /// Décodage du compte Metaplex + offre via RPC.
    #[default]
    OnChainDecode,
    /// Service externe d'informations token (definedfi).
    ExternalService,
}

#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Les défaillances partielles (compte absent, URI morte) donnent des champs vides ;
    /// une erreur n'est renvoyée que si la source entière est inutilisable.
    async fn token_metadata(&self, pool: &PoolAccounts, token: &Pubkey) -> Result<TokenMetadata>;
}

/// Lecture on-chain : compte de métadonnées décodé, JSON de l'URI, offre du mint.
pub struct OnChainMetadata {
    rpc: ResilientRpcClient,
    http: reqwest::Client,
}

impl OnChainMetadata {
    pub fn new(rpc: ResilientRpcClient, http: reqwest::Client) -> Self {
        Self { rpc, http }
    }

    async fn decoded(&self, token: &Pubkey) -> Option<DecodedMetadata> {
        let address = metadata_address(token);
        match self.rpc.get_account_data(&address).await {
            Ok(Some(data)) => match decode_metadata(&data) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    warn!(%token, error = %e, "[Metadata] Compte de métadonnées illisible");
                    None
                }
            },
            Ok(None) => {
                debug!(%token, "[Metadata] Aucun compte de métadonnées");
                None
            }
            Err(e) => {
                warn!(%token, error = %e, "[Metadata] Lecture du compte de métadonnées échouée");
                None
            }
        }
    }

    async fn total_supply(&self, token: &Pubkey) -> String {
        match self.rpc.get_token_supply(token).await {
            Ok(amount) => amount.ui_amount_string,
            Err(e) => {
                warn!(%token, error = %e, "[Metadata] Offre totale indisponible");
                String::new()
            }
        }
    }
}

/// Assemble les morceaux récupérés on-chain. Le créateur est le déployeur du pool.
pub fn assemble_on_chain(
    decoded: Option<DecodedMetadata>,
    socials: SocialLinks,
    total_supply: String,
    deployer: &Pubkey,
) -> TokenMetadata {
    let decoded = decoded.unwrap_or_default();
    TokenMetadata {
        symbol: decoded.symbol,
        name: decoded.name,
        is_scam: None,
        total_supply,
        creator_address: deployer.to_string(),
        socials,
    }
}

#[async_trait]
impl MetadataSource for OnChainMetadata {
    async fn token_metadata(&self, pool: &PoolAccounts, token: &Pubkey) -> Result<TokenMetadata> {
        let (decoded, total_supply) = tokio::join!(self.decoded(token), self.total_supply(token));
        let socials = match &decoded {
            Some(meta) => socials::fetch_social_links(&self.http, &meta.uri).await,
            None => SocialLinks::default(),
        };
        Ok(assemble_on_chain(decoded, socials, total_supply, &pool.deployer))
    }
}

/// Lecture via le service d'informations token.
pub struct ExternalServiceMetadata {
    provider: Arc<dyn TokenInfoProvider>,
}

impl ExternalServiceMetadata {
    pub fn new(provider: Arc<dyn TokenInfoProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl MetadataSource for ExternalServiceMetadata {
    async fn token_metadata(&self, pool: &PoolAccounts, token: &Pubkey) -> Result<TokenMetadata> {
        let mut metadata = self.provider.token_info(token).await?;
        if metadata.creator_address.is_empty() {
            metadata.creator_address = pool.deployer.to_string();
        }
        Ok(metadata)
    }
}

pub fn build_metadata_source(
    kind: MetadataSourceKind,
    rpc: ResilientRpcClient,
    http: reqwest::Client,
    token_info: Arc<dyn TokenInfoProvider>,
) -> Arc<dyn MetadataSource> {
    match kind {
        MetadataSourceKind::OnChainDecode => Arc::new(OnChainMetadata::new(rpc, http)),
        MetadataSourceKind::ExternalService => Arc::new(ExternalServiceMetadata::new(token_info)),
    }
}
