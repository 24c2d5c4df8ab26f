// src/data_pipeline/mod.rs

// Tout ce qui enrichit un pool fraîchement détecté : métadonnées du token,
// prix/liquidité de la paire, et les connecteurs vers les API externes.
pub mod api_connectors;
pub mod enrichment;
pub mod metadata_source;

use crate::decoders::{QuoteSide, SocialLinks};
use anyhow::Result;
use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;

pub use enrichment::{Enriched, Enricher};
pub use metadata_source::{MetadataSource, MetadataSourceKind};

/// Métadonnées d'un token. Tous les champs ont une valeur par défaut :
/// une source indisponible ne bloque jamais le pipeline.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TokenMetadata {
    pub symbol: String,
    pub name: String,
    pub is_scam: Option<bool>,
    /// Offre totale telle que renvoyée par la source (déjà ajustée des décimales).
    pub total_supply: String,
    pub creator_address: String,
    pub socials: SocialLinks,
}

/// Cotation brute d'une paire, telle que renvoyée par le service.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PairQuote {
    pub pair_address: String,
    pub price: f64,
    pub liquidity: f64,
}

/// Cotation enrichie de la FDV calculée.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PairMetadata {
    pub pair_address: String,
    pub price: f64,
    pub liquidity: f64,
    pub fdv: f64,
}

/// Service d'informations sur un token (symbole, offre, liens...).
#[async_trait]
pub trait TokenInfoProvider: Send + Sync {
    async fn token_info(&self, token: &Pubkey) -> Result<TokenMetadata>;
}

/// Service de prix/liquidité d'une paire.
#[async_trait]
pub trait PairMetadataProvider: Send + Sync {
    async fn pair_metadata(&self, pair_id: &Pubkey, quote: QuoteSide) -> Result<PairQuote>;
}
