// src/data_pipeline/enrichment.rs

use crate::{
    data_pipeline::{MetadataSource, PairMetadata, PairMetadataProvider, PairQuote, TokenMetadata},
    decoders::PoolAccounts,
};
use anyhow::{Context, Result};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::{info, warn};

/// `prix * offre totale`. Une offre illisible donne 0.
pub fn fdv(price: f64, total_supply: &str) -> f64 {
    let supply = total_supply.trim().parse::<f64>().unwrap_or(0.0);
    let value = price * supply;
    if value.is_finite() { value } else { 0.0 }
}

/// Ratio FDV / liquidité, seulement défini pour une liquidité strictement positive.
pub fn mc_to_liq(fdv: f64, liquidity: f64) -> Option<f64> {
    (liquidity > 0.0).then(|| fdv / liquidity)
}

pub fn with_fdv(quote: PairQuote, token: &TokenMetadata) -> PairMetadata {
    PairMetadata {
        fdv: fdv(quote.price, &token.total_supply),
        pair_address: quote.pair_address,
        price: quote.price,
        liquidity: quote.liquidity,
    }
}

/// Un token découvert, avec ses métadonnées et celles de sa paire.
#[derive(Debug, Clone, PartialEq)]
pub struct Enriched {
    pub token_address: Pubkey,
    pub token: TokenMetadata,
    pub pair: PairMetadata,
}

pub struct Enricher {
    metadata: Arc<dyn MetadataSource>,
    pairs: Arc<dyn PairMetadataProvider>,
    native_mint: Pubkey,
}

impl Enricher {
    pub fn new(metadata: Arc<dyn MetadataSource>, pairs: Arc<dyn PairMetadataProvider>, native_mint: Pubkey) -> Self {
        Self { metadata, pairs, native_mint }
    }

    /// Les métadonnées du token sont tolérantes (défauts si la source échoue) ;
    /// sans cotation de paire, l'événement est abandonné.
    pub async fn enrich(&self, pool: &PoolAccounts) -> Result<Enriched> {
        let token_address = pool.subject_token(&self.native_mint);
        let side = pool.subject_side(&self.native_mint);

        let (token, quote) = tokio::join!(
            self.metadata.token_metadata(pool, &token_address),
            self.pairs.pair_metadata(&pool.pair_id, side)
        );
        let token = token.unwrap_or_else(|e| {
            warn!(token = %token_address, error = %e, "[Enrichment] Métadonnées indisponibles, valeurs par défaut");
            TokenMetadata {
                creator_address: pool.deployer.to_string(),
                ..Default::default()
            }
        });
        let quote = quote.with_context(|| format!("Cotation indisponible pour la paire {}", pool.pair_id))?;
        let pair = with_fdv(quote, &token);

        info!(
            token = %token_address,
            symbol = %token.symbol,
            name = %token.name,
            price = pair.price,
            liquidity = pair.liquidity,
            fdv = pair.fdv,
            "[Enrichment] Token enrichi."
        );
        Ok(Enriched { token_address, token, pair })
    }
}
