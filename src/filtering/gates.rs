// DANS : src/filtering/gates.rs

use crate::{
    data_pipeline::{PairMetadata, TokenMetadata, enrichment::mc_to_liq},
    filtering::{Gate, NameCheck, RiskFailure},
};
use thiserror::Error;

/// Raison pour laquelle un token a été écarté.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Rejection {
    #[error("nom ou symbole contenant le mot banni `{word}`")]
    BannedName { word: String },
    #[error("FDV {fdv} sous le minimum {min}")]
    FdvBelowFloor { fdv: f64, min: f64 },
    #[error("FDV {fdv} au-dessus du maximum {max}")]
    FdvAboveCeiling { fdv: f64, max: f64 },
    #[error("liquidité {liquidity} sous le minimum {min}")]
    LiquidityBelowFloor { liquidity: f64, min: f64 },
    #[error("liquidité nulle, ratio mc/liq indéfini")]
    NoLiquidity,
    #[error("ratio mc/liq {ratio} sous le minimum {min}")]
    McToLiqBelowFloor { ratio: f64, min: f64 },
    #[error("contrôle de risque échoué : {0}")]
    Risk(#[from] RiskFailure),
}

impl Rejection {
    pub fn gate(&self) -> Gate {
        match self {
            Rejection::BannedName { .. } => Gate::NameCheck,
            Rejection::FdvBelowFloor { .. } | Rejection::FdvAboveCeiling { .. } => Gate::FdvFloor,
            Rejection::LiquidityBelowFloor { .. } => Gate::LiquidityFloor,
            Rejection::NoLiquidity | Rejection::McToLiqBelowFloor { .. } => Gate::McToLiqFloor,
            Rejection::Risk(_) => Gate::RiskGate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterThresholds {
    pub min_fdv: f64,
    pub max_fdv: Option<f64>,
    pub min_liq: f64,
    pub min_mc_to_liq: f64,
}

/// Ce que les portes de marché ont calculé pour un token admis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketScreen {
    pub mc_to_liq: f64,
}

/// Les quatre portes "marché", évaluées dans l'ordre avec sortie anticipée.
/// Le contrôle de risque (réseau) est appliqué ensuite par le pipeline.
#[derive(Debug, Clone)]
pub struct FilterPipeline {
    name_check: NameCheck,
    thresholds: FilterThresholds,
}

impl FilterPipeline {
    pub fn new(name_check: NameCheck, thresholds: FilterThresholds) -> Self {
        Self { name_check, thresholds }
    }

    pub fn screen(&self, token: &TokenMetadata, pair: &PairMetadata) -> Result<MarketScreen, Rejection> {
        // 1. NameCheck
        if let Some(word) = self.name_check.banned_word(&token.symbol, &token.name) {
            return Err(Rejection::BannedName { word: word.to_string() });
        }

        // 2. FdvFloor (et plafond optionnel)
        let t = &self.thresholds;
        if pair.fdv < t.min_fdv {
            return Err(Rejection::FdvBelowFloor { fdv: pair.fdv, min: t.min_fdv });
        }
        if let Some(max) = t.max_fdv {
            if pair.fdv > max {
                return Err(Rejection::FdvAboveCeiling { fdv: pair.fdv, max });
            }
        }

        // 3. LiquidityFloor
        if pair.liquidity < t.min_liq {
            return Err(Rejection::LiquidityBelowFloor {
                liquidity: pair.liquidity,
                min: t.min_liq,
            });
        }

        // 4. McToLiqFloor
        let ratio = mc_to_liq(pair.fdv, pair.liquidity).ok_or(Rejection::NoLiquidity)?;
        if ratio < t.min_mc_to_liq {
            return Err(Rejection::McToLiqBelowFloor { ratio, min: t.min_mc_to_liq });
        }

        Ok(MarketScreen { mc_to_liq: ratio })
    }
}
