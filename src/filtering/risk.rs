// src/filtering/risk.rs

use async_trait::async_trait;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::{collections::HashSet, sync::Arc};
use thiserror::Error;

/// Nom du risque qui fait toujours échouer le contrôle.
pub const MINT_AUTHORITY_RISK: &str = "Mint Authority still enabled";

/// Règle de décision du contrôle de risque.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RiskPolicy {
    /// Échoue uniquement si l'autorité de mint est encore active.
    #[default]
    MintAuthority,
    /// Échoue aussi si les gros porteurs (hors pool) détiennent trop de l'offre.
    HolderConcentration,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RiskFailure {
    #[error("service de risque indisponible : {0}")]
    ServiceUnavailable(String),
    #[error("le service de risque a renvoyé une erreur : {0}")]
    ErrorPayload(String),
    #[error("risques ou top holders absents de la réponse")]
    MissingFields,
    #[error("autorité de mint encore active")]
    MintAuthorityEnabled,
    #[error("top holders à {pct:.2} % de l'offre (max {max:.2} %)")]
    HolderConcentration { pct: f64, max: f64 },
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RiskEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TopHolder {
    pub owner: String,
    #[serde(default)]
    pub pct: f64,
}

/// Rapport brut du service de risque.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiskReport {
    pub risks: Vec<RiskEntry>,
    pub top_holders: Vec<TopHolder>,
}

/// Résultat du contrôle, joint à l'enregistrement final.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RiskAssessment {
    pub passed: bool,
    pub risk_descriptions: Vec<String>,
    pub top_holders_supply_pct: Option<f64>,
    pub top_holder_detail: String,
    pub mint_authority_enabled: bool,
}

#[async_trait]
pub trait RiskProvider: Send + Sync {
    async fn risk_report(&self, token: &Pubkey) -> Result<RiskReport, RiskFailure>;
}

#[derive(Debug, Clone)]
pub struct RiskRules {
    pub policy: RiskPolicy,
    pub max_top_holders_pct: f64,
    pub excluded_holders: HashSet<String>,
}

impl RiskRules {
    pub fn assess(&self, report: &RiskReport) -> RiskAssessment {
        let mint_authority_enabled = report.risks.iter().any(|r| r.name == MINT_AUTHORITY_RISK);

        let top_holders_supply_pct = report
            .top_holders
            .iter()
            .filter(|h| !self.excluded_holders.contains(&h.owner))
            .map(|h| h.pct)
            .sum::<f64>();

        let top_holder_detail = report
            .top_holders
            .iter()
            .map(|h| format!("{} - {} %", h.owner, h.pct))
            .collect::<Vec<_>>()
            .join(", ");

        let mut assessment = RiskAssessment {
            passed: false,
            risk_descriptions: report.risks.iter().map(|r| r.description.clone()).collect(),
            top_holders_supply_pct: Some(top_holders_supply_pct),
            top_holder_detail,
            mint_authority_enabled,
        };
        assessment.passed = self.verdict(&assessment).is_ok();
        assessment
    }

    pub fn verdict(&self, assessment: &RiskAssessment) -> Result<(), RiskFailure> {
        if assessment.mint_authority_enabled {
            return Err(RiskFailure::MintAuthorityEnabled);
        }
        if self.policy == RiskPolicy::HolderConcentration {
            let pct = assessment.top_holders_supply_pct.unwrap_or(0.0);
            if pct > self.max_top_holders_pct {
                return Err(RiskFailure::HolderConcentration {
                    pct,
                    max: self.max_top_holders_pct,
                });
            }
        }
        Ok(())
    }
}

/// Dernière porte du filtre : interroge le service et applique la politique configurée.
/// Toute défaillance du service fait échouer le contrôle.
pub struct RiskGate {
    provider: Arc<dyn RiskProvider>,
    rules: RiskRules,
}

impl RiskGate {
    pub fn new(provider: Arc<dyn RiskProvider>, rules: RiskRules) -> Self {
        Self { provider, rules }
    }

    pub async fn check(&self, token: &Pubkey) -> Result<RiskAssessment, RiskFailure> {
        let report = self.provider.risk_report(token).await?;
        let assessment = self.rules.assess(&report);
        self.rules.verdict(&assessment)?;
        Ok(assessment)
    }
}
