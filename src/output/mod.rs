// DANS : src/output/mod.rs

pub mod audit;
pub mod notifier;

use crate::{
    data_pipeline::{Enriched, PairMetadata, TokenMetadata},
    filtering::RiskAssessment,
};
use chrono::{DateTime, Local};
use solana_sdk::{pubkey::Pubkey, signature::Signature};

pub use audit::{AuditLog, AuditStream};
pub use notifier::{Notifier, TelegramNotifier};

/// L'unité écrite dans les fichiers d'audit et envoyée en notification.
/// Construite une fois par étape de sortie, jamais modifiée ensuite.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    pub timestamp: DateTime<Local>,
    pub signature: Signature,
    pub address: Pubkey,
    pub token: TokenMetadata,
    pub pair: PairMetadata,
    pub risk: Option<RiskAssessment>,
}

impl OutputRecord {
    pub fn new(timestamp: DateTime<Local>, signature: Signature, enriched: &Enriched) -> Self {
        Self {
            timestamp,
            signature,
            address: enriched.token_address,
            token: enriched.token.clone(),
            pair: enriched.pair.clone(),
            risk: None,
        }
    }

    /// Copie de l'enregistrement complétée par le résultat du contrôle de risque.
    pub fn with_risk(&self, risk: RiskAssessment) -> Self {
        Self {
            risk: Some(risk),
            ..self.clone()
        }
    }

    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }

    pub fn risks_text(&self) -> String {
        self.risk.as_ref().map(|r| r.risk_descriptions.join(", ")).unwrap_or_default()
    }

    pub fn top_holders_pct_text(&self) -> String {
        self.risk
            .as_ref()
            .and_then(|r| r.top_holders_supply_pct)
            .map(|pct| format!("{}%", pct))
            .unwrap_or_default()
    }

    pub fn top_holders_text(&self) -> String {
        self.risk.as_ref().map(|r| r.top_holder_detail.clone()).unwrap_or_default()
    }

    /// Colonnes dans l'ordre d'écriture ; les trois colonnes de risque
    /// n'existent que pour les enregistrements filtrés.
    pub fn columns(&self) -> Vec<(&'static str, String)> {
        let opt = |value: &Option<String>| value.clone().unwrap_or_default();
        let mut columns = vec![
            ("timestamp", self.formatted_timestamp()),
            ("signature", self.signature.to_string()),
            ("address", self.address.to_string()),
            ("symbol", self.token.symbol.clone()),
            ("name", self.token.name.clone()),
            ("isScam", self.token.is_scam.map(|b| b.to_string()).unwrap_or_default()),
            ("totalSupply", self.token.total_supply.clone()),
            ("creatorAddress", self.token.creator_address.clone()),
            ("website", opt(&self.token.socials.website)),
            ("telegram", opt(&self.token.socials.telegram)),
            ("twitter", opt(&self.token.socials.twitter)),
            ("pairAddress", self.pair.pair_address.clone()),
            ("price", self.pair.price.to_string()),
            ("liquidity", self.pair.liquidity.to_string()),
            ("fdv", self.pair.fdv.to_string()),
        ];
        if self.risk.is_some() {
            columns.push(("risks", self.risks_text()));
            columns.push(("topHoldersSupplyPct", self.top_holders_pct_text()));
            columns.push(("topHolders", self.top_holders_text()));
        }
        columns
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::decoders::SocialLinks;

    pub fn sample_record() -> OutputRecord {
        OutputRecord {
            timestamp: Local::now(),
            signature: Signature::new_unique(),
            address: Pubkey::new_unique(),
            token: TokenMetadata {
                symbol: "FOO".into(),
                name: "Foo, the token".into(),
                is_scam: Some(false),
                total_supply: "1000000".into(),
                creator_address: Pubkey::new_unique().to_string(),
                socials: SocialLinks {
                    website: Some("https://foo.io".into()),
                    telegram: None,
                    twitter: Some("https://x.com/foo".into()),
                },
            },
            pair: PairMetadata {
                pair_address: Pubkey::new_unique().to_string(),
                price: 0.004,
                liquidity: 2500.0,
                fdv: 4000.0,
            },
            risk: None,
        }
    }
}
