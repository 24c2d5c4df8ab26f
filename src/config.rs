// src/config.rs

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Deserializer};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey, pubkey::Pubkey};
use std::{path::PathBuf, str::FromStr, time::Duration};

use crate::{
    data_pipeline::metadata_source::MetadataSourceKind,
    filtering::{name_check::DEFAULT_BAN_WORDS, risk::RiskPolicy},
};

/// Programme Raydium AMM V4 (celui qui émet `initialize2` à la création d'un pool).
pub const RAYDIUM_AMM_V4_PROGRAM_ID: Pubkey = pubkey!("675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8");
/// Mint du SOL "wrappé", l'actif de cotation des nouveaux pools.
pub const WRAPPED_SOL_MINT: Pubkey = pubkey!("So11111111111111111111111111111111111111112");

/// Niveau de confirmation demandé au nœud, pour l'abonnement comme pour les requêtes.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Commitment {
    Processed,
    Confirmed,
    #[default]
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }

    pub fn to_config(self) -> CommitmentConfig {
        match self {
            Commitment::Processed => CommitmentConfig::processed(),
            Commitment::Confirmed => CommitmentConfig::confirmed(),
            Commitment::Finalized => CommitmentConfig::finalized(),
        }
    }
}

/// Configuration complète du processus, lue une seule fois au démarrage
/// depuis l'environnement (et un éventuel fichier `.env`).
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    // --- Connexion au nœud ---
    pub solana_rpc_client: String,
    pub solana_websocket_client: String,
    #[serde(default)]
    pub commitment: Commitment,

    // --- Cible de l'écoute ---
    #[serde(deserialize_with = "pubkey_from_string", default = "default_pool_program")]
    pub raydium_pool_address: Pubkey,
    #[serde(deserialize_with = "pubkey_from_string", default = "default_native_mint")]
    pub sol_token_address: Pubkey,
    #[serde(default = "default_log_instruction")]
    pub log_instruction: String,

    // --- Seuils du filtre ---
    pub min_fdv: f64,
    #[serde(default)]
    pub max_fdv: Option<f64>,
    pub min_liq: f64,
    pub min_mc_to_liq: f64,
    #[serde(default)]
    pub name_check_enabled: bool,
    #[serde(default = "default_ban_words")]
    pub ban_words: Vec<String>,

    // --- Contrôle de risque ---
    #[serde(default)]
    pub risk_policy: RiskPolicy,
    #[serde(default = "default_max_top_holders_pct")]
    pub max_top_holders_pct: f64,
    #[serde(default = "default_excluded_holders")]
    pub excluded_holders: Vec<String>,
    pub rug_checker_url: String,

    // --- Enrichissement ---
    #[serde(default)]
    pub metadata_source: MetadataSourceKind,
    pub definedfi_url: String,
    pub definedfi_api_key: String,
    #[serde(default = "default_network_id")]
    pub definedfi_network_id: u64,

    // --- Notification ---
    #[serde(default = "default_telegram_base_url")]
    pub telegram_base_url: String,
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,

    // --- Fichiers ---
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    pub unfiltered_data_path: PathBuf,
    pub filtered_data_path: PathBuf,

    // --- Réglages d'exécution ---
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    /// Tentatives du client RPC pour un appel isolé (compte, offre).
    #[serde(default = "default_rpc_max_retries")]
    pub rpc_max_retries: u8,
    #[serde(default = "default_resolve_max_attempts")]
    pub resolve_max_attempts: u32,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_seen_signatures_ttl_secs")]
    pub seen_signatures_ttl_secs: u64,
    #[serde(default = "default_seen_signatures_limit")]
    pub seen_signatures_limit: usize,
    #[serde(default = "default_max_concurrent_events")]
    pub max_concurrent_events: usize,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()
            .context("Lecture de la configuration depuis l'environnement échouée")?;
        config.validate()?;
        Ok(config)
    }

    /// Variante sans accès à l'environnement du processus (utilisée par les tests).
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::from_iter::<_, Config>(pairs)
            .context("Lecture de la configuration échouée")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.rug_checker_url.contains("<token_address>") {
            bail!("RUG_CHECKER_URL doit contenir le marqueur <token_address>");
        }
        if self.min_fdv < 0.0 || self.min_liq < 0.0 || self.min_mc_to_liq < 0.0 {
            bail!("Les seuils MIN_FDV, MIN_LIQ et MIN_MC_TO_LIQ doivent être positifs");
        }
        if let Some(max_fdv) = self.max_fdv {
            if max_fdv < self.min_fdv {
                bail!("MAX_FDV ({}) est inférieur à MIN_FDV ({})", max_fdv, self.min_fdv);
            }
        }
        if self.resolve_max_attempts == 0 {
            bail!("RESOLVE_MAX_ATTEMPTS doit être au moins 1");
        }
        if self.max_concurrent_events == 0 {
            bail!("MAX_CONCURRENT_EVENTS doit être au moins 1");
        }
        if self.log_instruction.is_empty() {
            bail!("LOG_INSTRUCTION ne peut pas être vide");
        }
        Ok(())
    }

    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn seen_signatures_ttl(&self) -> Duration {
        Duration::from_secs(self.seen_signatures_ttl_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }
}

fn pubkey_from_string<'de, D>(deserializer: D) -> Result<Pubkey, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Pubkey::from_str(s.trim()).map_err(serde::de::Error::custom)
}

fn default_pool_program() -> Pubkey {
    RAYDIUM_AMM_V4_PROGRAM_ID
}

fn default_native_mint() -> Pubkey {
    WRAPPED_SOL_MINT
}

fn default_log_instruction() -> String {
    "initialize2".to_string()
}

fn default_ban_words() -> Vec<String> {
    DEFAULT_BAN_WORDS.iter().map(|w| w.to_string()).collect()
}

fn default_max_top_holders_pct() -> f64 {
    50.0
}

fn default_excluded_holders() -> Vec<String> {
    vec![
        // Autorité Raydium AMM V4 (détient la liquidité du pool)
        "5Q544fKrFoe6tsEbD7S8EmxGTJYAKtTVhAW5Q5pge4j1".to_string(),
        "11111111111111111111111111111111".to_string(),
    ]
}

fn default_network_id() -> u64 {
    1399811149
}

fn default_telegram_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_retry_base_ms() -> u64 {
    1_000
}

fn default_rpc_max_retries() -> u8 {
    3
}

fn default_resolve_max_attempts() -> u32 {
    6
}

fn default_reconnect_delay_ms() -> u64 {
    5_000
}

fn default_seen_signatures_ttl_secs() -> u64 {
    3_600
}

fn default_seen_signatures_limit() -> usize {
    100_000
}

fn default_max_concurrent_events() -> usize {
    4
}

fn default_http_timeout_secs() -> u64 {
    15
}

fn default_stats_interval_secs() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_env() -> Vec<(String, String)> {
        [
            ("SOLANA_RPC_CLIENT", "https://rpc.example.org"),
            ("SOLANA_WEBSOCKET_CLIENT", "wss://rpc.example.org"),
            ("MIN_FDV", "2000"),
            ("MIN_LIQ", "1000"),
            ("MIN_MC_TO_LIQ", "1.5"),
            ("RUG_CHECKER_URL", "https://risk.example.org/tokens/<token_address>/report"),
            ("DEFINEDFI_URL", "https://graph.example.org/graphql"),
            ("DEFINEDFI_API_KEY", "key"),
            ("TELEGRAM_BOT_TOKEN", "bot-token"),
            ("TELEGRAM_CHAT_ID", "-100"),
            ("UNFILTERED_DATA_PATH", "/tmp/unfiltered"),
            ("FILTERED_DATA_PATH", "/tmp/filtered"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn with(mut env: Vec<(String, String)>, key: &str, value: &str) -> Vec<(String, String)> {
        env.retain(|(k, _)| k != key);
        env.push((key.to_string(), value.to_string()));
        env
    }

    #[test]
    fn defaults_match_the_raydium_listener() {
        let config = Config::from_pairs(base_env()).unwrap();
        assert_eq!(config.raydium_pool_address, RAYDIUM_AMM_V4_PROGRAM_ID);
        assert_eq!(config.sol_token_address, WRAPPED_SOL_MINT);
        assert_eq!(config.commitment, Commitment::Finalized);
        assert_eq!(config.log_instruction, "initialize2");
        assert_eq!(config.resolve_max_attempts, 6);
        assert_eq!(config.retry_base(), Duration::from_secs(1));
        assert_eq!(config.rpc_max_retries, 3);
        assert_eq!(config.risk_policy, RiskPolicy::MintAuthority);
        assert_eq!(config.metadata_source, MetadataSourceKind::OnChainDecode);
        assert!(!config.name_check_enabled);
        assert!(config.max_fdv.is_none());
        assert_eq!(config.excluded_holders.len(), 2);
        assert!(config.log_path.is_none());
    }

    #[test]
    fn parses_policies_lists_and_overrides() {
        let env = with(base_env(), "RISK_POLICY", "holder_concentration");
        let env = with(env, "METADATA_SOURCE", "external_service");
        let env = with(env, "BAN_WORDS", "Dog,Cat");
        let env = with(env, "COMMITMENT", "confirmed");
        let env = with(env, "MAX_FDV", "500000");
        let env = with(env, "RPC_MAX_RETRIES", "5");
        let config = Config::from_pairs(env).unwrap();
        assert_eq!(config.rpc_max_retries, 5);

        assert_eq!(config.risk_policy, RiskPolicy::HolderConcentration);
        assert_eq!(config.metadata_source, MetadataSourceKind::ExternalService);
        assert_eq!(config.ban_words, vec!["Dog".to_string(), "Cat".to_string()]);
        assert_eq!(config.commitment.as_str(), "confirmed");
        assert_eq!(config.max_fdv, Some(500_000.0));
    }

    #[test]
    fn rejects_invalid_addresses_and_templates() {
        let env = with(base_env(), "RAYDIUM_POOL_ADDRESS", "pas-une-adresse");
        assert!(Config::from_pairs(env).is_err());

        let env = with(base_env(), "RUG_CHECKER_URL", "https://risk.example.org/report");
        assert!(Config::from_pairs(env).is_err());

        let env = with(base_env(), "MAX_FDV", "10");
        assert!(Config::from_pairs(env).is_err());
    }

    #[test]
    fn missing_required_variable_fails() {
        let mut env = base_env();
        env.retain(|(k, _)| k != "MIN_FDV");
        assert!(Config::from_pairs(env).is_err());
    }
}
