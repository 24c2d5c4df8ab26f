// DANS : src/bin/lp_lock_checker.rs

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use sol_listener::{
    data_pipeline::api_connectors::{
        RugCheckClient,
        rugcheck::{LpLockOutcome, wait_for_lp_lock},
    },
    monitoring::logging,
};
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;
use tracing::{info, warn};

/// Suit le verrouillage de la liquidité d'un token fraîchement listé.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Adresse du mint à surveiller.
    token: Pubkey,
    /// Secondes entre deux requêtes.
    #[arg(long, default_value_t = 5)]
    interval_secs: u64,
    #[arg(long, default_value_t = 300)]
    max_tries: u32,
}

/// Seule la variable du service de risque est nécessaire ici.
#[derive(Deserialize, Debug)]
struct CheckerConfig {
    rug_checker_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::setup_logging(None)?;
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let config = envy::from_env::<CheckerConfig>().context("RUG_CHECKER_URL manquant dans l'environnement")?;

    let client = RugCheckClient::new(reqwest::Client::new(), config.rug_checker_url);
    info!(token = %cli.token, "[LpLock] Surveillance du verrouillage de la LP...");

    match wait_for_lp_lock(&client, &cli.token, Duration::from_secs(cli.interval_secs), cli.max_tries).await {
        LpLockOutcome::Locked { elapsed, tries } => {
            info!(
                token = %cli.token,
                tries,
                "[LpLock] Le déployeur a verrouillé la liquidité en {} s.",
                elapsed.as_secs()
            );
        }
        LpLockOutcome::NeverLocked { tries } => {
            warn!(token = %cli.token, tries, "[LpLock] Liquidité jamais verrouillée.");
        }
    }
    Ok(())
}
