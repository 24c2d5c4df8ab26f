// src/data_pipeline/api_connectors/rugcheck.rs

use crate::filtering::risk::{RiskEntry, RiskFailure, RiskProvider, RiskReport, TopHolder};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{info, warn};

pub const TOKEN_PLACEHOLDER: &str = "<token_address>";

/// Seuil au-delà duquel la liquidité est considérée comme verrouillée.
pub const LP_LOCKED_THRESHOLD_PCT: f64 = 98.9;

/// Client du service de rug check (rapport de risques par token).
#[derive(Clone)]
pub struct RugCheckClient {
    http: reqwest::Client,
    url_template: String,
}

impl RugCheckClient {
    pub fn new(http: reqwest::Client, url_template: String) -> Self {
        Self { http, url_template }
    }

    pub fn report_url(&self, token: &Pubkey) -> String {
        self.url_template.replace(TOKEN_PLACEHOLDER, &token.to_string())
    }

    async fn fetch_json(&self, token: &Pubkey) -> Result<Value, RiskFailure> {
        let response = self
            .http
            .get(self.report_url(token))
            .send()
            .await
            .map_err(|e| RiskFailure::ServiceUnavailable(e.to_string()))?;
        require_ok(response.status())?;
        response
            .json::<Value>()
            .await
            .map_err(|e| RiskFailure::ServiceUnavailable(e.to_string()))
    }
}

fn require_ok(status: StatusCode) -> Result<(), RiskFailure> {
    if status != StatusCode::OK {
        return Err(RiskFailure::ServiceUnavailable(format!("code {}", status)));
    }
    Ok(())
}

/// Interprète la réponse du service. Un objet vide ou une clé `error` est une
/// erreur du service ; `risks` et `topHolders` sont obligatoires.
pub fn parse_report(data: &Value) -> Result<RiskReport, RiskFailure> {
    let Some(object) = data.as_object().filter(|o| !o.is_empty()) else {
        return Err(RiskFailure::ErrorPayload("réponse vide".into()));
    };
    if let Some(error) = object.get("error") {
        let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
        return Err(RiskFailure::ErrorPayload(message));
    }
    let (Some(risks), Some(holders)) = (object.get("risks"), object.get("topHolders")) else {
        return Err(RiskFailure::MissingFields);
    };
    let risks: Vec<RiskEntry> =
        serde_json::from_value(risks.clone()).map_err(|_| RiskFailure::MissingFields)?;
    let top_holders: Vec<TopHolder> =
        serde_json::from_value(holders.clone()).map_err(|_| RiskFailure::MissingFields)?;
    Ok(RiskReport { risks, top_holders })
}

/// `markets[0].lp.lpLockedPct`, si présent.
pub fn lp_locked_pct(data: &Value) -> Option<f64> {
    data.get("markets")?.get(0)?.get("lp")?.get("lpLockedPct")?.as_f64()
}

#[async_trait]
impl RiskProvider for RugCheckClient {
    async fn risk_report(&self, token: &Pubkey) -> Result<RiskReport, RiskFailure> {
        let data = self.fetch_json(token).await?;
        parse_report(&data)
    }
}

/// Source du pourcentage de LP verrouillée, utilisée par le vérificateur de lock.
#[async_trait]
pub trait LpLockSource: Send + Sync {
    async fn lp_locked_pct(&self, token: &Pubkey) -> Result<Option<f64>>;
}

#[async_trait]
impl LpLockSource for RugCheckClient {
    async fn lp_locked_pct(&self, token: &Pubkey) -> Result<Option<f64>> {
        let data = self
            .fetch_json(token)
            .await
            .with_context(|| format!("Rapport indisponible pour {}", token))?;
        Ok(lp_locked_pct(&data))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LpLockOutcome {
    Locked { elapsed: Duration, tries: u32 },
    NeverLocked { tries: u32 },
}

/// Interroge la source jusqu'à ce que la LP soit verrouillée ou que les essais soient épuisés.
pub async fn wait_for_lp_lock(
    source: &dyn LpLockSource,
    token: &Pubkey,
    interval: Duration,
    max_tries: u32,
) -> LpLockOutcome {
    let started = Instant::now();
    for tries in 1..=max_tries {
        match source.lp_locked_pct(token).await {
            Ok(Some(pct)) if pct > LP_LOCKED_THRESHOLD_PCT => {
                let elapsed = started.elapsed();
                info!(%token, pct, tries, elapsed_secs = elapsed.as_secs(), "[LpLock] Liquidité verrouillée.");
                return LpLockOutcome::Locked { elapsed, tries };
            }
            Ok(Some(pct)) => info!(%token, pct, tries, "[LpLock] LP pas encore verrouillée, nouvel essai."),
            Ok(None) => info!(%token, tries, "[LpLock] Aucun marché dans le rapport, nouvel essai."),
            Err(e) => warn!(%token, tries, error = %e, "[LpLock] Requête échouée, nouvel essai."),
        }
        sleep(interval).await;
    }
    LpLockOutcome::NeverLocked { tries: max_tries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn url_template_is_substituted() {
        let client = RugCheckClient::new(reqwest::Client::new(), "https://r.io/v1/tokens/<token_address>/report".into());
        let token = Pubkey::new_unique();
        assert_eq!(client.report_url(&token), format!("https://r.io/v1/tokens/{}/report", token));
    }

    #[test]
    fn any_status_but_200_is_a_service_failure() {
        assert!(require_ok(StatusCode::OK).is_ok());
        assert!(matches!(
            require_ok(StatusCode::NO_CONTENT),
            Err(RiskFailure::ServiceUnavailable(_))
        ));
    }

    #[test]
    fn report_parsing_fails_closed() {
        assert!(matches!(parse_report(&json!({})), Err(RiskFailure::ErrorPayload(_))));
        assert_eq!(
            parse_report(&json!({"error": "not found"})),
            Err(RiskFailure::ErrorPayload("not found".into()))
        );
        assert_eq!(parse_report(&json!({"risks": []})), Err(RiskFailure::MissingFields));

        let report = parse_report(&json!({
            "risks": [{"name": "Mint Authority still enabled", "description": "More tokens can be minted", "score": 30}],
            "topHolders": [{"owner": "abc", "pct": 12.5, "amount": 10}]
        }))
        .unwrap();
        assert_eq!(report.risks[0].name, "Mint Authority still enabled");
        assert_eq!(report.top_holders[0].pct, 12.5);
    }

    #[test]
    fn lp_locked_pct_reads_the_first_market() {
        let data = json!({"markets": [{"lp": {"lpLockedPct": 99.5}}, {"lp": {"lpLockedPct": 1.0}}]});
        assert_eq!(lp_locked_pct(&data), Some(99.5));
        assert_eq!(lp_locked_pct(&json!({"markets": []})), None);
    }

    struct ScriptedLock(Mutex<Vec<Option<f64>>>);

    #[async_trait]
    impl LpLockSource for ScriptedLock {
        async fn lp_locked_pct(&self, _token: &Pubkey) -> Result<Option<f64>> {
            let mut script = self.0.lock().unwrap();
            if script.is_empty() { Ok(None) } else { Ok(script.remove(0)) }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn waits_until_the_lock_crosses_the_threshold() {
        let source = ScriptedLock(Mutex::new(vec![None, Some(50.0), Some(98.9), Some(99.0)]));
        let outcome = wait_for_lp_lock(&source, &Pubkey::new_unique(), Duration::from_secs(5), 300).await;
        assert_eq!(
            outcome,
            LpLockOutcome::Locked { elapsed: Duration::from_secs(15), tries: 4 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_tries() {
        let source = ScriptedLock(Mutex::new(Vec::new()));
        let outcome = wait_for_lp_lock(&source, &Pubkey::new_unique(), Duration::from_secs(5), 3).await;
        assert_eq!(outcome, LpLockOutcome::NeverLocked { tries: 3 });
    }
}
