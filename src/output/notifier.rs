// DANS : src/output/notifier.rs

use super::OutputRecord;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::info;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, record: &OutputRecord) -> Result<()>;
}

/// Envoie l'adresse du token dans un canal Telegram, lu par un bot de trading.
pub struct TelegramNotifier {
    http: reqwest::Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(http: reqwest::Client, base_url: String, bot_token: String, chat_id: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            bot_token,
            chat_id,
        }
    }

    pub fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.base_url, self.bot_token)
    }
}

pub fn format_message(record: &OutputRecord) -> String {
    format!(
        "⏱️ timestamp: {}\n\
         📝 token_address: {}\n\
         💠 symbol: {}\n\
         📛 name: {}\n\
         💲 price: ${}\n\
         💰 liquidity: {}\n\
         📈 fdv: {}\n\
         ⚠️ risks: {}\n\
         🤝 dexscreener: https://dexscreener.com/solana/{}\n\
         🗃️ top20 holders supply (excluding pool): {}\n\
         👥 top20 holders: {}",
        record.formatted_timestamp(),
        record.address,
        record.token.symbol,
        record.token.name,
        record.pair.price,
        record.pair.liquidity,
        record.pair.fdv,
        record.risks_text(),
        record.address,
        record.top_holders_pct_text(),
        record.top_holders_text(),
    )
}

/// Seul un 200 vaut livraison.
fn check_status(status: StatusCode) -> Result<()> {
    if status != StatusCode::OK {
        bail!("Telegram a répondu {}", status);
    }
    Ok(())
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, record: &OutputRecord) -> Result<()> {
        let text = format_message(record);
        let response = self
            .http
            .post(self.send_message_url())
            .query(&[("chat_id", self.chat_id.as_str()), ("text", text.as_str())])
            .send()
            .await
            .context("Appel Telegram échoué")?;
        check_status(response.status())?;
        info!(token = %record.address, "[Notifier] Adresse envoyée sur Telegram.");
        Ok(())
    }
}
