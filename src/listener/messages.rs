// DANS : src/listener/messages.rs

use crate::config::Commitment;
use serde_json::{Value, json};
use solana_sdk::pubkey::Pubkey;

/// Une notification `logsNotification` réduite à ce qu'on utilise.
#[derive(Debug, Clone, PartialEq)]
pub struct LogsNotification {
    pub signature: String,
    /// `true` si la transaction a échoué (champ `err` non nul).
    pub failed: bool,
    pub logs: Vec<String>,
}

impl LogsNotification {
    pub fn mentions(&self, marker: &str) -> bool {
        self.logs.iter().any(|line| line.contains(marker))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// Réponse à une requête : `id` et identifiant d'abonnement.
    Ack { id: u64, subscription: u64 },
    Logs(LogsNotification),
    Error { id: Option<u64>, message: String },
    Other,
}

pub fn subscribe_request(id: u64, program: &Pubkey, commitment: Commitment) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "logsSubscribe",
        "params": [
            {"mentions": [program.to_string()]},
            {"commitment": commitment.as_str()}
        ]
    })
    .to_string()
}

pub fn unsubscribe_request(id: u64, subscription: u64) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "logsUnsubscribe",
        "params": [subscription]
    })
    .to_string()
}

pub fn parse_message(text: &str) -> StreamMessage {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return StreamMessage::Other;
    };

    if let Some(error) = value.get("error") {
        return StreamMessage::Error {
            id: value.get("id").and_then(Value::as_u64),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        };
    }

    if let (Some(id), Some(result)) = (value.get("id").and_then(Value::as_u64), value.get("result")) {
        return match result.as_u64() {
            Some(subscription) => StreamMessage::Ack { id, subscription },
            // réponse à logsUnsubscribe (booléen)
            None => StreamMessage::Other,
        };
    }

    if value.get("method").and_then(Value::as_str) != Some("logsNotification") {
        return StreamMessage::Other;
    }
    let Some(inner) = value.pointer("/params/result/value") else {
        return StreamMessage::Other;
    };
    let Some(signature) = inner.get("signature").and_then(Value::as_str) else {
        return StreamMessage::Other;
    };
    let logs = inner
        .get("logs")
        .and_then(Value::as_array)
        .map(|lines| lines.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    StreamMessage::Logs(LogsNotification {
        signature: signature.to_string(),
        failed: inner.get("err").is_some_and(|err| !err.is_null()),
        logs,
    })
}
