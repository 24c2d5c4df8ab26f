// DANS : src/listener/mod.rs

// Écoute des logs du programme de pool via websocket, déduplication
// des signatures et envoi des événements vers le pipeline.
pub mod messages;
pub mod seen;
pub mod subscription;

use chrono::{DateTime, Local};
use solana_sdk::signature::Signature;

pub use seen::SeenSignatures;
pub use subscription::{ListenerSettings, SubscriptionManager};

/// Une création de pool repérée dans le flux, à traiter une seule fois.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolEvent {
    pub signature: Signature,
    pub observed_at: DateTime<Local>,
}
