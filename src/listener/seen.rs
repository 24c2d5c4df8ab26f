// DANS : src/listener/seen.rs

use solana_sdk::signature::Signature;
use std::{
    collections::{HashMap, VecDeque},
    time::{Duration, Instant},
};

/// Signatures déjà traitées, bornées en âge et en nombre.
/// La fenêtre doit couvrir ce que le nœud peut rejouer après une reconnexion.
#[derive(Debug)]
pub struct SeenSignatures {
    seen_at: HashMap<Signature, Instant>,
    order: VecDeque<(Signature, Instant)>,
    ttl: Duration,
    limit: usize,
}

impl SeenSignatures {
    pub fn new(ttl: Duration, limit: usize) -> Self {
        Self {
            seen_at: HashMap::new(),
            order: VecDeque::new(),
            ttl,
            limit: limit.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.seen_at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen_at.is_empty()
    }

    pub fn is_seen(&self, signature: &Signature, now: Instant) -> bool {
        self.seen_at
            .get(signature)
            .is_some_and(|seen_at| now.duration_since(*seen_at) < self.ttl)
    }

    /// Enregistre la signature et renvoie `true` si elle était nouvelle.
    /// L'insertion précède tout traitement : une signature n'est admise qu'une fois.
    pub fn check_and_insert(&mut self, signature: Signature, now: Instant) -> bool {
        self.prune(now);
        if self.is_seen(&signature, now) {
            return false;
        }
        self.seen_at.insert(signature, now);
        self.order.push_back((signature, now));
        self.prune(now);
        true
    }

    fn prune(&mut self, now: Instant) {
        while let Some((_, seen_at)) = self.order.front() {
            let expired = now.duration_since(*seen_at) >= self.ttl;
            let over_capacity = self.order.len() > self.limit;
            if !expired && !over_capacity {
                break;
            }
            if let Some((signature, seen_at)) = self.order.pop_front() {
                if self.seen_at.get(&signature).is_some_and(|t| *t == seen_at) {
                    self.seen_at.remove(&signature);
                }
            }
        }
    }
}
