// src/lib.rs

// Tous les modules sont publics pour être utilisés par les binaires
// (pool_listener, lp_lock_checker).
pub mod config;
pub mod data_pipeline;
pub mod decoders;
pub mod filtering;
pub mod listener;
pub mod monitoring;
pub mod output;
pub mod pipeline;
pub mod rpc;
