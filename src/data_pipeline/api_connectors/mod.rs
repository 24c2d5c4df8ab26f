// src/data_pipeline/api_connectors/mod.rs

pub mod definedfi;
pub mod rugcheck;

pub use definedfi::DefinedFiClient;
pub use rugcheck::RugCheckClient;
