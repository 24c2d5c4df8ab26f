// src/decoders/mod.rs

// Décodage des données brutes : instruction de création de pool,
// compte de métadonnées on-chain et liens sociaux du JSON hors chaîne.
pub mod metadata;
pub mod pool_init;
pub mod socials;

pub use metadata::{DecodedMetadata, MetadataDecodeError, decode_metadata, metadata_address};
pub use pool_init::{PoolAccounts, QuoteSide, parse_pool_creation};
pub use socials::SocialLinks;
