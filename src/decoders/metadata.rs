// DANS : src/decoders/metadata.rs

use borsh::BorshDeserialize;
use solana_sdk::{pubkey, pubkey::Pubkey};
use std::io::ErrorKind;
use thiserror::Error;

/// Programme Token Metadata de Metaplex.
pub const METADATA_PROGRAM_ID: Pubkey = pubkey!("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s");

/// Discriminant `Key::MetadataV1` en tête du compte.
pub const METADATA_V1_TAG: u8 = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataDecodeError {
    #[error("format de métadonnées non reconnu (tag {tag})")]
    UnrecognizedFormat { tag: u8 },
    #[error("compte de métadonnées tronqué")]
    Truncated,
    #[error("compte de métadonnées invalide : {0}")]
    Malformed(String),
}

// --- STRUCTURE DE SORTIE PROPRE ---
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedMetadata {
    pub update_authority: Pubkey,
    pub mint: Pubkey,
    pub name: String,
    pub symbol: String,
    pub uri: String,
}

// Seul le préfixe nous intéresse ; les champs suivants (créateurs, collection...)
// sont ignorés, borsh s'arrête après l'URI.
#[derive(BorshDeserialize)]
struct MetadataPrefix {
    key: u8,
    update_authority: [u8; 32],
    mint: [u8; 32],
    name: String,
    symbol: String,
    uri: String,
}

/// Adresse du compte de métadonnées d'un mint.
pub fn metadata_address(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[b"metadata", METADATA_PROGRAM_ID.as_ref(), mint.as_ref()],
        &METADATA_PROGRAM_ID,
    )
    .0
}

/// Décode les données brutes d'un compte de métadonnées.
/// Les chaînes sont stockées avec un padding de `\0` qu'on retire.
pub fn decode_metadata(data: &[u8]) -> Result<DecodedMetadata, MetadataDecodeError> {
    let tag = *data.first().ok_or(MetadataDecodeError::Truncated)?;
    if tag != METADATA_V1_TAG {
        return Err(MetadataDecodeError::UnrecognizedFormat { tag });
    }

    let mut cursor = data;
    let prefix = MetadataPrefix::deserialize(&mut cursor).map_err(|e| {
        // borsh signale les lectures courtes en InvalidData avec ce message.
        if e.kind() == ErrorKind::UnexpectedEof || e.to_string().contains("Unexpected length of input") {
            MetadataDecodeError::Truncated
        } else {
            MetadataDecodeError::Malformed(e.to_string())
        }
    })?;
    debug_assert_eq!(prefix.key, METADATA_V1_TAG);

    Ok(DecodedMetadata {
        update_authority: Pubkey::new_from_array(prefix.update_authority),
        mint: Pubkey::new_from_array(prefix.mint),
        name: trim_nul(prefix.name),
        symbol: trim_nul(prefix.symbol),
        uri: trim_nul(prefix.uri),
    })
}

fn trim_nul(value: String) -> String {
    value.trim_end_matches('\0').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_padded(buf: &mut Vec<u8>, value: &str, width: usize) {
        let mut bytes = value.as_bytes().to_vec();
        bytes.resize(width, 0);
        buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(&bytes);
    }

    fn account_bytes(tag: u8, name: &str, symbol: &str, uri: &str) -> (Vec<u8>, Pubkey, Pubkey) {
        let authority = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let mut buf = vec![tag];
        buf.extend_from_slice(authority.as_ref());
        buf.extend_from_slice(mint.as_ref());
        push_padded(&mut buf, name, 32);
        push_padded(&mut buf, symbol, 10);
        push_padded(&mut buf, uri, 200);
        // seller_fee_basis_points + creators absents : ignorés par le décodeur
        buf.extend_from_slice(&[0xf4, 0x01, 0x00]);
        (buf, authority, mint)
    }

    #[test]
    fn decodes_a_padded_v1_account() {
        let (data, authority, mint) = account_bytes(4, "FOO", "BAR", "https://arweave.net/abc");
        let decoded = decode_metadata(&data).unwrap();
        assert_eq!(decoded.name, "FOO");
        assert_eq!(decoded.symbol, "BAR");
        assert_eq!(decoded.uri, "https://arweave.net/abc");
        assert_eq!(decoded.update_authority, authority);
        assert_eq!(decoded.mint, mint);
    }

    #[test]
    fn rejects_other_tags() {
        let (data, _, _) = account_bytes(7, "FOO", "BAR", "");
        assert_eq!(
            decode_metadata(&data),
            Err(MetadataDecodeError::UnrecognizedFormat { tag: 7 })
        );
    }

    #[test]
    fn short_buffers_are_truncated() {
        assert_eq!(decode_metadata(&[]), Err(MetadataDecodeError::Truncated));
        let (data, _, _) = account_bytes(4, "FOO", "BAR", "https://arweave.net/abc");
        assert_eq!(decode_metadata(&data[..80]), Err(MetadataDecodeError::Truncated));
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let mut data = vec![4u8];
        data.extend_from_slice(&[0u8; 64]);
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&[0xff, 0xfe]);
        assert!(matches!(decode_metadata(&data), Err(MetadataDecodeError::Malformed(_))));
    }

    #[test]
    fn metadata_address_is_deterministic() {
        let mint = Pubkey::new_unique();
        assert_eq!(metadata_address(&mint), metadata_address(&mint));
        assert_ne!(metadata_address(&mint), metadata_address(&Pubkey::new_unique()));
    }
}
