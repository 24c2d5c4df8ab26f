// DANS : src/rpc/transaction.rs

use anyhow::{Context, Result, anyhow, bail};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, EncodedTransaction, UiCompiledInstruction,
    UiInstruction, UiLoadedAddresses, UiMessage, UiParsedInstruction,
};
use std::str::FromStr;

/// Une instruction de premier niveau, ramenée à ce dont le parseur a besoin :
/// le programme appelé et la liste ordonnée de ses comptes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInstruction {
    pub program_id: Pubkey,
    pub accounts: Vec<Pubkey>,
}

/// Vue "propre" d'une transaction récupérée par signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTransaction {
    pub signature: Signature,
    pub instructions: Vec<ResolvedInstruction>,
}

impl ResolvedTransaction {
    /// Convertit la réponse `getTransaction` du RPC.
    /// Gère l'encodage `jsonParsed` (instructions parsées ou partiellement décodées)
    /// et l'encodage `json` brut (instructions compilées, indices à résoudre).
    pub fn from_encoded(
        signature: Signature,
        encoded: &EncodedConfirmedTransactionWithStatusMeta,
    ) -> Result<Self> {
        let EncodedTransaction::Json(ui_tx) = &encoded.transaction.transaction else {
            bail!("Encodage de transaction non supporté pour {}", signature);
        };

        let instructions = match &ui_tx.message {
            UiMessage::Parsed(message) => {
                let account_keys = message
                    .account_keys
                    .iter()
                    .map(|account| parse_pubkey(&account.pubkey))
                    .collect::<Result<Vec<_>>>()?;
                message
                    .instructions
                    .iter()
                    .map(|ix| from_ui_instruction(ix, &account_keys))
                    .collect::<Result<Vec<_>>>()?
            }
            UiMessage::Raw(message) => {
                let mut account_keys = message
                    .account_keys
                    .iter()
                    .map(|key| parse_pubkey(key))
                    .collect::<Result<Vec<_>>>()?;
                // Les transactions v0 référencent aussi des comptes chargés depuis des LUT,
                // listés dans les métadonnées (writable puis readonly).
                if let Some(meta) = &encoded.transaction.meta {
                    let loaded: Option<UiLoadedAddresses> = meta.loaded_addresses.clone().into();
                    if let Some(loaded) = loaded {
                        for key in loaded.writable.iter().chain(loaded.readonly.iter()) {
                            account_keys.push(parse_pubkey(key)?);
                        }
                    }
                }
                message
                    .instructions
                    .iter()
                    .map(|ix| from_compiled(ix, &account_keys))
                    .collect::<Result<Vec<_>>>()?
            }
        };

        Ok(Self { signature, instructions })
    }
}

fn from_ui_instruction(ix: &UiInstruction, account_keys: &[Pubkey]) -> Result<ResolvedInstruction> {
    match ix {
        UiInstruction::Compiled(compiled) => from_compiled(compiled, account_keys),
        UiInstruction::Parsed(UiParsedInstruction::PartiallyDecoded(decoded)) => {
            Ok(ResolvedInstruction {
                program_id: parse_pubkey(&decoded.program_id)?,
                accounts: decoded
                    .accounts
                    .iter()
                    .map(|key| parse_pubkey(key))
                    .collect::<Result<Vec<_>>>()?,
            })
        }
        // Instructions des programmes connus du nœud (system, spl-token...) :
        // leurs comptes sont noyés dans le JSON `parsed`, on ne garde que le programme.
        UiInstruction::Parsed(UiParsedInstruction::Parsed(parsed)) => Ok(ResolvedInstruction {
            program_id: parse_pubkey(&parsed.program_id)?,
            accounts: Vec::new(),
        }),
    }
}

fn from_compiled(ix: &UiCompiledInstruction, account_keys: &[Pubkey]) -> Result<ResolvedInstruction> {
    let lookup = |index: u8| {
        account_keys
            .get(index as usize)
            .copied()
            .ok_or_else(|| anyhow!("Index de compte {} hors limites ({} clés)", index, account_keys.len()))
    };
    Ok(ResolvedInstruction {
        program_id: lookup(ix.program_id_index)?,
        accounts: ix.accounts.iter().map(|&i| lookup(i)).collect::<Result<Vec<_>>>()?,
    })
}

fn parse_pubkey(value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value).with_context(|| format!("Adresse invalide dans la transaction : {}", value))
}
