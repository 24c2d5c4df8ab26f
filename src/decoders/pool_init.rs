// DANS : src/decoders/pool_init.rs

use crate::rpc::ResolvedTransaction;
use anyhow::{Result, bail};
use solana_sdk::pubkey::Pubkey;

// Positions fixes des comptes dans l'instruction `initialize2` de Raydium AMM V4.
pub const PAIR_ID_INDEX: usize = 4;
pub const TOKEN0_INDEX: usize = 8;
pub const TOKEN1_INDEX: usize = 9;
pub const DEPLOYER_INDEX: usize = 17;

/// Côté de la paire qui porte le token découvert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteSide {
    Token0,
    Token1,
}

impl QuoteSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteSide::Token0 => "token0",
            QuoteSide::Token1 => "token1",
        }
    }
}

/// Les comptes utiles d'une instruction de création de pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolAccounts {
    pub pair_id: Pubkey,
    pub token0: Pubkey,
    pub token1: Pubkey,
    pub deployer: Pubkey,
}

impl PoolAccounts {
    /// Le token "nouveau" est celui qui n'est pas le mint natif (SOL wrappé).
    pub fn subject_side(&self, native_mint: &Pubkey) -> QuoteSide {
        if self.token0 == *native_mint {
            QuoteSide::Token1
        } else {
            QuoteSide::Token0
        }
    }

    pub fn subject_token(&self, native_mint: &Pubkey) -> Pubkey {
        match self.subject_side(native_mint) {
            QuoteSide::Token0 => self.token0,
            QuoteSide::Token1 => self.token1,
        }
    }
}

/// Cherche la première instruction du programme de pool et en extrait les comptes.
/// `Ok(None)` si la transaction ne contient aucune instruction de ce programme.
pub fn parse_pool_creation(tx: &ResolvedTransaction, pool_program: &Pubkey) -> Result<Option<PoolAccounts>> {
    let Some(ix) = tx.instructions.iter().find(|ix| ix.program_id == *pool_program) else {
        return Ok(None);
    };
    if ix.accounts.len() <= DEPLOYER_INDEX {
        bail!(
            "Instruction du programme {} avec seulement {} comptes dans {}",
            pool_program,
            ix.accounts.len(),
            tx.signature
        );
    }
    Ok(Some(PoolAccounts {
        pair_id: ix.accounts[PAIR_ID_INDEX],
        token0: ix.accounts[TOKEN0_INDEX],
        token1: ix.accounts[TOKEN1_INDEX],
        deployer: ix.accounts[DEPLOYER_INDEX],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::ResolvedInstruction;
    use solana_sdk::signature::Signature;

    fn instruction(program_id: Pubkey, n: usize) -> ResolvedInstruction {
        ResolvedInstruction {
            program_id,
            accounts: (0..n).map(|_| Pubkey::new_unique()).collect(),
        }
    }

    fn tx(instructions: Vec<ResolvedInstruction>) -> ResolvedTransaction {
        ResolvedTransaction {
            signature: Signature::new_unique(),
            instructions,
        }
    }

    #[test]
    fn extracts_fixed_accounts_from_the_first_match() {
        let program = Pubkey::new_unique();
        let first = instruction(program, 21);
        let second = instruction(program, 21);
        let tx = tx(vec![instruction(Pubkey::new_unique(), 3), first.clone(), second]);

        let accounts = parse_pool_creation(&tx, &program).unwrap().unwrap();

        assert_eq!(accounts.pair_id, first.accounts[4]);
        assert_eq!(accounts.token0, first.accounts[8]);
        assert_eq!(accounts.token1, first.accounts[9]);
        assert_eq!(accounts.deployer, first.accounts[17]);
    }

    #[test]
    fn no_matching_instruction_is_not_an_error() {
        let tx = tx(vec![instruction(Pubkey::new_unique(), 21)]);
        assert_eq!(parse_pool_creation(&tx, &Pubkey::new_unique()).unwrap(), None);
    }

    #[test]
    fn too_few_accounts_is_an_error() {
        let program = Pubkey::new_unique();
        let tx = tx(vec![instruction(program, 17)]);
        assert!(parse_pool_creation(&tx, &program).is_err());
    }

    #[test]
    fn subject_token_is_the_non_native_side() {
        let native = Pubkey::new_unique();
        let other = Pubkey::new_unique();
        let mut accounts = PoolAccounts {
            pair_id: Pubkey::new_unique(),
            token0: native,
            token1: other,
            deployer: Pubkey::new_unique(),
        };
        assert_eq!(accounts.subject_token(&native), other);
        assert_eq!(accounts.subject_side(&native), QuoteSide::Token1);

        accounts.token0 = other;
        accounts.token1 = native;
        assert_eq!(accounts.subject_token(&native), other);
        assert_eq!(accounts.subject_side(&native).as_str(), "token0");
    }
}
