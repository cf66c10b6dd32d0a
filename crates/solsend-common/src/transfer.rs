//! System Program transfer construction and signing.

use solana_sdk::{
    hash::Hash,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    system_program,
    transaction::Transaction,
};

use crate::errors::{Error, Result};

/// Index of `Transfer` in the System Program's instruction enum
pub const TRANSFER_DISCRIMINANT: u32 = 2;
pub const TRANSFER_DATA_LEN: usize = 12;

/// `u32 LE discriminant ‖ u64 LE lamports`
pub fn transfer_instruction_data(lamports: u64) -> [u8; TRANSFER_DATA_LEN] {
    let mut data = [0u8; TRANSFER_DATA_LEN];
    data[0..4].copy_from_slice(&TRANSFER_DISCRIMINANT.to_le_bytes());
    data[4..12].copy_from_slice(&lamports.to_le_bytes());
    data
}

pub fn transfer_instruction(from: &Pubkey, to: &Pubkey, lamports: u64) -> Instruction {
    Instruction {
        program_id: system_program::id(),
        accounts: vec![AccountMeta::new(*from, true), AccountMeta::new(*to, false)],
        data: transfer_instruction_data(lamports).to_vec(),
    }
}

/// Sign every required slot of `transaction` with `signer`.
pub fn sign_transaction(
    transaction: &mut Transaction,
    signer: &Keypair,
    blockhash: Hash,
) -> Result<()> {
    transaction
        .try_sign(&[signer], blockhash)
        .map_err(|e| Error::Signing(e.to_string()))
}

/// Build a single-instruction transfer paid and signed by `payer`.
pub fn build_transfer_transaction(
    payer: &Keypair,
    to: &Pubkey,
    lamports: u64,
    blockhash: Hash,
) -> Result<Transaction> {
    let from = payer.pubkey();
    let instruction = transfer_instruction(&from, to, lamports);
    let mut transaction = Transaction::new_with_payer(&[instruction], Some(&from));
    sign_transaction(&mut transaction, payer, blockhash)?;
    Ok(transaction)
}
