//! Unit conversion and address helpers

use solana_sdk::pubkey::{ParsePubkeyError, Pubkey};

use crate::errors::{Error, Result};

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Convert a whole-SOL amount to lamports, truncating any sub-lamport remainder.
pub fn sol_to_lamports(sol: f64) -> u64 {
    (sol * LAMPORTS_PER_SOL as f64) as u64
}

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

pub fn parse_address(s: &str) -> Result<Pubkey> {
    s.trim()
        .parse::<Pubkey>()
        .map_err(|e: ParsePubkeyError| Error::AddressFormat(format!("{}: {}", s, e)))
}

/// `amount + fee_buffer`, or `None` when the sum does not fit in a `u64`.
pub fn required_balance(amount: u64, fee_buffer: u64) -> Option<u64> {
    amount.checked_add(fee_buffer)
}

/// Check that `balance` covers `amount` plus the flat fee buffer.
///
/// Returns the required total on success. A total that overflows can never be
/// covered and is reported as `u64::MAX`.
pub fn check_sufficient_funds(balance: u64, amount: u64, fee_buffer: u64) -> Result<u64> {
    match required_balance(amount, fee_buffer) {
        Some(required) if balance >= required => Ok(required),
        required => Err(Error::InsufficientFunds {
            required: required.unwrap_or(u64::MAX),
            available: balance,
        }),
    }
}
