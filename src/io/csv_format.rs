//! CSV format handling for seed accounts, transfers and balance output
//!
//! This module centralizes all CSV format concerns, providing:
//! - `SeedRecord` / `TransferCsvRecord` structures for deserialization
//! - Conversion from CSV records to domain types
//! - Balance output serialization
//!
//! All functions are pure (no I/O) for easy testing.

use crate::types::{Account, AccountId, Amount, TransferError, TransferRequest};
use serde::Deserialize;
use std::io::Write;

/// Opening balance row: `account,balance`
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SeedRecord {
    pub account: AccountId,
    pub balance: String,
}

/// Transfer row: `sender,receiver,amount[,idempotency_key]`
///
/// The amount stays a string; the engine decides whether it is valid so a bad
/// amount is reported with the same code whatever the input channel.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TransferCsvRecord {
    pub sender: AccountId,
    pub receiver: AccountId,
    pub amount: String,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// Convert a SeedRecord to an Account
///
/// # Returns
///
/// * `Ok(Account)` - account with its normalized opening balance
/// * `Err(String)` - malformed or negative balance
pub fn convert_seed_record(record: SeedRecord) -> Result<Account, String> {
    let balance = Amount::normalize(&record.balance)
        .map_err(|e| format!("Invalid balance for account {}: {}", record.account, e))?;

    if balance.is_negative() {
        return Err(format!(
            "Opening balance for account {} cannot be negative: {}",
            record.account, balance
        ));
    }

    Ok(Account::with_balance(record.account, balance))
}

impl From<TransferCsvRecord> for TransferRequest {
    fn from(record: TransferCsvRecord) -> Self {
        let request = TransferRequest::new(record.sender, record.receiver, record.amount);
        match record.idempotency_key {
            Some(key) if !key.trim().is_empty() => request.with_idempotency_key(key.trim()),
            _ => request,
        }
    }
}

/// Write balances to CSV format
///
/// Writes accounts with columns: account, balance. Accounts are sorted by id
/// for deterministic output.
pub fn write_balances_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), TransferError> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record(["account", "balance"])?;

    let mut sorted = accounts.to_vec();
    sorted.sort_by_key(|account| account.id);

    for account in sorted {
        writer.write_record(&[account.id.to_string(), account.balance.to_string()])?;
    }

    writer.flush()?;
    Ok(())
}
