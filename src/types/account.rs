//! Account-related types for the wallet
//!
//! This module defines the Account structure holding a participant's balance.

use super::amount::Amount;
use serde::Serialize;

/// Account identifier
///
/// Opaque unique key. Its numeric order is the canonical lock order.
pub type AccountId = u64;

/// Wallet account state
///
/// Mutated only by the transfer engine while it holds the account's lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    /// The account ID
    pub id: AccountId,

    /// Current balance at scale 4
    ///
    /// Not constrained to be non-negative here; the transfer engine refuses
    /// any debit that would take it below zero.
    pub balance: Amount,
}

impl Account {
    /// Create a new account with a zero balance
    pub fn new(id: AccountId) -> Self {
        Self::with_balance(id, Amount::ZERO)
    }

    /// Create an account with an opening balance
    pub fn with_balance(id: AccountId, balance: Amount) -> Self {
        Account { id, balance }
    }
}
