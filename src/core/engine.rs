//! Transfer engine: the atomic balance-mutation protocol
//!
//! This module provides the `TransferEngine` struct, which moves money between
//! two accounts, charges a commission to the sender, and writes one immutable
//! ledger record, all inside a single `UnitOfWork`.
//!
//! # Pipeline
//!
//! ```text
//! validate ── same participant? ── normalize amount ── positive? ── commission
//!    │
//!    ▼
//! UnitOfWork::begin
//!    ├── AccountStore::lock_for_update({sender, receiver})  (ascending id order)
//!    ├── sufficiency check (balance >= amount + commission)
//!    ├── AccountStore::save(sender), AccountStore::save(receiver)
//!    ├── TransactionLedger::create(record)
//!    └── commit  ── or rollback on any error
//! ```
//!
//! Every validation failure is terminal and happens before any mutation. No
//! caller can observe a partially applied transfer.
//!
//! # Architecture
//!
//! ```text
//! TransferEngine
//!     ├── Arc<dyn AccountStore>       (locked balance reads and staged writes)
//!     ├── Arc<dyn TransactionLedger>  (append-only records)
//!     └── Mutex<ulid::Generator>      (monotonic transaction ids)
//! ```

use std::sync::{Arc, Mutex};

use tracing::{debug, info};
use ulid::Generator;

use super::traits::{AccountStore, TransactionLedger};
use super::unit_of_work::UnitOfWork;
use crate::types::{
    AccountId, Amount, CommissionRate, InvalidTransferReason, RoundingMode, Transaction,
    TransactionId, TransferError, TransferReceipt, TransferRequest,
};

/// Commission policy applied by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineSettings {
    pub commission_rate: CommissionRate,
    pub rounding: RoundingMode,
}

/// Validated amounts for one transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    /// Normalized amount credited to the receiver
    pub amount: Amount,
    /// Fee charged to the sender
    pub commission: Amount,
    /// `amount + commission`, debited from the sender
    pub total_debit: Amount,
}

/// Transfer processing orchestrator
///
/// Shareable across tasks behind an `Arc`; every call to
/// [`TransferEngine::execute`] is independent and may run in parallel with
/// any other.
pub struct TransferEngine {
    accounts: Arc<dyn AccountStore>,
    ledger: Arc<dyn TransactionLedger>,
    settings: EngineSettings,
    ids: Mutex<Generator>,
}

impl TransferEngine {
    /// Create a new TransferEngine
    ///
    /// # Arguments
    ///
    /// * `accounts` - Account store used for locked reads and staged writes
    /// * `ledger` - Ledger receiving one record per committed transfer
    /// * `settings` - Commission rate and rounding mode
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        ledger: Arc<dyn TransactionLedger>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            accounts,
            ledger,
            settings,
            ids: Mutex::new(Generator::new()),
        }
    }

    pub fn accounts(&self) -> &Arc<dyn AccountStore> {
        &self.accounts
    }

    pub fn ledger(&self) -> &Arc<dyn TransactionLedger> {
        &self.ledger
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    /// Normalize an amount and compute its commission
    ///
    /// # Returns
    ///
    /// * `Ok(Quote)` - amount, commission and total debit at scale 4
    /// * `Err(TransferError::InvalidTransfer)` - malformed or non-positive amount
    /// * `Err(TransferError::ArithmeticOverflow)` - total debit out of range
    pub fn quote(&self, sender: AccountId, amount: &str) -> Result<Quote, TransferError> {
        let amount = Amount::normalize(amount)?;
        if !amount.is_positive() {
            return Err(TransferError::invalid_transfer(
                InvalidTransferReason::NonPositiveAmount,
            ));
        }

        let commission = amount
            .mul_rate(self.settings.commission_rate, self.settings.rounding)
            .ok_or_else(|| TransferError::arithmetic_overflow("commission", sender))?;
        let total_debit = amount
            .checked_add(commission)
            .ok_or_else(|| TransferError::arithmetic_overflow("debit", sender))?;

        Ok(Quote {
            amount,
            commission,
            total_debit,
        })
    }

    /// Move `amount` from `sender` to `receiver`
    ///
    /// Returns the persisted ledger record. See [`TransferEngine::execute`]
    /// for the post-transfer balances.
    pub async fn transfer(
        &self,
        sender: AccountId,
        receiver: AccountId,
        amount: &str,
    ) -> Result<Transaction, TransferError> {
        self.execute(&TransferRequest::new(sender, receiver, amount))
            .await
            .map(|receipt| receipt.transaction)
    }

    /// Run one transfer as an atomic unit of work
    ///
    /// # Returns
    ///
    /// * `Ok(TransferReceipt)` - the committed record and both balances after commit
    /// * `Err(TransferError::InvalidTransfer)` - same participant, malformed or non-positive amount
    /// * `Err(TransferError::AccountNotFound)` - either account does not exist
    /// * `Err(TransferError::InsufficientBalance)` - sender cannot cover amount plus commission
    /// * `Err(TransferError::ArithmeticOverflow)` - a balance would leave the decimal range
    /// * `Err(TransferError::Storage)` - infrastructure failure; never retried here
    ///
    /// On any error nothing is persisted.
    pub async fn execute(&self, request: &TransferRequest) -> Result<TransferReceipt, TransferError> {
        if request.sender == request.receiver {
            return Err(TransferError::invalid_transfer(
                InvalidTransferReason::SameParticipant,
            ));
        }
        let quote = self.quote(request.sender, &request.amount)?;

        let mut uow = UnitOfWork::begin();
        match self.apply(&mut uow, request.sender, request.receiver, quote).await {
            Ok(receipt) => {
                uow.commit();
                info!(
                    tx_id = %receipt.transaction.id,
                    sender = request.sender,
                    receiver = request.receiver,
                    amount = %quote.amount,
                    commission = %quote.commission,
                    "transfer committed"
                );
                Ok(receipt)
            }
            Err(error) => {
                uow.rollback();
                debug!(
                    sender = request.sender,
                    receiver = request.receiver,
                    code = error.code(),
                    "transfer rolled back"
                );
                Err(error)
            }
        }
    }

    async fn apply(
        &self,
        uow: &mut UnitOfWork,
        sender: AccountId,
        receiver: AccountId,
        quote: Quote,
    ) -> Result<TransferReceipt, TransferError> {
        let mut locked = self
            .accounts
            .lock_for_update(uow, &[sender, receiver])
            .await?;
        let mut from = locked
            .remove(&sender)
            .ok_or_else(|| TransferError::account_not_found(sender))?;
        let mut to = locked
            .remove(&receiver)
            .ok_or_else(|| TransferError::account_not_found(receiver))?;

        if from.balance < quote.total_debit {
            return Err(TransferError::insufficient_balance(
                sender,
                from.balance,
                quote.total_debit,
            ));
        }

        from.balance = from
            .balance
            .checked_sub(quote.total_debit)
            .ok_or_else(|| TransferError::arithmetic_overflow("debit", sender))?;
        to.balance = to
            .balance
            .checked_add(quote.amount)
            .ok_or_else(|| TransferError::arithmetic_overflow("credit", receiver))?;

        let sender_balance = from.balance;
        let receiver_balance = to.balance;
        self.accounts.save(uow, from)?;
        self.accounts.save(uow, to)?;

        let record = Transaction::new(
            self.next_id()?,
            sender,
            receiver,
            quote.amount,
            quote.commission,
        );
        let transaction = self.ledger.create(uow, record)?;

        Ok(TransferReceipt {
            transaction,
            sender_balance,
            receiver_balance,
        })
    }

    fn next_id(&self) -> Result<TransactionId, TransferError> {
        let mut ids = self
            .ids
            .lock()
            .map_err(|_| TransferError::storage("transaction id generator poisoned"))?;
        ids.generate()
            .map(TransactionId::from_ulid)
            .map_err(|e| TransferError::storage(format!("transaction id generation failed: {}", e)))
    }
}

impl std::fmt::Debug for TransferEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferEngine")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
