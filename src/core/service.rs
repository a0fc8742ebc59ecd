//! Boundary orchestration around the transfer engine
//!
//! `TransferService` is what callers talk to. For each submission it:
//!
//! 1. counts the attempt against the sender's rate limit
//! 2. reserves the idempotency token, if one was given
//! 3. runs the engine
//! 4. releases the reservation when the engine rejected the transfer on
//!    business grounds, so the client can fix the request and resend it
//! 5. publishes `transaction.created` to both participants
//!
//! Publishing happens after commit. A failed publish is logged and the
//! transfer still succeeds.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use super::engine::TransferEngine;
use super::idempotency::{self, reservation_key};
use super::ledger::{Cursor, TransactionPage};
use super::notification::TransactionCreated;
use super::rate_limit::{self, RateLimiter};
use super::traits::{AccountStore, DeduplicationStore, NotificationSink, TransactionLedger};
use crate::types::{
    AccountId, Amount, Direction, Transaction, TransferError, TransferReceipt, TransferRequest,
};

/// Boundary policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundarySettings {
    /// Lifetime of an idempotency reservation
    pub idempotency_ttl: Duration,

    /// Transfers per sender per window; 0 disables the limit
    pub transfer_rate_limit: u32,

    pub rate_limit_window: Duration,
}

impl Default for BoundarySettings {
    fn default() -> Self {
        Self {
            idempotency_ttl: idempotency::DEFAULT_TTL,
            transfer_rate_limit: rate_limit::DEFAULT_LIMIT,
            rate_limit_window: rate_limit::DEFAULT_WINDOW,
        }
    }
}

/// A transaction labelled from the viewing account's side
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryItem {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub direction: Direction,
}

/// An account's balance together with a page of its history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountHistory {
    pub account: AccountId,
    pub balance: Amount,
    pub items: Vec<HistoryItem>,

    /// Pass back to fetch the next page; `None` on the last one
    pub next_cursor: Option<Cursor>,
}

/// Entry point for transfer submissions
pub struct TransferService {
    engine: Arc<TransferEngine>,
    dedup: Arc<dyn DeduplicationStore>,
    notifier: Arc<dyn NotificationSink>,
    limiter: RateLimiter,
    settings: BoundarySettings,
}

impl TransferService {
    pub fn new(
        engine: Arc<TransferEngine>,
        dedup: Arc<dyn DeduplicationStore>,
        notifier: Arc<dyn NotificationSink>,
        settings: BoundarySettings,
    ) -> Self {
        Self {
            engine,
            dedup,
            notifier,
            limiter: RateLimiter::new(settings.transfer_rate_limit, settings.rate_limit_window),
            settings,
        }
    }

    pub fn engine(&self) -> &Arc<TransferEngine> {
        &self.engine
    }

    pub fn settings(&self) -> BoundarySettings {
        self.settings
    }

    /// Submit one transfer
    ///
    /// # Returns
    ///
    /// * `Ok(TransferReceipt)` - the transfer committed
    /// * `Err(TransferError::RateLimited)` - sender is over its limit; nothing else ran
    /// * `Err(TransferError::DuplicateRequest)` - the idempotency token is taken
    /// * any engine error otherwise
    pub async fn submit(&self, request: TransferRequest) -> Result<TransferReceipt, TransferError> {
        self.limiter.check(request.sender)?;

        let reservation = match request.idempotency_key.as_deref() {
            Some(token) => {
                let key = reservation_key(token);
                if !self.dedup.reserve(&key, self.settings.idempotency_ttl) {
                    debug!(key = %key, sender = request.sender, "duplicate submission rejected");
                    return Err(TransferError::DuplicateRequest {
                        key: token.to_string(),
                    });
                }
                Some(key)
            }
            None => None,
        };

        match self.engine.execute(&request).await {
            Ok(receipt) => {
                self.publish(&receipt);
                Ok(receipt)
            }
            Err(error) => {
                if let Some(key) = reservation.as_deref() {
                    if error.is_business() {
                        self.dedup.release(key);
                    }
                }
                Err(error)
            }
        }
    }

    /// Current balance and one page of history, newest first
    pub async fn history(
        &self,
        account: AccountId,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> Result<AccountHistory, TransferError> {
        let balance = self
            .engine
            .accounts()
            .balance(account)
            .await
            .ok_or_else(|| TransferError::account_not_found(account))?;
        let TransactionPage { items, next_cursor } = self
            .engine
            .ledger()
            .list_for_participant(account, cursor, limit);
        let items = items
            .into_iter()
            .filter_map(|transaction| {
                transaction
                    .direction_for(account)
                    .map(|direction| HistoryItem {
                        transaction,
                        direction,
                    })
            })
            .collect();

        Ok(AccountHistory {
            account,
            balance,
            items,
            next_cursor,
        })
    }

    fn publish(&self, receipt: &TransferReceipt) {
        let event = TransactionCreated::from_receipt(receipt);
        for channel in event.channels() {
            if let Err(error) = self.notifier.publish(&channel, &event) {
                warn!(
                    tx_id = %receipt.transaction.id,
                    channel = %channel,
                    error = %error,
                    "failed to publish transaction event"
                );
            }
        }
    }
}

impl std::fmt::Debug for TransferService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferService")
            .field("engine", &self.engine)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::account_store::InMemoryAccountStore;
    use crate::core::engine::EngineSettings;
    use crate::core::idempotency::InMemoryDeduplicationStore;
    use crate::core::ledger::InMemoryLedger;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        published: Mutex<Vec<(String, TransactionCreated)>>,
    }

    impl NotificationSink for RecordingSink {
        fn publish(&self, channel: &str, event: &TransactionCreated) -> Result<(), TransferError> {
            self.published
                .lock()
                .unwrap()
                .push((channel.to_string(), event.clone()));
            Ok(())
        }
    }

    struct FailingSink;

    impl NotificationSink for FailingSink {
        fn publish(&self, _: &str, _: &TransactionCreated) -> Result<(), TransferError> {
            Err(TransferError::storage("broker down"))
        }
    }

    struct Harness {
        service: TransferService,
        dedup: Arc<InMemoryDeduplicationStore>,
        sink: Arc<RecordingSink>,
    }

    fn harness(settings: BoundarySettings) -> Harness {
        let store = Arc::new(InMemoryAccountStore::new());
        store.open_account(1, Amount::from_minor_units(10_000_000)).unwrap();
        store.open_account(2, Amount::ZERO).unwrap();
        let engine = Arc::new(TransferEngine::new(
            store as Arc<dyn AccountStore>,
            Arc::new(InMemoryLedger::new()) as Arc<dyn TransactionLedger>,
            EngineSettings::default(),
        ));
        let dedup = Arc::new(InMemoryDeduplicationStore::new());
        let sink = Arc::new(RecordingSink::default());
        let service = TransferService::new(
            engine,
            Arc::clone(&dedup) as Arc<dyn DeduplicationStore>,
            Arc::clone(&sink) as Arc<dyn NotificationSink>,
            settings,
        );
        Harness {
            service,
            dedup,
            sink,
        }
    }

    fn unlimited() -> BoundarySettings {
        BoundarySettings {
            transfer_rate_limit: 0,
            ..BoundarySettings::default()
        }
    }

    #[tokio::test]
    async fn test_submit_publishes_to_both_participants() {
        let h = harness(unlimited());

        let receipt = h
            .service
            .submit(TransferRequest::new(1, 2, "100"))
            .await
            .unwrap();

        let published = h.sink.published.lock().unwrap();
        let channels: Vec<&str> = published.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(channels, vec!["user.1", "user.2"]);
        assert_eq!(published[0].1.transaction, receipt.transaction);
        assert_eq!(published[0].1.sender_balance.to_string(), "898.5000");
        assert_eq!(published[1].1.receiver_balance.to_string(), "100.0000");
    }

    #[tokio::test]
    async fn test_duplicate_key_is_rejected_without_running_engine() {
        let h = harness(unlimited());
        let request = TransferRequest::new(1, 2, "10").with_idempotency_key("abc");

        h.service.submit(request.clone()).await.unwrap();
        let second = h.service.submit(request).await;

        assert_eq!(
            second,
            Err(TransferError::DuplicateRequest {
                key: "abc".to_string()
            })
        );
        assert_eq!(h.service.engine().ledger().len(), 1);
        assert_eq!(h.sink.published.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_business_error_releases_reservation() {
        let h = harness(unlimited());

        let rejected = h
            .service
            .submit(TransferRequest::new(1, 2, "5000").with_idempotency_key("retry-me"))
            .await;
        assert!(matches!(rejected, Err(TransferError::InsufficientBalance { .. })));
        assert!(h.dedup.is_empty());

        let fixed = h
            .service
            .submit(TransferRequest::new(1, 2, "50").with_idempotency_key("retry-me"))
            .await;
        assert!(fixed.is_ok());
        assert_eq!(h.dedup.len(), 1);
    }

    #[tokio::test]
    async fn test_keyed_submit_with_unbounded_ttl() {
        let h = harness(BoundarySettings {
            idempotency_ttl: Duration::from_secs(u64::MAX),
            ..unlimited()
        });
        let request = TransferRequest::new(1, 2, "10").with_idempotency_key("forever");

        assert!(h.service.submit(request.clone()).await.is_ok());
        assert!(matches!(
            h.service.submit(request).await,
            Err(TransferError::DuplicateRequest { .. })
        ));
        assert_eq!(h.dedup.len(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_before_engine() {
        let h = harness(BoundarySettings {
            transfer_rate_limit: 2,
            ..BoundarySettings::default()
        });

        h.service.submit(TransferRequest::new(1, 2, "1")).await.unwrap();
        h.service.submit(TransferRequest::new(1, 2, "1")).await.unwrap();
        let third = h
            .service
            .submit(TransferRequest::new(1, 2, "1").with_idempotency_key("k"))
            .await;

        assert!(matches!(third, Err(TransferError::RateLimited { account: 1, .. })));
        assert!(h.dedup.is_empty());
        assert_eq!(h.service.engine().ledger().len(), 2);

        // the receiver has its own budget
        assert!(h.service.submit(TransferRequest::new(2, 1, "1")).await.is_ok());
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_fail_transfer() {
        let store = Arc::new(InMemoryAccountStore::new());
        store.open_account(1, Amount::from_minor_units(10_000_000)).unwrap();
        store.open_account(2, Amount::ZERO).unwrap();
        let engine = Arc::new(TransferEngine::new(
            store as Arc<dyn AccountStore>,
            Arc::new(InMemoryLedger::new()) as Arc<dyn TransactionLedger>,
            EngineSettings::default(),
        ));
        let service = TransferService::new(
            engine,
            Arc::new(InMemoryDeduplicationStore::new()),
            Arc::new(FailingSink),
            unlimited(),
        );

        let result = service.submit(TransferRequest::new(1, 2, "10")).await;

        assert!(result.is_ok());
        assert_eq!(service.engine().ledger().len(), 1);
    }

    #[tokio::test]
    async fn test_history_returns_balance_and_newest_first_page() {
        let h = harness(unlimited());
        let first = h.service.submit(TransferRequest::new(1, 2, "10")).await.unwrap();
        let second = h.service.submit(TransferRequest::new(2, 1, "5")).await.unwrap();

        let history = h.service.history(2, None, 20).await.unwrap();

        assert_eq!(history.balance.to_string(), "4.9250");
        let ids: Vec<_> = history.items.iter().map(|i| i.transaction.id).collect();
        assert_eq!(ids, vec![second.transaction.id, first.transaction.id]);
        let directions: Vec<_> = history.items.iter().map(|i| i.direction).collect();
        assert_eq!(directions, vec![Direction::Outgoing, Direction::Incoming]);
        assert_eq!(history.next_cursor, None);
    }

    #[tokio::test]
    async fn test_history_item_serializes_flat_with_direction() {
        let h = harness(unlimited());
        h.service.submit(TransferRequest::new(1, 2, "10")).await.unwrap();

        let history = h.service.history(1, None, 0).await.unwrap();
        let json = serde_json::to_value(&history.items[0]).unwrap();

        assert_eq!(json["direction"], "outgoing");
        assert_eq!(json["sender_id"], 1);
        assert_eq!(json["amount"], "10.0000");
    }

    #[tokio::test]
    async fn test_history_with_unbounded_limit_is_capped() {
        let h = harness(unlimited());
        h.service.submit(TransferRequest::new(1, 2, "10")).await.unwrap();

        let history = h.service.history(1, None, usize::MAX).await.unwrap();

        assert_eq!(history.items.len(), 1);
        assert_eq!(history.next_cursor, None);
    }

    #[tokio::test]
    async fn test_history_for_unknown_account() {
        let h = harness(unlimited());

        let result = h.service.history(99, None, 20).await;

        assert_eq!(result, Err(TransferError::account_not_found(99)));
    }
}
