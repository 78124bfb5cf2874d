// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pending-transaction bookkeeping.
//!
//! On a half-duplex RTU line nothing in a frame says whether it is a
//! request or a response; the only usable signal is memory of what we
//! sent. The tracker remembers outbound requests keyed by transaction and
//! expires them after a timeout, so a crashed peer cannot pin the
//! classification of a unit/function pair forever.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::frame::{Message, Transaction};

/// Default lifetime of a pending transaction.
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(1);

/// Interval of the background expiry sweep.
const SWEEP_INTERVAL: Duration = Duration::from_millis(100);

struct Entry {
    request: Option<Message>,
    deadline: Instant,
}

struct Inner {
    pending: HashMap<Transaction, Entry>,
    timeout: Duration,
}

/// Tracks in-flight requests to classify inbound frames.
///
/// Cheap to clone; all clones share the same pending set.
#[derive(Clone)]
pub struct TransactionTracker {
    inner: Arc<Mutex<Inner>>,
}

impl TransactionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                pending: HashMap::new(),
                timeout: DEFAULT_TRANSACTION_TIMEOUT,
            })),
        }
    }

    /// Replace the expiry timeout for transactions added from now on.
    pub fn set_timeout(&self, timeout: Duration) {
        self.lock().timeout = timeout;
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.lock().timeout
    }

    /// Whether a request for this transaction is in flight and not expired.
    ///
    /// An expired entry is removed on the spot, so a frame arriving after
    /// the timeout is classified as a fresh request.
    #[must_use]
    pub fn is_request_active(&self, transaction: &Transaction) -> bool {
        let mut inner = self.lock();
        match inner.pending.get(transaction) {
            Some(entry) if entry.deadline > Instant::now() => true,
            Some(_) => {
                inner.pending.remove(transaction);
                trace!(%transaction, "pending transaction expired on lookup");
                false
            }
            None => false,
        }
    }

    /// Record an outbound request without retaining the message.
    pub fn add_transaction(&self, transaction: Transaction) {
        self.insert(transaction, None);
    }

    /// Record an outbound request and retain it for later correlation.
    pub fn add_transaction_with(&self, transaction: Transaction, request: Message) {
        self.insert(transaction, Some(request));
    }

    fn insert(&self, transaction: Transaction, request: Option<Message>) {
        let mut inner = self.lock();
        let deadline = Instant::now() + inner.timeout;
        inner.pending.insert(transaction, Entry { request, deadline });
    }

    /// Close a transaction, returning the retained request if any.
    ///
    /// The outer `Option` is `None` when no such transaction was pending.
    pub fn remove_transaction(&self, transaction: &Transaction) -> Option<Option<Message>> {
        self.lock()
            .pending
            .remove(transaction)
            .map(|entry| entry.request)
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn sweep(&self) -> usize {
        let mut inner = self.lock();
        let now = Instant::now();
        let before = inner.pending.len();
        inner.pending.retain(|_, entry| entry.deadline > now);
        let removed = before - inner.pending.len();
        if removed > 0 {
            trace!(removed, "expired pending transactions");
        }
        removed
    }

    /// Spawn a background task sweeping expired entries until cancelled.
    pub fn spawn_sweeper(&self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let tracker = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        tracker.sweep();
                    }
                }
            }
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // The critical sections never panic, so poisoning is unreachable;
        // recover instead of propagating it.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TransactionTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FunctionCode, ReadRequest};

    fn transaction() -> Transaction {
        Transaction {
            unit: 0x11,
            function: FunctionCode::ReadHoldingRegisters,
        }
    }

    #[test]
    fn active_until_removed() {
        let tracker = TransactionTracker::new();
        let t = transaction();
        assert!(!tracker.is_request_active(&t));
        tracker.add_transaction(t);
        assert!(tracker.is_request_active(&t));
        assert_eq!(tracker.remove_transaction(&t), Some(None));
        assert!(!tracker.is_request_active(&t));
        assert_eq!(tracker.remove_transaction(&t), None);
    }

    #[test]
    fn retained_request_is_returned() {
        let tracker = TransactionTracker::new();
        let request = Message::ReadRequest(ReadRequest {
            unit: 0x11,
            function: FunctionCode::ReadHoldingRegisters,
            register: 0x6B,
            count: 3,
        });
        tracker.add_transaction_with(transaction(), request.clone());
        assert_eq!(
            tracker.remove_transaction(&transaction()),
            Some(Some(request))
        );
    }

    #[test]
    fn expired_entry_is_dropped_on_lookup() {
        let tracker = TransactionTracker::new();
        tracker.set_timeout(Duration::ZERO);
        tracker.add_transaction(transaction());
        assert!(!tracker.is_request_active(&transaction()));
        assert_eq!(tracker.remove_transaction(&transaction()), None);
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let tracker = TransactionTracker::new();
        tracker.set_timeout(Duration::ZERO);
        tracker.add_transaction(transaction());
        tracker.set_timeout(Duration::from_secs(60));
        tracker.add_transaction(Transaction {
            unit: 0x22,
            function: FunctionCode::ReadCoils,
        });
        assert_eq!(tracker.sweep(), 1);
        assert!(tracker.is_request_active(&Transaction {
            unit: 0x22,
            function: FunctionCode::ReadCoils,
        }));
    }

    #[tokio::test]
    async fn sweeper_task_expires_entries() {
        let tracker = TransactionTracker::new();
        tracker.set_timeout(Duration::from_millis(50));
        tracker.add_transaction(transaction());

        let cancel = CancellationToken::new();
        let handle = tracker.spawn_sweeper(cancel.clone());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!tracker.is_request_active(&transaction()));

        cancel.cancel();
        handle.await.unwrap();
    }
}
