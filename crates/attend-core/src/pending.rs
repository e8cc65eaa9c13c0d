use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::models::RsvpSubmission;

/// An RSVP waiting for its Lightning invoice to settle. Lives only in
/// process memory; there is deliberately no expiry, so an abandoned invoice
/// leaks its record until restart.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPayment {
    pub invoice_id: String,
    pub amount: Decimal,
    pub rsvp: RsvpSubmission,
    pub paid: bool,
    pub created: DateTime<Utc>,
}

impl PendingPayment {
    pub fn new(invoice_id: impl Into<String>, amount: Decimal, rsvp: RsvpSubmission) -> Self {
        Self {
            invoice_id: invoice_id.into(),
            amount,
            rsvp,
            paid: false,
            created: Utc::now(),
        }
    }
}

/// Pending payments keyed by invoice id. Handlers run on a multi-threaded
/// runtime, so every access goes through the mutex; `take_paid` is the
/// only way a record leaves the map on the settlement path, which keeps the
/// commit exactly-once even under concurrent polls for the same invoice.
#[derive(Debug, Default)]
pub struct PendingPayments {
    inner: Mutex<HashMap<String, PendingPayment>>,
}

impl PendingPayments {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, payment: PendingPayment) {
        let mut inner = self.inner.lock().await;
        inner.insert(payment.invoice_id.clone(), payment);
    }

    pub async fn get(&self, invoice_id: &str) -> Option<PendingPayment> {
        let inner = self.inner.lock().await;
        inner.get(invoice_id).cloned()
    }

    /// Flips the paid flag. Returns false when the record is already gone,
    /// which means another poll has taken it for commit.
    pub async fn mark_paid(&self, invoice_id: &str) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.get_mut(invoice_id) {
            Some(payment) => {
                payment.paid = true;
                true
            }
            None => false,
        }
    }

    /// Removes and returns the record only if it is already marked paid.
    pub async fn take_paid(&self, invoice_id: &str) -> Option<PendingPayment> {
        let mut inner = self.inner.lock().await;
        if inner.get(invoice_id).is_some_and(|payment| payment.paid) {
            inner.remove(invoice_id)
        } else {
            None
        }
    }

    pub async fn remove(&self, invoice_id: &str) -> Option<PendingPayment> {
        let mut inner = self.inner.lock().await;
        inner.remove(invoice_id)
    }

    pub async fn len(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Asks the payment processor whether an invoice has settled. Transport
/// failures report as unsettled so the client keeps polling.
#[async_trait]
pub trait SettlementCheck: Send + Sync {
    async fn is_settled(&self, invoice_id: &str) -> bool;
}

/// One step of the per-invoice state machine:
/// Created -> PollingUnpaid -> Paid -> Committed.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// No record for this invoice id (never existed, or already committed).
    Unknown,
    /// Record exists and the processor has not reported settlement.
    Pending,
    /// Settlement detected on this poll; the commit happens on the next one.
    Detected,
    /// Record was already paid; it has been evicted and the caller must now
    /// commit the embedded RSVP.
    Commit(PendingPayment),
}

impl PollOutcome {
    pub fn paid(&self) -> bool {
        matches!(self, PollOutcome::Detected | PollOutcome::Commit(_))
    }
}

/// Drives one status check for an invoice. The detect and commit phases are
/// deliberately separate polls: detection flips the flag, the following poll
/// evicts the record and hands it to the caller for the durable insert.
pub async fn poll_status(
    store: &PendingPayments,
    checker: &dyn SettlementCheck,
    invoice_id: &str,
) -> PollOutcome {
    if let Some(payment) = store.take_paid(invoice_id).await {
        return PollOutcome::Commit(payment);
    }

    if store.get(invoice_id).await.is_none() {
        return PollOutcome::Unknown;
    }

    if checker.is_settled(invoice_id).await {
        store.mark_paid(invoice_id).await;
        PollOutcome::Detected
    } else {
        PollOutcome::Pending
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    fn rsvp(event_id: i64) -> RsvpSubmission {
        RsvpSubmission {
            name: "Alice".to_string(),
            email: "alice@example.org".to_string(),
            event_id,
        }
    }

    struct FixedSettlement {
        settled: AtomicBool,
        calls: AtomicUsize,
    }

    impl FixedSettlement {
        fn new(settled: bool) -> Self {
            Self {
                settled: AtomicBool::new(settled),
                calls: AtomicUsize::new(0),
            }
        }

        fn settle(&self) {
            self.settled.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl SettlementCheck for FixedSettlement {
        async fn is_settled(&self, _invoice_id: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.settled.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn insert_and_get_round_trip() {
        let store = PendingPayments::new();
        store
            .insert(PendingPayment::new("inv-1", Decimal::from(10), rsvp(3)))
            .await;

        let payment = store.get("inv-1").await.unwrap();
        assert!(!payment.paid);
        assert_eq!(payment.rsvp.event_id, 3);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn take_paid_requires_the_flag() {
        let store = PendingPayments::new();
        store
            .insert(PendingPayment::new("inv-1", Decimal::from(10), rsvp(3)))
            .await;

        assert!(store.take_paid("inv-1").await.is_none());
        assert!(store.mark_paid("inv-1").await);
        let taken = store.take_paid("inv-1").await.unwrap();
        assert!(taken.paid);
        assert!(store.is_empty().await);
        // A second take finds nothing.
        assert!(store.take_paid("inv-1").await.is_none());
    }

    #[tokio::test]
    async fn unknown_invoice_polls_as_unknown() {
        let store = PendingPayments::new();
        let checker = FixedSettlement::new(true);

        let outcome = poll_status(&store, &checker, "no-such-invoice").await;
        assert_eq!(outcome, PollOutcome::Unknown);
        assert!(!outcome.paid());
        assert_eq!(checker.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unsettled_invoice_stays_pending() {
        let store = PendingPayments::new();
        store
            .insert(PendingPayment::new("inv-1", Decimal::from(10), rsvp(3)))
            .await;
        let checker = FixedSettlement::new(false);

        for _ in 0..3 {
            let outcome = poll_status(&store, &checker, "inv-1").await;
            assert_eq!(outcome, PollOutcome::Pending);
        }
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn detect_then_commit_across_two_polls() {
        let store = PendingPayments::new();
        store
            .insert(PendingPayment::new("inv-1", Decimal::from(10), rsvp(4)))
            .await;
        let checker = FixedSettlement::new(false);

        assert_eq!(
            poll_status(&store, &checker, "inv-1").await,
            PollOutcome::Pending
        );

        checker.settle();
        let detected = poll_status(&store, &checker, "inv-1").await;
        assert_eq!(detected, PollOutcome::Detected);
        assert!(detected.paid());

        let committed = poll_status(&store, &checker, "inv-1").await;
        let PollOutcome::Commit(payment) = committed else {
            panic!("expected commit, got {committed:?}");
        };
        assert!(payment.paid);
        assert_eq!(payment.rsvp.event_id, 4);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn settled_invoice_commits_exactly_once() {
        let store = PendingPayments::new();
        store
            .insert(PendingPayment::new("inv-1", Decimal::from(10), rsvp(4)))
            .await;
        let checker = FixedSettlement::new(true);

        assert_eq!(
            poll_status(&store, &checker, "inv-1").await,
            PollOutcome::Detected
        );

        let mut commits = 0;
        for _ in 0..4 {
            if let PollOutcome::Commit(_) = poll_status(&store, &checker, "inv-1").await {
                commits += 1;
            }
        }
        assert_eq!(commits, 1);
        // Post-commit polls see no record at all.
        assert_eq!(
            poll_status(&store, &checker, "inv-1").await,
            PollOutcome::Unknown
        );
    }

    #[tokio::test]
    async fn concurrent_polls_yield_a_single_commit() {
        let store = std::sync::Arc::new(PendingPayments::new());
        store
            .insert(PendingPayment::new("inv-1", Decimal::from(10), rsvp(4)))
            .await;
        store.mark_paid("inv-1").await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(
                async move { store.take_paid("inv-1").await },
            ));
        }

        let mut commits = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                commits += 1;
            }
        }
        assert_eq!(commits, 1);
    }
}
