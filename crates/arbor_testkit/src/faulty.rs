//! A backend wrapper that counts calls and injects failures.

use arbor_storage::{
    BackendClient, InMemoryBackend, KeyRevision, KeyValue, RangeResponse, StorageError,
    StorageResult, TxnOutcome, TxnRequest,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Backend operations that can be counted and failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BackendOp {
    /// Point read.
    Get,
    /// Range read with values.
    GetRange,
    /// Range read of keys and revisions.
    RangeRevisions,
    /// Conditional transaction.
    SubmitTxn,
}

impl BackendOp {
    const ALL: [BackendOp; 4] = [
        BackendOp::Get,
        BackendOp::GetRange,
        BackendOp::RangeRevisions,
        BackendOp::SubmitTxn,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// An [`InMemoryBackend`] with call counters and switchable faults.
///
/// Failed calls return [`StorageError::Unavailable`] without reaching the
/// inner backend. A forced conflict makes the next `submit_txn` report every
/// compare as failed and apply nothing. A submit delay keeps `submit_txn` in flight for a while
/// before applying, to exercise cancellation.
#[derive(Debug, Default)]
pub struct FaultyBackend {
    inner: Arc<InMemoryBackend>,
    calls: [AtomicUsize; 4],
    failing: Mutex<BTreeSet<BackendOp>>,
    conflict_next: AtomicBool,
    submit_delay: Mutex<Option<Duration>>,
}

impl FaultyBackend {
    /// Creates a wrapper around a fresh in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a wrapper around an existing backend.
    pub fn wrap(inner: Arc<InMemoryBackend>) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Returns the wrapped backend.
    pub fn inner(&self) -> &Arc<InMemoryBackend> {
        &self.inner
    }

    /// Makes every later call of `op` fail until [`FaultyBackend::recover`].
    pub fn fail(&self, op: BackendOp) {
        self.failing.lock().insert(op);
    }

    /// Lets calls of `op` through again.
    pub fn recover(&self, op: BackendOp) {
        self.failing.lock().remove(&op);
    }

    /// Makes the next `submit_txn` fail its compares.
    pub fn conflict_next_submit(&self) {
        self.conflict_next.store(true, Ordering::SeqCst);
    }

    /// Delays every `submit_txn` by `delay` before it applies.
    pub fn delay_submit(&self, delay: Duration) {
        *self.submit_delay.lock() = Some(delay);
    }

    /// Returns the number of calls of `op`, including failed ones.
    pub fn calls(&self, op: BackendOp) -> usize {
        self.calls[op.index()].load(Ordering::SeqCst)
    }

    /// Returns the number of calls of every kind.
    pub fn total_calls(&self) -> usize {
        BackendOp::ALL.iter().map(|op| self.calls(*op)).sum()
    }

    /// Resets all call counters.
    pub fn reset_calls(&self) {
        for counter in &self.calls {
            counter.store(0, Ordering::SeqCst);
        }
    }

    fn enter(&self, op: BackendOp) -> StorageResult<()> {
        self.calls[op.index()].fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().contains(&op) {
            return Err(StorageError::unavailable(format!("injected {op:?} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl BackendClient for FaultyBackend {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<KeyValue>> {
        self.enter(BackendOp::Get)?;
        self.inner.get(key).await
    }

    async fn get_range(&self, prefix: &[u8]) -> StorageResult<RangeResponse> {
        self.enter(BackendOp::GetRange)?;
        self.inner.get_range(prefix).await
    }

    async fn range_revisions(&self, prefix: &[u8]) -> StorageResult<Vec<KeyRevision>> {
        self.enter(BackendOp::RangeRevisions)?;
        self.inner.range_revisions(prefix).await
    }

    async fn submit_txn(&self, request: TxnRequest) -> StorageResult<TxnOutcome> {
        self.enter(BackendOp::SubmitTxn)?;
        let delay = *self.submit_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.conflict_next.swap(false, Ordering::SeqCst) {
            let failed_compares = request.compares.into_iter().map(|c| c.key).collect();
            return Ok(TxnOutcome::Conflict { failed_compares });
        }
        self.inner.submit_txn(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_storage::{Compare, Revision};

    #[tokio::test]
    async fn counts_and_fails_calls() {
        let backend = FaultyBackend::new();
        backend.inner().insert(b"k", b"v");

        assert!(backend.get(b"k").await.unwrap().is_some());
        backend.fail(BackendOp::Get);
        assert!(matches!(
            backend.get(b"k").await,
            Err(StorageError::Unavailable(_))
        ));
        backend.recover(BackendOp::Get);
        assert!(backend.get(b"k").await.is_ok());

        assert_eq!(backend.calls(BackendOp::Get), 3);
        assert_eq!(backend.total_calls(), 3);
        backend.reset_calls();
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn failed_submit_applies_nothing() {
        let backend = FaultyBackend::new();
        backend.fail(BackendOp::SubmitTxn);

        let request = TxnRequest {
            puts: vec![(b"k".to_vec(), b"v".to_vec())],
            ..TxnRequest::default()
        };
        assert!(backend.submit_txn(request).await.is_err());
        assert!(backend.inner().is_empty());
    }

    #[tokio::test]
    async fn forced_conflict_applies_nothing_once() {
        let backend = FaultyBackend::new();
        backend.conflict_next_submit();

        let request = TxnRequest {
            compares: vec![Compare {
                key: b"k".to_vec(),
                expected: Revision::ABSENT,
            }],
            puts: vec![(b"k".to_vec(), b"v".to_vec())],
            ..TxnRequest::default()
        };
        let outcome = backend.submit_txn(request.clone()).await.unwrap();
        assert_eq!(
            outcome,
            TxnOutcome::Conflict {
                failed_compares: vec![b"k".to_vec()]
            }
        );
        assert!(backend.inner().is_empty());

        let outcome = backend.submit_txn(request).await.unwrap();
        assert!(matches!(outcome, TxnOutcome::Committed { .. }));
        assert_eq!(backend.inner().len(), 1);
    }
}
