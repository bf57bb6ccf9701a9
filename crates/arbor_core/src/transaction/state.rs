//! Read-write transaction.

use crate::error::{CoreError, CoreResult};
use crate::store::StoreHandle;
use crate::transaction::cohort::{CommitCohort, Progress};
use crate::transaction::log::{MutationLog, Operation};
use crate::transaction::overlay::{Observations, ReadOverlay};
use crate::types::{CommitState, TransactionId};
use arbor_codec::{Path, Value};
use arbor_storage::Revision;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace};

/// A read-write transaction over the tree.
///
/// Mutations are buffered in submission order and become visible to this
/// transaction's own reads immediately. Nothing reaches the backend until
/// the [`CommitCohort`] returned by [`Transaction::ready`] commits.
///
/// Every method that mutates or touches the backend takes `&mut self`, so
/// one call completes before the next one can be issued and side effects
/// apply in submission order.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    store: StoreHandle,
    log: MutationLog,
    observations: Observations,
    progress: Arc<Mutex<Progress>>,
    open_revision: Revision,
}

impl Transaction {
    pub(crate) fn new(id: TransactionId, store: StoreHandle) -> Self {
        Self {
            id,
            open_revision: store.known_revision(),
            store,
            log: MutationLog::new(),
            observations: Observations::new(),
            progress: Progress::shared(),
        }
    }

    /// Returns the newest backend revision the store had seen when this
    /// transaction was opened.
    ///
    /// Keys under a written path that changed after it, and that this
    /// transaction did not read, fail `can_commit`.
    #[must_use]
    pub fn open_revision(&self) -> Revision {
        self.open_revision
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the current state, including progress made by the cohort.
    #[must_use]
    pub fn state(&self) -> CommitState {
        self.progress.lock().commit
    }

    /// Checks if the transaction still accepts operations.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == CommitState::Open
    }

    /// Returns the buffered operations, oldest first.
    ///
    /// Empty once the transaction is ready or closed.
    pub fn operations(&self) -> &[Operation] {
        self.log.operations()
    }

    /// Returns the backend state observed by reads so far.
    pub fn observations(&self) -> &Observations {
        &self.observations
    }

    /// Replaces the subtree at `path` with `value`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the transaction is open.
    pub fn write(&mut self, path: impl Into<Path>, value: Value) -> CoreResult<()> {
        self.ensure_open("write")?;
        self.append(Operation::Put {
            path: path.into(),
            value,
        });
        Ok(())
    }

    /// Merges `value` into the subtree at `path`.
    ///
    /// The current value is resolved now, through the log and the backend;
    /// fields of `value` override it and nested maps merge recursively. If
    /// nothing exists at `path`, `value` is written as is.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the transaction is open, or
    /// `ReadFailed` if the current value cannot be read. Nothing is
    /// appended on failure.
    pub async fn merge(&mut self, path: impl Into<Path>, value: Value) -> CoreResult<()> {
        let path = path.into();
        self.ensure_open("merge")?;
        let current = self.overlay().read(&path).await;
        self.store.advance_revision(self.observations.latest());
        let merged = match current? {
            Some(existing) => existing.merged(value),
            None => value,
        };
        self.append(Operation::Merge {
            path,
            value: merged,
        });
        Ok(())
    }

    /// Removes the subtree at `path`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the transaction is open.
    pub fn delete(&mut self, path: impl Into<Path>) -> CoreResult<()> {
        self.ensure_open("delete")?;
        self.append(Operation::Delete { path: path.into() });
        Ok(())
    }

    /// Reads the value at `path` as this transaction sees it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the transaction is open, or
    /// `ReadFailed` if the backend is needed and cannot be read.
    pub async fn read(&mut self, path: impl Into<Path>) -> CoreResult<Option<Value>> {
        let path = path.into();
        self.ensure_open("read")?;
        let value = self.overlay().read(&path).await;
        self.store.advance_revision(self.observations.latest());
        value
    }

    /// Checks whether a value exists at `path` as this transaction sees it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the transaction is open, or
    /// `ReadFailed` if the backend is needed and cannot be read.
    pub async fn exists(&mut self, path: impl Into<Path>) -> CoreResult<bool> {
        let path = path.into();
        self.ensure_open("exists")?;
        self.overlay().exists(&path).await
    }

    /// Freezes the transaction and returns the cohort that commits it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the transaction is open; in particular
    /// a second call fails.
    pub fn ready(&mut self) -> CoreResult<CommitCohort> {
        self.ensure_open("ready")?;
        self.progress.lock().commit = CommitState::Ready;

        let log = std::mem::take(&mut self.log).freeze();
        let observations = std::mem::take(&mut self.observations);
        debug!(txn = %self.id, operations = log.len(), "transaction ready");
        Ok(CommitCohort::new(
            self.id,
            self.store.clone(),
            log,
            observations,
            self.open_revision,
            Arc::clone(&self.progress),
        ))
    }

    /// Closes the transaction.
    ///
    /// An open transaction is aborted without touching the backend. Once
    /// ready, the cohort is in charge and closing has no effect. Calling
    /// this more than once is harmless.
    pub fn close(&mut self) {
        let mut progress = self.progress.lock();
        if progress.commit == CommitState::Open {
            progress.commit = CommitState::Aborted;
            self.log.clear();
            self.observations.clear();
            debug!(txn = %self.id, "transaction closed");
        }
    }

    /// Readies the transaction and runs every commit phase.
    ///
    /// # Errors
    ///
    /// Returns the error of `ready` or of the failing phase; the cohort is
    /// aborted on failure.
    pub async fn commit(mut self) -> CoreResult<Revision> {
        self.ready()?.run().await
    }

    fn append(&mut self, operation: Operation) {
        trace!(txn = %self.id, op = operation.kind(), path = %operation.path(), "buffered");
        self.log.push(operation);
    }

    fn ensure_open(&self, operation: &str) -> CoreResult<()> {
        match self.state() {
            CommitState::Open => Ok(()),
            state => Err(CoreError::invalid_state(format!(
                "cannot {operation}: transaction is {state}"
            ))),
        }
    }

    fn overlay(&mut self) -> ReadOverlay<'_> {
        ReadOverlay::new(
            self.log.operations(),
            self.store.backend.as_ref(),
            &self.store.keys,
            &mut self.observations,
        )
    }
}
