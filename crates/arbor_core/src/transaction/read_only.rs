//! Read-only transaction.

use crate::error::{CoreError, CoreResult};
use crate::store::StoreHandle;
use crate::transaction::overlay::{Observations, ReadOverlay};
use crate::types::TransactionId;
use arbor_codec::{Path, Value};
use tracing::debug;

/// A transaction that only reads committed data.
///
/// It has no mutation log, so every read goes to the backend.
#[derive(Debug)]
pub struct ReadOnlyTransaction {
    id: TransactionId,
    store: StoreHandle,
    observations: Observations,
    closed: bool,
}

impl ReadOnlyTransaction {
    pub(crate) fn new(id: TransactionId, store: StoreHandle) -> Self {
        Self {
            id,
            store,
            observations: Observations::new(),
            closed: false,
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Checks if the transaction was closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns the backend state observed so far.
    pub fn observations(&self) -> &Observations {
        &self.observations
    }

    /// Reads the committed value at `path`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` after `close`, or `ReadFailed` if the backend
    /// cannot be read.
    pub async fn read(&mut self, path: impl Into<Path>) -> CoreResult<Option<Value>> {
        let path = path.into();
        self.ensure_open()?;
        let value = self.overlay().read(&path).await;
        self.store.advance_revision(self.observations.latest());
        value
    }

    /// Checks whether a committed value exists at `path`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` after `close`, or `ReadFailed` if the backend
    /// cannot be read.
    pub async fn exists(&mut self, path: impl Into<Path>) -> CoreResult<bool> {
        let path = path.into();
        self.ensure_open()?;
        self.overlay().exists(&path).await
    }

    /// Closes the transaction. Calling this more than once is harmless.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.observations.clear();
            debug!(txn = %self.id, "read-only transaction closed");
        }
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.closed {
            return Err(CoreError::invalid_state("read-only transaction is closed"));
        }
        Ok(())
    }

    fn overlay(&mut self) -> ReadOverlay<'_> {
        ReadOverlay::new(
            &[],
            self.store.backend.as_ref(),
            &self.store.keys,
            &mut self.observations,
        )
    }
}
