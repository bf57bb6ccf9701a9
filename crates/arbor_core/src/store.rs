//! The data store: entry point for opening transactions.

use crate::config::StoreConfig;
use crate::error::CoreResult;
use crate::transaction::{ReadOnlyTransaction, Transaction};
use crate::types::TransactionId;
use arbor_codec::{KeyCodec, Path, Value};
use arbor_storage::{BackendClient, Revision};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Collaborators every transaction of a store shares.
#[derive(Clone)]
pub(crate) struct StoreHandle {
    pub(crate) backend: Arc<dyn BackendClient>,
    pub(crate) keys: Arc<KeyCodec>,
    pub(crate) config: Arc<StoreConfig>,
    known_revision: Arc<AtomicU64>,
}

impl StoreHandle {
    /// Highest backend revision this store has seen.
    pub(crate) fn known_revision(&self) -> Revision {
        Revision::new(self.known_revision.load(Ordering::SeqCst))
    }

    /// Raises the known revision to `revision`; lower values are ignored.
    pub(crate) fn advance_revision(&self, revision: Revision) {
        self.known_revision
            .fetch_max(revision.as_u64(), Ordering::SeqCst);
    }
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("keys", &self.keys)
            .field("config", &self.config)
            .field("known_revision", &self.known_revision())
            .finish_non_exhaustive()
    }
}

/// A tree store on top of a revisioned key-value backend.
///
/// The store owns the backend handle and hands it to every transaction it
/// opens. Transactions are independent of each other; concurrent writers are
/// detected at commit time.
///
/// # Example
///
/// ```rust
/// use arbor_core::{DataStore, Value};
/// use arbor_storage::InMemoryBackend;
/// use std::sync::Arc;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let store = DataStore::new(Arc::new(InMemoryBackend::new()));
///
/// let mut txn = store.begin();
/// txn.write("/users/alice", Value::object([("age", Value::from(30))])).unwrap();
/// assert!(txn.exists("/users/alice/age").await.unwrap());
/// txn.commit().await.unwrap();
///
/// let age = store.read("/users/alice/age").await.unwrap();
/// assert_eq!(age, Some(Value::from(30)));
/// # });
/// ```
pub struct DataStore {
    handle: StoreHandle,
    next_txn_id: AtomicU64,
}

impl DataStore {
    /// Creates a store with the default configuration.
    pub fn new(backend: Arc<dyn BackendClient>) -> Self {
        Self::with_config(backend, StoreConfig::default())
    }

    /// Creates a store with the given configuration.
    pub fn with_config(backend: Arc<dyn BackendClient>, config: StoreConfig) -> Self {
        let keys = KeyCodec::new(config.key_prefix.clone());
        Self {
            handle: StoreHandle {
                backend,
                keys: Arc::new(keys),
                config: Arc::new(config),
                known_revision: Arc::new(AtomicU64::new(0)),
            },
            next_txn_id: AtomicU64::new(1),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.handle.config
    }

    /// Returns the key codec of this store's namespace.
    pub fn key_codec(&self) -> &KeyCodec {
        &self.handle.keys
    }

    /// Returns the shared backend handle.
    pub fn backend(&self) -> &Arc<dyn BackendClient> {
        &self.handle.backend
    }

    /// Returns the highest backend revision seen by this store's
    /// transactions.
    ///
    /// A read-write transaction takes this as its open revision: keys it
    /// writes without reading must not have changed after it.
    pub fn known_revision(&self) -> Revision {
        self.handle.known_revision()
    }

    /// Opens a read-write transaction with the next free ID.
    pub fn begin(&self) -> Transaction {
        self.begin_with_id(self.allocate_id())
    }

    /// Opens a read-write transaction with a caller-assigned ID.
    pub fn begin_with_id(&self, id: TransactionId) -> Transaction {
        debug!(txn = %id, "opened read-write transaction");
        Transaction::new(id, self.handle.clone())
    }

    /// Opens a read-only transaction.
    pub fn begin_read_only(&self) -> ReadOnlyTransaction {
        let id = self.allocate_id();
        debug!(txn = %id, "opened read-only transaction");
        ReadOnlyTransaction::new(id, self.handle.clone())
    }

    /// Reads the committed value at `path`.
    ///
    /// # Errors
    ///
    /// Returns `ReadFailed` if the backend cannot be read.
    pub async fn read(&self, path: impl Into<Path>) -> CoreResult<Option<Value>> {
        let mut txn = self.begin_read_only();
        let value = txn.read(path).await;
        txn.close();
        value
    }

    fn allocate_id(&self) -> TransactionId {
        TransactionId::new(self.next_txn_id.fetch_add(1, Ordering::SeqCst))
    }
}

impl fmt::Debug for DataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStore")
            .field("config", &self.handle.config)
            .field("next_txn_id", &self.next_txn_id.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
