//! In-memory revisioned backend for testing.

use crate::backend::{
    BackendClient, KeyRevision, KeyValue, RangeResponse, Revision, TxnOutcome, TxnRequest,
};
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    create_revision: Revision,
    mod_revision: Revision,
    version: u64,
}

#[derive(Debug, Default)]
struct State {
    entries: BTreeMap<Vec<u8>, Entry>,
    revision: u64,
    closed: bool,
}

impl State {
    fn check_open(&self) -> StorageResult<()> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        Ok(())
    }

    fn key_value(key: &[u8], entry: &Entry) -> KeyValue {
        KeyValue {
            key: key.to_vec(),
            value: entry.value.clone(),
            create_revision: entry.create_revision,
            mod_revision: entry.mod_revision,
            version: entry.version,
        }
    }

    fn range<'a>(&'a self, prefix: &'a [u8]) -> impl Iterator<Item = (&'a Vec<u8>, &'a Entry)> {
        self.entries
            .range(prefix.to_vec()..)
            .take_while(move |(key, _)| key.starts_with(prefix))
    }

    fn mod_revision(&self, key: &[u8]) -> Revision {
        self.entries
            .get(key)
            .map_or(Revision::ABSENT, |entry| entry.mod_revision)
    }

    fn apply(&mut self, request: TxnRequest) -> Revision {
        if request.is_read_only() {
            return Revision(self.revision);
        }
        self.revision += 1;
        let revision = Revision(self.revision);

        for key in &request.deletes {
            self.entries.remove(key);
        }
        for (key, value) in request.puts {
            self.entries
                .entry(key)
                .and_modify(|entry| {
                    entry.value.clone_from(&value);
                    entry.mod_revision = revision;
                    entry.version += 1;
                })
                .or_insert_with(|| Entry {
                    value,
                    create_revision: revision,
                    mod_revision: revision,
                    version: 1,
                });
        }
        revision
    }
}

/// An in-memory, etcd-like key-value store.
///
/// Keys are kept in byte order together with their create and modification
/// revisions. A single global revision counter advances once per applied
/// write transaction. Transactions are all-or-nothing.
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across tasks.
///
/// # Example
///
/// ```rust
/// use arbor_storage::{BackendClient, InMemoryBackend};
///
/// # tokio_test_block_on(async {
/// let backend = InMemoryBackend::new();
/// let revision = backend.insert(b"a", b"1");
/// let kv = backend.get(b"a").await.unwrap().unwrap();
/// assert_eq!(kv.mod_revision, revision);
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Runtime::new().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: RwLock<State>,
}

impl InMemoryBackend {
    /// Creates a new empty backend at revision 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a key outside of any transaction and returns its revision.
    ///
    /// Useful for seeding tests and simulating concurrent writers.
    pub fn insert(&self, key: &[u8], value: &[u8]) -> Revision {
        self.state.write().apply(TxnRequest {
            puts: vec![(key.to_vec(), value.to_vec())],
            ..TxnRequest::default()
        })
    }

    /// Removes a key outside of any transaction.
    pub fn remove(&self, key: &[u8]) -> Revision {
        self.state.write().apply(TxnRequest {
            deletes: vec![key.to_vec()],
            ..TxnRequest::default()
        })
    }

    /// Returns the current global revision.
    #[must_use]
    pub fn revision(&self) -> Revision {
        Revision(self.state.read().revision)
    }

    /// Returns a copy of every key and value.
    ///
    /// Revisions are not part of the snapshot, so two backends holding the
    /// same data compare equal.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.state
            .read()
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Returns true if no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// Closes the backend; every later call fails with `Closed`.
    pub fn close(&self) {
        self.state.write().closed = true;
    }
}

#[async_trait]
impl BackendClient for InMemoryBackend {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<KeyValue>> {
        let state = self.state.read();
        state.check_open()?;
        Ok(state
            .entries
            .get(key)
            .map(|entry| State::key_value(key, entry)))
    }

    async fn get_range(&self, prefix: &[u8]) -> StorageResult<RangeResponse> {
        let state = self.state.read();
        state.check_open()?;
        Ok(RangeResponse {
            entries: state
                .range(prefix)
                .map(|(key, entry)| State::key_value(key, entry))
                .collect(),
            revision: Revision(state.revision),
        })
    }

    async fn range_revisions(&self, prefix: &[u8]) -> StorageResult<Vec<KeyRevision>> {
        let state = self.state.read();
        state.check_open()?;
        Ok(state
            .range(prefix)
            .map(|(key, entry)| KeyRevision {
                key: key.clone(),
                mod_revision: entry.mod_revision,
            })
            .collect())
    }

    async fn submit_txn(&self, request: TxnRequest) -> StorageResult<TxnOutcome> {
        let mut state = self.state.write();
        state.check_open()?;

        let failed_compares: Vec<Vec<u8>> = request
            .compares
            .iter()
            .filter(|compare| state.mod_revision(&compare.key) != compare.expected)
            .map(|compare| compare.key.clone())
            .collect();
        if !failed_compares.is_empty() {
            return Ok(TxnOutcome::Conflict { failed_compares });
        }

        let revision = state.apply(request);
        Ok(TxnOutcome::Committed { revision })
    }
}
