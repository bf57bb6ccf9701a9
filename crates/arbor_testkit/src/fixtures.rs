//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up test stores and common
//! test scenarios.

use crate::faulty::FaultyBackend;
use arbor_codec::{flatten, Encode, Path, Value};
use arbor_core::{DataStore, Revision, StoreConfig};
use arbor_storage::InMemoryBackend;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A data store over an in-memory backend the test can inspect.
pub struct TestStore {
    /// The store instance.
    pub store: DataStore,
    /// The backend behind the store.
    pub backend: Arc<InMemoryBackend>,
}

impl TestStore {
    /// Creates a store with the default configuration.
    pub fn memory() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates a store with the given configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        let backend = Arc::new(InMemoryBackend::new());
        let store = DataStore::with_config(backend.clone(), config);
        Self { store, backend }
    }

    /// Commits `value` at `path` through a transaction.
    pub async fn seed(&self, path: &str, value: Value) -> Revision {
        let mut txn = self.store.begin();
        txn.write(path, value).expect("Failed to buffer seed write");
        txn.commit().await.expect("Failed to commit seed data")
    }

    /// Writes the entries of `value` at `path` straight into the backend.
    ///
    /// Unlike [`TestStore::seed`], no interior nodes are created for the
    /// ancestors of `path`, which mimics data written by another client.
    pub fn seed_raw(&self, path: &str, value: &Value) {
        let base = Path::parse(path);
        for (relative, entry) in flatten(value) {
            let key = self.store.key_codec().encode(&base.join(&relative));
            let bytes = entry.encode().expect("Failed to encode seed entry");
            self.backend.insert(&key, &bytes);
        }
    }

    /// Returns the committed value at `path`.
    pub async fn committed(&self, path: &str) -> Option<Value> {
        self.store.read(path).await.expect("Failed to read committed data")
    }

    /// Returns every key and value held by the backend.
    pub fn snapshot(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.backend.snapshot()
    }
}

impl std::ops::Deref for TestStore {
    type Target = DataStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// A data store over a [`FaultyBackend`].
pub struct FaultyStore {
    /// The store instance.
    pub store: DataStore,
    /// The fault-injecting backend behind the store.
    pub backend: Arc<FaultyBackend>,
}

impl FaultyStore {
    /// Creates a store over a fresh fault-injecting backend.
    pub fn new() -> Self {
        let backend = Arc::new(FaultyBackend::new());
        let store = DataStore::new(backend.clone());
        Self { store, backend }
    }
}

impl Default for FaultyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for FaultyStore {
    type Target = DataStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Installs a `tracing` subscriber honoring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Builds a map value from named fields.
pub fn tree(fields: &[(&str, Value)]) -> Value {
    Value::object(fields.iter().cloned())
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates a store holding `count` users under `/users`.
    pub async fn populated_store(count: usize) -> TestStore {
        let test = TestStore::memory();
        let users = (0..count).map(|n| {
            (
                format!("user{n}"),
                tree(&[("id", Value::from(n as i64)), ("active", Value::Bool(true))]),
            )
        });
        test.seed("/users", Value::object(users)).await;
        test
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seed_is_readable() {
        let test = TestStore::memory();
        test.seed("/a", tree(&[("b", Value::from(1))])).await;
        assert_eq!(test.committed("/a/b").await, Some(Value::from(1)));
    }

    #[tokio::test]
    async fn seed_raw_skips_ancestors() {
        let test = TestStore::memory();
        test.seed_raw("/x/y", &Value::from("leaf"));
        assert_eq!(test.snapshot().len(), 1);
        assert_eq!(
            test.committed("/x").await,
            Some(tree(&[("y", Value::from("leaf"))]))
        );
    }

    #[tokio::test]
    async fn populated_store_has_users() {
        let test = scenarios::populated_store(3).await;
        let users = test.committed("/users").await.unwrap();
        assert_eq!(users.fields().count(), 3);
    }
}
