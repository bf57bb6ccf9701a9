//! Benchmark utilities.

use arbor_codec::{Path, Value};
use arbor_core::{DataStore, StoreConfig};
use arbor_storage::InMemoryBackend;
use rand::Rng;
use std::sync::Arc;

/// Generate random bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate a tree with `width` children per node, `depth` levels deep.
///
/// Leaves carry `leaf_size` random bytes.
pub fn random_tree(width: usize, depth: usize, leaf_size: usize) -> Value {
    if depth == 0 {
        return Value::Bytes(random_data(leaf_size));
    }
    Value::object((0..width).map(|n| (format!("n{n}"), random_tree(width, depth - 1, leaf_size))))
}

/// Generate `count` distinct sibling paths under `parent`.
pub fn sibling_paths(parent: &str, count: usize) -> Vec<Path> {
    let parent = Path::parse(parent);
    (0..count).map(|n| parent.child(format!("k{n}"))).collect()
}

/// Opens a store over a fresh in-memory backend.
///
/// Request limits are raised so that large batches measure the commit path
/// rather than the size check.
pub fn memory_store() -> DataStore {
    let config = StoreConfig::new()
        .max_txn_ops(1 << 16)
        .max_request_bytes(64 << 20);
    DataStore::with_config(Arc::new(InMemoryBackend::new()), config)
}

/// Builds a runtime for driving async store calls from a benchmark loop.
pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}
