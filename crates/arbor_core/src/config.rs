//! Store configuration.

/// Default key namespace.
pub const DEFAULT_KEY_PREFIX: &[u8] = b"arbor/";

/// Default limit on operations per transaction, matching etcd's
/// `--max-txn-ops`.
pub const DEFAULT_MAX_TXN_OPS: usize = 128;

/// Default limit on request size, matching etcd's `--max-request-bytes`.
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 1536 * 1024;

/// Configuration for a [`crate::DataStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Prefix of every key the store reads or writes.
    pub key_prefix: Vec<u8>,

    /// Maximum number of compares, puts and deletes in one commit.
    pub max_txn_ops: usize,

    /// Maximum number of key and value bytes in one commit.
    pub max_request_bytes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_vec(),
            max_txn_ops: DEFAULT_MAX_TXN_OPS,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the key namespace.
    #[must_use]
    pub fn key_prefix(mut self, prefix: impl Into<Vec<u8>>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Sets the operation limit.
    #[must_use]
    pub const fn max_txn_ops(mut self, limit: usize) -> Self {
        self.max_txn_ops = limit;
        self
    }

    /// Sets the request size limit.
    #[must_use]
    pub const fn max_request_bytes(mut self, limit: usize) -> Self {
        self.max_request_bytes = limit;
        self
    }
}
