//! Backend client trait and request/response types.

use crate::error::StorageResult;
use async_trait::async_trait;
use std::fmt;

/// Modification revision of a key.
///
/// Revisions are assigned by the backend from a single increasing counter;
/// every successful write transaction gets a new one. [`Revision::ABSENT`]
/// stands for "the key does not exist".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Revision(pub u64);

impl Revision {
    /// Revision of a key that does not exist.
    pub const ABSENT: Revision = Revision(0);

    /// Creates a revision from its raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns true for [`Revision::ABSENT`].
    #[must_use]
    pub const fn is_absent(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rev:{}", self.0)
    }
}

/// A stored key with its value and revision metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    /// The key.
    pub key: Vec<u8>,
    /// The stored bytes.
    pub value: Vec<u8>,
    /// Revision at which the key was created.
    pub create_revision: Revision,
    /// Revision of the last modification.
    pub mod_revision: Revision,
    /// Number of modifications since creation.
    pub version: u64,
}

/// A key and its modification revision, without the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRevision {
    /// The key.
    pub key: Vec<u8>,
    /// Revision of the last modification.
    pub mod_revision: Revision,
}

/// Result of a range read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeResponse {
    /// Entries whose key starts with the requested prefix, in key order.
    pub entries: Vec<KeyValue>,
    /// Backend revision at which the range was served.
    pub revision: Revision,
}

/// Condition of a transaction: `key` must currently be at `expected`.
///
/// An expected revision of [`Revision::ABSENT`] requires the key to be
/// missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compare {
    /// The key to check.
    pub key: Vec<u8>,
    /// The required modification revision.
    pub expected: Revision,
}

/// A conditional multi-key transaction.
///
/// If every compare holds, all puts and deletes are applied atomically under
/// one new revision. Otherwise nothing is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxnRequest {
    /// Conditions that must all hold.
    pub compares: Vec<Compare>,
    /// Keys to write.
    pub puts: Vec<(Vec<u8>, Vec<u8>)>,
    /// Keys to remove.
    pub deletes: Vec<Vec<u8>>,
}

impl TxnRequest {
    /// Returns the number of operations the backend has to evaluate.
    pub fn op_count(&self) -> usize {
        self.compares.len() + self.puts.len() + self.deletes.len()
    }

    /// Returns the number of key and value bytes carried by the request.
    pub fn payload_len(&self) -> usize {
        let compares: usize = self.compares.iter().map(|c| c.key.len() + 8).sum();
        let puts: usize = self.puts.iter().map(|(k, v)| k.len() + v.len()).sum();
        let deletes: usize = self.deletes.iter().map(Vec::len).sum();
        compares + puts + deletes
    }

    /// Returns true if the request writes nothing.
    pub fn is_read_only(&self) -> bool {
        self.puts.is_empty() && self.deletes.is_empty()
    }
}

/// Outcome of [`BackendClient::submit_txn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxnOutcome {
    /// Every compare held and all mutations were applied.
    Committed {
        /// Revision of the backend after the transaction.
        revision: Revision,
    },
    /// At least one compare failed; nothing was applied.
    Conflict {
        /// Keys whose compare did not hold.
        failed_compares: Vec<Vec<u8>>,
    },
}

/// Client of a remote, revision-versioned key-value store.
///
/// Implementations must be shareable across tasks. Calls may suspend and
/// may fail with [`crate::StorageError::Unavailable`]; callers never retry
/// implicitly.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Reads a single key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    async fn get(&self, key: &[u8]) -> StorageResult<Option<KeyValue>>;

    /// Reads every key starting with `prefix`, in key order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    async fn get_range(&self, prefix: &[u8]) -> StorageResult<RangeResponse>;

    /// Lists the keys starting with `prefix` and their revisions.
    ///
    /// The default implementation reads the full range and drops the values.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    async fn range_revisions(&self, prefix: &[u8]) -> StorageResult<Vec<KeyRevision>> {
        let response = self.get_range(prefix).await?;
        Ok(response
            .entries
            .into_iter()
            .map(|kv| KeyRevision {
                key: kv.key,
                mod_revision: kv.mod_revision,
            })
            .collect())
    }

    /// Submits a conditional transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached. A failed compare is
    /// not an error but [`TxnOutcome::Conflict`].
    async fn submit_txn(&self, request: TxnRequest) -> StorageResult<TxnOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revision_absent() {
        assert!(Revision::ABSENT.is_absent());
        assert!(!Revision::new(3).is_absent());
        assert_eq!(Revision::new(3).to_string(), "rev:3");
        assert!(Revision::new(1) > Revision::ABSENT);
    }

    #[test]
    fn request_sizes() {
        let request = TxnRequest {
            compares: vec![Compare {
                key: b"ab".to_vec(),
                expected: Revision::ABSENT,
            }],
            puts: vec![(b"k".to_vec(), b"vvv".to_vec())],
            deletes: vec![b"dd".to_vec()],
        };
        assert_eq!(request.op_count(), 3);
        assert_eq!(request.payload_len(), 10 + 4 + 2);
        assert!(!request.is_read_only());
        assert!(TxnRequest::default().is_read_only());
    }
}
