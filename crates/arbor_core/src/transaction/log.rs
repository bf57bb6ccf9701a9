//! Ordered mutation buffer.

use arbor_codec::{Path, Value};
use std::sync::Arc;

/// A buffered tree mutation.
///
/// Operations are immutable once appended to a [`MutationLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Replace the subtree at `path` with `value`.
    Put {
        /// Target node.
        path: Path,
        /// New subtree.
        value: Value,
    },
    /// Merge result for `path`, resolved when the merge was requested.
    ///
    /// Applied like a `Put`.
    Merge {
        /// Target node.
        path: Path,
        /// Union of the value read at merge time and the merged fields.
        value: Value,
    },
    /// Remove the subtree at `path`.
    Delete {
        /// Target node.
        path: Path,
    },
}

impl Operation {
    /// Returns the path the operation targets.
    pub fn path(&self) -> &Path {
        match self {
            Self::Put { path, .. } | Self::Merge { path, .. } | Self::Delete { path } => path,
        }
    }

    /// Returns the subtree written by a put or merge.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Put { value, .. } | Self::Merge { value, .. } => Some(value),
            Self::Delete { .. } => None,
        }
    }

    /// Returns a short name of the operation kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Put { .. } => "put",
            Self::Merge { .. } => "merge",
            Self::Delete { .. } => "delete",
        }
    }
}

/// Append-only list of operations in submission order.
#[derive(Debug, Default)]
pub struct MutationLog {
    operations: Vec<Operation>,
}

impl MutationLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an operation.
    pub fn push(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    /// Returns the operations, oldest first.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Returns the number of buffered operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns true if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Drops every buffered operation.
    pub fn clear(&mut self) {
        self.operations.clear();
    }

    /// Freezes the log; the result can never be appended to again.
    pub fn freeze(self) -> FrozenLog {
        FrozenLog {
            operations: self.operations.into(),
        }
    }
}

/// An immutable, shareable mutation log.
#[derive(Debug, Clone)]
pub struct FrozenLog {
    operations: Arc<[Operation]>,
}

impl FrozenLog {
    /// Returns the operations, oldest first.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Returns the number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns true if the log holds no operations.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_keep_submission_order() {
        let mut log = MutationLog::new();
        log.push(Operation::Delete {
            path: Path::parse("/b"),
        });
        log.push(Operation::Put {
            path: Path::parse("/a"),
            value: Value::Integer(1),
        });

        let kinds: Vec<_> = log.operations().iter().map(Operation::kind).collect();
        assert_eq!(kinds, vec!["delete", "put"]);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn freeze_preserves_operations() {
        let mut log = MutationLog::new();
        log.push(Operation::Merge {
            path: Path::parse("/a"),
            value: Value::empty_map(),
        });

        let frozen = log.freeze();
        let shared = frozen.clone();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared.operations()[0].path(), &Path::parse("/a"));
        assert_eq!(shared.operations()[0].value(), Some(&Value::empty_map()));
    }

    #[test]
    fn delete_has_no_value() {
        let op = Operation::Delete {
            path: Path::root(),
        };
        assert_eq!(op.value(), None);
        assert!(op.path().is_root());
    }
}
