//! Core type definitions for Arbor.

use std::fmt;

/// Unique identifier for a transaction.
///
/// Identifiers handed out by [`crate::DataStore`] are monotonically
/// increasing and never reused within one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// Lifecycle of a read-write transaction.
///
/// Transitions only move forward:
/// `Open -> Ready -> Committing -> Committed | Aborted`. Any state before
/// `Committed` may also move straight to `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitState {
    /// Accepting mutations and reads.
    Open,
    /// Frozen; a commit cohort has been issued.
    Ready,
    /// The commit cohort passed validation and is staging or applying.
    Committing,
    /// The changes were applied by the backend.
    Committed,
    /// The transaction was discarded.
    Aborted,
}

impl CommitState {
    /// Returns true for `Committed` and `Aborted`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Aborted)
    }
}

impl fmt::Display for CommitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Ready => "ready",
            Self::Committing => "committing",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Progress of a commit cohort through the commit phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CohortState {
    /// No phase has run yet.
    NotStarted,
    /// `can_commit` succeeded.
    CanCommitChecked,
    /// `pre_commit` staged the backend request.
    PreCommitted,
    /// `commit` applied the staged request.
    Committed,
    /// The cohort was aborted.
    Aborted,
}

impl fmt::Display for CohortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "not-started",
            Self::CanCommitChecked => "can-commit-checked",
            Self::PreCommitted => "pre-committed",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// The commit phase in which a conflict was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitPhase {
    /// Validation of observed revisions, before anything was staged.
    CanCommit,
    /// Submission of the staged request; its compares failed.
    Commit,
}

impl fmt::Display for CommitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CanCommit => f.write_str("can-commit"),
            Self::Commit => f.write_str("commit"),
        }
    }
}

/// Which limit a staged request exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeLimit {
    /// Number of compares, puts and deletes.
    Operations,
    /// Encoded key and value bytes.
    Bytes,
}

impl fmt::Display for SizeLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operations => f.write_str("operations"),
            Self::Bytes => f.write_str("bytes"),
        }
    }
}
