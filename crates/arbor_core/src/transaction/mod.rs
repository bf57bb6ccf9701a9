//! Transactions over the tree.
//!
//! A [`Transaction`] buffers writes, merges and deletes in a
//! [`MutationLog`] and serves reads through a [`ReadOverlay`]: buffered
//! operations first, the backend as fallback. [`Transaction::ready`] freezes
//! the log and hands it to a [`CommitCohort`], which commits it in three
//! phases:
//!
//! 1. `can_commit` re-validates every backend revision the reads observed
//! 2. `pre_commit` assembles and size-checks one conditional request
//! 3. `commit` submits that request exactly once
//!
//! The backend applies the request atomically, so a commit is all or
//! nothing.

mod assembly;
mod cohort;
mod log;
mod overlay;
mod read_only;
mod state;

pub use assembly::{assemble, TxnAssembler};
pub use cohort::CommitCohort;
pub use log::{FrozenLog, MutationLog, Operation};
pub use overlay::{Observations, ReadOverlay};
pub use read_only::ReadOnlyTransaction;
pub use state::Transaction;
