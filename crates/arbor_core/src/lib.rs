//! # Arbor Core
//!
//! Transactional sessions over a tree stored in a revisioned key-value
//! backend.
//!
//! This crate provides:
//! - [`DataStore`], which owns the backend handle and opens transactions
//! - [`Transaction`] with ordered, read-your-writes mutation buffering
//! - [`CommitCohort`], the `can_commit` / `pre_commit` / `commit` / `abort`
//!   protocol that maps a tree-shaped change set onto one conditional
//!   backend transaction
//! - Optimistic conflict detection based on observed key revisions
//!
//! ## Example
//!
//! ```rust
//! use arbor_core::{DataStore, Value};
//! use arbor_storage::InMemoryBackend;
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let store = DataStore::new(Arc::new(InMemoryBackend::new()));
//!
//! let mut txn = store.begin();
//! txn.write("/config", Value::object([("retries", Value::from(3))])).unwrap();
//! txn.merge("/config", Value::object([("timeout", Value::from(30))])).await.unwrap();
//! txn.commit().await.unwrap();
//!
//! let config = store.read("/config").await.unwrap().unwrap();
//! assert_eq!(config.field("retries"), Some(&Value::from(3)));
//! assert_eq!(config.field("timeout"), Some(&Value::from(30)));
//! # });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod store;
pub mod transaction;
mod types;

pub use arbor_codec::{Path, Value};
pub use arbor_storage::Revision;
pub use config::{StoreConfig, DEFAULT_KEY_PREFIX, DEFAULT_MAX_REQUEST_BYTES, DEFAULT_MAX_TXN_OPS};
pub use error::{CoreError, CoreResult};
pub use store::DataStore;
pub use transaction::{CommitCohort, Operation, ReadOnlyTransaction, Transaction};
pub use types::{CohortState, CommitPhase, CommitState, SizeLimit, TransactionId};
