//! # Arbor Storage
//!
//! The backend interface Arbor commits against, and an in-memory
//! implementation of it.
//!
//! Backends are etcd-like: an ordered key space of opaque byte keys and
//! values, a global revision counter, per-key modification revisions, and a
//! single atomicity primitive, the conditional multi-key transaction
//! ([`TxnRequest`]). Backends do not interpret keys or values.
//!
//! ## Design Principles
//!
//! - Reads report the revision of every key they return
//! - A transaction either applies all of its puts and deletes or none
//! - Compare failures are outcomes, transport failures are errors
//! - Must be `Send + Sync`; one handle is shared by many transactions
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral storage

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod memory;

pub use backend::{
    BackendClient, Compare, KeyRevision, KeyValue, RangeResponse, Revision, TxnOutcome,
    TxnRequest,
};
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryBackend;
