//! # Arbor Testkit
//!
//! Test utilities for Arbor.
//!
//! This crate provides:
//! - Test stores over an inspectable in-memory backend
//! - A fault-injecting backend that counts calls
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use arbor_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn test_with_store() {
//!     let test = TestStore::memory();
//!     test.seed("/a", Value::from(1)).await;
//!     // ... test operations
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faulty;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faulty::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use arbor_codec::{Path, Value};
}

pub use faulty::*;
pub use fixtures::*;
pub use generators::*;
