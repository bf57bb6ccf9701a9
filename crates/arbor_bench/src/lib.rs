//! Benchmark support for Arbor.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod utils;
