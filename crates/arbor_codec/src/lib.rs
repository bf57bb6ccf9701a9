//! # Arbor Codec
//!
//! Tree values, paths and the storage encoding used by Arbor.
//!
//! - [`Value`] is the dynamic tree type. Maps with text keys are interior
//!   nodes, every other value is a leaf.
//! - [`Path`] addresses nodes; [`KeyCodec`] maps paths onto backend keys so
//!   that a range read over a path returns exactly its subtree.
//! - [`flatten`] and [`compose`] convert between a tree and its per-node
//!   [`NodeEntry`] records.
//! - Values and entries are stored as canonical CBOR: map keys sorted,
//!   shortest integer encoding, definite lengths, no floats.
//!
//! ## Usage
//!
//! ```
//! use arbor_codec::{compose, flatten, from_cbor, to_canonical_cbor, Value};
//!
//! let tree = Value::object([("name", Value::from("alice")), ("age", Value::from(30))]);
//!
//! let bytes = to_canonical_cbor(&tree).unwrap();
//! assert_eq!(from_cbor(&bytes).unwrap(), tree);
//!
//! assert_eq!(compose(flatten(&tree)), Some(tree));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod path;
mod tree;
mod value;

pub use decoder::from_cbor;
pub use encoder::to_canonical_cbor;
pub use error::{CodecError, CodecResult};
pub use path::{KeyCodec, Path};
pub use tree::{compose, flatten, is_node, NodeEntry};
pub use value::Value;

/// Trait for types that can be encoded to canonical CBOR.
pub trait Encode {
    /// Encode this value to canonical CBOR bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for types that can be decoded from CBOR.
pub trait Decode: Sized {
    /// Decode this value from CBOR bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl Encode for Value {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_canonical_cbor(self)
    }
}

impl Decode for Value {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}
