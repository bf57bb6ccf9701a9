//! Flattening trees into per-node entries and composing them back.
//!
//! Every node of a stored tree has its own backend key. Interior nodes are
//! stored as [`NodeEntry::Container`], everything else as
//! [`NodeEntry::Leaf`]. Entries are addressed by their segments relative to
//! the root of the flattened subtree.

use crate::decoder::from_cbor;
use crate::encoder::to_canonical_cbor;
use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use crate::{Decode, Encode};

const CONTAINER_TAG: i64 = 0;
const LEAF_TAG: i64 = 1;

/// The stored form of a single tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEntry {
    /// An interior node; its fields are stored under their own keys.
    Container,
    /// A leaf node holding its whole value.
    Leaf(Value),
}

impl NodeEntry {
    /// Returns the value this entry contributes before its children are
    /// attached.
    pub fn into_value(self) -> Value {
        match self {
            NodeEntry::Container => Value::empty_map(),
            NodeEntry::Leaf(value) => value,
        }
    }
}

impl Encode for NodeEntry {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        let item = match self {
            NodeEntry::Container => Value::Array(vec![Value::Integer(CONTAINER_TAG)]),
            NodeEntry::Leaf(value) => {
                Value::Array(vec![Value::Integer(LEAF_TAG), value.clone()])
            }
        };
        to_canonical_cbor(&item)
    }
}

impl Decode for NodeEntry {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let Value::Array(mut items) = from_cbor(bytes)? else {
            return Err(CodecError::invalid_structure("node entry is not an array"));
        };
        match (items.first().and_then(Value::as_integer), items.len()) {
            (Some(CONTAINER_TAG), 1) => Ok(NodeEntry::Container),
            (Some(LEAF_TAG), 2) => Ok(NodeEntry::Leaf(items.swap_remove(1))),
            _ => Err(CodecError::invalid_structure("unknown node entry shape")),
        }
    }
}

/// Returns true if `value` is stored as an interior node.
///
/// Only maps whose keys are all text can be addressed by path segments.
pub fn is_node(value: &Value) -> bool {
    value
        .as_map()
        .is_some_and(|pairs| pairs.iter().all(|(k, _)| k.as_text().is_some()))
}

/// Flattens a tree into one entry per node, parents before children.
///
/// The first entry always belongs to the root of `value` (empty segments).
pub fn flatten(value: &Value) -> Vec<(Vec<String>, NodeEntry)> {
    let mut entries = Vec::new();
    flatten_into(value, &mut Vec::new(), &mut entries);
    entries
}

fn flatten_into(
    value: &Value,
    segments: &mut Vec<String>,
    entries: &mut Vec<(Vec<String>, NodeEntry)>,
) {
    if !is_node(value) {
        entries.push((segments.clone(), NodeEntry::Leaf(value.clone())));
        return;
    }
    entries.push((segments.clone(), NodeEntry::Container));
    for (name, child) in value.fields() {
        segments.push(name.to_string());
        flatten_into(child, segments, entries);
        segments.pop();
    }
}

/// Composes entries back into a tree.
///
/// Entries may arrive in any order. A node with descendants but without its
/// own entry becomes a map, and descendants take precedence over a leaf
/// stored at one of their ancestors. Returns `None` when there are no
/// entries.
pub fn compose<I>(entries: I) -> Option<Value>
where
    I: IntoIterator<Item = (Vec<String>, NodeEntry)>,
{
    let mut entries: Vec<_> = entries.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut root: Option<Value> = None;
    for (segments, entry) in entries {
        let value = entry.into_value();
        if segments.is_empty() {
            root = Some(value);
        } else {
            root.get_or_insert_with(Value::empty_map)
                .set_at(&segments, value);
        }
    }
    root
}
