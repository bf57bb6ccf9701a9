//! Property-based test generators using proptest.
//!
//! Provides strategies for generating paths, values and mutation
//! sequences over a small alphabet, so that generated operations collide
//! often enough to exercise overlay and assembly edge cases.

use arbor_codec::{Path, Value};
use arbor_core::Operation;
use proptest::prelude::*;

/// Strategy for a path segment from a small alphabet.
pub fn segment_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["a", "b", "c", "d"]).prop_map(str::to_string)
}

/// Strategy for paths of depth 1 to `max_depth`.
pub fn path_strategy(max_depth: usize) -> impl Strategy<Value = Path> {
    prop::collection::vec(segment_strategy(), 1..=max_depth.max(1)).prop_map(Path::new)
}

/// Strategy for leaf values.
pub fn leaf_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1000i64..1000).prop_map(Value::Integer),
        "[a-z]{0,6}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..4).prop_map(Value::Bytes),
    ]
}

/// Strategy for tree values: leaves or non-empty maps of trees.
pub fn tree_strategy() -> impl Strategy<Value = Value> {
    leaf_strategy().prop_recursive(3, 16, 3, |inner| {
        prop::collection::vec((segment_strategy(), inner), 1..4).prop_map(Value::object)
    })
}

/// Strategy for a single buffered put or delete.
pub fn operation_strategy(max_depth: usize) -> impl Strategy<Value = Operation> {
    prop_oneof![
        3 => (path_strategy(max_depth), tree_strategy())
            .prop_map(|(path, value)| Operation::Put { path, value }),
        1 => path_strategy(max_depth).prop_map(|path| Operation::Delete { path }),
    ]
}

/// Strategy for a sequence of up to `max_len` operations.
pub fn operations_strategy(max_len: usize, max_depth: usize) -> impl Strategy<Value = Vec<Operation>> {
    prop::collection::vec(operation_strategy(max_depth), 0..=max_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_codec::is_node;

    proptest! {
        #[test]
        fn paths_are_not_root(path in path_strategy(3)) {
            prop_assert!(!path.is_root());
            prop_assert!(path.depth() <= 3);
        }

        #[test]
        fn leaves_are_not_nodes(leaf in leaf_strategy()) {
            prop_assert!(!is_node(&leaf));
        }

        #[test]
        fn operation_sequences_are_bounded(ops in operations_strategy(5, 2)) {
            prop_assert!(ops.len() <= 5);
            for op in &ops {
                prop_assert!(op.path().depth() <= 2);
            }
        }
    }
}
