//! Dynamic tree value type.

use std::cmp::Ordering;

/// A dynamic tree value.
///
/// Maps with text keys are the interior nodes of a tree; every other variant
/// is a leaf. Floats are intentionally not supported per the canonical CBOR
/// rules the codec enforces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer (supports full i64 range).
    Integer(i64),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Text string (UTF-8).
    Text(String),
    /// Array of values. Arrays are leaves: they are stored and replaced whole.
    Array(Vec<Value>),
    /// Map of key-value pairs (keys are sorted for canonical encoding).
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Create a map value with sorted keys.
    ///
    /// If a key appears more than once the last occurrence wins.
    pub fn map(mut pairs: Vec<(Value, Value)>) -> Self {
        pairs.reverse();
        pairs.sort_by(|a, b| a.0.cmp_canonical(&b.0));
        pairs.dedup_by(|later, kept| later.0 == kept.0);
        Value::Map(pairs)
    }

    /// Create a map value from named fields.
    ///
    /// ```
    /// use arbor_codec::Value;
    ///
    /// let node = Value::object([("b", Value::from(2)), ("a", Value::from(1))]);
    /// assert_eq!(node.field("a"), Some(&Value::Integer(1)));
    /// ```
    pub fn object<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::map(
            fields
                .into_iter()
                .map(|(k, v)| (Value::Text(k.into()), v))
                .collect(),
        )
    }

    /// Create an empty map, the value of a tree node without fields.
    #[must_use]
    pub fn empty_map() -> Self {
        Value::Map(Vec::new())
    }

    /// Compare two values for canonical ordering.
    ///
    /// Values of different CBOR major types order by major type; within a
    /// type, ordering follows the canonical encoding (length first, then
    /// bytewise).
    #[allow(clippy::match_same_arms)]
    pub fn cmp_canonical(&self, other: &Self) -> Ordering {
        let self_type = self.major_type();
        let other_type = other.major_type();
        if self_type != other_type {
            return self_type.cmp(&other_type);
        }

        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            #[allow(clippy::cast_sign_loss)]
            (Value::Integer(a), Value::Integer(b)) => {
                // Same major type, so both are non-negative or both negative.
                // Negative integers encode their argument as -1 - n.
                if *a >= 0 {
                    Self::cmp_unsigned_canonical(*a as u64, *b as u64)
                } else {
                    Self::cmp_unsigned_canonical((-1 - *a) as u64, (-1 - *b) as u64)
                }
            }
            (Value::Bytes(a), Value::Bytes(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Value::Array(a), Value::Array(b)) => a.len().cmp(&b.len()).then_with(|| {
                a.iter()
                    .zip(b.iter())
                    .map(|(av, bv)| av.cmp_canonical(bv))
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            }),
            (Value::Map(a), Value::Map(b)) => a.len().cmp(&b.len()).then_with(|| {
                a.iter()
                    .zip(b.iter())
                    .map(|((ak, av), (bk, bv))| {
                        ak.cmp_canonical(bk).then_with(|| av.cmp_canonical(bv))
                    })
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            }),
            _ => Ordering::Equal,
        }
    }

    fn cmp_unsigned_canonical(a: u64, b: u64) -> Ordering {
        Self::cbor_uint_encoded_len(a)
            .cmp(&Self::cbor_uint_encoded_len(b))
            .then(a.cmp(&b))
    }

    /// Returns the encoded length (in bytes) of an unsigned integer in CBOR.
    fn cbor_uint_encoded_len(n: u64) -> usize {
        if n <= 23 {
            1
        } else if n <= 0xFF {
            2
        } else if n <= 0xFFFF {
            3
        } else if n <= 0xFFFF_FFFF {
            5
        } else {
            9
        }
    }

    fn major_type(&self) -> u8 {
        match self {
            Value::Integer(n) if *n >= 0 => 0,
            Value::Integer(_) => 1,
            Value::Bytes(_) => 2,
            Value::Text(_) => 3,
            Value::Array(_) => 4,
            Value::Map(_) => 5,
            Value::Bool(_) | Value::Null => 7,
        }
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is a map, i.e. an interior tree node.
    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a byte string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get this value as a map, if it is one.
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a named field of this map value.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Map(pairs) => pairs
                .iter()
                .find(|(k, _)| k.as_text() == Some(name))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut Value> {
        match self {
            Value::Map(pairs) => pairs
                .iter_mut()
                .find(|(k, _)| k.as_text() == Some(name))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Iterates the text-keyed fields of a map value.
    ///
    /// Non-map values have no fields.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.as_map()
            .unwrap_or_default()
            .iter()
            .filter_map(|(k, v)| k.as_text().map(|name| (name, v)))
    }

    /// Sets a named field, turning this value into a map if it is a leaf.
    ///
    /// Returns the previous value of the field.
    pub fn insert_field(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.insert_entry(Value::Text(name.into()), value)
    }

    /// Removes a named field of a map value.
    pub fn remove_field(&mut self, name: &str) -> Option<Value> {
        match self {
            Value::Map(pairs) => {
                let index = pairs.iter().position(|(k, _)| k.as_text() == Some(name))?;
                Some(pairs.remove(index).1)
            }
            _ => None,
        }
    }

    fn insert_entry(&mut self, key: Value, value: Value) -> Option<Value> {
        if !self.is_map() {
            *self = Value::empty_map();
        }
        let Value::Map(pairs) = self else {
            return None;
        };
        if let Some((_, existing)) = pairs.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(existing, value));
        }
        let index = pairs.partition_point(|(k, _)| k.cmp_canonical(&key) == Ordering::Less);
        pairs.insert(index, (key, value));
        None
    }

    fn remove_entry(&mut self, key: &Value) -> Option<Value> {
        match self {
            Value::Map(pairs) => {
                let index = pairs.iter().position(|(k, _)| k == key)?;
                Some(pairs.remove(index).1)
            }
            _ => None,
        }
    }

    /// Returns the subtree found by following `segments` from this value.
    ///
    /// An empty segment list returns the value itself.
    pub fn at<S: AsRef<str>>(&self, segments: &[S]) -> Option<&Value> {
        segments
            .iter()
            .try_fold(self, |node, segment| node.field(segment.as_ref()))
    }

    /// Replaces the subtree at `segments`, creating intermediate nodes.
    ///
    /// Leaves found on the way are replaced by maps.
    pub fn set_at<S: AsRef<str>>(&mut self, segments: &[S], value: Value) {
        let Some((first, rest)) = segments.split_first() else {
            *self = value;
            return;
        };
        let name = first.as_ref();
        match self.field_mut(name) {
            Some(child) if child.is_map() || rest.is_empty() => child.set_at(rest, value),
            _ => {
                let mut child = Value::empty_map();
                child.set_at(rest, value);
                self.insert_field(name, child);
            }
        }
    }

    /// Removes the subtree at `segments` and returns it.
    ///
    /// An empty segment list removes nothing.
    pub fn remove_at<S: AsRef<str>>(&mut self, segments: &[S]) -> Option<Value> {
        let (last, parents) = segments.split_last()?;
        let mut node = self;
        for segment in parents {
            node = node.field_mut(segment.as_ref())?;
        }
        node.remove_field(last.as_ref())
    }

    /// Merges `overlay` into this value.
    ///
    /// Fields of `overlay` override fields of `self`; fields only present in
    /// `self` are retained. Nested maps merge recursively. If either side is
    /// not a map, `overlay` replaces `self`.
    #[must_use]
    pub fn merged(self, overlay: Value) -> Value {
        match (self, overlay) {
            (mut base @ Value::Map(_), Value::Map(fields)) => {
                for (key, value) in fields {
                    let merged = match base.remove_entry(&key) {
                        Some(existing) => existing.merged(value),
                        None => value,
                    };
                    base.insert_entry(key, merged);
                }
                base
            }
            (_, overlay) => overlay,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(fields: &[(&str, Value)]) -> Value {
        Value::object(fields.iter().cloned())
    }

    #[test]
    fn map_keys_are_sorted() {
        let map = obj(&[("z", 1.into()), ("a", 2.into()), ("m", 3.into())]);
        let names: Vec<_> = map.fields().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["a", "m", "z"]);
    }

    #[test]
    fn map_key_length_ordering() {
        // Shorter keys come first in canonical CBOR
        let map = obj(&[("abc", 1.into()), ("a", 2.into()), ("ab", 3.into())]);
        let names: Vec<_> = map.fields().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["a", "ab", "abc"]);
    }

    #[test]
    fn map_duplicate_keys_keep_last() {
        let map = obj(&[("a", 1.into()), ("a", 2.into())]);
        assert_eq!(map.as_map().unwrap().len(), 1);
        assert_eq!(map.field("a"), Some(&Value::Integer(2)));
    }

    #[test]
    fn integer_ordering() {
        let mut sorted = vec![
            Value::Integer(-1),
            Value::Integer(0),
            Value::Integer(1),
            Value::Integer(-2),
            Value::Integer(2),
        ];
        sorted.sort_by(Value::cmp_canonical);

        assert_eq!(
            sorted,
            vec![
                Value::Integer(0),
                Value::Integer(1),
                Value::Integer(2),
                Value::Integer(-1),
                Value::Integer(-2),
            ]
        );
    }

    #[test]
    fn at_follows_nested_fields() {
        let tree = obj(&[("a", obj(&[("b", obj(&[("c", 7.into())]))]))]);
        assert_eq!(tree.at(&["a", "b", "c"]), Some(&Value::Integer(7)));
        assert_eq!(tree.at::<&str>(&[]), Some(&tree));
        assert_eq!(tree.at(&["a", "x"]), None);
        assert_eq!(tree.at(&["a", "b", "c", "d"]), None);
    }

    #[test]
    fn set_at_creates_intermediate_nodes() {
        let mut tree = Value::empty_map();
        tree.set_at(&["a", "b"], 1.into());
        assert_eq!(tree, obj(&[("a", obj(&[("b", 1.into())]))]));

        // A leaf on the way is replaced by a node
        tree.set_at(&["a", "b", "c"], 2.into());
        assert_eq!(tree.at(&["a", "b", "c"]), Some(&Value::Integer(2)));
    }

    #[test]
    fn remove_at_detaches_subtree() {
        let mut tree = obj(&[("a", obj(&[("b", 1.into()), ("c", 2.into())]))]);
        assert_eq!(tree.remove_at(&["a", "b"]), Some(Value::Integer(1)));
        assert_eq!(tree, obj(&[("a", obj(&[("c", 2.into())]))]));
        assert_eq!(tree.remove_at(&["a", "zz"]), None);
        assert_eq!(tree.remove_at::<&str>(&[]), None);
    }

    #[test]
    fn merged_is_field_union() {
        let existing = obj(&[("b", 2.into())]);
        let merged = existing.merged(obj(&[("a", 1.into())]));
        assert_eq!(merged, obj(&[("a", 1.into()), ("b", 2.into())]));
    }

    #[test]
    fn merged_overrides_and_recurses() {
        let existing = obj(&[
            ("x", 1.into()),
            ("nested", obj(&[("keep", true.into()), ("swap", 1.into())])),
        ]);
        let overlay = obj(&[("x", 9.into()), ("nested", obj(&[("swap", 2.into())]))]);

        let merged = existing.merged(overlay);
        assert_eq!(merged.field("x"), Some(&Value::Integer(9)));
        assert_eq!(merged.at(&["nested", "keep"]), Some(&Value::Bool(true)));
        assert_eq!(merged.at(&["nested", "swap"]), Some(&Value::Integer(2)));
    }

    #[test]
    fn merged_leaf_is_replaced() {
        assert_eq!(
            Value::Integer(1).merged(obj(&[("a", 1.into())])),
            obj(&[("a", 1.into())])
        );
        assert_eq!(obj(&[("a", 1.into())]).merged(Value::Null), Value::Null);
    }

    #[test]
    fn value_accessors() {
        assert!(Value::Null.is_null());
        assert!(Value::empty_map().is_map());
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Integer(42).as_integer(), Some(42));
        assert_eq!(Value::Text("hello".to_string()).as_text(), Some("hello"));
        assert_eq!(Value::Bytes(vec![1, 2, 3]).as_bytes(), Some(&[1, 2, 3][..]));
        assert_eq!(Value::from(()), Value::Null);
    }
}
