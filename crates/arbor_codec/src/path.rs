//! Tree paths and their backend key encoding.

use crate::error::{CodecError, CodecResult};
use std::fmt;

/// Location of a node in the tree.
///
/// A path is an ordered sequence of segment names starting at the root. The
/// empty path is the root itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// The root path.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Creates a path from its segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses a slash-separated path such as `/users/alice`.
    ///
    /// Empty segments are ignored, so `""` and `"/"` both denote the root.
    pub fn parse(s: &str) -> Self {
        Self::new(s.split('/').filter(|segment| !segment.is_empty()))
    }

    /// Returns the segments of this path.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the number of segments below the root.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Returns true for the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the last segment, or `None` for the root.
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Returns the path of a child node.
    #[must_use]
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.into());
        Self { segments }
    }

    /// Returns the parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, parent) = self.segments.split_last()?;
        Some(Self {
            segments: parent.to_vec(),
        })
    }

    /// Appends relative segments to this path.
    #[must_use]
    pub fn join<S: AsRef<str>>(&self, relative: &[S]) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(relative.iter().map(|s| s.as_ref().to_string()));
        Self { segments }
    }

    /// Returns true if `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &Path) -> bool {
        self.depth() < other.depth() && self.is_ancestor_or_equal(other)
    }

    /// Returns true if `self` is an ancestor of `other` or equal to it.
    pub fn is_ancestor_or_equal(&self, other: &Path) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// Returns the segments of `self` below `ancestor`.
    ///
    /// Returns `None` if `ancestor` is not an ancestor of (or equal to) `self`.
    pub fn relative_to(&self, ancestor: &Path) -> Option<&[String]> {
        self.segments.strip_prefix(ancestor.segments.as_slice())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<&Path> for Path {
    fn from(path: &Path) -> Self {
        path.clone()
    }
}

impl<S: Into<String>> FromIterator<S> for Path {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

const TERMINATOR: u8 = 0x00;
const ESCAPE: u8 = 0x01;

/// Maps tree paths to backend keys and back.
///
/// Every key starts with the store prefix, followed by each segment with
/// `0x00` and `0x01` bytes escaped and a `0x00` terminator. The encoding is
/// injective and prefix-preserving: `encode(a)` is a byte prefix of
/// `encode(b)` exactly when `a` is an ancestor of or equal to `b`. A range
/// read over `encode(p)` therefore returns `p` and its descendants only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCodec {
    prefix: Vec<u8>,
}

impl KeyCodec {
    /// Creates a codec for the given key namespace.
    pub fn new(prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns the namespace prefix, which is also the key of the root.
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Encodes a path into its backend key.
    pub fn encode(&self, path: &Path) -> Vec<u8> {
        let mut key = self.prefix.clone();
        for segment in path.segments() {
            for &byte in segment.as_bytes() {
                match byte {
                    TERMINATOR => key.extend_from_slice(&[ESCAPE, 0x01]),
                    ESCAPE => key.extend_from_slice(&[ESCAPE, 0x02]),
                    other => key.push(other),
                }
            }
            key.push(TERMINATOR);
        }
        key
    }

    /// Decodes a backend key into a path.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the key lies outside the namespace, ends in
    /// the middle of a segment, holds an invalid escape or a segment that is
    /// not UTF-8.
    pub fn decode(&self, key: &[u8]) -> CodecResult<Path> {
        let mut rest = key
            .strip_prefix(self.prefix.as_slice())
            .ok_or_else(|| CodecError::invalid_key("key outside of store prefix"))?
            .iter();

        let mut segments = Vec::new();
        let mut current = Vec::new();
        while let Some(&byte) = rest.next() {
            match byte {
                TERMINATOR => {
                    let segment = String::from_utf8(std::mem::take(&mut current))
                        .map_err(|_| CodecError::invalid_key("segment is not valid UTF-8"))?;
                    segments.push(segment);
                }
                ESCAPE => match rest.next() {
                    Some(0x01) => current.push(TERMINATOR),
                    Some(0x02) => current.push(ESCAPE),
                    _ => return Err(CodecError::invalid_key("invalid escape sequence")),
                },
                other => current.push(other),
            }
        }
        if !current.is_empty() {
            return Err(CodecError::invalid_key("unterminated segment"));
        }
        Ok(Path { segments })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_and_display() {
        let path = Path::parse("/users/alice");
        assert_eq!(path.segments(), ["users", "alice"]);
        assert_eq!(path.to_string(), "/users/alice");
        assert_eq!(Path::parse("/"), Path::root());
        assert_eq!(Path::root().to_string(), "/");
    }

    #[test]
    fn ancestry() {
        let a = Path::parse("/a");
        let ab = Path::parse("/a/b");
        let ac = Path::parse("/ac");

        assert!(a.is_ancestor_of(&ab));
        assert!(!a.is_ancestor_of(&a));
        assert!(a.is_ancestor_or_equal(&a));
        assert!(!a.is_ancestor_or_equal(&ac));
        assert!(Path::root().is_ancestor_of(&a));
        assert!(!ab.is_ancestor_or_equal(&a));
    }

    #[test]
    fn relative_child_parent() {
        let ab = Path::parse("/a/b");
        assert_eq!(ab.relative_to(&Path::parse("/a")), Some(&["b".to_string()][..]));
        assert_eq!(ab.relative_to(&Path::parse("/x")), None);
        assert_eq!(Path::parse("/a").child("b"), ab);
        assert_eq!(ab.parent(), Some(Path::parse("/a")));
        assert_eq!(Path::root().parent(), None);
        assert_eq!(Path::parse("/a").join(&["b", "c"]), Path::parse("/a/b/c"));
    }

    #[test]
    fn encode_layout() {
        let codec = KeyCodec::new(b"p/".to_vec());
        assert_eq!(codec.encode(&Path::root()), b"p/".to_vec());
        assert_eq!(codec.encode(&Path::parse("/a/bc")), b"p/a\0bc\0".to_vec());
        assert_eq!(
            codec.encode(&Path::new(["x\u{0}\u{1}"])),
            vec![b'p', b'/', b'x', 0x01, 0x01, 0x01, 0x02, 0x00]
        );
    }

    #[test]
    fn sibling_with_common_prefix_is_not_in_range() {
        let codec = KeyCodec::new(b"p/".to_vec());
        let a = codec.encode(&Path::parse("/a"));
        let ab = codec.encode(&Path::parse("/ab"));
        assert!(!ab.starts_with(&a));
    }

    #[test]
    fn decode_rejects_foreign_and_malformed_keys() {
        let codec = KeyCodec::new(b"p/".to_vec());
        assert!(codec.decode(b"q/a\0").is_err());
        assert!(codec.decode(b"p/a").is_err());
        assert!(codec.decode(&[b'p', b'/', 0x01, 0x07, 0x00]).is_err());
        assert!(codec.decode(&[b'p', b'/', 0xff, 0x00]).is_err());
    }

    fn path_strategy() -> impl Strategy<Value = Path> {
        prop::collection::vec("[a-c\\x00\\x01/]{0,3}", 0..4).prop_map(Path::new)
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(path in path_strategy()) {
            let codec = KeyCodec::new(b"ns/".to_vec());
            prop_assert_eq!(codec.decode(&codec.encode(&path)).unwrap(), path);
        }

        #[test]
        fn encoding_is_injective(a in path_strategy(), b in path_strategy()) {
            let codec = KeyCodec::new(b"ns/".to_vec());
            prop_assert_eq!(codec.encode(&a) == codec.encode(&b), a == b);
        }

        #[test]
        fn encoding_preserves_ancestry(a in path_strategy(), b in path_strategy()) {
            let codec = KeyCodec::new(b"ns/".to_vec());
            let is_prefix = codec.encode(&b).starts_with(&codec.encode(&a));
            prop_assert_eq!(is_prefix, a.is_ancestor_or_equal(&b));
        }
    }
}
