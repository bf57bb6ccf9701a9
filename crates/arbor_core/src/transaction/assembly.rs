//! Translation of a frozen mutation log into one conditional backend request.
//!
//! The log is walked in insertion order while a key-level action map is
//! maintained. Each operation sees the keys present under its path as the
//! backend had them, overridden by the actions of earlier operations, so a
//! later operation always observes the writes of earlier ones.
//!
//! Every key the assembler scans joins the compare-set with the revision
//! seen during the scan. Revisions observed by the transaction's reads take
//! precedence, so the request only applies if nothing the transaction relied
//! on has changed since.

use crate::error::{CoreError, CoreResult};
use crate::transaction::log::Operation;
use crate::transaction::overlay::Observations;
use arbor_codec::{flatten, Decode, Encode, KeyCodec, NodeEntry, Path, Value};
use arbor_storage::{BackendClient, Compare, KeyRevision, Revision, TxnRequest};
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Put(NodeEntry),
    Delete,
}

/// Builds a [`TxnRequest`] from operations applied in order.
pub struct TxnAssembler<'a> {
    backend: &'a dyn BackendClient,
    keys: &'a KeyCodec,
    actions: BTreeMap<Vec<u8>, Action>,
    ranges: BTreeMap<Vec<u8>, Vec<KeyRevision>>,
    nodes: BTreeMap<Vec<u8>, Option<NodeEntry>>,
    compares: BTreeMap<Vec<u8>, Revision>,
    range_scans: usize,
}

impl<'a> TxnAssembler<'a> {
    /// Creates an assembler that reads existing keys from `backend`.
    pub fn new(backend: &'a dyn BackendClient, keys: &'a KeyCodec) -> Self {
        Self {
            backend,
            keys,
            actions: BTreeMap::new(),
            ranges: BTreeMap::new(),
            nodes: BTreeMap::new(),
            compares: BTreeMap::new(),
            range_scans: 0,
        }
    }

    /// Number of backend range scans issued so far.
    pub fn range_scans(&self) -> usize {
        self.range_scans
    }

    /// Applies the next operation of the log.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if a range read fails, or a codec error if
    /// the backend holds an undecodable node.
    pub async fn apply(&mut self, operation: &Operation) -> CoreResult<()> {
        match operation {
            Operation::Put { path, value } | Operation::Merge { path, value } => {
                self.replace(path, value).await
            }
            Operation::Delete { path } => {
                let prefix = self.keys.encode(path);
                for (key, in_backend) in self.existing_keys(&prefix).await? {
                    self.remove(key, in_backend);
                }
                Ok(())
            }
        }
    }

    async fn replace(&mut self, path: &Path, value: &Value) -> CoreResult<()> {
        self.ensure_ancestors(path).await?;

        let entries: Vec<(Vec<u8>, NodeEntry)> = flatten(value)
            .into_iter()
            .map(|(relative, entry)| (self.keys.encode(&path.join(&relative)), entry))
            .collect();
        let produced: BTreeSet<&[u8]> = entries.iter().map(|(key, _)| key.as_slice()).collect();

        let prefix = self.keys.encode(path);
        for (key, in_backend) in self.existing_keys(&prefix).await? {
            if !produced.contains(key.as_slice()) {
                self.remove(key, in_backend);
            }
        }
        for (key, entry) in entries {
            self.actions.insert(key, Action::Put(entry));
        }
        Ok(())
    }

    /// Turns every ancestor of `path` into an interior node.
    async fn ensure_ancestors(&mut self, path: &Path) -> CoreResult<()> {
        let mut ancestor = Path::root();
        for segment in path.segments() {
            let key = self.keys.encode(&ancestor);
            if !self.is_container(&key).await? {
                self.actions.insert(key, Action::Put(NodeEntry::Container));
            }
            ancestor = ancestor.child(segment.as_str());
        }
        Ok(())
    }

    async fn is_container(&mut self, key: &[u8]) -> CoreResult<bool> {
        match self.actions.get(key) {
            Some(Action::Put(entry)) => return Ok(*entry == NodeEntry::Container),
            Some(Action::Delete) => return Ok(false),
            None => {}
        }
        if let Some(entry) = self.nodes.get(key) {
            return Ok(entry == &Some(NodeEntry::Container));
        }

        let stored = self
            .backend
            .get(key)
            .await
            .map_err(CoreError::from_backend)?;
        let revision = stored
            .as_ref()
            .map_or(Revision::ABSENT, |kv| kv.mod_revision);
        self.compares.entry(key.to_vec()).or_insert(revision);

        let entry = stored
            .map(|kv| NodeEntry::decode(&kv.value))
            .transpose()?;
        let container = entry == Some(NodeEntry::Container);
        self.nodes.insert(key.to_vec(), entry);
        Ok(container)
    }

    /// Keys currently present under `prefix`, flagged with whether the
    /// backend holds them.
    async fn existing_keys(&mut self, prefix: &[u8]) -> CoreResult<Vec<(Vec<u8>, bool)>> {
        let stored = self.backend_range(prefix).await?;

        let mut present = BTreeMap::new();
        for entry in stored {
            if self.actions.get(&entry.key) != Some(&Action::Delete) {
                present.insert(entry.key, true);
            }
        }
        let written = self
            .actions
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(_, action)| matches!(action, Action::Put(_)));
        for (key, _) in written {
            present.entry(key.clone()).or_insert(false);
        }
        Ok(present.into_iter().collect())
    }

    /// Backend keys under `prefix`, scanned at most once per prefix.
    async fn backend_range(&mut self, prefix: &[u8]) -> CoreResult<Vec<KeyRevision>> {
        let covering = self
            .ranges
            .iter()
            .find(|(scanned, _)| prefix.starts_with(scanned));
        if let Some((_, entries)) = covering {
            return Ok(entries
                .iter()
                .filter(|entry| entry.key.starts_with(prefix))
                .cloned()
                .collect());
        }

        let entries = self
            .backend
            .range_revisions(prefix)
            .await
            .map_err(CoreError::from_backend)?;
        self.range_scans += 1;
        trace!(keys = entries.len(), "scanned existing keys");

        for entry in &entries {
            self.compares
                .entry(entry.key.clone())
                .or_insert(entry.mod_revision);
        }
        self.ranges.insert(prefix.to_vec(), entries.clone());
        Ok(entries)
    }

    fn remove(&mut self, key: Vec<u8>, in_backend: bool) {
        if in_backend {
            self.actions.insert(key, Action::Delete);
        } else {
            self.actions.remove(&key);
        }
    }

    /// Produces the request.
    ///
    /// # Errors
    ///
    /// Returns a codec error if a node entry cannot be encoded.
    pub fn finish(mut self, observations: &Observations) -> CoreResult<TxnRequest> {
        // A read that found nothing must still find nothing at commit.
        for prefix in observations.empty_ranges() {
            self.compares.insert(prefix.to_vec(), Revision::ABSENT);
        }
        for (key, revision) in observations.revisions() {
            self.compares.insert(key.to_vec(), revision);
        }

        let mut request = TxnRequest {
            compares: self
                .compares
                .into_iter()
                .map(|(key, expected)| Compare { key, expected })
                .collect(),
            ..TxnRequest::default()
        };
        for (key, action) in self.actions {
            match action {
                Action::Put(entry) => request.puts.push((key, entry.encode()?)),
                Action::Delete => request.deletes.push(key),
            }
        }
        Ok(request)
    }
}

/// Builds the request for `operations` in one pass.
///
/// # Errors
///
/// See [`TxnAssembler::apply`] and [`TxnAssembler::finish`].
pub async fn assemble(
    operations: &[Operation],
    backend: &dyn BackendClient,
    keys: &KeyCodec,
    observations: &Observations,
) -> CoreResult<TxnRequest> {
    let mut assembler = TxnAssembler::new(backend, keys);
    for operation in operations {
        assembler.apply(operation).await?;
    }
    assembler.finish(observations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_storage::InMemoryBackend;

    fn codec() -> KeyCodec {
        KeyCodec::new(b"t/".to_vec())
    }

    fn key(path: &str) -> Vec<u8> {
        codec().encode(&Path::parse(path))
    }

    fn seed(backend: &InMemoryBackend, path: &str, value: &Value) {
        let base = Path::parse(path);
        for (relative, entry) in flatten(value) {
            backend.insert(
                &codec().encode(&base.join(&relative)),
                &entry.encode().unwrap(),
            );
        }
    }

    fn obj(fields: &[(&str, Value)]) -> Value {
        Value::object(fields.iter().cloned())
    }

    fn put_keys(request: &TxnRequest) -> Vec<Vec<u8>> {
        request.puts.iter().map(|(k, _)| k.clone()).collect()
    }

    #[tokio::test]
    async fn put_creates_ancestors_and_entries() {
        let backend = InMemoryBackend::new();
        let keys = codec();
        let ops = [Operation::Put {
            path: Path::parse("/a/b"),
            value: obj(&[("c", 1.into())]),
        }];

        let request = assemble(&ops, &backend, &keys, &Observations::new())
            .await
            .unwrap();

        assert_eq!(
            put_keys(&request),
            vec![key("/"), key("/a"), key("/a/b"), key("/a/b/c")]
        );
        assert!(request.deletes.is_empty());
        // Ancestors were absent and must stay absent until the commit
        assert!(request
            .compares
            .iter()
            .all(|c| c.expected == Revision::ABSENT));
    }

    #[tokio::test]
    async fn put_replaces_existing_subtree() {
        let backend = InMemoryBackend::new();
        seed(&backend, "/", &obj(&[("a", obj(&[("x", 1.into()), ("y", 2.into())]))]));
        let keys = codec();
        let ops = [Operation::Put {
            path: Path::parse("/a"),
            value: obj(&[("x", 5.into())]),
        }];

        let request = assemble(&ops, &backend, &keys, &Observations::new())
            .await
            .unwrap();

        assert_eq!(put_keys(&request), vec![key("/a"), key("/a/x")]);
        assert_eq!(request.deletes, vec![key("/a/y")]);
        let compared: Vec<_> = request.compares.iter().map(|c| c.key.clone()).collect();
        assert!(compared.contains(&key("/a/y")));
        assert!(compared.contains(&key("/")));
    }

    #[tokio::test]
    async fn delete_drops_earlier_puts() {
        let backend = InMemoryBackend::new();
        seed(&backend, "/", &obj(&[("a", obj(&[("old", 1.into())]))]));
        let keys = codec();
        let ops = [
            Operation::Put {
                path: Path::parse("/a/new"),
                value: 2.into(),
            },
            Operation::Delete {
                path: Path::parse("/a"),
            },
        ];

        let request = assemble(&ops, &backend, &keys, &Observations::new())
            .await
            .unwrap();

        assert!(request.puts.is_empty());
        assert_eq!(request.deletes, vec![key("/a"), key("/a/old")]);
    }

    #[tokio::test]
    async fn later_operations_observe_earlier_ones() {
        let backend = InMemoryBackend::new();
        let keys = codec();
        let ops = [
            Operation::Put {
                path: Path::parse("/a"),
                value: obj(&[("b", 1.into()), ("c", 2.into())]),
            },
            Operation::Put {
                path: Path::parse("/a"),
                value: obj(&[("c", 3.into())]),
            },
        ];

        let request = assemble(&ops, &backend, &keys, &Observations::new())
            .await
            .unwrap();

        assert_eq!(put_keys(&request), vec![key("/"), key("/a"), key("/a/c")]);
        assert!(request.deletes.is_empty());
    }

    #[tokio::test]
    async fn range_scanned_once_per_prefix() {
        let backend = InMemoryBackend::new();
        let keys = codec();
        let mut assembler = TxnAssembler::new(&backend, &keys);

        for n in 0..3 {
            assembler
                .apply(&Operation::Put {
                    path: Path::parse("/a"),
                    value: Value::Integer(n),
                })
                .await
                .unwrap();
        }
        assembler
            .apply(&Operation::Delete {
                path: Path::parse("/a/x"),
            })
            .await
            .unwrap();

        assert_eq!(assembler.range_scans(), 1);
    }

    #[tokio::test]
    async fn observed_revisions_take_precedence() {
        let backend = InMemoryBackend::new();
        seed(&backend, "/a", &Value::Integer(1));
        let keys = codec();
        let mut observations = Observations::new();
        observations.record_range(&key("/a"), vec![(key("/a"), Revision(77))]);

        let ops = [Operation::Delete {
            path: Path::parse("/a"),
        }];
        let request = assemble(&ops, &backend, &keys, &observations).await.unwrap();

        let compare = request
            .compares
            .iter()
            .find(|c| c.key == key("/a"))
            .unwrap();
        assert_eq!(compare.expected, Revision(77));
    }

    #[tokio::test]
    async fn empty_read_is_compared_as_absent() {
        let backend = InMemoryBackend::new();
        let keys = codec();
        let mut observations = Observations::new();
        observations.record_range(&key("/slot"), Vec::new());

        let ops = [Operation::Put {
            path: Path::parse("/x"),
            value: 1.into(),
        }];
        let request = assemble(&ops, &backend, &keys, &observations).await.unwrap();

        let compare = request
            .compares
            .iter()
            .find(|c| c.key == key("/slot"))
            .unwrap();
        assert_eq!(compare.expected, Revision::ABSENT);
    }
}
