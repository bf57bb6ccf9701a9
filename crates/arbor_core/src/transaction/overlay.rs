//! Read-your-writes view over the mutation log and the backend.
//!
//! A read first consults the log, newest operation first. The newest
//! operation on the queried path or one of its ancestors decides the base
//! value; without one the backend is read and every key revision it reports
//! is recorded in [`Observations`]. Newer operations on strict descendants
//! of the queried path are then grafted onto the base in log order, so an
//! in-transaction read returns what the backend will hold after commit.

use crate::error::{CoreError, CoreResult};
use crate::transaction::log::Operation;
use arbor_codec::{compose, is_node, Decode, KeyCodec, NodeEntry, Path, Value};
use arbor_storage::{BackendClient, KeyRevision, Revision};
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// Backend state a transaction has observed through its reads.
///
/// For every range read the key set of the range is kept, and for every key
/// the revision it had when first seen. Later observations never overwrite
/// earlier ones, so a change between two reads of the same key surfaces as
/// a conflict.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observations {
    revisions: BTreeMap<Vec<u8>, Revision>,
    ranges: BTreeMap<Vec<u8>, BTreeSet<Vec<u8>>>,
    latest: Revision,
}

impl Observations {
    /// Creates an empty set of observations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the result of a range read over `prefix`.
    pub fn record_range<I>(&mut self, prefix: &[u8], keys: I)
    where
        I: IntoIterator<Item = (Vec<u8>, Revision)>,
    {
        let mut seen = BTreeSet::new();
        for (key, revision) in keys {
            self.latest = self.latest.max(revision);
            self.revisions.entry(key.clone()).or_insert(revision);
            seen.insert(key);
        }
        self.ranges.entry(prefix.to_vec()).or_insert(seen);
    }

    /// Records the revision a range read was served at.
    pub fn record_header(&mut self, revision: Revision) {
        self.latest = self.latest.max(revision);
    }

    /// Returns the highest backend revision seen so far.
    pub fn latest(&self) -> Revision {
        self.latest
    }

    /// Returns the revision a key had when first observed.
    pub fn revision(&self, key: &[u8]) -> Option<Revision> {
        self.revisions.get(key).copied()
    }

    /// Iterates every observed key with its revision.
    pub fn revisions(&self) -> impl Iterator<Item = (&[u8], Revision)> {
        self.revisions.iter().map(|(k, r)| (k.as_slice(), *r))
    }

    /// Iterates the prefixes of every observed range.
    pub fn range_prefixes(&self) -> impl Iterator<Item = &[u8]> {
        self.ranges.keys().map(Vec::as_slice)
    }

    /// Iterates the prefixes of observed ranges that held no key.
    pub fn empty_ranges(&self) -> impl Iterator<Item = &[u8]> {
        self.ranges
            .iter()
            .filter(|(_, keys)| keys.is_empty())
            .map(|(prefix, _)| prefix.as_slice())
    }

    /// Returns the number of observed keys.
    pub fn key_count(&self) -> usize {
        self.revisions.len()
    }

    /// Returns true if nothing has been observed.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Compares the current content of an observed range with what was seen.
    ///
    /// Returns the first key that appeared, disappeared or changed revision,
    /// or `None` if the range is unchanged. Unknown prefixes are unchanged.
    pub fn first_change(&self, prefix: &[u8], current: &[KeyRevision]) -> Option<Vec<u8>> {
        let seen = self.ranges.get(prefix)?;
        for entry in current {
            let unchanged = seen.contains(&entry.key)
                && self.revision(&entry.key) == Some(entry.mod_revision);
            if !unchanged {
                return Some(entry.key.clone());
            }
        }
        let current_keys: BTreeSet<&[u8]> = current.iter().map(|e| e.key.as_slice()).collect();
        seen.iter()
            .find(|key| !current_keys.contains(key.as_slice()))
            .cloned()
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.revisions.clear();
        self.ranges.clear();
        self.latest = Revision::ABSENT;
    }
}

/// Returns the part of `value` at `relative`, following interior nodes only.
pub(crate) fn subtree<'v, S: AsRef<str>>(value: &'v Value, relative: &[S]) -> Option<&'v Value> {
    relative.iter().try_fold(value, |node, segment| {
        if is_node(node) {
            node.field(segment.as_ref())
        } else {
            None
        }
    })
}

/// Log-first reader bound to one transaction's state.
pub struct ReadOverlay<'a> {
    operations: &'a [Operation],
    backend: &'a dyn BackendClient,
    keys: &'a KeyCodec,
    observations: &'a mut Observations,
}

impl<'a> ReadOverlay<'a> {
    /// Creates an overlay over `operations` with `backend` as fallback.
    pub fn new(
        operations: &'a [Operation],
        backend: &'a dyn BackendClient,
        keys: &'a KeyCodec,
        observations: &'a mut Observations,
    ) -> Self {
        Self {
            operations,
            backend,
            keys,
            observations,
        }
    }

    /// Returns the value at `path` as this transaction sees it.
    ///
    /// # Errors
    ///
    /// Returns `ReadFailed` if the backend is needed and cannot be read or
    /// holds undecodable data.
    pub async fn read(&mut self, path: &Path) -> CoreResult<Option<Value>> {
        let (base, newer) = match self.deciding_index(path) {
            Some(index) => (project(&self.operations[index], path), index + 1),
            None => (self.fetch(path).await?, 0),
        };
        Ok(graft(base, path, &self.operations[newer..]))
    }

    /// Returns true if a value exists at `path` as this transaction sees it.
    ///
    /// When no buffered operation touches `path` or its subtree, the backend
    /// is read for keys and revisions only.
    ///
    /// # Errors
    ///
    /// Returns `ReadFailed` if the backend is needed and cannot be read.
    pub async fn exists(&mut self, path: &Path) -> CoreResult<bool> {
        let touched = self
            .operations
            .iter()
            .any(|op| op.path().is_ancestor_or_equal(path) || path.is_ancestor_of(op.path()));
        if touched {
            return Ok(self.read(path).await?.is_some());
        }

        let prefix = self.keys.encode(path);
        let keys = self
            .backend
            .range_revisions(&prefix)
            .await
            .map_err(|e| CoreError::read_failed(path, e))?;
        trace!(path = %path, keys = keys.len(), "backend fallback scan");
        let found = !keys.is_empty();
        self.observations
            .record_range(&prefix, keys.into_iter().map(|k| (k.key, k.mod_revision)));
        Ok(found)
    }

    /// Index of the newest operation on `path` or one of its ancestors.
    fn deciding_index(&self, path: &Path) -> Option<usize> {
        self.operations
            .iter()
            .rposition(|op| op.path().is_ancestor_or_equal(path))
    }

    async fn fetch(&mut self, path: &Path) -> CoreResult<Option<Value>> {
        let prefix = self.keys.encode(path);
        let response = self
            .backend
            .get_range(&prefix)
            .await
            .map_err(|e| CoreError::read_failed(path, e))?;
        trace!(path = %path, keys = response.entries.len(), "backend fallback read");
        self.observations.record_header(response.revision);

        self.observations.record_range(
            &prefix,
            response
                .entries
                .iter()
                .map(|kv| (kv.key.clone(), kv.mod_revision)),
        );

        let mut entries = Vec::with_capacity(response.entries.len());
        for kv in response.entries {
            let node = self
                .keys
                .decode(&kv.key)
                .map_err(|e| CoreError::read_failed(path, e))?;
            let relative = node
                .relative_to(path)
                .ok_or_else(|| CoreError::read_failed(path, "backend returned a key outside the range"))?
                .to_vec();
            let entry = NodeEntry::decode(&kv.value).map_err(|e| CoreError::read_failed(path, e))?;
            entries.push((relative, entry));
        }
        Ok(compose(entries))
    }
}

/// Value `op` gives to `path`, where `op` targets `path` or an ancestor.
fn project(op: &Operation, path: &Path) -> Option<Value> {
    let value = op.value()?;
    let relative = path.relative_to(op.path())?;
    subtree(value, relative).cloned()
}

/// Applies operations on strict descendants of `path` to `base`, in order.
fn graft(mut base: Option<Value>, path: &Path, newer: &[Operation]) -> Option<Value> {
    for op in newer {
        if !path.is_ancestor_of(op.path()) {
            continue;
        }
        let Some(relative) = op.path().relative_to(path) else {
            continue;
        };
        match op.value() {
            Some(value) => base
                .get_or_insert_with(Value::empty_map)
                .set_at(relative, value.clone()),
            None => {
                if let Some(node) = base.as_mut() {
                    node.remove_at(relative);
                }
            }
        }
    }
    base
}
