// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Mutable file nodes over a blob store
//!
//! A file node aggregates a data index, named children, extended attributes
//! and stat metadata. Mutations are buffered in memory; [`FileNode::flush`]
//! commits a subtree bottom-up and returns the node's content address.

mod cursor;
pub(crate) mod data;
pub(crate) mod extent;
mod stat;

pub use cursor::Cursor;
pub use stat::{FileType, Ident, Stat, Timestamp};

use crate::{
    cancel::CancelSignal,
    coding::{Decode, DecodeError, Encode, EncodeError},
    split::SplitConfig,
    store::{BlobStore, StoreRef},
    wire::{self, Variant},
    Error, Key, Slice,
};
use data::FileData;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Construction options for a [`FileNode`]
#[derive(Default)]
pub struct FileOptions {
    /// Transient name attributed to the node; not persisted
    pub name: Option<String>,

    /// Initial stat; providing one enables stat persistence
    pub stat: Option<Stat>,

    /// Chunking configuration for file data written through this node
    pub split: Option<SplitConfig>,

    /// Cancellation signal observed by store-facing operations
    pub cancel: Option<CancelSignal>,
}

/// Child entry of a file node
#[derive(Clone)]
struct Child {
    name: String,

    /// Storage key of the child; stale while `node` holds unflushed changes
    key: Key,

    /// Cached child node; when present, the authoritative state
    node: Option<FileNode>,
}

struct State {
    /// Transient name, set at construction or when opened as a child
    name: String,

    /// Storage key; unset iff the node is fresh or mutated since last flush
    key: Option<Key>,

    data: FileData,
    split: SplitConfig,
    stat: Stat,
    persist_stat: bool,
    xattrs: BTreeMap<String, Slice>,

    /// Sorted ascending by name, names unique
    children: Vec<Child>,
}

impl State {
    fn identity(&self) -> String {
        if !self.name.is_empty() {
            return self.name.clone();
        }

        match &self.key {
            Some(key) => key.to_hex(),
            None => "(unnamed node)".into(),
        }
    }

    fn child_index(&self, name: &str) -> Option<usize> {
        let index = self.children.partition_point(|c| c.name.as_str() < name);

        self.children
            .get(index)
            .is_some_and(|c| c.name == name)
            .then_some(index)
    }
}

/// A mutable node of a file tree
///
/// Cloning a `FileNode` clones a shared handle: a node cached as a child of
/// its parent and a handle obtained via [`FileNode::open_child`] observe the
/// same state. Every operation takes the node's read-write lock, so handles
/// can be used from multiple threads.
#[derive(Clone)]
pub struct FileNode {
    store: StoreRef,
    cancel: CancelSignal,
    inner: Arc<RwLock<State>>,
}

impl std::fmt::Debug for FileNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("FileNode")
            .field("name", &state.name)
            .field("key", &state.key)
            .field("size", &state.data.total_bytes())
            .field("children", &state.children.len())
            .finish_non_exhaustive()
    }
}

impl FileNode {
    /// Constructs an empty node.
    #[must_use]
    pub fn new(store: StoreRef, opts: FileOptions) -> Self {
        let persist_stat = opts.stat.is_some();

        Self {
            store,
            cancel: opts.cancel.unwrap_or_default(),
            inner: Arc::new(RwLock::new(State {
                name: opts.name.unwrap_or_default(),
                key: None,
                data: FileData::new(),
                split: opts.split.unwrap_or_default(),
                stat: opts.stat.unwrap_or_default(),
                persist_stat,
                xattrs: BTreeMap::new(),
                children: Vec::new(),
            })),
        }
    }

    /// Fetches and decodes the node stored under `key`.
    ///
    /// Children are opened lazily: their entries carry only storage keys
    /// until [`FileNode::open_child`] fetches them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyNotFound`] for an unknown key and a decode error
    /// for a blob that is not a file node.
    pub fn open(store: StoreRef, key: &Key) -> crate::Result<Self> {
        Self::open_internal(
            store,
            key,
            SplitConfig::default(),
            CancelSignal::default(),
            String::new(),
        )
    }

    fn open_internal(
        store: StoreRef,
        key: &Key,
        split: SplitConfig,
        cancel: CancelSignal,
        name: String,
    ) -> crate::Result<Self> {
        let blob = store.get(key)?;
        let mut reader = &*blob;

        wire::expect_envelope(&mut reader, Variant::Node)?;
        let parts = decode_state(&mut reader)?;
        let persist_stat = parts.stat.is_some();

        log::trace!(
            "opened node {} from {key}",
            if name.is_empty() { "_" } else { name.as_str() }
        );

        Ok(Self {
            store,
            cancel,
            inner: Arc::new(RwLock::new(State {
                name,
                key: Some(key.clone()),
                data: parts.data,
                split,
                stat: parts.stat.unwrap_or_default(),
                persist_stat,
                xattrs: parts.xattrs,
                children: parts.children,
            })),
        })
    }

    /// Returns the store this node reads from and flushes to.
    #[must_use]
    pub fn store(&self) -> &StoreRef {
        &self.store
    }

    /// Returns the cancellation signal observed by this node.
    #[must_use]
    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    pub(crate) fn split_config(&self) -> SplitConfig {
        self.read().split.clone()
    }

    /// Returns the node's transient attributed name.
    ///
    /// Set at construction or when the node is opened as a child; never
    /// persisted and without effect on the storage key.
    #[must_use]
    pub fn name(&self) -> String {
        self.read().name.clone()
    }

    /// Returns the node's storage key, or `None` if the node has been
    /// mutated (or never flushed) since it was last written.
    #[must_use]
    pub fn storage_key(&self) -> Option<Key> {
        self.read().key.clone()
    }

    /// Returns the logical file size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.read().data.total_bytes()
    }

    /// Returns a copy of the node's stat.
    #[must_use]
    pub fn stat(&self) -> Stat {
        self.read().stat.clone()
    }

    /// Mutates the node's stat and enables stat persistence.
    pub fn set_stat(&self, f: impl FnOnce(&mut Stat)) {
        let mut state = self.write();
        state.persist_stat = true;
        f(&mut state.stat);
        state.key = None;
    }

    /// Disables stat persistence and resets the stat.
    pub fn clear_stat(&self) {
        let mut state = self.write();

        if state.persist_stat {
            state.persist_stat = false;
            state.stat = Stat::default();
            state.key = None;
        }
    }

    /// Returns `true` if a child with the given name exists.
    #[must_use]
    pub fn has_child(&self, name: &str) -> bool {
        self.read().child_index(name).is_some()
    }

    /// Returns the names of all children, in ascending order.
    #[must_use]
    pub fn child_names(&self) -> Vec<String> {
        self.read()
            .children
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    /// Installs `child` under `name`, replacing any existing entry.
    ///
    /// The parent keeps a shared handle so the child's future mutations are
    /// picked up by the next flush.
    pub fn set_child(&self, name: &str, child: &Self) {
        let child_key = child.storage_key().unwrap_or_else(Key::empty);

        let mut state = self.write();
        let entry = Child {
            name: name.into(),
            key: child_key,
            node: Some(child.clone()),
        };

        if let Some(index) = state.child_index(name) {
            if let Some(slot) = state.children.get_mut(index) {
                *slot = entry;
            }
        } else {
            let index = state.children.partition_point(|c| c.name.as_str() < name);
            state.children.insert(index, entry);
        }

        state.key = None;
    }

    /// Removes the child with the given name.
    ///
    /// Returns `false` if no such child exists.
    pub fn remove_child(&self, name: &str) -> bool {
        let mut state = self.write();

        if let Some(index) = state.child_index(name) {
            state.children.remove(index);
            state.key = None;
            true
        } else {
            false
        }
    }

    /// Returns the child with the given name, fetching it from the store if
    /// it is not cached.
    ///
    /// The opened node is cached on the parent and attributed the child's
    /// name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChildNotFound`] if no such name exists.
    pub fn open_child(&self, name: &str) -> crate::Result<Self> {
        let (key, split) = {
            let state = self.read();

            let Some(index) = state.child_index(name) else {
                return Err(Error::ChildNotFound(name.into()));
            };

            #[allow(clippy::expect_used)]
            let entry = state.children.get(index).expect("index is in range");

            if let Some(node) = &entry.node {
                return Ok(node.clone());
            }

            (entry.key.clone(), state.split.clone())
        };

        let node = Self::open_internal(
            self.store.clone(),
            &key,
            split,
            self.cancel.clone(),
            name.into(),
        )?;

        let mut state = self.write();

        if let Some(index) = state.child_index(name) {
            if let Some(entry) = state.children.get_mut(index) {
                // another thread may have cached the child meanwhile
                if let Some(existing) = &entry.node {
                    return Ok(existing.clone());
                }

                entry.node = Some(node.clone());
            }
        }

        Ok(node)
    }

    /// Drops cached child nodes whose storage keys are up to date.
    ///
    /// Purely a memory reclamation aid; children with unflushed changes stay
    /// cached.
    pub fn release_children(&self) {
        let cached: Vec<(String, Self)> = self
            .read()
            .children
            .iter()
            .filter_map(|c| c.node.clone().map(|node| (c.name.clone(), node)))
            .collect();

        let mut releasable = Vec::new();

        for (name, node) in cached {
            if Arc::ptr_eq(&node.inner, &self.inner) {
                continue;
            }

            if let Some(key) = node.storage_key() {
                releasable.push((name, key));
            }
        }

        let mut state = self.write();

        for (name, key) in releasable {
            if let Some(index) = state.child_index(&name) {
                if let Some(entry) = state.children.get_mut(index) {
                    if entry.key == key {
                        entry.node = None;
                    }
                }
            }
        }
    }

    /// Returns `true` if an extended attribute with the given name exists.
    #[must_use]
    pub fn has_xattr(&self, name: &str) -> bool {
        self.read().xattrs.contains_key(name)
    }

    /// Returns the value of the extended attribute with the given name.
    #[must_use]
    pub fn xattr(&self, name: &str) -> Option<Slice> {
        self.read().xattrs.get(name).cloned()
    }

    /// Returns the names of all extended attributes, in ascending order.
    #[must_use]
    pub fn xattr_names(&self) -> Vec<String> {
        self.read().xattrs.keys().cloned().collect()
    }

    /// Sets an extended attribute.
    pub fn set_xattr(&self, name: &str, value: impl Into<Slice>) {
        let mut state = self.write();
        state.xattrs.insert(name.into(), value.into());
        state.key = None;
    }

    /// Removes an extended attribute.
    ///
    /// Returns `false` if no such attribute exists.
    pub fn remove_xattr(&self, name: &str) -> bool {
        let mut state = self.write();

        if state.xattrs.remove(name).is_some() {
            state.key = None;
            true
        } else {
            false
        }
    }

    /// Removes all extended attributes.
    pub fn clear_xattrs(&self) {
        let mut state = self.write();

        if !state.xattrs.is_empty() {
            state.xattrs.clear();
            state.key = None;
        }
    }

    /// Reads file data into `dst` starting at `offset`.
    ///
    /// Returns the number of bytes produced; zero means end of file. Holes
    /// read as zero bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if a referenced block cannot be fetched.
    pub fn read_at(&self, dst: &mut [u8], offset: u64) -> crate::Result<usize> {
        let state = self.read();
        state.data.read_at(&self.store, &self.cancel, dst, offset)
    }

    /// Writes `src` at `offset`, invalidating the storage key.
    ///
    /// # Errors
    ///
    /// Returns an error if blocks cannot be stored.
    pub fn write_at(&self, src: &[u8], offset: u64) -> crate::Result<usize> {
        if src.is_empty() {
            return Ok(0);
        }

        let mut state = self.write();
        let split = state.split.clone();

        let n = state
            .data
            .write_at(&self.store, &self.cancel, &split, src, offset)?;

        state.key = None;
        if state.persist_stat {
            state.stat.touch();
        }

        Ok(n)
    }

    /// Truncates (or extends with a hole) the file data to `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if a transected block cannot be re-chunked.
    pub fn truncate(&self, size: u64) -> crate::Result<()> {
        let mut state = self.write();

        if state.data.total_bytes() == size {
            return Ok(());
        }

        let split = state.split.clone();
        state
            .data
            .truncate(&self.store, &self.cancel, &split, size)?;

        state.key = None;
        if state.persist_stat {
            state.stat.touch();
        }

        Ok(())
    }

    /// Returns a positioned [`Cursor`] implementing the `std::io` traits.
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.clone())
    }

    /// Flushes the subtree rooted at this node and returns its storage key.
    ///
    /// Cached children flush first; the node itself is re-encoded and stored
    /// only when fresh, mutated, or holding a changed child key, so flushing
    /// a clean tree writes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cycle`] if the node is reachable through its own
    /// subtree; neither the node nor its ancestors are written in that case.
    pub fn flush(&self) -> crate::Result<Key> {
        let mut stack = Vec::new();
        self.flush_with(&mut stack)
    }

    // The stack carries each ancestor's identity so that reporting a cycle
    // never has to lock a node an ancestor call is already holding.
    fn flush_with(&self, stack: &mut Vec<(usize, String)>) -> crate::Result<Key> {
        let me = Arc::as_ptr(&self.inner) as usize;

        if let Some((_, identity)) = stack.iter().find(|(ptr, _)| *ptr == me) {
            return Err(Error::Cycle(identity.clone()));
        }

        stack.push((me, self.read().identity()));
        let result = self.flush_children_and_self(stack);
        stack.pop();

        result
    }

    fn flush_children_and_self(&self, stack: &mut Vec<(usize, String)>) -> crate::Result<Key> {
        let mut state = self.write();
        let mut dirty = state.key.is_none();

        for index in 0..state.children.len() {
            self.cancel.check()?;

            let Some(child) = state.children.get(index).and_then(|c| c.node.clone()) else {
                continue;
            };

            let child_key = child.flush_with(stack)?;

            if let Some(entry) = state.children.get_mut(index) {
                if entry.key != child_key {
                    log::trace!("child {} moved to {child_key}", entry.name);
                    entry.key = child_key;
                    dirty = true;
                }
            }
        }

        if !dirty {
            if let Some(key) = &state.key {
                return Ok(key.clone());
            }
        }

        let mut blob = Vec::new();
        encode_state(&state, &mut blob)?;

        let key = self.store.put_cas(&blob)?;
        log::debug!("flushed node {} -> {key}", state.identity());

        state.key = Some(key.clone());

        Ok(key)
    }

    /// Recursively visits every storage key reachable from this node.
    ///
    /// The subtree is flushed first. `visit` receives each key with a flag
    /// that is `true` for file nodes and `false` for data blocks; returning
    /// `false` for a file node skips its subtree. A key referenced multiple
    /// times is visited once per reference.
    ///
    /// # Errors
    ///
    /// Returns flush, fetch and cancellation errors.
    pub fn scan<F: FnMut(&Key, bool) -> bool>(&self, mut visit: F) -> crate::Result<()> {
        self.scan_inner(&mut visit)
    }

    fn scan_inner(&self, visit: &mut dyn FnMut(&Key, bool) -> bool) -> crate::Result<()> {
        let key = self.flush()?;

        if !visit(&key, true) {
            return Ok(());
        }

        let (blocks, children, split) = {
            let state = self.read();

            let blocks: Vec<Key> = state.data.blocks().map(|b| b.key.clone()).collect();
            let children: Vec<(String, Key, Option<Self>)> = state
                .children
                .iter()
                .map(|c| (c.name.clone(), c.key.clone(), c.node.clone()))
                .collect();

            (blocks, children, state.split.clone())
        };

        for block_key in &blocks {
            self.cancel.check()?;
            visit(block_key, false);
        }

        for (name, child_key, cached) in children {
            self.cancel.check()?;

            let child = match cached {
                Some(node) => node,
                None => Self::open_internal(
                    self.store.clone(),
                    &child_key,
                    split.clone(),
                    self.cancel.clone(),
                    name,
                )?,
            };

            child.scan_inner(visit)?;
        }

        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.inner.read().expect("lock is poisoned")
    }

    #[allow(clippy::expect_used)]
    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.inner.write().expect("lock is poisoned")
    }
}

const TAG_INDEX: u8 = 1;
const TAG_STAT: u8 = 2;
const TAG_XATTRS: u8 = 3;
const TAG_CHILDREN: u8 = 4;

fn encode_state<W: Write>(state: &State, writer: &mut W) -> Result<(), EncodeError> {
    wire::write_envelope(writer, Variant::Node)?;

    if !state.data.is_empty() {
        wire::write_tag(writer, TAG_INDEX)?;
        state.data.encode_into(writer)?;
    }

    if state.persist_stat {
        wire::write_tag(writer, TAG_STAT)?;
        state.stat.encode_into(writer)?;
    }

    if !state.xattrs.is_empty() {
        wire::write_tag(writer, TAG_XATTRS)?;
        wire::write_u64(writer, state.xattrs.len() as u64)?;

        // BTreeMap iterates in name order, keeping the encoding canonical
        for (name, value) in &state.xattrs {
            wire::write_str(writer, name)?;
            wire::write_bytes(writer, value)?;
        }
    }

    if !state.children.is_empty() {
        wire::write_tag(writer, TAG_CHILDREN)?;
        wire::write_u64(writer, state.children.len() as u64)?;

        for child in &state.children {
            wire::write_str(writer, &child.name)?;
            wire::write_bytes(writer, child.key.as_bytes())?;
        }
    }

    wire::write_end(writer)?;

    Ok(())
}

struct DecodedState {
    data: FileData,
    stat: Option<Stat>,
    xattrs: BTreeMap<String, Slice>,
    children: Vec<Child>,
}

fn decode_state<R: Read>(reader: &mut R) -> Result<DecodedState, DecodeError> {
    let mut parts = DecodedState {
        data: FileData::new(),
        stat: None,
        xattrs: BTreeMap::new(),
        children: Vec::new(),
    };

    loop {
        match wire::read_tag(reader)? {
            wire::END => break,

            TAG_INDEX => parts.data = FileData::decode_from(reader)?,

            TAG_STAT => parts.stat = Some(Stat::decode_from(reader)?),

            TAG_XATTRS => {
                let count = wire::read_len(reader)?;

                for _ in 0..count {
                    let name = wire::read_str(reader)?;
                    let value = Slice::from(wire::read_bytes(reader)?);
                    parts.xattrs.insert(name, value);
                }
            }

            TAG_CHILDREN => {
                let count = wire::read_len(reader)?;
                let mut children = Vec::with_capacity(count.min(1_024));

                for _ in 0..count {
                    children.push(Child {
                        name: wire::read_str(reader)?,
                        key: Key::from(wire::read_bytes(reader)?),
                        node: None,
                    });
                }

                children.sort_by(|a, b| a.name.cmp(&b.name));
                parts.children = children;
            }

            tag => return Err(DecodeError::InvalidTag(("Node", tag))),
        }
    }

    Ok(parts)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::{FileNode, FileOptions, FileType};
    use crate::{Error, MemoryStore, StoreRef};
    use std::sync::Arc;
    use test_log::test;

    fn memory_node() -> (StoreRef, FileNode) {
        let store: StoreRef = Arc::new(MemoryStore::new());
        let node = FileNode::new(store.clone(), FileOptions::default());
        (store, node)
    }

    #[test]
    fn node_children_stay_sorted() {
        let (store, node) = memory_node();

        for name in ["all.txt", "your.go", "base.exe"] {
            let child = FileNode::new(store.clone(), FileOptions::default());
            node.set_child(name, &child);
        }

        assert_eq!(
            vec!["all.txt", "base.exe", "your.go"],
            node.child_names()
        );
        assert!(node.has_child("your.go"));
        assert!(!node.has_child("missing"));
    }

    #[test]
    fn node_remove_child() {
        let (store, node) = memory_node();
        let child = FileNode::new(store, FileOptions::default());

        node.set_child("a", &child);
        assert!(node.remove_child("a"));
        assert!(!node.remove_child("a"));
        assert!(node.child_names().is_empty());
    }

    #[test]
    fn node_xattrs_are_a_map() {
        let (_, node) = memory_node();

        node.set_xattr("zeta", "z");
        node.set_xattr("alpha", "a");
        node.set_xattr("alpha", "a2");

        assert_eq!(vec!["alpha", "zeta"], node.xattr_names());
        assert_eq!(Some("a2".into()), node.xattr("alpha"));
        assert!(node.has_xattr("zeta"));
        assert!(node.remove_xattr("zeta"));
        assert!(!node.remove_xattr("zeta"));

        node.clear_xattrs();
        assert!(node.xattr_names().is_empty());
    }

    #[test]
    fn node_mutation_invalidates_key() -> crate::Result<()> {
        let (_, node) = memory_node();

        assert_eq!(None, node.storage_key());

        let key = node.flush()?;
        assert_eq!(Some(key), node.storage_key());

        node.write_at(b"dirty", 0)?;
        assert_eq!(None, node.storage_key());

        node.flush()?;
        node.set_xattr("user.tag", "v");
        assert_eq!(None, node.storage_key());

        Ok(())
    }

    #[test]
    fn node_flush_is_stable() -> crate::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let node = FileNode::new(store.clone(), FileOptions::default());

        node.write_at(b"stable contents", 0)?;

        let first = node.flush()?;
        let writes = store.put_count();

        let second = node.flush()?;
        assert_eq!(first, second);
        assert_eq!(writes, store.put_count());

        Ok(())
    }

    #[test]
    fn node_flush_detects_cycles() -> crate::Result<()> {
        let (store, a) = memory_node();
        let b = FileNode::new(
            store,
            FileOptions {
                name: Some("b".into()),
                ..FileOptions::default()
            },
        );

        a.set_child("x", &b);
        b.set_child("y", &a);

        assert!(matches!(a.flush(), Err(Error::Cycle(_))));
        assert_eq!(None, a.storage_key());
        assert_eq!(None, b.storage_key());

        Ok(())
    }

    #[test]
    fn node_open_child_caches_handle() -> crate::Result<()> {
        let (store, parent) = memory_node();

        let child = FileNode::new(store.clone(), FileOptions::default());
        child.write_at(b"child data", 0)?;
        parent.set_child("kid", &child);
        parent.flush()?;

        // reopen from storage; the child is fetched lazily
        let reopened = FileNode::open(store, &parent.flush()?)?;
        let kid = reopened.open_child("kid")?;

        assert_eq!("kid", kid.name());
        assert_eq!(10, kid.size());

        // second open returns the cached handle
        let again = reopened.open_child("kid")?;
        again.write_at(b"x", 0)?;
        assert_eq!(None, kid.storage_key());

        assert!(matches!(
            reopened.open_child("nope"),
            Err(Error::ChildNotFound(_))
        ));

        Ok(())
    }

    #[test]
    fn node_release_keeps_dirty_children() -> crate::Result<()> {
        let (store, parent) = memory_node();

        let clean = FileNode::new(store.clone(), FileOptions::default());
        let dirty = FileNode::new(store, FileOptions::default());

        parent.set_child("clean", &clean);
        parent.set_child("dirty", &dirty);
        parent.flush()?;

        dirty.write_at(b"pending", 0)?;

        parent.release_children();

        // the clean child was dropped from the cache, the dirty one kept
        let kid = parent.open_child("dirty")?;
        assert_eq!(7, kid.size());
        assert_eq!(None, kid.storage_key());

        Ok(())
    }

    #[test]
    fn node_stat_persistence_flag() -> crate::Result<()> {
        let (store, node) = memory_node();

        // no stat configured: nothing persisted
        node.write_at(b"data", 0)?;
        let key = node.flush()?;
        let reopened = FileNode::open(store.clone(), &key)?;
        assert_eq!(FileType::Unknown, reopened.stat().file_type);

        node.set_stat(|stat| {
            stat.file_type = FileType::Regular;
            stat.permissions = 0o644;
        });

        let key = node.flush()?;
        let reopened = FileNode::open(store, &key)?;
        assert_eq!(FileType::Regular, reopened.stat().file_type);
        assert_eq!(0o644, reopened.stat().permissions);

        Ok(())
    }

    #[test]
    fn node_scan_visits_every_reference() -> crate::Result<()> {
        let (store, root) = memory_node();

        root.write_at(b"root data", 0)?;

        let child = FileNode::new(store, FileOptions::default());
        child.write_at(b"child data", 0)?;
        root.set_child("kid", &child);

        let mut nodes = 0;
        let mut blocks = 0;

        root.scan(|_, is_node| {
            if is_node {
                nodes += 1;
            } else {
                blocks += 1;
            }
            true
        })?;

        assert_eq!(2, nodes);
        assert_eq!(2, blocks);

        // pruning the root visits nothing else
        let mut visits = 0;
        root.scan(|_, _| {
            visits += 1;
            false
        })?;
        assert_eq!(1, visits);

        Ok(())
    }
}
