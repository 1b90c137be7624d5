// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Root pointer records
//!
//! A root is a small mutable record stored under a caller-chosen pointer key
//! (by convention `root:<name>`), providing a stable entry point into a tree
//! whose interior blobs are all content-addressed.

use crate::{
    coding::{DecodeError, EncodeError},
    store::{BlobStore, StoreRef},
    wire::{self, Variant},
    Error, FileNode, Key, Slice,
};
use std::io::{Read, Write};

/// Conventional prefix of root pointer keys
pub const POINTER_PREFIX: &str = "root:";

/// Builds the conventional pointer key for a root name.
#[must_use]
pub fn pointer_key(name: &str) -> Key {
    Key::from(format!("{POINTER_PREFIX}{name}").into_bytes())
}

/// Construction options for a [`Root`]
#[derive(Default)]
pub struct RootOptions {
    /// Storage key of the tree's root file node
    pub file_key: Option<Key>,

    /// Human-readable description
    pub description: String,

    /// Key of an owner metadata blob
    pub owner_key: Option<Key>,

    /// Key of a blob-reachability index
    pub index_key: Option<Key>,
}

/// Top-level pointer record locating a file tree
pub struct Root {
    store: StoreRef,
    file_key: Option<Key>,
    description: String,
    owner_key: Option<Key>,
    index_key: Option<Key>,
}

impl std::fmt::Debug for Root {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Root")
            .field("file_key", &self.file_key)
            .field("description", &self.description)
            .field("owner_key", &self.owner_key)
            .field("index_key", &self.index_key)
            .finish()
    }
}

fn non_empty(key: Option<Key>) -> Option<Key> {
    key.filter(|k| !k.is_empty())
}

impl Root {
    /// Constructs a root record in memory.
    #[must_use]
    pub fn new(store: StoreRef, opts: RootOptions) -> Self {
        Self {
            store,
            file_key: non_empty(opts.file_key),
            description: opts.description,
            owner_key: non_empty(opts.owner_key),
            index_key: non_empty(opts.index_key),
        }
    }

    /// Fetches and decodes the root record stored under `pointer_key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyNotFound`] for an unknown pointer and a decode
    /// error if the blob is not a root record.
    pub fn open(store: StoreRef, pointer_key: &Key) -> crate::Result<Self> {
        let blob = store.get(pointer_key)?;
        let mut reader = &*blob;

        wire::expect_envelope(&mut reader, Variant::Root)?;
        let mut root = decode_root(&mut reader, store)?;
        root.file_key = non_empty(root.file_key);

        log::debug!("opened root {pointer_key:?}");

        Ok(root)
    }

    /// Opens the file tree this root points to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoFileKey`] if no file key is set.
    pub fn file(&self) -> crate::Result<FileNode> {
        match &self.file_key {
            Some(key) => FileNode::open(self.store.clone(), key),
            None => Err(Error::NoFileKey),
        }
    }

    /// Serializes the record and stores it under `pointer_key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoFileKey`] if no file key is set, and
    /// [`Error::KeyExists`] if the pointer is taken and `replace` is `false`.
    pub fn save(&self, pointer_key: &Key, replace: bool) -> crate::Result<()> {
        if self.file_key.is_none() {
            return Err(Error::NoFileKey);
        }

        let mut blob = Vec::new();
        encode_root(self, &mut blob)?;

        self.store.put(pointer_key, &blob, replace)?;
        log::debug!("saved root {pointer_key:?}");

        Ok(())
    }

    /// Returns the storage key of the tree's root file node.
    #[must_use]
    pub fn file_key(&self) -> Option<&Key> {
        self.file_key.as_ref()
    }

    /// Points the root at a new file node key.
    pub fn set_file_key(&mut self, key: Key) {
        self.file_key = non_empty(Some(key));
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Sets the description.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Returns the owner metadata key.
    #[must_use]
    pub fn owner_key(&self) -> Option<&Key> {
        self.owner_key.as_ref()
    }

    /// Sets or clears the owner metadata key.
    pub fn set_owner_key(&mut self, key: Option<Key>) {
        self.owner_key = non_empty(key);
    }

    /// Returns the reachability index key.
    #[must_use]
    pub fn index_key(&self) -> Option<&Key> {
        self.index_key.as_ref()
    }

    /// Stores an opaque reachability index payload and records its key.
    ///
    /// Index construction is the caller's concern; the payload is wrapped in
    /// the Index object envelope and content-addressed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn save_index(&mut self, payload: &[u8]) -> crate::Result<Key> {
        let mut blob = Vec::new();
        wire::write_envelope(&mut blob, Variant::Index)?;
        wire::write_bytes(&mut blob, payload)?;

        let key = self.store.put_cas(&blob)?;
        self.index_key = Some(key.clone());

        Ok(key)
    }

    /// Loads the reachability index payload, if one is recorded.
    ///
    /// # Errors
    ///
    /// Returns fetch and decode errors.
    pub fn load_index(&self) -> crate::Result<Option<Slice>> {
        let Some(key) = &self.index_key else {
            return Ok(None);
        };

        let blob = self.store.get(key)?;
        let mut reader = &*blob;

        wire::expect_envelope(&mut reader, Variant::Index)?;
        let payload = wire::read_bytes(&mut reader)?;

        Ok(Some(payload.into()))
    }
}

/// Enumerates the names of all `root:`-prefixed pointers, in order.
///
/// The visitor returns `false` to stop early. Pointer keys that are not
/// valid UTF-8 are skipped.
///
/// # Errors
///
/// Returns an error if the store cannot be listed.
pub fn list_roots(store: &StoreRef, visit: &mut dyn FnMut(&str) -> bool) -> crate::Result<()> {
    let prefix = POINTER_PREFIX.as_bytes();

    store.list(&Key::from(POINTER_PREFIX), &mut |key| {
        let Some(name) = key
            .as_bytes()
            .strip_prefix(prefix)
            .and_then(|name| std::str::from_utf8(name).ok())
        else {
            // past the prefix range; nothing left to see
            return key.as_bytes().starts_with(prefix);
        };

        visit(name)
    })
}

const TAG_FILE_KEY: u8 = 1;
const TAG_DESCRIPTION: u8 = 2;
const TAG_INDEX_KEY: u8 = 4;
const TAG_OWNER_KEY: u8 = 6;

fn encode_root<W: Write>(root: &Root, writer: &mut W) -> Result<(), EncodeError> {
    wire::write_envelope(writer, Variant::Root)?;

    if let Some(key) = &root.file_key {
        wire::write_tag(writer, TAG_FILE_KEY)?;
        wire::write_bytes(writer, key.as_bytes())?;
    }

    if !root.description.is_empty() {
        wire::write_tag(writer, TAG_DESCRIPTION)?;
        wire::write_str(writer, &root.description)?;
    }

    if let Some(key) = &root.index_key {
        wire::write_tag(writer, TAG_INDEX_KEY)?;
        wire::write_bytes(writer, key.as_bytes())?;
    }

    if let Some(key) = &root.owner_key {
        wire::write_tag(writer, TAG_OWNER_KEY)?;
        wire::write_bytes(writer, key.as_bytes())?;
    }

    wire::write_end(writer)?;

    Ok(())
}

fn decode_root<R: Read>(reader: &mut R, store: StoreRef) -> Result<Root, DecodeError> {
    let mut root = Root {
        store,
        file_key: None,
        description: String::new(),
        owner_key: None,
        index_key: None,
    };

    loop {
        match wire::read_tag(reader)? {
            wire::END => break,

            TAG_FILE_KEY => root.file_key = Some(Key::from(wire::read_bytes(reader)?)),
            TAG_DESCRIPTION => root.description = wire::read_str(reader)?,
            TAG_INDEX_KEY => root.index_key = Some(Key::from(wire::read_bytes(reader)?)),
            TAG_OWNER_KEY => root.owner_key = Some(Key::from(wire::read_bytes(reader)?)),

            // tags 3 and 5 were retired by earlier format revisions
            tag => return Err(DecodeError::InvalidTag(("Root", tag))),
        }
    }

    Ok(root)
}
