// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Blob store contract consumed by the file tree
//!
//! The tree core treats the store as an external collaborator: a flat,
//! thread-safe key-value store of byte blobs. Two reference implementations
//! ship with the crate, an in-memory store for tests and small trees, and a
//! directory-backed store.

mod fs;
mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

use crate::{Key, Slice};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Shared handle to a blob store
pub type StoreRef = Arc<dyn BlobStore>;

/// Flat key-value store of byte blobs
///
/// Implementations must be safe for concurrent use from multiple threads.
/// Content-addressed puts derive the key by hashing the payload, so equal
/// byte sequences always map to the same key and store at most once.
pub trait BlobStore: Send + Sync {
    /// Stores `value` under a caller-chosen key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyExists`](crate::Error::KeyExists) if the key is
    /// taken and `replace` is `false`.
    fn put(&self, key: &Key, value: &[u8], replace: bool) -> crate::Result<()>;

    /// Stores `value` under its content hash and returns the key.
    ///
    /// Idempotent: storing the same bytes twice returns the same key and
    /// writes at most once.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn put_cas(&self, value: &[u8]) -> crate::Result<Key>;

    /// Returns the blob stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyNotFound`](crate::Error::KeyNotFound) for unknown keys.
    fn get(&self, key: &Key) -> crate::Result<Slice>;

    /// Returns the size in bytes of the blob stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyNotFound`](crate::Error::KeyNotFound) for unknown keys.
    fn size(&self, key: &Key) -> crate::Result<u64>;

    /// Removes the blob stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyNotFound`](crate::Error::KeyNotFound) for unknown keys.
    fn delete(&self, key: &Key) -> crate::Result<()>;

    /// Enumerates keys in ascending key order, starting at `start`.
    ///
    /// The visitor returns `false` to stop the enumeration early.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list(&self, start: &Key, visit: &mut dyn FnMut(&Key) -> bool) -> crate::Result<()>;

    /// Returns the number of stored blobs.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn len(&self) -> crate::Result<u64>;

    /// Returns `true` if the store holds no blobs.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn is_empty(&self) -> crate::Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// SHA-256 content address of a blob payload.
pub(crate) fn content_key(value: &[u8]) -> Key {
    let mut hasher = Sha256::new();
    hasher.update(value);
    Key::from(hasher.finalize().to_vec())
}
