// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Content-addressable file trees over a flat blob store.
//!
//! ##### NOTE
//!
//! > This crate only provides the tree core — nodes, chunking and root
//! > pointers over a pluggable blob store. It does not ship a garbage
//! > collector, mount adapter or network transport; unreferenced blobs
//! > stay in the store until an external pass reclaims them.
//!
//! ##### About
//!
//! File contents are split into variable-sized blocks by a rolling-hash
//! content-defined chunker and stored under their digests, so equal data —
//! within one file, across files, across whole trees — is stored once.
//! A [`FileNode`] records the block layout of its data alongside stat
//! metadata, extended attributes and named children, and is itself stored as
//! a blob under its content address. Mutations are buffered in memory;
//! [`FileNode::flush`] commits a subtree bottom-up and returns the new
//! address of its root.
//!
//! A [`Root`] is the only mutable pointer in the system: a small record
//! stored under a caller-chosen key (conventionally `root:<name>`) that
//! locates the current root node of a tree.
//!
//! # Example usage
//!
//! ```
//! use cas_tree::{path, FileNode, FileOptions, MemoryStore, Root, RootOptions};
//! use std::sync::Arc;
//!
//! # fn main() -> cas_tree::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//!
//! // build a small tree
//! let tree = FileNode::new(store.clone(), FileOptions::default());
//! let file = path::set(&tree, "/docs/hello.txt", path::SetOptions {
//!     create: true,
//!     ..Default::default()
//! })?;
//! file.write_at(b"hello world", 0)?;
//!
//! // commit it bottom-up and point a named root at it
//! let key = tree.flush()?;
//! let root = Root::new(store.clone(), RootOptions {
//!     file_key: Some(key),
//!     description: "example tree".into(),
//!     ..Default::default()
//! });
//! root.save(&cas_tree::root::pointer_key("example"), false)?;
//!
//! // reopen it later through the pointer
//! let root = Root::open(store, &cas_tree::root::pointer_key("example"))?;
//! let file = path::open(&root.file()?, "/docs/hello.txt")?;
//!
//! let mut buf = vec![0; file.size() as usize];
//! file.read_at(&mut buf, 0)?;
//! assert_eq!(b"hello world", &*buf);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]
#![allow(clippy::option_if_let_else)]

mod cancel;
mod coding;
mod error;
mod file;
mod key;

pub mod path;

mod rolling;

pub mod root;

mod slice;
mod split;
mod store;
mod wire;

pub use {
    cancel::CancelSignal,
    coding::{Decode, DecodeError, Encode, EncodeError},
    error::{Error, Result},
    file::{Cursor, FileNode, FileOptions, FileType, Ident, Stat, Timestamp},
    key::Key,
    rolling::{RabinKarp, RollingHash},
    root::{Root, RootOptions},
    slice::Slice,
    split::{SplitConfig, Splitter},
    store::{BlobStore, FsStore, MemoryStore, StoreRef},
};

pub use rolling::{DEFAULT_BASE, DEFAULT_MODULUS, DEFAULT_WINDOW};
pub use split::{DEFAULT_MAX_SIZE, DEFAULT_MIN_SIZE, DEFAULT_TARGET_SIZE};
