// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    coding::{DecodeError, EncodeError},
    Key,
};

/// Represents errors that can occur in the file tree
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// Serialization failed
    Encode(EncodeError),

    /// Deserialization failed (corrupt or malformed blob)
    Decode(DecodeError),

    /// The blob store has no blob under the given key
    KeyNotFound(Key),

    /// A blob already exists under the given key and replacing was not requested
    KeyExists(Key),

    /// A file node has no child with the given name
    ChildNotFound(String),

    /// Flush found a node that is reachable through its own subtree
    Cycle(String),

    /// The root record has no file key
    NoFileKey,

    /// Path traversal was given an unusable path
    InvalidPath(String),

    /// The operation observed a cancellation signal
    ///
    /// Work already committed to the store is not rolled back.
    Cancelled,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CasTreeError: {self:?}")
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<EncodeError> for Error {
    fn from(value: EncodeError) -> Self {
        Self::Encode(value)
    }
}

impl From<DecodeError> for Error {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

impl From<Error> for std::io::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::Io(e) => e,
            e => Self::other(e),
        }
    }
}

/// Tree result
pub type Result<T> = std::result::Result<T, Error>;
