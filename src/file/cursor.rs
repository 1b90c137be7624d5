// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::FileNode;
use std::io::{Read, Seek, SeekFrom, Write};

/// Positioned `std::io` adapter over a [`FileNode`]
///
/// Tracks a byte position and delegates to [`FileNode::read_at`] and
/// [`FileNode::write_at`]. Writes land in the node's in-memory index
/// immediately; committing them to a storage key still requires
/// [`FileNode::flush`].
pub struct Cursor {
    node: FileNode,
    pos: u64,
}

impl Cursor {
    pub(crate) fn new(node: FileNode) -> Self {
        Self { node, pos: 0 }
    }

    /// Returns the current byte position.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Returns the underlying node.
    #[must_use]
    pub fn node(&self) -> &FileNode {
        &self.node
    }
}

impl Read for Cursor {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.node.read_at(buf, self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Write for Cursor {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.node.write_at(buf, self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        // buffered state lives in the node; nothing to do here
        Ok(())
    }
}

impl Seek for Cursor {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.node.size().checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };

        match target {
            Some(offset) => {
                self.pos = offset;
                Ok(offset)
            }
            None => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "seek before start of file",
            )),
        }
    }
}
