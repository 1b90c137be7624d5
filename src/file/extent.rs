// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    cancel::CancelSignal,
    coding::DecodeError,
    store::{BlobStore, StoreRef},
    Error, Key,
};

/// Reference to one stored block of file data
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Block {
    /// Payload length in bytes
    pub bytes: u64,

    /// Content address of the payload
    pub key: Key,
}

/// A contiguous logical span of a file, backed by an ordered run of blocks
///
/// Extents are rebuilt, never patched: every constructor recomputes the
/// per-block start offset table, so binary searches over `starts` can never
/// observe a stale table.
#[derive(Clone, Debug)]
pub(crate) struct Extent {
    /// Starting offset of the span within the file
    pub base: u64,

    /// Total span length; always the sum of the block lengths
    pub bytes: u64,

    /// Blocks covering the span, in order
    pub blocks: Vec<Block>,

    /// File offset at which each block starts, parallel to `blocks`
    starts: Vec<u64>,
}

impl PartialEq for Extent {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base && self.blocks == other.blocks
    }
}

impl Eq for Extent {}

impl Extent {
    pub(crate) fn new(base: u64, blocks: Vec<Block>) -> Self {
        let mut starts = Vec::with_capacity(blocks.len());
        let mut offset = base;

        for block in &blocks {
            starts.push(offset);
            offset += block.bytes;
        }

        Self {
            base,
            bytes: offset - base,
            blocks,
            starts,
        }
    }

    /// One-past-the-end offset of the span.
    pub(crate) fn end(&self) -> u64 {
        self.base + self.bytes
    }

    /// Consumes two exactly abutting extents into one.
    pub(crate) fn merged_with(mut self, next: Self) -> Self {
        debug_assert_eq!(self.end(), next.base);

        self.blocks.extend(next.blocks);
        Self::new(self.base, self.blocks)
    }

    fn block_at(&self, index: usize) -> (u64, &Block) {
        #[allow(clippy::expect_used)]
        let start = *self.starts.get(index).expect("block index out of range");
        #[allow(clippy::expect_used)]
        let block = self.blocks.get(index).expect("block index out of range");
        (start, block)
    }

    fn fetch(store: &StoreRef, start: u64, block: &Block) -> crate::Result<crate::Slice> {
        let data = store.get(&block.key)?;

        if data.len() as u64 != block.bytes {
            log::error!(
                "block {} at offset {start} has {} stored bytes, expected {}",
                block.key,
                data.len(),
                block.bytes
            );
            return Err(Error::Decode(DecodeError::Malformed(
                "stored block length does not match index",
            )));
        }

        Ok(data)
    }

    /// Copies the overlap of this extent with `[req_start, req_end)` into
    /// `out`, where `out` covers the request range.
    pub(crate) fn read_into(
        &self,
        store: &StoreRef,
        cancel: &CancelSignal,
        out: &mut [u8],
        req_start: u64,
        req_end: u64,
    ) -> crate::Result<()> {
        let lo = req_start.max(self.base);
        let hi = req_end.min(self.end());

        if lo >= hi {
            return Ok(());
        }

        let mut index = self.starts.partition_point(|&start| start <= lo) - 1;
        let mut pos = lo;

        while pos < hi {
            cancel.check()?;

            let (start, block) = self.block_at(index);
            let data = Self::fetch(store, start, block)?;

            let from = (pos - start) as usize;
            let to = (hi - start).min(block.bytes) as usize;

            let dst = (pos - req_start) as usize;
            let len = to - from;

            if let (Some(dst), Some(src)) = (out.get_mut(dst..dst + len), data.get(from..to)) {
                dst.copy_from_slice(src);
            }

            pos += len as u64;
            index += 1;
        }

        Ok(())
    }

    /// Splits this extent around a write starting at `offset`, where
    /// `base < offset <= end`.
    ///
    /// Returns the blocks strictly before the boundary block, verbatim, and
    /// the boundary block's bytes up to `offset`, fetched from the store.
    /// When `offset` lands exactly on an interior block boundary, the
    /// boundary block is untouched and no fetch happens.
    pub(crate) fn split_left(
        &self,
        store: &StoreRef,
        offset: u64,
    ) -> crate::Result<(Vec<Block>, crate::Slice)> {
        let index = self.starts.partition_point(|&start| start <= offset) - 1;
        let (start, block) = self.block_at(index);

        let keep = self.blocks.get(..index).unwrap_or_default().to_vec();
        let lead_len = (offset - start) as usize;

        let lead = if lead_len == 0 {
            crate::Slice::empty()
        } else {
            Self::fetch(store, start, block)?.slice(..lead_len)
        };

        Ok((keep, lead))
    }

    /// Splits this extent around a write ending at `end`, where
    /// `base <= end < self.end()`.
    ///
    /// Returns the boundary block's bytes after `end`, fetched from the
    /// store, and the blocks strictly after it, verbatim. When `end` lands
    /// exactly on an interior block boundary, no fetch happens.
    pub(crate) fn split_right(
        &self,
        store: &StoreRef,
        end: u64,
    ) -> crate::Result<(crate::Slice, Vec<Block>)> {
        let index = self
            .starts
            .partition_point(|&start| start < end)
            .saturating_sub(1);
        let (start, block) = self.block_at(index);

        let keep = self.blocks.get(index + 1..).unwrap_or_default().to_vec();
        let from = (end - start) as usize;

        let trail = if from as u64 == block.bytes {
            crate::Slice::empty()
        } else {
            Self::fetch(store, start, block)?.slice(from..)
        };

        Ok((trail, keep))
    }

    /// Blocks strictly before the block containing `size`, plus the
    /// transected block's payload prefix up to `size`, fetched from the
    /// store.
    ///
    /// Used by truncate; `base < size < self.end()`.
    pub(crate) fn split_at(
        &self,
        store: &StoreRef,
        size: u64,
    ) -> crate::Result<(Vec<Block>, crate::Slice)> {
        let index = self.starts.partition_point(|&start| start <= size) - 1;
        let (start, block) = self.block_at(index);

        let keep = self.blocks.get(..index).unwrap_or_default().to_vec();
        let prefix_len = (size - start) as usize;

        let prefix = if prefix_len == 0 {
            crate::Slice::empty()
        } else {
            Self::fetch(store, start, block)?.slice(..prefix_len)
        };

        Ok((keep, prefix))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::{Block, Extent};
    use crate::{BlobStore, CancelSignal, MemoryStore, StoreRef};
    use std::sync::Arc;
    use test_log::test;

    fn store_with_blocks(parts: &[&[u8]]) -> (StoreRef, Vec<Block>) {
        let store: StoreRef = Arc::new(MemoryStore::new());
        let blocks = parts
            .iter()
            .map(|part| Block {
                bytes: part.len() as u64,
                key: store.put_cas(part).unwrap(),
            })
            .collect();
        (store, blocks)
    }

    #[test]
    fn extent_start_offsets() {
        let (_, blocks) = store_with_blocks(&[b"01234", b"56", b"789"]);
        let extent = Extent::new(100, blocks);

        assert_eq!(10, extent.bytes);
        assert_eq!(110, extent.end());
        assert_eq!(&[100, 105, 107], extent.starts.as_slice());
    }

    #[test]
    fn extent_read_overlap() -> crate::Result<()> {
        let (store, blocks) = store_with_blocks(&[b"01234", b"56", b"789"]);
        let extent = Extent::new(100, blocks);
        let cancel = CancelSignal::default();

        // read crossing all three blocks
        let mut out = vec![0; 8];
        extent.read_into(&store, &cancel, &mut out, 101, 109)?;
        assert_eq!(b"12345678", out.as_slice());

        // read hanging over both ends of the extent
        let mut out = vec![0; 14];
        extent.read_into(&store, &cancel, &mut out, 98, 112)?;
        assert_eq!(b"\0\00123456789\0\0", out.as_slice());

        Ok(())
    }

    #[test]
    fn extent_split_left_on_boundary_fetches_nothing() -> crate::Result<()> {
        let (store, blocks) = store_with_blocks(&[b"01234", b"56789"]);
        let extent = Extent::new(0, blocks.clone());

        let (keep, lead) = extent.split_left(&store, 5)?;
        assert_eq!(vec![blocks[0].clone()], keep);
        assert!(lead.is_empty());

        Ok(())
    }

    #[test]
    fn extent_split_left_mid_block() -> crate::Result<()> {
        let (store, blocks) = store_with_blocks(&[b"01234", b"56789"]);
        let extent = Extent::new(0, blocks.clone());

        let (keep, lead) = extent.split_left(&store, 7)?;
        assert_eq!(vec![blocks[0].clone()], keep);
        assert_eq!(b"56", &*lead);

        Ok(())
    }

    #[test]
    fn extent_split_left_at_end_pulls_last_block() -> crate::Result<()> {
        let (store, blocks) = store_with_blocks(&[b"01234", b"56789"]);
        let extent = Extent::new(0, blocks.clone());

        let (keep, lead) = extent.split_left(&store, 10)?;
        assert_eq!(vec![blocks[0].clone()], keep);
        assert_eq!(b"56789", &*lead);

        Ok(())
    }

    #[test]
    fn extent_split_right_cases() -> crate::Result<()> {
        let (store, blocks) = store_with_blocks(&[b"01234", b"56789"]);
        let extent = Extent::new(0, blocks.clone());

        // mid-block
        let (trail, keep) = extent.split_right(&store, 7)?;
        assert_eq!(b"789", &*trail);
        assert!(keep.is_empty());

        // on an interior boundary: preceding block keeps its bytes
        let (trail, keep) = extent.split_right(&store, 5)?;
        assert!(trail.is_empty());
        assert_eq!(vec![blocks[1].clone()], keep);

        // at the extent base: the whole first block is re-read
        let (trail, keep) = extent.split_right(&store, 0)?;
        assert_eq!(b"01234", &*trail);
        assert_eq!(vec![blocks[1].clone()], keep);

        Ok(())
    }

    #[test]
    fn extent_merge_abutting() {
        let (_, left) = store_with_blocks(&[b"aa"]);
        let (_, right) = store_with_blocks(&[b"bbb"]);

        let merged = Extent::new(0, left).merged_with(Extent::new(2, right));

        assert_eq!(0, merged.base);
        assert_eq!(5, merged.bytes);
        assert_eq!(2, merged.blocks.len());
        assert_eq!(&[0, 2], merged.starts.as_slice());
    }
}
