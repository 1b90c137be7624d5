// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::extent::{Block, Extent};
use crate::{
    cancel::CancelSignal,
    coding::{Decode, DecodeError, Encode, EncodeError},
    split::{SplitConfig, Splitter},
    store::{BlobStore, StoreRef},
    wire, Key,
};
use std::io::{Read, Write};

/// Extent index over a file's logical bytes
///
/// Maps the range `[0, total_bytes)` onto an ordered list of extents of
/// stored blocks. Regions not covered by any extent are holes that read as
/// zeros without being stored. Extents never overlap and never exactly abut;
/// abutting pairs are merged on the spot.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct FileData {
    total: u64,
    extents: Vec<Extent>,
}

impl FileData {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Logical file size, including any trailing hole.
    pub(crate) fn total_bytes(&self) -> u64 {
        self.total
    }

    pub(crate) fn extent_count(&self) -> usize {
        self.extents.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.total == 0 && self.extents.is_empty()
    }

    /// Every stored `(size, key)` occurrence, in file order.
    ///
    /// A block referenced from several places is yielded once per reference.
    pub(crate) fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.extents.iter().flat_map(|extent| extent.blocks.iter())
    }

    /// Reads into `dst` starting at `offset`.
    ///
    /// Returns the number of bytes produced; zero means end of file. Holes
    /// inside the read range come back as zero bytes.
    pub(crate) fn read_at(
        &self,
        store: &StoreRef,
        cancel: &CancelSignal,
        dst: &mut [u8],
        offset: u64,
    ) -> crate::Result<usize> {
        if dst.is_empty() || offset >= self.total {
            return Ok(0);
        }

        let end = (offset + dst.len() as u64).min(self.total);
        let len = (end - offset) as usize;

        let Some(out) = dst.get_mut(..len) else {
            return Ok(0);
        };
        out.fill(0);

        let first = self.extents.partition_point(|extent| extent.end() <= offset);

        for extent in self.extents.iter().skip(first) {
            if extent.base >= end {
                break;
            }

            cancel.check()?;
            extent.read_into(store, cancel, out, offset, end)?;
        }

        Ok(len)
    }

    /// Writes `src` at `offset`, re-chunking the touched region.
    ///
    /// Blocks not covered by the write keep their stored keys. The boundary
    /// blocks of the overlapped region — including blocks of an extent that
    /// exactly abuts the write — are re-read and re-chunked together with
    /// `src`, so adjacent writes converge to the same block layout a single
    /// write would have produced.
    pub(crate) fn write_at(
        &mut self,
        store: &StoreRef,
        cancel: &CancelSignal,
        config: &SplitConfig,
        src: &[u8],
        offset: u64,
    ) -> crate::Result<usize> {
        if src.is_empty() {
            return Ok(0);
        }

        let end = offset + src.len() as u64;

        // Extents touching [offset, end], boundary contact included
        let lo = self.extents.partition_point(|extent| extent.end() < offset);
        let hi = self.extents.partition_point(|extent| extent.base <= end);

        let mut new_base = offset;
        let mut new_end = end;
        let mut left = Vec::new();
        let mut right = Vec::new();
        let mut lead = crate::Slice::empty();
        let mut trail = crate::Slice::empty();

        if lo < hi {
            #[allow(clippy::expect_used)]
            let first = self.extents.get(lo).expect("span is non-empty");
            #[allow(clippy::expect_used)]
            let last = self.extents.get(hi - 1).expect("span is non-empty");

            new_base = first.base.min(offset);
            new_end = last.end().max(end);

            if first.base < offset {
                (left, lead) = first.split_left(store, offset)?;
            }
            if last.end() > end {
                (trail, right) = last.split_right(store, end)?;
            }
        }

        log::trace!(
            "write of {} bytes at {offset} re-chunks {} bytes in [{new_base}, {new_end})",
            src.len(),
            lead.len() + src.len() + trail.len(),
        );

        let reader = (&*lead).chain(src).chain(&*trail);
        let mut body = left;
        Self::store_blocks(store, cancel, config, reader, &mut body)?;
        body.extend(right);

        let merged = Extent::new(new_base, body);
        debug_assert_eq!(new_end, merged.end());

        self.extents.splice(lo..hi, std::iter::once(merged));
        self.coalesce_around(lo);
        self.total = self.total.max(end);

        Ok(src.len())
    }

    /// Shrinks or grows the file to `size` bytes.
    ///
    /// Growing only extends the trailing hole. Shrinking drops extents past
    /// the cut and re-chunks the transected block's prefix; a cut exactly on
    /// a block boundary touches no block payloads.
    pub(crate) fn truncate(
        &mut self,
        store: &StoreRef,
        cancel: &CancelSignal,
        config: &SplitConfig,
        size: u64,
    ) -> crate::Result<()> {
        if size >= self.total {
            self.total = size;
            return Ok(());
        }

        let keep = self.extents.partition_point(|extent| extent.base < size);
        self.extents.truncate(keep);

        if self.extents.last().is_some_and(|extent| extent.end() > size) {
            if let Some(extent) = self.extents.pop() {
                let (mut blocks, prefix) = extent.split_at(store, size)?;
                Self::store_blocks(store, cancel, config, &*prefix, &mut blocks)?;

                if !blocks.is_empty() {
                    self.extents.push(Extent::new(extent.base, blocks));
                }
            }
        }

        self.total = size;

        Ok(())
    }

    /// Chunks `reader` through the splitter, storing each block via
    /// `put_cas` and appending its reference to `blocks`.
    fn store_blocks<R: Read>(
        store: &StoreRef,
        cancel: &CancelSignal,
        config: &SplitConfig,
        reader: R,
        blocks: &mut Vec<Block>,
    ) -> crate::Result<()> {
        let mut splitter = Splitter::new(reader, config);

        while let Some(data) = splitter.next_block()? {
            cancel.check()?;

            let key = store.put_cas(data)?;
            blocks.push(Block {
                bytes: data.len() as u64,
                key,
            });
        }

        Ok(())
    }

    fn coalesce_around(&mut self, index: usize) {
        self.merge_if_abutting(index);

        if index > 0 {
            self.merge_if_abutting(index - 1);
        }
    }

    /// Merges the extent at `index` with its successor if they exactly abut.
    fn merge_if_abutting(&mut self, index: usize) {
        let abutting = self
            .extents
            .get(index)
            .zip(self.extents.get(index + 1))
            .is_some_and(|(a, b)| a.end() == b.base);

        if abutting {
            let b = self.extents.remove(index + 1);
            if let Some(a) = self.extents.get_mut(index) {
                *a = a.clone().merged_with(b);
            }
        }
    }

    /// Sorts, drops empties and merges exactly abutting extents.
    ///
    /// Applied after decoding; in-memory mutation keeps the invariants
    /// incrementally.
    fn normalize(&mut self) {
        self.extents.retain(|extent| extent.bytes > 0);
        self.extents.sort_by_key(|extent| extent.base);

        let mut normalized: Vec<Extent> = Vec::with_capacity(self.extents.len());

        for extent in self.extents.drain(..) {
            match normalized.pop() {
                Some(prev) if prev.end() == extent.base => {
                    normalized.push(prev.merged_with(extent));
                }
                Some(prev) => {
                    normalized.push(prev);
                    normalized.push(extent);
                }
                None => normalized.push(extent),
            }
        }

        self.extents = normalized;
    }
}

const TAG_TOTAL: u8 = 1;
const TAG_EXTENTS: u8 = 2;
const TAG_SINGLE: u8 = 3;

impl Encode for FileData {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        wire::write_tag(writer, TAG_TOTAL)?;
        wire::write_u64(writer, self.total)?;

        // Single-block shortcut: one extent, one block, no holes
        let single = match self.extents.as_slice() {
            [extent] if extent.base == 0 && extent.bytes == self.total => match extent
                .blocks
                .as_slice()
            {
                [block] => Some(&block.key),
                _ => None,
            },
            _ => None,
        };

        if let Some(key) = single {
            wire::write_tag(writer, TAG_SINGLE)?;
            wire::write_bytes(writer, key.as_bytes())?;
        } else if !self.extents.is_empty() {
            wire::write_tag(writer, TAG_EXTENTS)?;
            wire::write_u64(writer, self.extents.len() as u64)?;

            for extent in &self.extents {
                wire::write_u64(writer, extent.base)?;
                wire::write_u64(writer, extent.bytes)?;
                wire::write_u64(writer, extent.blocks.len() as u64)?;

                for block in &extent.blocks {
                    wire::write_u64(writer, block.bytes)?;
                    wire::write_bytes(writer, block.key.as_bytes())?;
                }
            }
        }

        wire::write_end(writer)?;

        Ok(())
    }
}

impl Decode for FileData {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let mut total = 0;
        let mut extents: Option<Vec<Extent>> = None;
        let mut single: Option<Key> = None;

        loop {
            match wire::read_tag(reader)? {
                wire::END => break,

                TAG_TOTAL => total = wire::read_u64(reader)?,

                TAG_EXTENTS => {
                    let count = wire::read_len(reader)?;
                    let mut list = Vec::with_capacity(count.min(1_024));

                    for _ in 0..count {
                        let base = wire::read_u64(reader)?;
                        let bytes = wire::read_u64(reader)?;
                        let block_count = wire::read_len(reader)?;
                        let mut blocks = Vec::with_capacity(block_count.min(1_024));

                        for _ in 0..block_count {
                            let block_bytes = wire::read_u64(reader)?;
                            let key = Key::from(wire::read_bytes(reader)?);

                            // Zero-length blocks should not occur; drop them
                            if block_bytes > 0 {
                                blocks.push(Block {
                                    bytes: block_bytes,
                                    key,
                                });
                            }
                        }

                        let extent = Extent::new(base, blocks);

                        if extent.bytes != bytes {
                            return Err(DecodeError::Malformed(
                                "extent length does not match its blocks",
                            ));
                        }

                        list.push(extent);
                    }

                    extents = Some(list);
                }

                TAG_SINGLE => single = Some(Key::from(wire::read_bytes(reader)?)),

                tag => return Err(DecodeError::InvalidTag(("Index", tag))),
            }
        }

        if extents.is_some() && single.is_some() {
            return Err(DecodeError::Malformed(
                "index has both single block and extent list",
            ));
        }

        let mut data = Self {
            total,
            extents: match single {
                Some(key) if total > 0 => vec![Extent::new(
                    0,
                    vec![Block {
                        bytes: total,
                        key,
                    }],
                )],
                _ => extents.unwrap_or_default(),
            },
        };

        data.normalize();

        Ok(data)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::FileData;
    use crate::coding::{Decode, DecodeError, Encode};
    use crate::{BlobStore, CancelSignal, Error, MemoryStore, SplitConfig, StoreRef};
    use std::sync::Arc;
    use test_log::test;

    fn setup() -> (StoreRef, CancelSignal, SplitConfig) {
        let store: StoreRef = Arc::new(MemoryStore::new());
        (store, CancelSignal::default(), SplitConfig::default())
    }

    fn read_all(data: &FileData, store: &StoreRef) -> Vec<u8> {
        let mut buf = vec![0; data.total_bytes() as usize];
        let n = data
            .read_at(store, &CancelSignal::default(), &mut buf, 0)
            .unwrap();
        assert_eq!(buf.len(), n);
        buf
    }

    #[test]
    fn data_interleaved_writes_leave_holes() -> crate::Result<()> {
        let (store, cancel, config) = setup();
        let mut data = FileData::new();

        data.write_at(&store, &cancel, &config, b"foobar", 0)?;
        data.write_at(&store, &cancel, &config, b"foobar", 10)?;
        data.write_at(&store, &cancel, &config, b"aliquot", 20)?;

        assert_eq!(3, data.extent_count());
        assert_eq!(27, data.total_bytes());

        let mut buf = vec![0; 27];
        assert_eq!(27, data.read_at(&store, &cancel, &mut buf, 0)?);
        assert_eq!(b"foobar\0\0\0\0foobar\0\0\0\0aliquot", buf.as_slice());

        // overwrite across the first hole
        data.write_at(&store, &cancel, &config, b"barbarossa", 3)?;
        assert_eq!(b"foobarbarossabar\0\0\0\0aliquot", read_all(&data, &store).as_slice());
        assert_eq!(2, data.extent_count());

        data.truncate(&store, &cancel, &config, 6)?;
        assert_eq!(6, data.total_bytes());
        assert_eq!(1, data.extent_count());
        assert_eq!(b"foobar", read_all(&data, &store).as_slice());

        Ok(())
    }

    #[test]
    fn data_adjacent_writes_merge_into_one_block() -> crate::Result<()> {
        let (store, cancel, _) = setup();
        let config = SplitConfig::default().with_min_size(1_024);
        let mut data = FileData::new();

        data.write_at(&store, &cancel, &config, b"fookinghell", 0)?;
        data.write_at(&store, &cancel, &config, b"mate", 11)?;

        assert_eq!(1, data.extent_count());
        assert_eq!(1, data.blocks().count());

        let expected = store.put_cas(b"fookinghellmate")?;
        assert_eq!(&expected, &data.blocks().next().unwrap().key);

        Ok(())
    }

    #[test]
    fn data_overwriting_whole_block_is_stable() -> crate::Result<()> {
        let (store, cancel, _) = setup();
        let config = SplitConfig::default().with_min_size(4).with_max_size(8);
        let mut data = FileData::new();

        data.write_at(&store, &cancel, &config, &[7u8; 32], 0)?;
        let before: Vec<_> = data.blocks().cloned().collect();

        // rewrite the exact range of the second block with the same bytes
        let start = before[0].bytes;
        let len = before[1].bytes as usize;
        data.write_at(&store, &cancel, &config, &vec![7u8; len], start)?;

        let after: Vec<_> = data.blocks().cloned().collect();
        assert_eq!(before[0], after[0]);

        Ok(())
    }

    #[test]
    fn data_read_past_end_is_eof() -> crate::Result<()> {
        let (store, cancel, config) = setup();
        let mut data = FileData::new();

        data.write_at(&store, &cancel, &config, b"abc", 0)?;

        let mut buf = [0u8; 8];
        assert_eq!(0, data.read_at(&store, &cancel, &mut buf, 3)?);
        assert_eq!(0, data.read_at(&store, &cancel, &mut buf, 99)?);

        Ok(())
    }

    #[test]
    fn data_truncate_laws() -> crate::Result<()> {
        let (store, cancel, config) = setup();
        let mut data = FileData::new();

        data.write_at(&store, &cancel, &config, b"0123456789", 0)?;

        data.truncate(&store, &cancel, &config, 4)?;
        assert_eq!(4, data.total_bytes());
        assert_eq!(b"0123", read_all(&data, &store).as_slice());

        // extending introduces a zero hole
        data.truncate(&store, &cancel, &config, 8)?;
        assert_eq!(8, data.total_bytes());
        assert_eq!(b"0123\0\0\0\0", read_all(&data, &store).as_slice());

        data.truncate(&store, &cancel, &config, 0)?;
        assert_eq!(0, data.total_bytes());
        assert_eq!(0, data.extent_count());

        Ok(())
    }

    #[test]
    fn data_truncate_inside_hole_drops_later_extents() -> crate::Result<()> {
        let (store, cancel, config) = setup();
        let mut data = FileData::new();

        data.write_at(&store, &cancel, &config, b"head", 0)?;
        data.write_at(&store, &cancel, &config, b"tail", 100)?;

        data.truncate(&store, &cancel, &config, 50)?;
        assert_eq!(50, data.total_bytes());
        assert_eq!(1, data.extent_count());
        assert_eq!(b"head", &read_all(&data, &store)[..4]);

        Ok(())
    }

    #[test]
    fn data_wire_roundtrip_multi_extent() -> crate::Result<()> {
        let (store, cancel, config) = setup();
        let mut data = FileData::new();

        data.write_at(&store, &cancel, &config, b"lorem ipsum", 0)?;
        data.write_at(&store, &cancel, &config, b"dolor sit amet", 1_000)?;

        let bytes = data.encode_into_vec();
        let decoded = FileData::decode_from(&mut &bytes[..])?;

        assert_eq!(data, decoded);

        Ok(())
    }

    #[test]
    fn data_single_block_shortcut() -> crate::Result<()> {
        let (store, cancel, config) = setup();
        let mut data = FileData::new();

        data.write_at(&store, &cancel, &config, b"just one block", 0)?;
        assert_eq!(1, data.blocks().count());

        let bytes = data.encode_into_vec();

        // total, then the single key; no extent list on the wire
        assert_eq!(super::TAG_TOTAL, bytes[0]);
        assert_eq!(super::TAG_SINGLE, bytes[2]);

        let decoded = FileData::decode_from(&mut &bytes[..])?;
        assert_eq!(data, decoded);
        assert_eq!(b"just one block", read_all(&decoded, &store).as_slice());

        Ok(())
    }

    #[test]
    fn data_rejects_single_and_extents() {
        let mut bytes = vec![];
        wire_test_encode(&mut bytes);

        let result = FileData::decode_from(&mut &bytes[..]);
        assert!(matches!(
            result,
            Err(DecodeError::Malformed(_))
        ));
    }

    fn wire_test_encode(out: &mut Vec<u8>) {
        use crate::wire;

        wire::write_tag(out, super::TAG_TOTAL).unwrap();
        wire::write_u64(out, 4).unwrap();
        wire::write_tag(out, super::TAG_SINGLE).unwrap();
        wire::write_bytes(out, b"k1").unwrap();
        wire::write_tag(out, super::TAG_EXTENTS).unwrap();
        wire::write_u64(out, 0).unwrap();
        wire::write_end(out).unwrap();
    }

    #[test]
    fn data_tolerates_extent_past_total() -> crate::Result<()> {
        use crate::wire;

        // an extent ending at 4 with a recorded total of 2 implies a
        // shrunken file; accepted as-is rather than rejected
        let mut bytes = vec![];
        wire::write_tag(&mut bytes, super::TAG_TOTAL).unwrap();
        wire::write_u64(&mut bytes, 2).unwrap();
        wire::write_tag(&mut bytes, super::TAG_EXTENTS).unwrap();
        wire::write_u64(&mut bytes, 1).unwrap();
        wire::write_u64(&mut bytes, 0).unwrap(); // base
        wire::write_u64(&mut bytes, 4).unwrap(); // bytes
        wire::write_u64(&mut bytes, 1).unwrap(); // block count
        wire::write_u64(&mut bytes, 4).unwrap(); // block bytes
        wire::write_bytes(&mut bytes, b"some-key").unwrap();
        wire::write_end(&mut bytes).unwrap();

        let decoded = FileData::decode_from(&mut &bytes[..])?;
        assert_eq!(2, decoded.total_bytes());
        assert_eq!(1, decoded.extent_count());

        Ok(())
    }

    #[test]
    fn data_block_length_mismatch_is_corrupt() -> crate::Result<()> {
        let (store, cancel, config) = setup();
        let mut data = FileData::new();
        data.write_at(&store, &cancel, &config, b"0123456789", 0)?;

        // clobber the stored block with a shorter payload
        let key = data.blocks().next().unwrap().key.clone();
        store.put(&key, b"0123", true)?;

        let mut buf = [0u8; 10];
        assert!(matches!(
            data.read_at(&store, &cancel, &mut buf, 0),
            Err(Error::Decode(_))
        ));

        Ok(())
    }

    #[test]
    fn data_cancelled_write_surfaces() {
        let (store, _, config) = setup();
        let cancel = CancelSignal::default();
        cancel.cancel();

        let mut data = FileData::new();
        assert!(matches!(
            data.write_at(&store, &cancel, &config, b"doomed", 0),
            Err(Error::Cancelled)
        ));
    }
}
