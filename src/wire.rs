// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Stored object envelope and wire primitives
//!
//! Every persisted blob except raw data blocks and root pointers is wrapped
//! in an envelope: a variant byte selecting Node, Root or Index, followed by
//! a varint version marker, followed by the payload message. Messages are
//! sequences of `(tag, payload)` fields ending with a zero tag; unknown tags
//! are rejected rather than skipped, so a reader either understands a blob
//! completely or not at all.

use crate::coding::{DecodeError, EncodeError};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};
use varint_rs::{VarintReader, VarintWriter};

/// Current object version
pub(crate) const VERSION: u64 = 0;

/// Field tag terminating a message
pub(crate) const END: u8 = 0;

/// Stored object variant
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Variant {
    /// A file node
    Node,

    /// A root pointer record
    Root,

    /// An opaque blob-reachability index
    Index,
}

impl From<Variant> for u8 {
    fn from(value: Variant) -> Self {
        match value {
            Variant::Node => 1,
            Variant::Root => 2,
            Variant::Index => 3,
        }
    }
}

impl TryFrom<u8> for Variant {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Node),
            2 => Ok(Self::Root),
            3 => Ok(Self::Index),
            _ => Err(()),
        }
    }
}

pub(crate) fn write_envelope<W: Write>(writer: &mut W, variant: Variant) -> Result<(), EncodeError> {
    writer.write_u8(variant.into())?;
    writer.write_u64_varint(VERSION)?;
    Ok(())
}

pub(crate) fn read_envelope<R: Read>(reader: &mut R) -> Result<Variant, DecodeError> {
    let raw = reader.read_u8()?;
    let variant = Variant::try_from(raw).map_err(|()| DecodeError::InvalidTag(("Object", raw)))?;

    let version = reader.read_u64_varint()?;
    if version != VERSION {
        return Err(DecodeError::InvalidVersion(version));
    }

    Ok(variant)
}

pub(crate) fn expect_envelope<R: Read>(reader: &mut R, want: Variant) -> Result<(), DecodeError> {
    let got = read_envelope(reader)?;

    if got == want {
        Ok(())
    } else {
        Err(DecodeError::InvalidTag(("Object", got.into())))
    }
}

pub(crate) fn write_tag<W: Write>(writer: &mut W, tag: u8) -> Result<(), EncodeError> {
    writer.write_u8(tag)?;
    Ok(())
}

pub(crate) fn write_end<W: Write>(writer: &mut W) -> Result<(), EncodeError> {
    writer.write_u8(END)?;
    Ok(())
}

pub(crate) fn write_u64<W: Write>(writer: &mut W, value: u64) -> Result<(), EncodeError> {
    writer.write_u64_varint(value)?;
    Ok(())
}

pub(crate) fn write_u32<W: Write>(writer: &mut W, value: u32) -> Result<(), EncodeError> {
    writer.write_u32_varint(value)?;
    Ok(())
}

pub(crate) fn write_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<(), EncodeError> {
    writer.write_u64_varint(bytes.len() as u64)?;
    writer.write_all(bytes)?;
    Ok(())
}

pub(crate) fn write_str<W: Write>(writer: &mut W, s: &str) -> Result<(), EncodeError> {
    write_bytes(writer, s.as_bytes())
}

pub(crate) fn read_tag<R: Read>(reader: &mut R) -> Result<u8, DecodeError> {
    Ok(reader.read_u8()?)
}

pub(crate) fn read_u64<R: Read>(reader: &mut R) -> Result<u64, DecodeError> {
    Ok(reader.read_u64_varint()?)
}

pub(crate) fn read_u32<R: Read>(reader: &mut R) -> Result<u32, DecodeError> {
    Ok(reader.read_u32_varint()?)
}

pub(crate) fn read_len<R: Read>(reader: &mut R) -> Result<usize, DecodeError> {
    let len = reader.read_u64_varint()?;

    usize::try_from(len).map_err(|_| DecodeError::Malformed("length overflows usize"))
}

pub(crate) fn read_bytes<R: Read>(reader: &mut R) -> Result<Vec<u8>, DecodeError> {
    let len = read_len(reader)?;
    let mut buf = vec![0; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

pub(crate) fn read_str<R: Read>(reader: &mut R) -> Result<String, DecodeError> {
    let bytes = read_bytes(reader)?;
    String::from_utf8(bytes).map_err(|e| DecodeError::Utf8(e.utf8_error()))
}
