// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    coding::{Decode, DecodeError, Encode, EncodeError},
    wire,
};
use std::io::{Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

/// File type tag
///
/// Purely descriptive; the tree core preserves it on round-trip and never
/// interprets it.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum FileType {
    /// Regular file
    Regular,

    /// Directory
    Directory,

    /// Symbolic link
    Symlink,

    /// Socket
    Socket,

    /// Named pipe (FIFO)
    NamedPipe,

    /// Block device
    BlockDevice,

    /// Character device
    CharDevice,

    /// Unknown file type
    #[default]
    Unknown,
}

impl From<FileType> for u32 {
    fn from(value: FileType) -> Self {
        match value {
            FileType::Regular => 0,
            FileType::Directory => 1,
            FileType::Symlink => 2,
            FileType::Socket => 3,
            FileType::NamedPipe => 4,
            FileType::BlockDevice => 5,
            FileType::CharDevice => 6,
            FileType::Unknown => 404,
        }
    }
}

impl From<u32> for FileType {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::Regular,
            1 => Self::Directory,
            2 => Self::Symlink,
            3 => Self::Socket,
            4 => Self::NamedPipe,
            5 => Self::BlockDevice,
            6 => Self::CharDevice,
            // stat is descriptive, so unrecognized tags degrade to Unknown
            _ => Self::Unknown,
        }
    }
}

/// Point in time since the Unix epoch, UTC
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct Timestamp {
    /// Whole seconds since the epoch
    pub seconds: u64,

    /// Sub-second nanoseconds
    pub nanos: u32,
}

impl Timestamp {
    /// The current wall-clock time.
    ///
    /// A clock set before the Unix epoch reads as the epoch itself.
    #[must_use]
    pub fn now() -> Self {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        Self {
            seconds: elapsed.as_secs(),
            nanos: elapsed.subsec_nanos(),
        }
    }
}

/// Owner or group identity
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Ident {
    /// Numeric id
    pub id: u64,

    /// Symbolic name
    pub name: String,
}

/// POSIX-flavored file metadata
///
/// Preserved on round-trip and touched on data mutation when persistence is
/// enabled; never interpreted by the tree core.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Stat {
    /// Permission bits; only the low 12 bits (rwx triplets plus
    /// setuid/setgid/sticky) are meaningful
    pub permissions: u32,

    /// File type tag
    pub file_type: FileType,

    /// Modification time
    pub mod_time: Timestamp,

    /// Owning user
    pub owner: Ident,

    /// Owning group
    pub group: Ident,
}

impl Stat {
    /// Setuid permission bit
    pub const SETUID: u32 = 0o4000;

    /// Setgid permission bit
    pub const SETGID: u32 = 0o2000;

    /// Sticky permission bit
    pub const STICKY: u32 = 0o1000;

    /// Mask of all meaningful permission bits
    pub const PERMISSION_MASK: u32 = 0o7777;

    /// Sets the modification time to now.
    pub fn touch(&mut self) {
        self.mod_time = Timestamp::now();
    }
}

const TAG_PERMISSIONS: u8 = 1;
const TAG_FILE_TYPE: u8 = 2;
const TAG_MOD_TIME: u8 = 3;
const TAG_OWNER: u8 = 4;
const TAG_GROUP: u8 = 5;

fn write_ident<W: Write>(writer: &mut W, ident: &Ident) -> Result<(), EncodeError> {
    wire::write_u64(writer, ident.id)?;
    wire::write_str(writer, &ident.name)?;
    Ok(())
}

fn read_ident<R: Read>(reader: &mut R) -> Result<Ident, DecodeError> {
    Ok(Ident {
        id: wire::read_u64(reader)?,
        name: wire::read_str(reader)?,
    })
}

impl Encode for Stat {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        wire::write_tag(writer, TAG_PERMISSIONS)?;
        wire::write_u32(writer, self.permissions)?;

        wire::write_tag(writer, TAG_FILE_TYPE)?;
        wire::write_u32(writer, self.file_type.into())?;

        wire::write_tag(writer, TAG_MOD_TIME)?;
        wire::write_u64(writer, self.mod_time.seconds)?;
        wire::write_u32(writer, self.mod_time.nanos)?;

        wire::write_tag(writer, TAG_OWNER)?;
        write_ident(writer, &self.owner)?;

        wire::write_tag(writer, TAG_GROUP)?;
        write_ident(writer, &self.group)?;

        wire::write_end(writer)?;

        Ok(())
    }
}

impl Decode for Stat {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let mut stat = Self::default();

        loop {
            match wire::read_tag(reader)? {
                wire::END => break,
                TAG_PERMISSIONS => stat.permissions = wire::read_u32(reader)?,
                TAG_FILE_TYPE => stat.file_type = wire::read_u32(reader)?.into(),
                TAG_MOD_TIME => {
                    stat.mod_time = Timestamp {
                        seconds: wire::read_u64(reader)?,
                        nanos: wire::read_u32(reader)?,
                    };
                }
                TAG_OWNER => stat.owner = read_ident(reader)?,
                TAG_GROUP => stat.group = read_ident(reader)?,
                tag => return Err(DecodeError::InvalidTag(("Stat", tag))),
            }
        }

        Ok(stat)
    }
}
