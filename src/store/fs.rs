// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{content_key, BlobStore};
use crate::{Error, Key, Slice};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Directory-backed blob store
///
/// One file per blob: `<root>/<first key byte as hex>/<full key as hex>`.
/// Writes go through a temporary file that is atomically renamed into
/// place, so a crashed writer never leaves a torn blob behind.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Opens (or creates) a store rooted at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        log::debug!("opened fs blob store at {}", root.display());

        Ok(Self { root })
    }

    fn blob_path(&self, key: &Key) -> crate::Result<PathBuf> {
        let hex = key.to_hex();

        let Some(shard) = hex.get(0..2) else {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty keys cannot be stored",
            )));
        };

        Ok(self.root.join(shard).join(hex))
    }

    fn write_blob(&self, path: &Path, value: &[u8], replace: bool) -> crate::Result<()> {
        #[allow(clippy::expect_used)]
        let folder = path.parent().expect("blob paths have a shard folder");
        fs::create_dir_all(folder)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(folder)?;
        temp_file.write_all(value)?;
        temp_file.flush()?;

        if replace {
            temp_file.persist(path).map_err(|e| Error::Io(e.error))?;
        } else {
            temp_file.persist_noclobber(path).map_err(|e| {
                if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                    Error::KeyExists(Key::empty())
                } else {
                    Error::Io(e.error)
                }
            })?;
        }

        Ok(())
    }

    fn sorted_entries(path: &Path) -> crate::Result<Vec<String>> {
        let mut names = vec![];

        for entry in fs::read_dir(path)? {
            let entry = entry?;
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }

        names.sort_unstable();

        Ok(names)
    }
}

impl BlobStore for FsStore {
    fn put(&self, key: &Key, value: &[u8], replace: bool) -> crate::Result<()> {
        let path = self.blob_path(key)?;

        self.write_blob(&path, value, replace).map_err(|e| {
            if matches!(e, Error::KeyExists(_)) {
                Error::KeyExists(key.clone())
            } else {
                e
            }
        })
    }

    fn put_cas(&self, value: &[u8]) -> crate::Result<Key> {
        let key = content_key(value);
        let path = self.blob_path(&key)?;

        if !path.try_exists()? {
            self.write_blob(&path, value, true)?;
            log::trace!("stored {} bytes under {key}", value.len());
        }

        Ok(key)
    }

    fn get(&self, key: &Key) -> crate::Result<Slice> {
        let path = self.blob_path(key)?;

        match fs::read(&path) {
            Ok(bytes) => Ok(bytes.into()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::KeyNotFound(key.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn size(&self, key: &Key) -> crate::Result<u64> {
        let path = self.blob_path(key)?;

        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::KeyNotFound(key.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, key: &Key) -> crate::Result<()> {
        let path = self.blob_path(key)?;

        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::KeyNotFound(key.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, start: &Key, visit: &mut dyn FnMut(&Key) -> bool) -> crate::Result<()> {
        // Shards are the first key byte in hex, so shard order is key order
        for shard in Self::sorted_entries(&self.root)? {
            let shard_path = self.root.join(&shard);
            if !shard_path.is_dir() {
                continue;
            }

            for name in Self::sorted_entries(&shard_path)? {
                let Some(key) = Key::from_hex(&name) else {
                    continue;
                };

                if key < *start {
                    continue;
                }

                if !visit(&key) {
                    return Ok(());
                }
            }
        }

        Ok(())
    }

    fn len(&self) -> crate::Result<u64> {
        let mut count = 0;

        for shard in Self::sorted_entries(&self.root)? {
            let shard_path = self.root.join(&shard);
            if !shard_path.is_dir() {
                continue;
            }

            count += Self::sorted_entries(&shard_path)?
                .iter()
                .filter(|name| Key::from_hex(name).is_some())
                .count() as u64;
        }

        Ok(count)
    }
}
