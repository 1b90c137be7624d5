// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::rolling::{RabinKarp, RollingHash};
use std::io::Read;
use std::sync::Arc;

/// Default minimum block size in bytes
pub const DEFAULT_MIN_SIZE: usize = 2_048;

/// Default target block size in bytes
pub const DEFAULT_TARGET_SIZE: usize = 16_384;

/// Default maximum block size in bytes
pub const DEFAULT_MAX_SIZE: usize = 65_536;

type HasherFactory = Arc<dyn Fn() -> Box<dyn RollingHash> + Send + Sync>;

/// Block splitter configuration builder
///
/// Zero values fall back to the documented defaults when a [`Splitter`] is
/// constructed, so `SplitConfig::default()` with a few `with_*` overrides is
/// the usual way to tune chunking.
#[derive(Clone)]
pub struct SplitConfig {
    /// Minimum block size in bytes
    pub min_size: usize,

    /// Target (average) block size in bytes
    ///
    /// A block boundary is declared where the rolling hash modulo this value
    /// hits a fixed residue, so blocks average out to roughly this size.
    pub target_size: usize,

    /// Maximum block size in bytes
    pub max_size: usize,

    hasher: HasherFactory,
}

impl std::fmt::Debug for SplitConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitConfig")
            .field("min_size", &self.min_size)
            .field("target_size", &self.target_size)
            .field("max_size", &self.max_size)
            .finish_non_exhaustive()
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_SIZE,
            target_size: DEFAULT_TARGET_SIZE,
            max_size: DEFAULT_MAX_SIZE,
            hasher: Arc::new(|| Box::new(RabinKarp::default()) as Box<dyn RollingHash>),
        }
    }
}

impl SplitConfig {
    /// Initializes a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the minimum block size.
    #[must_use]
    pub fn with_min_size(mut self, bytes: usize) -> Self {
        self.min_size = bytes;
        self
    }

    /// Sets the target block size.
    #[must_use]
    pub fn with_target_size(mut self, bytes: usize) -> Self {
        self.target_size = bytes;
        self
    }

    /// Sets the maximum block size.
    #[must_use]
    pub fn with_max_size(mut self, bytes: usize) -> Self {
        self.max_size = bytes;
        self
    }

    /// Sets the rolling hash factory.
    ///
    /// The factory is invoked once per [`Splitter`]; block boundaries are only
    /// reproducible across runs when the factory always yields identically
    /// parameterized hashes.
    #[must_use]
    pub fn with_hasher<H: RollingHash + 'static>(
        mut self,
        factory: impl Fn() -> H + Send + Sync + 'static,
    ) -> Self {
        self.hasher = Arc::new(move || Box::new(factory()) as Box<dyn RollingHash>);
        self
    }

    pub(crate) fn new_hasher(&self) -> Box<dyn RollingHash> {
        (self.hasher)()
    }

    /// Normalized (min, target, max), substituting defaults for zero values.
    #[must_use]
    pub(crate) fn bounds(&self) -> (usize, usize, usize) {
        let min = if self.min_size == 0 {
            DEFAULT_MIN_SIZE
        } else {
            self.min_size
        };
        let target = if self.target_size == 0 {
            DEFAULT_TARGET_SIZE
        } else {
            self.target_size
        };
        let max = if self.max_size == 0 {
            DEFAULT_MAX_SIZE
        } else {
            self.max_size
        };
        (min, target, max)
    }
}

/// Streaming content-defined block splitter
///
/// Cuts a byte stream into variable-sized blocks. A block ends either where
/// the rolling hash, taken modulo the target size, hits a fixed residue (once
/// the block holds at least `min_size` bytes), or when the block reaches
/// `max_size` bytes. The hash runs continuously over the stream, so block
/// boundaries depend only on nearby bytes — two streams that agree over a
/// window-sized stretch cut in the same places from there on. This is what
/// makes chunking deterministic and deduplication effective.
pub struct Splitter<R: Read> {
    reader: R,
    hasher: Box<dyn RollingHash>,
    min: usize,
    target: u64,
    max: usize,
    buf: Vec<u8>,
    hashed: usize,
    consumed: usize,
    eof: bool,
}

impl<R: Read> Splitter<R> {
    /// Creates a splitter over `reader` with the given configuration.
    #[must_use]
    pub fn new(reader: R, config: &SplitConfig) -> Self {
        let (min, target, max) = config.bounds();

        Self {
            reader,
            hasher: config.new_hasher(),
            min,
            target: target as u64,
            max,
            buf: Vec::with_capacity(max),
            hashed: 0,
            consumed: 0,
            eof: false,
        }
    }

    /// Produces the next block, or `None` at end of stream.
    ///
    /// The returned slice is only valid until the next call; callers that
    /// retain block contents must copy them.
    ///
    /// # Errors
    ///
    /// Propagates reader errors. End-of-stream is not an error.
    pub fn next_block(&mut self) -> crate::Result<Option<&[u8]>> {
        // Shift out the block consumed by the previous call. The byte whose
        // hash triggered that cut stays behind as the start of this block.
        self.buf.drain(..self.consumed);
        self.hashed -= self.consumed;
        self.consumed = 0;

        loop {
            while self.hashed < self.buf.len() {
                let byte = self.buf.get(self.hashed).copied().expect("should exist");
                let hash = self.hasher.update(byte);

                // A cut here ends the block *before* the hashed byte
                if self.hashed >= self.min && hash % self.target == 1 {
                    self.consumed = self.hashed;
                    self.hashed += 1;
                    return Ok(Some(self.buf.get(..self.consumed).expect("should exist")));
                }

                self.hashed += 1;

                if self.hashed >= self.max {
                    self.consumed = self.hashed;
                    return Ok(Some(self.buf.get(..self.consumed).expect("should exist")));
                }
            }

            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                self.consumed = self.buf.len();
                return Ok(Some(&self.buf));
            }

            self.refill()?;
        }
    }

    #[allow(clippy::expect_used)]
    fn refill(&mut self) -> crate::Result<()> {
        // only called when the whole buffer is hashed but shorter than max
        let old_len = self.buf.len();
        self.buf.resize(self.max, 0);

        let tail = self.buf.get_mut(old_len..).expect("buffer was just grown");

        match self.reader.read(tail) {
            Ok(0) => {
                self.buf.truncate(old_len);
                self.eof = true;
                Ok(())
            }
            Ok(n) => {
                self.buf.truncate(old_len + n);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                self.buf.truncate(old_len);
                Ok(())
            }
            Err(e) => {
                self.buf.truncate(old_len);
                Err(e.into())
            }
        }
    }

    /// Drains the stream, forwarding every block to `f`.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first reader or callback error.
    pub fn split<F: FnMut(&[u8]) -> crate::Result<()>>(mut self, mut f: F) -> crate::Result<()> {
        while let Some(block) = self.next_block()? {
            f(block)?;
        }
        Ok(())
    }
}
