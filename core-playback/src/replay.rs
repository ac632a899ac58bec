//! # Replayable Byte Source
//!
//! Turns a forward-only byte stream into one that can be re-read from the
//! beginning.
//!
//! Every byte pulled from the underlying reader is appended to an in-memory
//! cache. Reads below the high-water mark are served from the cache and never
//! touch the underlying reader; reads at the high-water mark pull fresh bytes
//! and extend the cache. [`rewind`](ReplayableByteSource::rewind) only moves
//! the cursor back to zero.
//!
//! A failing underlying reader is reported as end-of-stream here. The error
//! kind is kept in [`last_error`](ReplayableByteSource::last_error) for
//! diagnostics; deciding whether a short stream is a problem is left to the
//! decoder.

use std::io::{self, Read};
use tracing::{debug, warn};

/// Cache capacity used when none is configured.
pub const DEFAULT_INITIAL_CAPACITY: usize = 64 * 1024;

pub struct ReplayableByteSource {
    inner: Box<dyn Read + Send>,
    /// Every byte ever read from `inner`. `cache.len()` is the high-water mark.
    cache: Vec<u8>,
    cursor: usize,
    exhausted: bool,
    mark: usize,
    last_error: Option<io::ErrorKind>,
}

impl ReplayableByteSource {
    /// Wrap `inner` with the default initial cache capacity.
    pub fn new<R: Read + Send + 'static>(inner: R) -> Self {
        Self::with_capacity(inner, DEFAULT_INITIAL_CAPACITY)
    }

    /// Wrap `inner`, preallocating `capacity` bytes of cache.
    pub fn with_capacity<R: Read + Send + 'static>(inner: R, capacity: usize) -> Self {
        Self {
            inner: Box::new(inner),
            cache: Vec::with_capacity(capacity.max(1)),
            cursor: 0,
            exhausted: false,
            mark: 0,
            last_error: None,
        }
    }

    /// Read one byte, or `None` at end of stream.
    pub fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }

    /// Move the cursor back to the first byte. The cache is kept.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Remember the current cursor position.
    pub fn mark(&mut self) {
        self.mark = self.cursor;
    }

    /// Move the cursor back to the last [`mark`](Self::mark) (zero if none).
    pub fn reset(&mut self) {
        self.cursor = self.mark;
    }

    /// Total bytes ever read from the underlying source.
    pub fn cache_size_bytes(&self) -> u64 {
        self.cache.len() as u64
    }

    /// Allocated cache capacity.
    pub fn capacity(&self) -> usize {
        self.cache.capacity()
    }

    /// Current read position.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Whether the underlying source has reported end of stream (or failed).
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Whether the underlying source has been fully captured.
    pub fn is_complete(&self) -> bool {
        self.exhausted
    }

    /// Kind of the error that ended the underlying stream, if any.
    pub fn last_error(&self) -> Option<io::ErrorKind> {
        self.last_error
    }

    /// Grow the cache so `additional` more bytes fit, doubling its capacity.
    fn reserve(&mut self, additional: usize) {
        let needed = self.cache.len() + additional;
        let mut capacity = self.cache.capacity().max(1);
        if needed <= capacity {
            return;
        }
        while capacity < needed {
            capacity *= 2;
        }
        debug!(
            from = self.cache.capacity(),
            to = capacity,
            "Growing replay cache"
        );
        self.cache.reserve_exact(capacity - self.cache.len());
    }

    /// Pull up to `buf.len()` new bytes from the underlying source.
    fn fill(&mut self, buf: &mut [u8]) -> usize {
        loop {
            match self.inner.read(buf) {
                Ok(0) => {
                    self.exhausted = true;
                    debug!(bytes = self.cache.len(), "Underlying source exhausted");
                    return 0;
                }
                Ok(n) => {
                    self.reserve(n);
                    self.cache.extend_from_slice(&buf[..n]);
                    return n;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(
                        error = %e,
                        bytes = self.cache.len(),
                        "Underlying source failed, treating as end of stream"
                    );
                    self.exhausted = true;
                    self.last_error = Some(e.kind());
                    return 0;
                }
            }
        }
    }
}

impl Read for ReplayableByteSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let high_water = self.cache.len();
        if self.cursor < high_water {
            let n = buf.len().min(high_water - self.cursor);
            buf[..n].copy_from_slice(&self.cache[self.cursor..self.cursor + n]);
            self.cursor += n;
            return Ok(n);
        }

        if self.exhausted {
            return Ok(0);
        }

        let n = self.fill(buf);
        self.cursor += n;
        Ok(n)
    }
}

impl std::fmt::Debug for ReplayableByteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayableByteSource")
            .field("cached", &self.cache.len())
            .field("capacity", &self.cache.capacity())
            .field("cursor", &self.cursor)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}
