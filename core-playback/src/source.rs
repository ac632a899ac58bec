//! # Byte Sources
//!
//! The two kinds of compressed input a line can be built over:
//!
//! - [`ByteSource::OneShot`]: a forward-only stream read exactly once. The
//!   line can play it through, but cannot rewind, loop or seek.
//! - [`ByteSource::Replayable`]: the same stream captured by a
//!   [`ReplayableByteSource`] so it can be read again from the start.
//!
//! The choice is made once, when the line is built.
//!
//! [`SourceReader`] is the shared handle the codec reads through. The line's
//! pipeline keeps one clone to rewind the source; each codec adapter gets
//! another.

use crate::error::{PlaybackError, Result};
use crate::replay::ReplayableByteSource;
use parking_lot::Mutex;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

/// Forward-only reader that counts consumed bytes.
pub struct OneShotSource {
    inner: Box<dyn Read + Send>,
    consumed: u64,
    exhausted: bool,
}

impl Read for OneShotSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.exhausted {
            return Ok(0);
        }
        let n = self.inner.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.exhausted = true;
        }
        self.consumed += n as u64;
        Ok(n)
    }
}

/// Compressed input of an audio line.
pub enum ByteSource {
    OneShot(OneShotSource),
    Replayable(ReplayableByteSource),
}

impl ByteSource {
    /// Forward-only source without a replay cache.
    pub fn one_shot<R: Read + Send + 'static>(reader: R) -> Self {
        ByteSource::OneShot(OneShotSource {
            inner: Box::new(reader),
            consumed: 0,
            exhausted: false,
        })
    }

    /// Source backed by a replay cache with the given initial capacity.
    pub fn replayable<R: Read + Send + 'static>(reader: R, initial_capacity: usize) -> Self {
        ByteSource::Replayable(ReplayableByteSource::with_capacity(reader, initial_capacity))
    }

    pub fn is_replayable(&self) -> bool {
        matches!(self, ByteSource::Replayable(_))
    }

    /// Go back to the first byte.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::Unsupported`] for one-shot sources.
    pub fn rewind(&mut self) -> Result<()> {
        match self {
            ByteSource::Replayable(source) => {
                source.rewind();
                Ok(())
            }
            ByteSource::OneShot(_) => Err(PlaybackError::Unsupported(
                "rewind requires a replayable byte source".to_string(),
            )),
        }
    }

    /// Bytes read from the underlying stream so far.
    pub fn bytes_consumed(&self) -> u64 {
        match self {
            ByteSource::OneShot(source) => source.consumed,
            ByteSource::Replayable(source) => source.cache_size_bytes(),
        }
    }

    /// Whether the underlying stream has been read to its end.
    pub fn is_exhausted(&self) -> bool {
        match self {
            ByteSource::OneShot(source) => source.exhausted,
            ByteSource::Replayable(source) => source.is_exhausted(),
        }
    }

    fn position(&self) -> u64 {
        match self {
            ByteSource::OneShot(source) => source.consumed,
            ByteSource::Replayable(source) => source.position() as u64,
        }
    }
}

impl Read for ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ByteSource::OneShot(source) => source.read(buf),
            ByteSource::Replayable(source) => source.read(buf),
        }
    }
}

impl std::fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ByteSource::OneShot(source) => f
                .debug_struct("OneShot")
                .field("consumed", &source.consumed)
                .field("exhausted", &source.exhausted)
                .finish(),
            ByteSource::Replayable(source) => source.fmt(f),
        }
    }
}

/// Cloneable, thread-safe reading handle over a [`ByteSource`].
///
/// Only seeking to the current position is supported, which is all that
/// container probing asks of a forward-only stream.
#[derive(Clone, Debug)]
pub struct SourceReader {
    inner: Arc<Mutex<ByteSource>>,
}

impl SourceReader {
    pub fn new(source: ByteSource) -> Self {
        Self {
            inner: Arc::new(Mutex::new(source)),
        }
    }

    /// See [`ByteSource::rewind`].
    pub fn rewind(&self) -> Result<()> {
        self.inner.lock().rewind()
    }

    pub fn is_replayable(&self) -> bool {
        self.inner.lock().is_replayable()
    }

    /// See [`ByteSource::bytes_consumed`].
    pub fn bytes_consumed(&self) -> u64 {
        self.inner.lock().bytes_consumed()
    }

    /// See [`ByteSource::is_exhausted`].
    pub fn is_exhausted(&self) -> bool {
        self.inner.lock().is_exhausted()
    }
}

impl Read for SourceReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.lock().read(buf)
    }
}

impl Seek for SourceReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let source = self.inner.lock();
        let current = source.position();
        match pos {
            SeekFrom::Current(0) => Ok(current),
            SeekFrom::Start(offset) if offset == current => Ok(current),
            _ => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "byte source only supports forward reads",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_one_shot_cannot_rewind() {
        let mut source = ByteSource::one_shot(Cursor::new(vec![1u8, 2, 3]));
        assert!(!source.is_replayable());
        assert!(matches!(source.rewind(), Err(PlaybackError::Unsupported(_))));
    }

    #[test]
    fn test_one_shot_counts_consumed_bytes() {
        let mut source = ByteSource::one_shot(Cursor::new(vec![0u8; 10]));
        let mut out = Vec::new();
        source.read_to_end(&mut out).unwrap();
        assert_eq!(source.bytes_consumed(), 10);
        assert!(source.is_exhausted());
    }

    #[test]
    fn test_reader_clones_share_cursor() {
        let reader = SourceReader::new(ByteSource::replayable(Cursor::new(vec![1u8, 2, 3, 4]), 4));
        let mut a = reader.clone();
        let mut b = reader.clone();

        let mut buf = [0u8; 2];
        a.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2]);
        b.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [3, 4]);

        reader.rewind().unwrap();
        a.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2]);
        assert_eq!(reader.bytes_consumed(), 4);
    }

    #[test]
    fn test_seek_only_reports_position() {
        let mut reader = SourceReader::new(ByteSource::one_shot(Cursor::new(vec![0u8; 8])));
        let mut buf = [0u8; 3];
        reader.read_exact(&mut buf).unwrap();

        assert_eq!(reader.seek(SeekFrom::Current(0)).unwrap(), 3);
        assert_eq!(reader.seek(SeekFrom::Start(3)).unwrap(), 3);
        assert!(reader.seek(SeekFrom::Start(0)).is_err());
        assert!(reader.seek(SeekFrom::End(0)).is_err());
    }
}
