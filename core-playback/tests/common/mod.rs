//! Shared fixtures for the line integration tests.
//!
//! The stream format is trivial: every byte is one frame, decoded to a single
//! mono sample equal to the byte value. `0xEE` fails to decode and `0xFF`
//! announces a different sample rate.

#![allow(dead_code)]

use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::playback::{AudioSink, PcmFormat};
use core_playback::{
    AudioLine, CodecAdapter, FrameHeader, PlaybackError, Result, SourceReader,
};
use core_runtime::events::{LineEvent, Receiver};
use parking_lot::Mutex;
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub const SAMPLE_RATE: u32 = 8_000;
/// Eight bits per frame at one frame per millisecond.
pub const BITRATE: u32 = 8_000;
pub const CORRUPT: u8 = 0xEE;
pub const RATE_CHANGE: u8 = 0xFF;

pub struct ByteFrameCodec {
    source: SourceReader,
    current: u8,
}

impl CodecAdapter for ByteFrameCodec {
    fn read_frame(&mut self) -> Result<Option<FrameHeader>> {
        let mut byte = [0u8; 1];
        if self.source.read(&mut byte)? == 0 {
            return Ok(None);
        }
        self.current = byte[0];
        let rate = if self.current == RATE_CHANGE {
            SAMPLE_RATE * 2
        } else {
            SAMPLE_RATE
        };
        Ok(Some(FrameHeader::new(rate, 1, BITRATE)))
    }

    fn decode(&mut self, _header: &FrameHeader) -> Result<Vec<i16>> {
        if self.current == CORRUPT {
            return Err(PlaybackError::DecodingError(format!(
                "bad frame byte {:#x}",
                self.current
            )));
        }
        Ok(vec![self.current as i16])
    }
}

pub fn byte_codec(source: SourceReader) -> Result<Box<dyn CodecAdapter>> {
    Ok(Box::new(ByteFrameCodec { source, current: 0 }))
}

/// `0, 1, .., frames - 1`
pub fn counting_stream(frames: u8) -> Vec<u8> {
    (0..frames).collect()
}

/// Sink that records every write, optionally sleeping per write to mimic a
/// device draining at playback speed.
#[derive(Default)]
pub struct RecordingSink {
    writes: Mutex<Vec<Vec<u8>>>,
    pace: Option<Duration>,
    open: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
    closes: AtomicUsize,
    fail_writes_after: Option<usize>,
    reject_once_at: Option<usize>,
    rejected: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn paced(pace: Duration) -> Arc<Self> {
        Arc::new(Self {
            pace: Some(pace),
            ..Self::default()
        })
    }

    /// Reject every write after the first `count`.
    pub fn failing_after(count: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_writes_after: Some(count),
            ..Self::default()
        })
    }

    /// Reject the write that would become write number `index` (zero
    /// based), once; later writes succeed.
    pub fn rejecting_once_at(index: usize) -> Arc<Self> {
        Arc::new(Self {
            reject_once_at: Some(index),
            ..Self::default()
        })
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    /// The first sample of every write, in order.
    pub fn samples(&self) -> Vec<i16> {
        self.writes
            .lock()
            .iter()
            .filter(|pcm| pcm.len() >= 2)
            .map(|pcm| i16::from_le_bytes([pcm[0], pcm[1]]))
            .collect()
    }

    /// Every sample written, concatenated.
    pub fn all_samples(&self) -> Vec<i16> {
        self.writes
            .lock()
            .iter()
            .flat_map(|pcm| {
                pcm.chunks_exact(2)
                    .map(|b| i16::from_le_bytes([b[0], b[1]]))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn clear(&self) {
        self.writes.lock().clear();
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl AudioSink for RecordingSink {
    fn open(&self, _format: &PcmFormat, _buffer_frames: usize) -> BridgeResult<()> {
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn start(&self) -> BridgeResult<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn write(&self, pcm: &[u8]) -> BridgeResult<usize> {
        if let Some(limit) = self.fail_writes_after {
            if self.write_count() >= limit {
                return Err(BridgeError::Device("device unplugged".to_string()));
            }
        }
        if self.reject_once_at == Some(self.write_count())
            && !self.rejected.swap(true, Ordering::SeqCst)
        {
            return Err(BridgeError::Device("buffer underrun".to_string()));
        }
        if let Some(pace) = self.pace {
            thread::sleep(pace);
        }
        self.writes.lock().push(pcm.to_vec());
        Ok(pcm.len())
    }

    fn stop(&self) -> BridgeResult<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn flush(&self) -> BridgeResult<()> {
        Ok(())
    }

    fn drain(&self) -> BridgeResult<()> {
        Ok(())
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn set_volume(&self, _volume: f32) -> BridgeResult<()> {
        Ok(())
    }

    fn set_balance(&self, _balance: f32) -> BridgeResult<()> {
        Ok(())
    }

    fn set_muted(&self, _muted: bool) -> BridgeResult<()> {
        Ok(())
    }
}

pub fn build_line(bytes: Vec<u8>, sink: Arc<RecordingSink>, replay: bool) -> AudioLine {
    AudioLine::builder(Cursor::new(bytes), sink)
        .replay(replay)
        .codec(byte_codec)
        .build()
        .expect("synthetic stream probes")
}

/// Poll until the line is idle.
pub fn wait_until_stopped(line: &AudioLine) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while line.is_active() {
        assert!(Instant::now() < deadline, "line never stopped");
        thread::sleep(Duration::from_millis(1));
    }
}

/// Collect events until `done` matches one, or panic after five seconds.
pub fn collect_until<F>(rx: &mut Receiver<LineEvent>, mut done: F) -> Vec<LineEvent>
where
    F: FnMut(&LineEvent) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut seen = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => {
                let finished = done(&event);
                seen.push(event);
                if finished {
                    return seen;
                }
            }
            Err(_) => {
                assert!(Instant::now() < deadline, "timed out, saw {:?}", seen);
                thread::sleep(Duration::from_millis(1));
            }
        }
    }
}
