//! # Core Playback Traits
//!
//! The seams of the audio line engine: the codec boundary the decode pipeline
//! drives, and the capability surfaces an [`AudioLine`](crate::AudioLine)
//! presents to callers.
//!
//! ## Architecture
//!
//! ```text
//!  ByteSource ──> CodecAdapter ──> FrameDecodePipeline ──> DecodeWorker ──> AudioSink
//!  (bytes)        (frames)         (bootstrap, restart)    (thread)         (host)
//! ```
//!
//! A [`CodecAdapter`] is a forward-only frame reader: it knows nothing about
//! rewinding. When the line needs to start over, the pipeline rewinds the byte
//! source and asks the [`CodecProvider`] for a brand new adapter.
//!
//! ## Threading Model
//!
//! Adapters are created on the controlling thread and then driven from the
//! decode worker thread, so they must be `Send`. Only one thread touches an
//! adapter at a time.
//!
//! ## Capability surfaces
//!
//! - [`Transport`]: start/stop, looping and activity queries, always
//!   available. Looping a line without replay plays a single pass.
//! - [`FormatNegotiable`]: the PCM format and the open/close lifecycle.
//! - [`Seekable`]: frame positioning and stream length. A line only hands
//!   this out when it was built with replay enabled.

use crate::error::Result;
use crate::source::SourceReader;
use crate::state::LoopCount;
use bridge_traits::playback::PcmFormat;
use serde::{Deserialize, Serialize};

// ============================================================================
// Audio Format Types
// ============================================================================

/// Compressed audio codecs the engine can identify.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    /// MPEG-1 Audio Layer 3
    Mp3,
    /// Advanced Audio Coding (AAC/M4A)
    Aac,
    /// Free Lossless Audio Codec
    Flac,
    /// Ogg Vorbis
    Vorbis,
    /// Opus (low-latency codec)
    Opus,
    /// Waveform Audio File Format
    Wav,
    /// Apple Lossless Audio Codec
    Alac,
    /// Codec not recognized
    Unknown,
    /// Custom or proprietary codec
    Other(String),
}

impl AudioCodec {
    /// Returns `true` if this is a lossless codec.
    pub fn is_lossless(&self) -> bool {
        matches!(self, AudioCodec::Flac | AudioCodec::Wav | AudioCodec::Alac)
    }

    /// Returns `true` if bit rate can differ from frame to frame, which makes
    /// the duration estimate approximate.
    pub fn is_variable_bitrate(&self) -> bool {
        !matches!(self, AudioCodec::Wav)
    }
}

// ============================================================================
// Frames
// ============================================================================

/// Header of one compressed frame, as reported by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHeader {
    /// Sample rate in hertz.
    pub sample_rate: u32,
    /// Number of channels.
    pub channels: u16,
    /// Bit rate of this frame in bits per second. Zero when unknown.
    pub bitrate: u32,
}

impl FrameHeader {
    pub fn new(sample_rate: u32, channels: u16, bitrate: u32) -> Self {
        Self {
            sample_rate,
            channels,
            bitrate,
        }
    }

    /// The PCM layout frames with this header are converted to.
    pub fn pcm_format(&self) -> PcmFormat {
        PcmFormat::s16le(self.sample_rate, self.channels)
    }

    /// Whether both headers describe the same PCM layout.
    pub fn same_layout(&self, other: &FrameHeader) -> bool {
        self.sample_rate == other.sample_rate && self.channels == other.channels
    }
}

/// One decoded frame: its header plus interleaved 16-bit samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    /// Interleaved signed 16-bit samples. Every element is valid.
    pub samples: Vec<i16>,
}

impl Frame {
    pub fn new(header: FrameHeader, samples: Vec<i16>) -> Self {
        Self { header, samples }
    }

    /// Number of sample frames (one sample per channel) in this frame.
    pub fn sample_frames(&self) -> usize {
        match self.header.channels {
            0 => 0,
            ch => self.samples.len() / ch as usize,
        }
    }

    /// Returns `true` if the frame carries no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// ============================================================================
// Codec Boundary
// ============================================================================

/// Forward-only frame decoder over a byte source.
///
/// The pipeline calls [`read_frame`](CodecAdapter::read_frame) and then
/// [`decode`](CodecAdapter::decode) with the returned header, once per frame.
pub trait CodecAdapter: Send {
    /// Advance to the next frame.
    ///
    /// Returns `Ok(None)` once the stream is exhausted.
    fn read_frame(&mut self) -> Result<Option<FrameHeader>>;

    /// Produce interleaved samples for the frame last returned by
    /// [`read_frame`](CodecAdapter::read_frame).
    fn decode(&mut self, header: &FrameHeader) -> Result<Vec<i16>>;

    /// The codec being decoded, if known.
    fn codec(&self) -> AudioCodec {
        AudioCodec::Unknown
    }
}

/// Factory for [`CodecAdapter`]s.
///
/// Called once when a line is built and again every time it restarts from
/// the beginning of its (rewound) byte source.
pub trait CodecProvider: Send + Sync {
    fn open(&self, source: SourceReader) -> Result<Box<dyn CodecAdapter>>;
}

impl<F> CodecProvider for F
where
    F: Fn(SourceReader) -> Result<Box<dyn CodecAdapter>> + Send + Sync,
{
    fn open(&self, source: SourceReader) -> Result<Box<dyn CodecAdapter>> {
        self(source)
    }
}

// ============================================================================
// Capability Surfaces
// ============================================================================

/// Start/stop control.
pub trait Transport {
    /// Start decoding from the current position to the end of the stream.
    fn start(&self) -> Result<()>;

    /// Stop decoding, blocking until the worker thread has exited.
    fn stop(&self);

    /// Restart playback and repeat it `count` times.
    fn loop_playback(&self, count: LoopCount) -> Result<()>;

    /// Whether a decode pass is running.
    fn is_active(&self) -> bool;

    /// Whether the last pass consumed the whole stream.
    fn is_finished(&self) -> bool;
}

/// Output format and device lifecycle.
pub trait FormatNegotiable {
    /// PCM layout written to the sink.
    fn format(&self) -> PcmFormat;

    /// Open the output sink for [`format`](FormatNegotiable::format).
    fn open(&self) -> Result<()>;

    /// Stop and release every resource. Idempotent.
    fn close(&self);
}

/// Random access within the stream. Requires the replay cache.
pub trait Seekable {
    /// Position the line at `frame`, leaving it stopped there.
    fn set_frame_position(&self, frame: u64) -> Result<()>;

    /// Total frames, once the stream has been read to its end.
    fn frame_length(&self) -> Option<u64>;

    /// Approximate duration in microseconds, once the stream has been read to
    /// its end.
    fn microsecond_length(&self) -> Option<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_properties() {
        assert!(AudioCodec::Flac.is_lossless());
        assert!(!AudioCodec::Mp3.is_lossless());
        assert!(AudioCodec::Mp3.is_variable_bitrate());
        assert!(!AudioCodec::Wav.is_variable_bitrate());
    }

    #[test]
    fn test_header_layout() {
        let a = FrameHeader::new(44_100, 2, 128_000);
        let b = FrameHeader::new(44_100, 2, 320_000);
        let c = FrameHeader::new(22_050, 2, 128_000);
        assert!(a.same_layout(&b));
        assert!(!a.same_layout(&c));
        assert_eq!(a.pcm_format(), PcmFormat::s16le(44_100, 2));
    }

    #[test]
    fn test_frame_sample_frames() {
        let frame = Frame::new(FrameHeader::new(8_000, 2, 0), vec![0; 10]);
        assert_eq!(frame.sample_frames(), 5);
        assert!(!frame.is_empty());

        let empty = Frame::new(FrameHeader::new(8_000, 0, 0), Vec::new());
        assert_eq!(empty.sample_frames(), 0);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_closure_provider() {
        struct Nothing;
        impl CodecAdapter for Nothing {
            fn read_frame(&mut self) -> Result<Option<FrameHeader>> {
                Ok(None)
            }
            fn decode(&mut self, _header: &FrameHeader) -> Result<Vec<i16>> {
                Ok(Vec::new())
            }
        }

        let provider = |_source: SourceReader| -> Result<Box<dyn CodecAdapter>> {
            Ok(Box::new(Nothing))
        };
        let source = SourceReader::new(crate::source::ByteSource::one_shot(std::io::empty()));
        let mut codec = provider.open(source).unwrap();
        assert!(codec.read_frame().unwrap().is_none());
        assert_eq!(codec.codec(), AudioCodec::Unknown);
    }
}
