//! Audio output bridge traits and supporting PCM types.
//!
//! The playback core decodes compressed audio into raw PCM and pushes it into
//! an [`AudioSink`] supplied by the host. The sink owns the actual device
//! (desktop mixer, mobile audio session, test recorder) and paces the decoder
//! by blocking in [`AudioSink::write`] while its internal buffer is full.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Byte layout of the PCM stream handed to an [`AudioSink`].
///
/// The playback core always emits interleaved, signed, little-endian 16-bit
/// samples; only the sample rate and channel count vary per stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PcmFormat {
    /// Sample rate in hertz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Bits per sample. Always 16 for streams produced by the core.
    pub bits_per_sample: u16,
    /// Whether samples are signed integers.
    pub signed: bool,
    /// Whether samples are stored big-endian.
    pub big_endian: bool,
}

impl PcmFormat {
    /// Signed 16-bit little-endian PCM at the given rate and channel count.
    pub fn s16le(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample: 16,
            signed: true,
            big_endian: false,
        }
    }

    /// Size of one frame (one sample for every channel) in bytes.
    pub fn frame_size(&self) -> usize {
        self.channels as usize * (self.bits_per_sample as usize / 8)
    }

    /// Bytes consumed per second of playback.
    pub fn bytes_per_second(&self) -> u64 {
        self.sample_rate as u64 * self.frame_size() as u64
    }

    /// Playback duration of `bytes` worth of PCM in this format.
    pub fn duration_of(&self, bytes: usize) -> Duration {
        let bps = self.bytes_per_second();
        if bps == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(bytes as u64 * 1_000_000 / bps)
    }
}

impl fmt::Display for PcmFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {}-bit {} {}",
            self.sample_rate,
            self.channels,
            self.bits_per_sample,
            if self.signed { "signed" } else { "unsigned" },
            if self.big_endian { "BE" } else { "LE" }
        )
    }
}

/// Unique identifier for an audio line, used to correlate logs and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineId(Uuid);

impl LineId {
    /// Generate a new line identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Construct an identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for LineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Host audio output device.
///
/// All methods take `&self`: the playback core shares one sink between the
/// controlling thread and its decode worker, so implementations use interior
/// mutability.
///
/// # Blocking contract
///
/// [`write`](AudioSink::write) must block until every byte has been accepted
/// into the device buffer. That suspension is what paces decoding to real
/// time. A started sink must keep consuming data so that a blocked writer
/// always makes progress; [`stop`](AudioSink::stop) pauses consumption and is
/// only called once no writer is active.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::playback::{AudioSink, PcmFormat};
///
/// fn play_silence(sink: &dyn AudioSink) -> bridge_traits::error::Result<()> {
///     let format = PcmFormat::s16le(44_100, 2);
///     sink.open(&format, 4096)?;
///     sink.start()?;
///     sink.write(&vec![0u8; format.frame_size() * 44_100])?;
///     sink.drain()?;
///     sink.close();
///     Ok(())
/// }
/// ```
pub trait AudioSink: Send + Sync {
    /// Acquire the device for the given format with room for `buffer_frames`
    /// frames of queued audio.
    fn open(&self, format: &PcmFormat, buffer_frames: usize) -> Result<()>;

    /// Begin (or resume) consuming queued audio.
    fn start(&self) -> Result<()>;

    /// Queue PCM bytes, blocking until all of them were accepted.
    ///
    /// Returns the number of bytes written, which equals `pcm.len()` unless
    /// the sink was closed while the call was blocked.
    fn write(&self, pcm: &[u8]) -> Result<usize>;

    /// Pause consumption. Queued audio is kept.
    fn stop(&self) -> Result<()>;

    /// Discard queued audio without playing it.
    fn flush(&self) -> Result<()>;

    /// Block until all queued audio has been played.
    fn drain(&self) -> Result<()>;

    /// Release the device. Must be idempotent.
    fn close(&self);

    /// Whether [`open`](AudioSink::open) succeeded and the sink is not closed.
    fn is_open(&self) -> bool;

    /// Set linear output gain in `[0.0, 1.0]`.
    fn set_volume(&self, _volume: f32) -> Result<()> {
        Ok(())
    }

    /// Set stereo balance in `[-1.0, 1.0]` (left to right).
    fn set_balance(&self, _balance: f32) -> Result<()> {
        Ok(())
    }

    /// Mute or unmute output without touching the stored gain.
    fn set_muted(&self, _muted: bool) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s16le_layout() {
        let format = PcmFormat::s16le(44_100, 2);
        assert_eq!(format.bits_per_sample, 16);
        assert!(format.signed);
        assert!(!format.big_endian);
        assert_eq!(format.frame_size(), 4);
        assert_eq!(format.bytes_per_second(), 176_400);
    }

    #[test]
    fn test_duration_of() {
        let format = PcmFormat::s16le(8_000, 1);
        assert_eq!(format.duration_of(16_000), Duration::from_secs(1));
        assert_eq!(format.duration_of(0), Duration::ZERO);
    }

    #[test]
    fn test_format_display() {
        let format = PcmFormat::s16le(48_000, 1);
        assert_eq!(format.to_string(), "48000 Hz, 1 ch, 16-bit signed LE");
    }

    #[test]
    fn test_line_id_unique() {
        let a = LineId::new();
        let b = LineId::new();
        assert_ne!(a, b);
        assert_eq!(LineId::from_uuid(*a.as_uuid()), a);
    }
}
