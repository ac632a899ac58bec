//! # Sample Format Converter
//!
//! Converts decoded audio between the sample representations the line uses:
//! codec output to interleaved `i16`, `i16` to the little-endian bytes the
//! sink receives, and sink bytes back to `f32` for device output.

#[cfg(feature = "core-decoder")]
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
#[cfg(feature = "core-decoder")]
use symphonia::core::conv::IntoSample;
#[cfg(feature = "core-decoder")]
use symphonia::core::sample::Sample;
use tracing::warn;

/// Sample converter that normalizes audio to signed 16-bit interleaved PCM.
///
/// Symphonia outputs audio in various formats (i8 through f64) and always in
/// planar layout. The line writes interleaved signed 16-bit little-endian
/// PCM, so everything passes through here on the way out.
pub struct SampleConverter;

impl SampleConverter {
    /// Convert a Symphonia buffer to interleaved `i16` samples.
    ///
    /// The output layout is interleaved (LRLRLR... for stereo) regardless of
    /// the source sample type.
    #[cfg(feature = "core-decoder")]
    pub fn to_interleaved_i16(buffer: &AudioBufferRef<'_>) -> Vec<i16> {
        match buffer {
            AudioBufferRef::S16(buf) => Self::convert_and_interleave(&**buf, |s: i16| s),
            AudioBufferRef::F32(buf) => {
                Self::convert_and_interleave(&**buf, |s: f32| s.into_sample())
            }
            AudioBufferRef::F64(buf) => {
                Self::convert_and_interleave(&**buf, |s: f64| s.into_sample())
            }
            AudioBufferRef::S32(buf) => {
                Self::convert_and_interleave(&**buf, |s: i32| s.into_sample())
            }
            AudioBufferRef::S24(buf) => {
                Self::convert_and_interleave(&**buf, |s| IntoSample::into_sample(s))
            }
            AudioBufferRef::S8(buf) => {
                Self::convert_and_interleave(&**buf, |s: i8| s.into_sample())
            }
            AudioBufferRef::U32(buf) => {
                Self::convert_and_interleave(&**buf, |s: u32| s.into_sample())
            }
            AudioBufferRef::U24(buf) => {
                Self::convert_and_interleave(&**buf, |s| IntoSample::into_sample(s))
            }
            AudioBufferRef::U16(buf) => {
                Self::convert_and_interleave(&**buf, |s: u16| s.into_sample())
            }
            AudioBufferRef::U8(buf) => {
                Self::convert_and_interleave(&**buf, |s: u8| s.into_sample())
            }
        }
    }

    /// Convert and interleave a planar buffer of any sample type.
    #[cfg(feature = "core-decoder")]
    fn convert_and_interleave<T>(buf: &AudioBuffer<T>, convert: fn(T) -> i16) -> Vec<i16>
    where
        T: Sample + Copy,
    {
        let num_channels = buf.spec().channels.count();
        let num_frames = buf.frames();
        let mut interleaved = Vec::with_capacity(num_frames * num_channels);

        for frame_idx in 0..num_frames {
            for chan_idx in 0..num_channels {
                interleaved.push(convert(buf.chan(chan_idx)[frame_idx]));
            }
        }

        interleaved
    }

    /// Serialize samples as little-endian bytes, two per sample.
    pub fn to_le_bytes(samples: &[i16]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }

    /// Parse signed 16-bit little-endian bytes into `f32` samples in
    /// `[-1.0, 1.0]`.
    ///
    /// A trailing odd byte is ignored.
    pub fn le_bytes_to_f32(bytes: &[u8]) -> Vec<f32> {
        if bytes.len() % 2 != 0 {
            warn!("Dropping trailing odd byte from {} byte PCM block", bytes.len());
        }
        bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
            .collect()
    }

    /// Scale interleaved samples in place by volume and stereo balance.
    ///
    /// Balance only applies to two-channel audio: negative values attenuate
    /// the right channel, positive values the left.
    pub fn apply_gain(samples: &mut [f32], channels: u16, volume: f32, balance: f32) {
        let (left, right) = if channels == 2 {
            (
                volume * (1.0 - balance.max(0.0)),
                volume * (1.0 + balance.min(0.0)),
            )
        } else {
            (volume, volume)
        };

        if channels == 2 {
            for pair in samples.chunks_mut(2) {
                pair[0] *= left;
                if let Some(r) = pair.get_mut(1) {
                    *r *= right;
                }
            }
        } else {
            for sample in samples.iter_mut() {
                *sample *= volume;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_le_bytes_layout() {
        let bytes = SampleConverter::to_le_bytes(&[1, -1, 0x1234]);
        assert_eq!(bytes, vec![0x01, 0x00, 0xFF, 0xFF, 0x34, 0x12]);
    }

    #[test]
    fn test_le_bytes_to_f32_range() {
        let bytes = SampleConverter::to_le_bytes(&[i16::MIN, 0, i16::MAX]);
        let samples = SampleConverter::le_bytes_to_f32(&bytes);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], -1.0);
        assert_eq!(samples[1], 0.0);
        assert!(samples[2] > 0.999 && samples[2] < 1.0);
    }

    #[test]
    fn test_odd_trailing_byte_is_dropped() {
        let samples = SampleConverter::le_bytes_to_f32(&[0x00, 0x40, 0x7F]);
        assert_eq!(samples, vec![0.5]);
    }

    #[test]
    fn test_apply_gain_balance() {
        let mut samples = vec![1.0, 1.0, 1.0, 1.0];
        SampleConverter::apply_gain(&mut samples, 2, 0.5, -1.0);
        assert_eq!(samples, vec![0.5, 0.0, 0.5, 0.0]);

        let mut samples = vec![1.0, 1.0];
        SampleConverter::apply_gain(&mut samples, 2, 1.0, 0.5);
        assert_eq!(samples, vec![0.5, 1.0]);
    }

    #[test]
    fn test_apply_gain_mono_ignores_balance() {
        let mut samples = vec![1.0, -1.0, 0.5];
        SampleConverter::apply_gain(&mut samples, 1, 0.5, 1.0);
        assert_eq!(samples, vec![0.5, -0.5, 0.25]);
    }
}
