//! # Symphonia Codec Adapter
//!
//! Frame-at-a-time decoding of any container/codec pair Symphonia supports.

use crate::config::LineConfig;
use crate::decoder::format_detector::FormatDetector;
use crate::decoder::sample_converter::SampleConverter;
use crate::error::{PlaybackError, Result};
use crate::source::SourceReader;
use crate::traits::{AudioCodec, CodecAdapter, CodecProvider, FrameHeader};
use std::path::Path;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, error, info, instrument, trace, warn};

/// Default number of corrupt packets skipped in a row before giving up.
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: usize = 10;

impl MediaSource for SourceReader {
    fn is_seekable(&self) -> bool {
        false
    }

    fn byte_len(&self) -> Option<u64> {
        None
    }
}

/// [`CodecAdapter`] backed by a Symphonia format reader and decoder.
///
/// Each Symphonia packet of the selected track is one frame. The packet is
/// decoded as soon as it is read so that the frame header can report the
/// decoded sample rate and channel count; [`decode`](CodecAdapter::decode)
/// then hands out the converted samples.
pub struct SymphoniaCodec {
    /// Format reader (demuxer), owns the media source stream
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    codec: AudioCodec,
    /// Samples of the frame last returned by `read_frame`
    pending: Vec<i16>,
    max_consecutive_errors: usize,
    frames_read: u64,
}

impl SymphoniaCodec {
    /// Probe `source` and prepare a decoder for its first audio track.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::FormatUnavailable`] if the container is not
    ///   recognized or has no decodable audio track
    /// - [`PlaybackError::UnsupportedCodec`] if the codec was not compiled in
    /// - [`PlaybackError::DecoderError`] if Symphonia cannot build a decoder
    #[instrument(skip(source, hint))]
    pub fn new(source: SourceReader, hint: &Hint, max_consecutive_errors: usize) -> Result<Self> {
        let mss = MediaSourceStream::new(Box::new(source), Default::default());

        let probed = symphonia::default::get_probe()
            .format(
                hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| {
                error!("Format probe failed: {}", e);
                PlaybackError::FormatUnavailable(format!("Failed to probe format: {}", e))
            })?;

        let format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                error!("No supported audio tracks found");
                PlaybackError::FormatUnavailable("No supported audio tracks".to_string())
            })?;

        let track_id = track.id;
        let codec = FormatDetector::detect_codec(track.codec_params.codec);
        FormatDetector::validate_codec_support(&codec)?;
        info!(track_id, "Detected codec: {:?}", codec);

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| {
                error!("Failed to create decoder: {}", e);
                PlaybackError::DecoderError(format!("Failed to create codec decoder: {}", e))
            })?;

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            codec,
            pending: Vec::new(),
            max_consecutive_errors: max_consecutive_errors.max(1),
            frames_read: 0,
        })
    }

    /// Bit rate of one packet in bits per second, derived from its encoded
    /// size and duration in sample frames.
    fn packet_bitrate(encoded_bytes: usize, duration: u64, sample_rate: u32) -> u32 {
        if duration == 0 {
            return 0;
        }
        let bits = encoded_bytes as u64 * 8 * sample_rate as u64 / duration;
        u32::try_from(bits).unwrap_or(u32::MAX)
    }

    /// Count one skipped packet, failing once too many happened in a row.
    fn note_skip(
        &self,
        consecutive_errors: &mut usize,
        what: &str,
        err: &dyn std::fmt::Display,
    ) -> Result<()> {
        *consecutive_errors += 1;
        warn!(
            "Skipping packet with {} (attempt {}/{}): {}",
            what, consecutive_errors, self.max_consecutive_errors, err
        );
        if *consecutive_errors >= self.max_consecutive_errors {
            error!("Too many consecutive {}s, stream may be corrupted", what);
            return Err(PlaybackError::CorruptedStream(format!(
                "{} failed packets in a row after frame {}: {}",
                consecutive_errors, self.frames_read, err
            )));
        }
        Ok(())
    }
}

impl CodecAdapter for SymphoniaCodec {
    fn read_frame(&mut self) -> Result<Option<FrameHeader>> {
        let mut consecutive_errors = 0usize;

        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    debug!("Reached end of stream after {} frames", self.frames_read);
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    warn!("Decoder reset required for track list change");
                    return Err(PlaybackError::DecoderError(
                        "Track list changed, reset required".to_string(),
                    ));
                }
                Err(SymphoniaError::IoError(e)) => {
                    self.note_skip(&mut consecutive_errors, "I/O error", &e)?;
                    continue;
                }
                Err(e) => {
                    error!("Fatal format reader error: {}", e);
                    return Err(PlaybackError::DecodingError(format!(
                        "Failed to read packet: {}",
                        e
                    )));
                }
            };

            while !self.format_reader.metadata().is_latest() {
                self.format_reader.metadata().pop();
            }

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let channels = spec.channels.count() as u16;
                    self.pending = SampleConverter::to_interleaved_i16(&decoded);
                    self.frames_read += 1;

                    let bitrate =
                        Self::packet_bitrate(packet.buf().len(), packet.dur(), spec.rate);
                    trace!(
                        frame = self.frames_read,
                        samples = self.pending.len(),
                        bitrate,
                        "Decoded packet"
                    );
                    return Ok(Some(FrameHeader::new(spec.rate, channels, bitrate)));
                }
                Err(SymphoniaError::IoError(e)) => {
                    self.note_skip(&mut consecutive_errors, "I/O error", &e)?;
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    self.note_skip(&mut consecutive_errors, "decode error", &e)?;
                }
                Err(e) => {
                    error!("Fatal decode error: {}", e);
                    return Err(PlaybackError::DecoderError(format!(
                        "Failed to decode packet: {}",
                        e
                    )));
                }
            }
        }
    }

    fn decode(&mut self, _header: &FrameHeader) -> Result<Vec<i16>> {
        Ok(std::mem::take(&mut self.pending))
    }

    fn codec(&self) -> AudioCodec {
        self.codec.clone()
    }
}

/// Builds a [`SymphoniaCodec`] for every (re)start of a line.
#[derive(Debug, Clone)]
pub struct SymphoniaCodecProvider {
    extension: Option<String>,
    mime_type: Option<String>,
    max_consecutive_errors: usize,
}

impl Default for SymphoniaCodecProvider {
    fn default() -> Self {
        Self {
            extension: None,
            mime_type: None,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
        }
    }
}

impl SymphoniaCodecProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider using the codec hint and error budget from `config`.
    pub fn from_config(config: &LineConfig) -> Self {
        Self {
            extension: config.codec_hint.clone(),
            mime_type: None,
            max_consecutive_errors: config.max_consecutive_decode_errors,
        }
    }

    /// Provider hinting the extension of `path`.
    pub fn for_path(path: &Path) -> Self {
        Self {
            extension: FormatDetector::extension_of(path).map(str::to_string),
            ..Self::default()
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_max_consecutive_errors(mut self, max: usize) -> Self {
        self.max_consecutive_errors = max;
        self
    }

    fn hint(&self) -> Hint {
        FormatDetector::probe_hint(self.extension.as_deref(), self.mime_type.as_deref())
    }
}

impl CodecProvider for SymphoniaCodecProvider {
    fn open(&self, source: SourceReader) -> Result<Box<dyn CodecAdapter>> {
        let codec = SymphoniaCodec::new(source, &self.hint(), self.max_consecutive_errors)?;
        Ok(Box::new(codec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ByteSource;
    use std::io::Cursor;

    /// Minimal RIFF/WAVE file holding signed 16-bit PCM.
    #[cfg(feature = "decoder-wav")]
    fn wav_bytes(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let block_align = channels * 2;
        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        out.extend_from_slice(&SampleConverter::to_le_bytes(samples));
        out
    }

    #[test]
    fn test_packet_bitrate() {
        // 1152-sample MP3 frame of 417 bytes at 44.1 kHz is ~128 kbit/s
        let bitrate = SymphoniaCodec::packet_bitrate(417, 1152, 44_100);
        assert!((127_000..=129_000).contains(&bitrate));
        assert_eq!(SymphoniaCodec::packet_bitrate(417, 0, 44_100), 0);
    }

    #[test]
    fn test_garbage_fails_probe() {
        let reader = SourceReader::new(ByteSource::one_shot(Cursor::new(vec![0x42u8; 512])));
        let result = SymphoniaCodecProvider::new().with_extension("mp3").open(reader);
        assert!(matches!(result, Err(PlaybackError::FormatUnavailable(_))));
    }

    #[test]
    fn test_provider_from_config() {
        let config = LineConfig {
            codec_hint: Some("ogg".to_string()),
            max_consecutive_decode_errors: 3,
            ..LineConfig::default()
        };
        let provider = SymphoniaCodecProvider::from_config(&config);
        assert_eq!(provider.extension.as_deref(), Some("ogg"));
        assert_eq!(provider.max_consecutive_errors, 3);

        let provider = SymphoniaCodecProvider::for_path(Path::new("/clips/hit.flac"));
        assert_eq!(provider.extension.as_deref(), Some("flac"));
    }

    #[cfg(feature = "decoder-wav")]
    #[test]
    fn test_decodes_pcm_wav() {
        let samples: Vec<i16> = (0..4_000).map(|i| (i % 2_000) as i16 - 1_000).collect();
        let bytes = wav_bytes(8_000, 1, &samples);
        let reader = SourceReader::new(ByteSource::one_shot(Cursor::new(bytes)));

        let mut codec = SymphoniaCodecProvider::new()
            .with_extension("wav")
            .open(reader)
            .expect("wav should probe");
        assert_eq!(codec.codec(), AudioCodec::Wav);

        let mut decoded = Vec::new();
        let mut first_header = None;
        while let Some(header) = codec.read_frame().expect("frame") {
            first_header.get_or_insert(header);
            decoded.extend(codec.decode(&header).expect("samples"));
        }

        let header = first_header.expect("at least one frame");
        assert_eq!(header.sample_rate, 8_000);
        assert_eq!(header.channels, 1);
        assert_eq!(header.bitrate, 128_000);
        assert_eq!(decoded, samples);
    }
}
