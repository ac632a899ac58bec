//! Probe hints and codec identification.
//!
//! A line's byte stream carries no name, so the only help the Symphonia
//! probe gets is what the host passes in: an extension (from
//! [`LineConfig::codec_hint`](crate::LineConfig) or a file path) and
//! optionally a MIME type. Everything else is sniffed from the first bytes.

use crate::error::{PlaybackError, Result};
use crate::traits::AudioCodec;
use std::path::Path;
use symphonia::core::codecs::{
    CodecType, CODEC_TYPE_AAC, CODEC_TYPE_ALAC, CODEC_TYPE_FLAC, CODEC_TYPE_MP1, CODEC_TYPE_MP2,
    CODEC_TYPE_MP3, CODEC_TYPE_OPUS, CODEC_TYPE_PCM_F32BE, CODEC_TYPE_PCM_F32LE,
    CODEC_TYPE_PCM_F64BE, CODEC_TYPE_PCM_F64LE, CODEC_TYPE_PCM_S16BE, CODEC_TYPE_PCM_S16LE,
    CODEC_TYPE_PCM_S24BE, CODEC_TYPE_PCM_S24LE, CODEC_TYPE_PCM_S32BE, CODEC_TYPE_PCM_S32LE,
    CODEC_TYPE_PCM_U8, CODEC_TYPE_VORBIS,
};
use symphonia::core::probe::Hint;
use tracing::{debug, trace};

const MPEG_LAYERS: &[CodecType] = &[CODEC_TYPE_MP1, CODEC_TYPE_MP2, CODEC_TYPE_MP3];

const PCM_VARIANTS: &[CodecType] = &[
    CODEC_TYPE_PCM_U8,
    CODEC_TYPE_PCM_S16LE,
    CODEC_TYPE_PCM_S16BE,
    CODEC_TYPE_PCM_S24LE,
    CODEC_TYPE_PCM_S24BE,
    CODEC_TYPE_PCM_S32LE,
    CODEC_TYPE_PCM_S32BE,
    CODEC_TYPE_PCM_F32LE,
    CODEC_TYPE_PCM_F32BE,
    CODEC_TYPE_PCM_F64LE,
    CODEC_TYPE_PCM_F64BE,
];

/// Stateless helpers around Symphonia's probe.
pub struct FormatDetector;

impl FormatDetector {
    /// Build a probe hint. Blank values are ignored and a leading dot on the
    /// extension is stripped, so `".ogg"` and `"ogg"` are equivalent.
    pub fn probe_hint(extension: Option<&str>, mime_type: Option<&str>) -> Hint {
        let mut hint = Hint::new();

        let extension = extension
            .map(|ext| ext.trim().trim_start_matches('.'))
            .filter(|ext| !ext.is_empty());
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let mime_type = mime_type.map(str::trim).filter(|mime| !mime.is_empty());
        if let Some(mime) = mime_type {
            hint.mime_type(mime);
        }

        if extension.is_none() && mime_type.is_none() {
            trace!("Probing without a hint");
        } else {
            debug!(?extension, ?mime_type, "Probe hint");
        }
        hint
    }

    /// Extension of `path`, if it has a UTF-8 one.
    ///
    /// ```rust
    /// use core_playback::FormatDetector;
    /// use std::path::Path;
    ///
    /// assert_eq!(FormatDetector::extension_of(Path::new("sfx/click.mp3")), Some("mp3"));
    /// assert_eq!(FormatDetector::extension_of(Path::new("sfx/click")), None);
    /// ```
    pub fn extension_of(path: &Path) -> Option<&str> {
        path.extension().and_then(|ext| ext.to_str())
    }

    /// Which [`AudioCodec`] a Symphonia track uses.
    pub fn detect_codec(codec_type: CodecType) -> AudioCodec {
        let codec = match codec_type {
            t if MPEG_LAYERS.contains(&t) => AudioCodec::Mp3,
            t if PCM_VARIANTS.contains(&t) => AudioCodec::Wav,
            t if t == CODEC_TYPE_AAC => AudioCodec::Aac,
            t if t == CODEC_TYPE_FLAC => AudioCodec::Flac,
            t if t == CODEC_TYPE_VORBIS => AudioCodec::Vorbis,
            t if t == CODEC_TYPE_OPUS => AudioCodec::Opus,
            t if t == CODEC_TYPE_ALAC => AudioCodec::Alac,
            _ => AudioCodec::Unknown,
        };
        if codec == AudioCodec::Unknown {
            debug!(?codec_type, "Track uses a codec with no mapping");
        }
        codec
    }

    /// Fails with [`PlaybackError::UnsupportedCodec`] unless a decoder for
    /// `codec` was compiled in.
    pub fn validate_codec_support(codec: &AudioCodec) -> Result<()> {
        let feature = match codec {
            AudioCodec::Mp3 if cfg!(feature = "decoder-mp3") => return Ok(()),
            AudioCodec::Flac if cfg!(feature = "decoder-flac") => return Ok(()),
            AudioCodec::Vorbis if cfg!(feature = "decoder-vorbis") => return Ok(()),
            AudioCodec::Aac if cfg!(feature = "decoder-aac") => return Ok(()),
            AudioCodec::Wav if cfg!(feature = "decoder-wav") => return Ok(()),
            AudioCodec::Alac if cfg!(feature = "decoder-alac") => return Ok(()),
            AudioCodec::Mp3 => "decoder-mp3",
            AudioCodec::Flac => "decoder-flac",
            AudioCodec::Vorbis => "decoder-vorbis",
            AudioCodec::Aac => "decoder-aac",
            AudioCodec::Wav => "decoder-wav",
            AudioCodec::Alac => "decoder-alac",
            AudioCodec::Opus => {
                return Err(PlaybackError::UnsupportedCodec(
                    "no Opus decoder is available".to_string(),
                ))
            }
            AudioCodec::Unknown => {
                return Err(PlaybackError::UnsupportedCodec(
                    "stream codec not recognised".to_string(),
                ))
            }
            AudioCodec::Other(name) => {
                return Err(PlaybackError::UnsupportedCodec(name.clone()));
            }
        };

        Err(PlaybackError::UnsupportedCodec(format!(
            "{:?} support is compiled out (feature `{}`)",
            codec, feature
        )))
    }
}
