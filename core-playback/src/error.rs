//! # Playback Error Types
//!
//! Error types for audio line operations.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Format/Codec Errors
    // ========================================================================
    /// No decodable frame could be read when probing the stream.
    #[error("Audio format unavailable: {0}")]
    FormatUnavailable(String),

    /// Codec is not supported by the decoder.
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// A frame reported a different sample rate or channel count than the
    /// first frame of the stream.
    #[error("Stream format changed mid-stream: expected {expected}, found {found}")]
    FormatChanged { expected: String, found: String },

    // ========================================================================
    // Decoding Errors
    // ========================================================================
    /// Error occurred during audio decoding.
    #[error("Decoding error: {0}")]
    DecodingError(String),

    /// Audio stream is corrupted or contains invalid data.
    #[error("Corrupted audio stream: {0}")]
    CorruptedStream(String),

    /// Decoder encountered an internal error.
    #[error("Decoder internal error: {0}")]
    DecoderError(String),

    // ========================================================================
    // Playback Control Errors
    // ========================================================================
    /// Operation needs the replay cache, which this line was built without.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Requested frame lies beyond the end of the stream.
    #[error("Seek position out of bounds: frame {requested} of {total}")]
    SeekOutOfBounds { requested: u64, total: u64 },

    /// Invalid volume value (must be in range [0.0, 1.0]).
    #[error("Invalid volume: {0} (must be between 0.0 and 1.0)")]
    InvalidVolume(f32),

    /// Invalid balance value (must be in range [-1.0, 1.0]).
    #[error("Invalid balance: {0} (must be between -1.0 and 1.0)")]
    InvalidBalance(f32),

    // ========================================================================
    // Output Errors
    // ========================================================================
    /// The output sink could not be opened or started, or the line is closed.
    #[error("Audio line unavailable: {0}")]
    LineUnavailable(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Line configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, PlaybackError::LineUnavailable(_))
    }

    /// Returns `true` if this error is related to audio format/codec issues.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::FormatUnavailable(_)
                | PlaybackError::UnsupportedCodec(_)
                | PlaybackError::FormatChanged { .. }
        )
    }

    /// Returns `true` if this error came out of the codec while decoding.
    ///
    /// A decode pass that ends with one of these is treated as having reached
    /// the end of the stream.
    pub fn is_decode_failure(&self) -> bool {
        matches!(
            self,
            PlaybackError::DecodingError(_)
                | PlaybackError::CorruptedStream(_)
                | PlaybackError::DecoderError(_)
                | PlaybackError::FormatChanged { .. }
        )
    }
}

impl From<BridgeError> for PlaybackError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Io(e) => PlaybackError::IoError(e),
            other => PlaybackError::LineUnavailable(other.to_string()),
        }
    }
}

impl From<core_runtime::Error> for PlaybackError {
    fn from(err: core_runtime::Error) -> Self {
        PlaybackError::Config(err.to_string())
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
