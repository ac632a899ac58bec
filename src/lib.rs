//! # Clipline
//!
//! Umbrella crate for the audio line engine. It re-exports the public surface
//! of the workspace crates so hosts can depend on a single crate and pick
//! codecs and the desktop output through features:
//!
//! | Feature          | Enables                                   |
//! |------------------|-------------------------------------------|
//! | `decoder-all`    | Every Symphonia codec below (default)     |
//! | `decoder-mp3`    | MPEG audio layers I-III                   |
//! | `decoder-flac`   | FLAC                                      |
//! | `decoder-vorbis` | Ogg Vorbis                                |
//! | `decoder-aac`    | AAC in MP4 containers                     |
//! | `decoder-wav`    | PCM in WAV containers                     |
//! | `decoder-alac`   | Apple Lossless                            |
//! | `desktop-output` | [`CpalSink`] on the default output device |
//!
//! ```rust,ignore
//! use clipline::{AudioLine, CpalSink, LineConfig, LoopCount};
//! use std::sync::Arc;
//!
//! let sink = Arc::new(CpalSink::new()?);
//! let line = AudioLine::builder(std::fs::File::open("bell.ogg")?, sink)
//!     .config(LineConfig::clip())
//!     .build()?;
//! line.open()?;
//! line.loop_playback(LoopCount::Times(2))?;
//! ```

pub use bridge_traits::{
    AudioSink, BridgeError, ConsoleLogger, LineId, LogLevel, LoggerSink, MemorySettingsStore,
    PcmFormat, SettingsStore,
};
pub use core_playback::{
    AudioCodec, AudioLine, ByteSource, CodecAdapter, CodecProvider, FormatNegotiable, Frame,
    FrameDecodePipeline, FrameHeader, LineBuilder, LineConfig, LoopCount, PlayUntil,
    PlaybackError, PlaybackState, ReplayableByteSource, Seekable, SourceReader, Transport,
};
#[cfg(any(
    feature = "decoder-mp3",
    feature = "decoder-flac",
    feature = "decoder-vorbis",
    feature = "decoder-aac",
    feature = "decoder-wav",
    feature = "decoder-alac"
))]
pub use core_playback::{FormatDetector, SymphoniaCodecProvider};
#[cfg(feature = "desktop-output")]
pub use core_playback::CpalSink;
pub use core_runtime::config::{AudioSettings, EngineConfig};
pub use core_runtime::events::{EventBus, LineEvent, StopReason};
pub use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};

/// Crate-wide result type.
pub type Result<T> = core_playback::Result<T>;
