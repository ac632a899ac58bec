//! # Audio Decoder Module
//!
//! Codec adapters built on the Symphonia pure-Rust audio library.
//!
//! ## Supported Formats
//!
//! | Format | Codec | Feature Flag | License |
//! |--------|-------|--------------|---------|
//! | MP3 | MPEG-1/2 Audio Layer III | `decoder-mp3` | Patents expired |
//! | FLAC | Free Lossless Audio Codec | `decoder-flac` | BSD-3 |
//! | Vorbis | Ogg Vorbis | `decoder-vorbis` | BSD-3 |
//! | AAC | Advanced Audio Coding | `decoder-aac` | Patent-encumbered |
//! | WAV | Waveform Audio | `decoder-wav` | Public domain |
//! | ALAC | Apple Lossless | `decoder-alac` | Apache 2.0 |
//!
//! ## Architecture
//!
//! ```text
//! SourceReader → MediaSourceStream → FormatReader → Decoder → Vec<i16>
//! ```
//!
//! [`SymphoniaCodec`] reads one packet per frame. The line rebuilds it
//! through [`SymphoniaCodecProvider`] every time it restarts from the
//! beginning of a replayable source.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use core_playback::{AudioLine, LineConfig, SymphoniaCodecProvider};
//! use std::fs::File;
//! use std::sync::Arc;
//!
//! # fn example(sink: Arc<dyn bridge_traits::AudioSink>) -> core_playback::Result<()> {
//! let file = File::open("/clips/door.mp3")?;
//! let line = AudioLine::builder(file, sink)
//!     .config(LineConfig::clip())
//!     .codec(SymphoniaCodecProvider::new().with_extension("mp3"))
//!     .build()?;
//! line.open()?;
//! line.start()?;
//! # Ok(())
//! # }
//! ```
//!
//! [`SampleConverter`] is always available; its Symphonia buffer conversion
//! needs the `core-decoder` feature.

#[cfg(feature = "core-decoder")]
mod format_detector;

mod sample_converter;

#[cfg(feature = "core-decoder")]
mod symphonia;

#[cfg(feature = "core-decoder")]
pub use self::symphonia::{SymphoniaCodec, SymphoniaCodecProvider, DEFAULT_MAX_CONSECUTIVE_ERRORS};

#[cfg(feature = "core-decoder")]
pub use format_detector::FormatDetector;

pub use sample_converter::SampleConverter;
