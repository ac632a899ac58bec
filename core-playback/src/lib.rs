//! # Audio Line Engine
//!
//! Streams a compressed audio clip from any byte source, decodes it on a
//! dedicated thread and writes PCM to an output sink in real time.
//!
//! ## Overview
//!
//! This crate handles:
//! - Replayable byte sources that cache a forward-only stream
//! - Frame-by-frame decoding through a pluggable codec boundary
//!   (Symphonia by default, feature-gated)
//! - A start/stop/loop/seek transport driven by one decode worker per pass
//! - An optional desktop output sink built on cpal
//!
//! ## Architecture
//!
//! ```text
//! Read ─> ByteSource ─> FrameDecodePipeline ─> DecodeWorker ─> AudioSink
//!         (replay cache)   (codec adapter)       (thread)
//!                 ▲                                   │
//!                 └──────── AudioLine (transport) ◄───┘
//! ```

pub mod config;
pub mod decoder;
pub mod error;
pub mod line;
pub mod output;
pub mod pipeline;
pub mod replay;
pub mod ring_buffer;
pub mod source;
pub mod state;
pub mod traits;

mod worker;

pub use config::LineConfig;
pub use decoder::SampleConverter;
#[cfg(feature = "core-decoder")]
pub use decoder::{FormatDetector, SymphoniaCodec, SymphoniaCodecProvider};
pub use error::{PlaybackError, Result};
pub use line::{AudioLine, LineBuilder};
#[cfg(feature = "desktop-output")]
pub use output::CpalSink;
pub use pipeline::FrameDecodePipeline;
pub use replay::ReplayableByteSource;
pub use ring_buffer::RingBuffer;
pub use source::{ByteSource, SourceReader};
pub use state::{LoopCount, PlayUntil, PlaybackState, TransportState};
pub use traits::{
    AudioCodec, CodecAdapter, CodecProvider, Frame, FrameHeader, FormatNegotiable, Seekable,
    Transport,
};
