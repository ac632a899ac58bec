//! # Host Bridge Traits
//!
//! Abstraction traits the host application implements for the audio line
//! engine.
//!
//! ## Overview
//!
//! The playback core never talks to an audio device, a configuration file or
//! a logging backend directly. Each of those is a capability injected by the
//! host through one of the traits below, which keeps the engine testable with
//! in-memory fakes.
//!
//! ## Traits
//!
//! - [`AudioSink`](playback::AudioSink) - Blocking PCM output device
//! - [`SettingsStore`](storage::SettingsStore) - Named configuration values
//! - [`LoggerSink`](logger::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type for consistent
//! error handling. Implementations should:
//!
//! - Convert platform-specific errors to `BridgeError`
//! - Provide actionable error messages
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`. The playback core calls an
//! [`AudioSink`](playback::AudioSink) from both the controlling thread and the
//! decode worker thread.

pub mod error;
pub mod logger;
pub mod playback;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use logger::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use playback::{AudioSink, LineId, PcmFormat};
pub use storage::{MemorySettingsStore, SettingsStore};
