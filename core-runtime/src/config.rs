//! # Engine Configuration Module
//!
//! Reads audio line tunables and logging settings from a host-provided
//! [`SettingsStore`].
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct an
//! `EngineConfig`. The builder enforces fail-fast validation: a missing
//! settings store is reported as [`Error::CapabilityMissing`], and a value of
//! the wrong type or outside its allowed range as [`Error::Config`], naming
//! the offending key.
//!
//! ## Recognised keys
//!
//! | Key | Type | Default |
//! |-----|------|---------|
//! | `audio.replay` | bool | `false` |
//! | `audio.cache_bytes` | integer | 65536 |
//! | `audio.sink_buffer_frames` | integer | 8192 |
//! | `audio.max_decode_errors` | integer | 10 |
//! | `audio.codec_hint` | string | none |
//! | `log.level` | string | `info` |
//! | `log.format` | string | build dependent |
//! | `log.filter` | string | none |
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_traits::storage::MemorySettingsStore;
//! use core_runtime::config::EngineConfig;
//! use std::sync::Arc;
//!
//! let store = MemorySettingsStore::from_pairs([("audio.replay", "true")]);
//! let config = EngineConfig::builder()
//!     .settings_store(Arc::new(store))
//!     .build()
//!     .expect("Failed to build config");
//!
//! assert!(config.audio.enable_replay);
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use crate::logging::{LogFormat, LoggingConfig};
use bridge_traits::logger::{LogLevel, LoggerSink};
use bridge_traits::SettingsStore;
use std::sync::Arc;

pub const KEY_REPLAY: &str = "audio.replay";
pub const KEY_CACHE_BYTES: &str = "audio.cache_bytes";
pub const KEY_SINK_BUFFER_FRAMES: &str = "audio.sink_buffer_frames";
pub const KEY_MAX_DECODE_ERRORS: &str = "audio.max_decode_errors";
pub const KEY_CODEC_HINT: &str = "audio.codec_hint";
pub const KEY_LOG_LEVEL: &str = "log.level";
pub const KEY_LOG_FORMAT: &str = "log.format";
pub const KEY_LOG_FILTER: &str = "log.filter";

const DEFAULT_CACHE_BYTES: usize = 64 * 1024;
const DEFAULT_SINK_BUFFER_FRAMES: usize = 8192;
const DEFAULT_MAX_DECODE_ERRORS: usize = 10;

/// Upper bound for the initial replay cache allocation.
const MAX_CACHE_BYTES: usize = 256 * 1024 * 1024;

/// Audio line settings as read from the settings store.
///
/// The playback crate turns this into its own line configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSettings {
    /// Capture the byte stream so the line can rewind, loop and seek.
    pub enable_replay: bool,
    /// Initial replay cache capacity in bytes.
    pub initial_cache_bytes: usize,
    /// Frames of PCM the output sink buffers ahead of the device.
    pub sink_buffer_frames: usize,
    /// Consecutive corrupt packets tolerated before decoding gives up.
    pub max_consecutive_decode_errors: usize,
    /// Container/codec hint (file extension) for format probing.
    pub codec_hint: Option<String>,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            enable_replay: false,
            initial_cache_bytes: DEFAULT_CACHE_BYTES,
            sink_buffer_frames: DEFAULT_SINK_BUFFER_FRAMES,
            max_consecutive_decode_errors: DEFAULT_MAX_DECODE_ERRORS,
            codec_hint: None,
        }
    }
}

impl AudioSettings {
    /// Read every `audio.*` key, falling back to defaults for absent ones.
    pub fn load(store: &dyn SettingsStore) -> Result<Self> {
        let defaults = Self::default();

        let settings = Self {
            enable_replay: store
                .get_bool(KEY_REPLAY)
                .map_err(|e| setting_error(KEY_REPLAY, e))?
                .unwrap_or(defaults.enable_replay),
            initial_cache_bytes: read_usize(store, KEY_CACHE_BYTES)?
                .unwrap_or(defaults.initial_cache_bytes),
            sink_buffer_frames: read_usize(store, KEY_SINK_BUFFER_FRAMES)?
                .unwrap_or(defaults.sink_buffer_frames),
            max_consecutive_decode_errors: read_usize(store, KEY_MAX_DECODE_ERRORS)?
                .unwrap_or(defaults.max_consecutive_decode_errors),
            codec_hint: store
                .get_string(KEY_CODEC_HINT)
                .map_err(|e| setting_error(KEY_CODEC_HINT, e))?
                .map(|hint| hint.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|hint| !hint.is_empty()),
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Validates value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.initial_cache_bytes == 0 {
            return Err(Error::Config(format!(
                "{} must be greater than 0",
                KEY_CACHE_BYTES
            )));
        }

        if self.initial_cache_bytes > MAX_CACHE_BYTES {
            return Err(Error::Config(format!(
                "{} exceeds maximum of {} bytes",
                KEY_CACHE_BYTES, MAX_CACHE_BYTES
            )));
        }

        if self.sink_buffer_frames == 0 {
            return Err(Error::Config(format!(
                "{} must be greater than 0",
                KEY_SINK_BUFFER_FRAMES
            )));
        }

        if self.max_consecutive_decode_errors == 0 {
            return Err(Error::Config(format!(
                "{} must be at least 1",
                KEY_MAX_DECODE_ERRORS
            )));
        }

        Ok(())
    }
}

fn setting_error(key: &str, err: bridge_traits::BridgeError) -> Error {
    Error::Config(format!("Failed to read {}: {}", key, err))
}

fn read_usize(store: &dyn SettingsStore, key: &str) -> Result<Option<usize>> {
    let Some(value) = store.get_i64(key).map_err(|e| setting_error(key, e))? else {
        return Ok(None);
    };

    usize::try_from(value)
        .map(Some)
        .map_err(|_| Error::Config(format!("{} must not be negative (got {})", key, value)))
}

fn load_logging(store: &dyn SettingsStore) -> Result<LoggingConfig> {
    let mut logging = LoggingConfig::default();

    if let Some(level) = store
        .get_string(KEY_LOG_LEVEL)
        .map_err(|e| setting_error(KEY_LOG_LEVEL, e))?
    {
        let level = LogLevel::parse(&level)
            .ok_or_else(|| Error::Config(format!("Unknown {}: {}", KEY_LOG_LEVEL, level)))?;
        logging = logging.with_level(level);
    }

    if let Some(format) = store
        .get_string(KEY_LOG_FORMAT)
        .map_err(|e| setting_error(KEY_LOG_FORMAT, e))?
    {
        logging = logging.with_format(format.parse::<LogFormat>()?);
    }

    if let Some(filter) = store
        .get_string(KEY_LOG_FILTER)
        .map_err(|e| setting_error(KEY_LOG_FILTER, e))?
    {
        logging = logging.with_filter(filter);
    }

    Ok(logging)
}

/// Engine configuration.
///
/// Use [`EngineConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct EngineConfig {
    /// Store the settings were read from (kept for later lookups by the host)
    pub settings_store: Arc<dyn SettingsStore>,

    /// Audio line settings
    pub audio: AudioSettings,

    /// Logging settings, with the logger sink attached when one was provided
    pub logging: LoggingConfig,

    /// Capacity of each line's event channel
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("settings_store", &"SettingsStore { ... }")
            .field("audio", &self.audio)
            .field("logging", &self.logging)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl EngineConfig {
    /// Creates a new builder for constructing an `EngineConfig`.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

/// Builder for constructing [`EngineConfig`] instances.
#[derive(Default)]
pub struct EngineConfigBuilder {
    settings_store: Option<Arc<dyn SettingsStore>>,
    logger_sink: Option<Arc<dyn LoggerSink>>,
    event_buffer_size: Option<usize>,
}

impl EngineConfigBuilder {
    /// Sets the settings store implementation (required).
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Sets the logger sink that mirrors tracing events to the host.
    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    /// Sets the per-line event channel capacity.
    ///
    /// Default: 100 events
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Reads and validates every setting.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] if no settings store was provided
    /// - [`Error::Config`] for malformed or out-of-range values
    pub fn build(self) -> Result<EngineConfig> {
        let settings_store = self.settings_store.ok_or_else(|| Error::CapabilityMissing {
            capability: "SettingsStore".to_string(),
            message: "A SettingsStore is required to read audio configuration. \
                      Use MemorySettingsStore for in-process defaults or inject the \
                      host's configuration file reader."
                .to_string(),
        })?;

        let event_buffer_size = self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE);
        if event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        let audio = AudioSettings::load(settings_store.as_ref())?;
        let mut logging = load_logging(settings_store.as_ref())?;
        if let Some(sink) = self.logger_sink {
            logging = logging.with_logger_sink(sink);
        }

        Ok(EngineConfig {
            settings_store,
            audio,
            logging,
            event_buffer_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::logger::ConsoleLogger;
    use bridge_traits::storage::MemorySettingsStore;

    fn store(pairs: &[(&str, &str)]) -> Arc<dyn SettingsStore> {
        Arc::new(MemorySettingsStore::from_pairs(pairs.iter().copied()))
    }

    #[test]
    fn test_builder_requires_settings_store() {
        let result = EngineConfig::builder().build();
        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "SettingsStore")
            }
            other => panic!("expected CapabilityMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults_from_empty_store() {
        let config = EngineConfig::builder()
            .settings_store(store(&[]))
            .build()
            .unwrap();

        assert_eq!(config.audio, AudioSettings::default());
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert!(config.logging.logger_sink.is_none());
    }

    #[test]
    fn test_reads_audio_keys() {
        let config = EngineConfig::builder()
            .settings_store(store(&[
                (KEY_REPLAY, "true"),
                (KEY_CACHE_BYTES, "1024"),
                (KEY_SINK_BUFFER_FRAMES, "2048"),
                (KEY_MAX_DECODE_ERRORS, "3"),
                (KEY_CODEC_HINT, ".MP3"),
            ]))
            .build()
            .unwrap();

        assert!(config.audio.enable_replay);
        assert_eq!(config.audio.initial_cache_bytes, 1024);
        assert_eq!(config.audio.sink_buffer_frames, 2048);
        assert_eq!(config.audio.max_consecutive_decode_errors, 3);
        assert_eq!(config.audio.codec_hint.as_deref(), Some("mp3"));
    }

    #[test]
    fn test_reads_logging_keys() {
        let config = EngineConfig::builder()
            .settings_store(store(&[
                (KEY_LOG_LEVEL, "debug"),
                (KEY_LOG_FORMAT, "json"),
                (KEY_LOG_FILTER, "core_playback=trace"),
            ]))
            .logger_sink(Arc::new(ConsoleLogger::default()))
            .build()
            .unwrap();

        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(
            config.logging.filter.as_deref(),
            Some("core_playback=trace")
        );
        assert!(config.logging.logger_sink.is_some());
    }

    #[test]
    fn test_rejects_negative_size() {
        let err = EngineConfig::builder()
            .settings_store(store(&[(KEY_CACHE_BYTES, "-1")]))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains(KEY_CACHE_BYTES));
    }

    #[test]
    fn test_rejects_zero_sink_buffer() {
        let err = EngineConfig::builder()
            .settings_store(store(&[(KEY_SINK_BUFFER_FRAMES, "0")]))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_bad_bool() {
        let err = EngineConfig::builder()
            .settings_store(store(&[(KEY_REPLAY, "sometimes")]))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains(KEY_REPLAY));
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let result = EngineConfig::builder()
            .settings_store(store(&[(KEY_LOG_LEVEL, "chatty")]))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_zero_event_buffer() {
        let result = EngineConfig::builder()
            .settings_store(store(&[]))
            .event_buffer_size(0)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_blank_codec_hint_ignored() {
        let config = EngineConfig::builder()
            .settings_store(store(&[(KEY_CODEC_HINT, "  ")]))
            .build()
            .unwrap();
        assert_eq!(config.audio.codec_hint, None);
    }

    #[test]
    fn test_config_is_cloneable() {
        let config = EngineConfig::builder()
            .settings_store(store(&[(KEY_REPLAY, "yes")]))
            .build()
            .unwrap();
        let cloned = config.clone();
        assert_eq!(cloned.audio, config.audio);
    }
}
