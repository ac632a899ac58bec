//! # Line Configuration
//!
//! Per-line knobs: replay caching, sink buffering and codec tolerance.

use core_runtime::config::AudioSettings;
use serde::{Deserialize, Serialize};

/// Audio line configuration.
///
/// Controls whether the byte stream is cached for replay, how large the
/// sink's buffer is and how forgiving the codec is with corrupt packets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineConfig {
    /// Cache every byte read from the source so the line can rewind, seek and
    /// loop.
    ///
    /// Default: false.
    #[serde(default = "default_enable_replay")]
    pub enable_replay: bool,

    /// Initial size of the replay cache in bytes. The cache doubles whenever
    /// it fills up.
    ///
    /// Default: 64 KiB.
    #[serde(default = "default_initial_cache_bytes")]
    pub initial_cache_bytes: usize,

    /// Buffer requested from the sink when it is opened, in sample frames.
    ///
    /// Default: 8192 frames (~186ms at 44.1kHz).
    #[serde(default = "default_sink_buffer_frames")]
    pub sink_buffer_frames: usize,

    /// Corrupt packets the codec may skip in a row before the decode pass
    /// fails.
    ///
    /// Default: 10.
    #[serde(default = "default_max_consecutive_decode_errors")]
    pub max_consecutive_decode_errors: usize,

    /// File extension used as a container hint when probing, e.g. `"mp3"`.
    #[serde(default)]
    pub codec_hint: Option<String>,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            enable_replay: default_enable_replay(),
            initial_cache_bytes: default_initial_cache_bytes(),
            sink_buffer_frames: default_sink_buffer_frames(),
            max_consecutive_decode_errors: default_max_consecutive_decode_errors(),
            codec_hint: None,
        }
    }
}

impl LineConfig {
    /// Configuration for long one-pass streams.
    ///
    /// - No replay cache
    /// - Larger sink buffer
    pub fn streaming() -> Self {
        Self {
            enable_replay: false,
            sink_buffer_frames: 16384,
            ..Default::default()
        }
    }

    /// Configuration for short clips that are looped and repositioned.
    ///
    /// - Replay cache enabled, starting at 256 KiB
    /// - Smaller sink buffer for quicker stops
    pub fn clip() -> Self {
        Self {
            enable_replay: true,
            initial_cache_bytes: 256 * 1024,
            sink_buffer_frames: 4096,
            ..Default::default()
        }
    }

    /// Build from settings loaded out of a host settings store.
    pub fn from_settings(settings: &AudioSettings) -> Self {
        Self {
            enable_replay: settings.enable_replay,
            initial_cache_bytes: settings.initial_cache_bytes,
            sink_buffer_frames: settings.sink_buffer_frames,
            max_consecutive_decode_errors: settings.max_consecutive_decode_errors,
            codec_hint: settings.codec_hint.clone(),
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.initial_cache_bytes == 0 {
            return Err("initial_cache_bytes must be > 0".to_string());
        }

        if self.sink_buffer_frames == 0 {
            return Err("sink_buffer_frames must be > 0".to_string());
        }

        if self.max_consecutive_decode_errors == 0 {
            return Err("max_consecutive_decode_errors must be > 0".to_string());
        }

        if let Some(hint) = &self.codec_hint {
            if hint.trim().is_empty() {
                return Err("codec_hint cannot be blank".to_string());
            }
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_enable_replay() -> bool {
    false
}

fn default_initial_cache_bytes() -> usize {
    64 * 1024
}

fn default_sink_buffer_frames() -> usize {
    8192
}

fn default_max_consecutive_decode_errors() -> usize {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LineConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.enable_replay);
        assert_eq!(config.initial_cache_bytes, 64 * 1024);
        assert_eq!(config.sink_buffer_frames, 8192);
    }

    #[test]
    fn test_presets() {
        let streaming = LineConfig::streaming();
        assert!(streaming.validate().is_ok());
        assert!(!streaming.enable_replay);

        let clip = LineConfig::clip();
        assert!(clip.validate().is_ok());
        assert!(clip.enable_replay);
        assert!(clip.sink_buffer_frames < streaming.sink_buffer_frames);
    }

    #[test]
    fn test_config_validation() {
        let mut config = LineConfig::default();

        config.sink_buffer_frames = 0;
        assert!(config.validate().is_err());

        config = LineConfig::default();
        config.max_consecutive_decode_errors = 0;
        assert!(config.validate().is_err());

        config = LineConfig::default();
        config.codec_hint = Some("  ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serde_defaults() {
        let config: LineConfig = serde_json::from_str(r#"{"enable_replay": true}"#).unwrap();
        assert!(config.enable_replay);
        assert_eq!(config.sink_buffer_frames, 8192);
        assert_eq!(config.codec_hint, None);
    }

    #[test]
    fn test_from_settings() {
        let settings = AudioSettings {
            enable_replay: true,
            codec_hint: Some("mp3".to_string()),
            ..AudioSettings::default()
        };
        let config = LineConfig::from_settings(&settings);
        assert!(config.enable_replay);
        assert_eq!(config.codec_hint.as_deref(), Some("mp3"));
        assert!(config.validate().is_ok());
    }
}
