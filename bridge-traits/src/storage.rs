//! Settings Storage Abstractions
//!
//! Provides the named-value lookup the engine reads its tunables from. Hosts
//! back it with whatever they already use for configuration (a key-value
//! config file, platform preferences, a test fixture).

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{BridgeError, Result};

/// Key-value settings storage trait
///
/// Abstracts platform-specific configuration storage:
/// - Desktop: key-value config files
/// - Mobile: UserDefaults / SharedPreferences
/// - Tests: [`MemorySettingsStore`]
///
/// Getters return `Ok(None)` when the key is absent and
/// [`BridgeError::InvalidSetting`] when it holds a value of another type.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// fn replay_enabled(store: &dyn SettingsStore) -> Result<bool> {
///     Ok(store.get_bool("audio.replay")?.unwrap_or(false))
/// }
/// ```
pub trait SettingsStore: Send + Sync {
    /// Store a string value
    fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value
    fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Store a boolean value
    fn set_bool(&self, key: &str, value: bool) -> Result<()>;

    /// Retrieve a boolean value
    fn get_bool(&self, key: &str) -> Result<Option<bool>>;

    /// Store an integer value
    fn set_i64(&self, key: &str, value: i64) -> Result<()>;

    /// Retrieve an integer value
    fn get_i64(&self, key: &str) -> Result<Option<i64>>;

    /// Store a floating-point value
    fn set_f64(&self, key: &str, value: f64) -> Result<()>;

    /// Retrieve a floating-point value
    fn get_f64(&self, key: &str) -> Result<Option<f64>>;

    /// Delete a setting
    fn delete(&self, key: &str) -> Result<()>;

    /// Check if a setting exists
    fn has_key(&self, key: &str) -> Result<bool>;

    /// List all setting keys
    fn list_keys(&self) -> Result<Vec<String>>;
}

/// In-process [`SettingsStore`] holding JSON values.
///
/// Strings that parse as the requested type are accepted by the typed
/// getters, so values loaded verbatim from a text config file
/// (`audio.replay = true`) behave like natively typed ones.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: RwLock<BTreeMap<String, Value>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from `(key, value)` string pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), Value::String(v.into())))
            .collect();
        Self {
            values: RwLock::new(values),
        }
    }

    fn get_with<T>(
        &self,
        key: &str,
        expected: &str,
        native: impl Fn(&Value) -> Option<T>,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<Option<T>> {
        let values = self.values.read();
        let Some(value) = values.get(key) else {
            return Ok(None);
        };

        native(value)
            .or_else(|| value.as_str().and_then(|s| parse(s.trim())))
            .map(Some)
            .ok_or_else(|| BridgeError::InvalidSetting {
                key: key.to_string(),
                message: format!("expected {}, found {}", expected, value),
            })
    }

    fn set(&self, key: &str, value: Value) {
        self.values.write().insert(key.to_string(), value);
    }
}

impl SettingsStore for MemorySettingsStore {
    fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.set(key, Value::String(value.to_string()));
        Ok(())
    }

    fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.get_with(
            key,
            "string",
            |v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            },
            |s| Some(s.to_string()),
        )
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set(key, Value::Bool(value));
        Ok(())
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.get_with(key, "boolean", Value::as_bool, |s| {
            match s.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" => Some(false),
                _ => None,
            }
        })
    }

    fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        self.set(key, Value::from(value));
        Ok(())
    }

    fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        self.get_with(key, "integer", Value::as_i64, |s| s.parse().ok())
    }

    fn set_f64(&self, key: &str, value: f64) -> Result<()> {
        let number = serde_json::Number::from_f64(value).ok_or_else(|| {
            BridgeError::InvalidSetting {
                key: key.to_string(),
                message: format!("{} is not a finite number", value),
            }
        })?;
        self.set(key, Value::Number(number));
        Ok(())
    }

    fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        self.get_with(key, "number", Value::as_f64, |s| s.parse().ok())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.values.write().remove(key);
        Ok(())
    }

    fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.values.read().contains_key(key))
    }

    fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.values.read().keys().cloned().collect())
    }
}
