//! Process-wide type mapping defaults
//!
//! Four settings fill in attributes a column leaves unspecified: string length,
//! binary length, decimal precision and decimal scale. Each is its own atomic, so
//! writers never block readers. Resolution takes one [`TypeMappingSettings`]
//! snapshot per call; there is no atomicity across settings.

use super::UNLIMITED;
use crate::{Result, SchemataError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI32, Ordering};

pub const DEFAULT_STRING_LENGTH: i32 = UNLIMITED;
pub const DEFAULT_BINARY_LENGTH: i32 = UNLIMITED;
pub const DEFAULT_DECIMAL_PRECISION: i32 = 16;
pub const DEFAULT_DECIMAL_SCALE: i32 = 4;
pub const MAX_DECIMAL_PRECISION: i32 = 38;

static STRING_LENGTH: AtomicI32 = AtomicI32::new(DEFAULT_STRING_LENGTH);
static BINARY_LENGTH: AtomicI32 = AtomicI32::new(DEFAULT_BINARY_LENGTH);
static DECIMAL_PRECISION: AtomicI32 = AtomicI32::new(DEFAULT_DECIMAL_PRECISION);
static DECIMAL_SCALE: AtomicI32 = AtomicI32::new(DEFAULT_DECIMAL_SCALE);

/// A consistent view of the defaults, or a set of values to apply.
///
/// Loadable from TOML, either at the top level or under `[type_mapping]`:
///
/// ```toml
/// [type_mapping]
/// string_length = 255
/// decimal_precision = 18
/// decimal_scale = 2
/// ```
///
/// A length of `-1` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeMappingSettings {
    pub string_length: i32,
    pub binary_length: i32,
    pub decimal_precision: i32,
    pub decimal_scale: i32,
}

impl Default for TypeMappingSettings {
    fn default() -> Self {
        Self {
            string_length: DEFAULT_STRING_LENGTH,
            binary_length: DEFAULT_BINARY_LENGTH,
            decimal_precision: DEFAULT_DECIMAL_PRECISION,
            decimal_scale: DEFAULT_DECIMAL_SCALE,
        }
    }
}

#[derive(Deserialize)]
struct SettingsFile {
    type_mapping: Option<TypeMappingSettings>,
}

impl TypeMappingSettings {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let value: toml::Value = toml::from_str(source)
            .map_err(|e| SchemataError::Configuration(format!("invalid type mapping TOML: {}", e)))?;
        let settings = if value.get("type_mapping").is_some() {
            let file: SettingsFile = value.try_into().map_err(|e: toml::de::Error| {
                SchemataError::Configuration(format!("invalid type mapping TOML: {}", e))
            })?;
            file.type_mapping.unwrap_or_default()
        } else {
            value.try_into().map_err(|e: toml::de::Error| {
                SchemataError::Configuration(format!("invalid type mapping TOML: {}", e))
            })?
        };
        settings.validated()
    }

    /// Check every value, normalising `-1` lengths to the unlimited sentinel.
    pub fn validated(self) -> Result<Self> {
        Ok(Self {
            string_length: validate_length("string length", self.string_length)?,
            binary_length: validate_length("binary length", self.binary_length)?,
            decimal_precision: validate_precision(self.decimal_precision)?,
            decimal_scale: validate_scale(self.decimal_scale)?,
        })
    }

    /// Scale as used for a given precision: never larger than it.
    pub fn scale_for(&self, precision: i32) -> i32 {
        self.decimal_scale.min(precision)
    }
}

fn validate_length(setting: &str, value: i32) -> Result<i32> {
    match value {
        -1 => Ok(UNLIMITED),
        v if v > 0 => Ok(v),
        v => Err(SchemataError::Configuration(format!(
            "default {} must be positive or unlimited, got {}",
            setting, v
        ))),
    }
}

fn validate_precision(value: i32) -> Result<i32> {
    if (1..=MAX_DECIMAL_PRECISION).contains(&value) {
        Ok(value)
    } else {
        Err(SchemataError::Configuration(format!(
            "default decimal precision must be between 1 and {}, got {}",
            MAX_DECIMAL_PRECISION, value
        )))
    }
}

fn validate_scale(value: i32) -> Result<i32> {
    if (0..=MAX_DECIMAL_PRECISION).contains(&value) {
        Ok(value)
    } else {
        Err(SchemataError::Configuration(format!(
            "default decimal scale must be between 0 and {}, got {}",
            MAX_DECIMAL_PRECISION, value
        )))
    }
}

/// Accessors for the process-wide defaults.
pub struct TypeMappingDefaults;

impl TypeMappingDefaults {
    pub fn string_length() -> i32 {
        STRING_LENGTH.load(Ordering::Acquire)
    }

    pub fn binary_length() -> i32 {
        BINARY_LENGTH.load(Ordering::Acquire)
    }

    pub fn decimal_precision() -> i32 {
        DECIMAL_PRECISION.load(Ordering::Acquire)
    }

    pub fn decimal_scale() -> i32 {
        DECIMAL_SCALE.load(Ordering::Acquire)
    }

    pub fn set_string_length(length: i32) -> Result<()> {
        let length = validate_length("string length", length)?;
        STRING_LENGTH.store(length, Ordering::Release);
        tracing::debug!(length, "default string length changed");
        Ok(())
    }

    pub fn set_binary_length(length: i32) -> Result<()> {
        let length = validate_length("binary length", length)?;
        BINARY_LENGTH.store(length, Ordering::Release);
        tracing::debug!(length, "default binary length changed");
        Ok(())
    }

    pub fn set_decimal_precision(precision: i32) -> Result<()> {
        let precision = validate_precision(precision)?;
        DECIMAL_PRECISION.store(precision, Ordering::Release);
        tracing::debug!(precision, "default decimal precision changed");
        Ok(())
    }

    pub fn set_decimal_scale(scale: i32) -> Result<()> {
        let scale = validate_scale(scale)?;
        DECIMAL_SCALE.store(scale, Ordering::Release);
        tracing::debug!(scale, "default decimal scale changed");
        Ok(())
    }

    /// Validate all four values, then store them.
    pub fn apply(settings: &TypeMappingSettings) -> Result<()> {
        let settings = settings.validated()?;
        STRING_LENGTH.store(settings.string_length, Ordering::Release);
        BINARY_LENGTH.store(settings.binary_length, Ordering::Release);
        DECIMAL_PRECISION.store(settings.decimal_precision, Ordering::Release);
        DECIMAL_SCALE.store(settings.decimal_scale, Ordering::Release);
        tracing::info!(?settings, "type mapping defaults applied");
        Ok(())
    }

    pub fn reset() {
        STRING_LENGTH.store(DEFAULT_STRING_LENGTH, Ordering::Release);
        BINARY_LENGTH.store(DEFAULT_BINARY_LENGTH, Ordering::Release);
        DECIMAL_PRECISION.store(DEFAULT_DECIMAL_PRECISION, Ordering::Release);
        DECIMAL_SCALE.store(DEFAULT_DECIMAL_SCALE, Ordering::Release);
    }

    /// Read each setting once. The scale is clamped to the precision.
    pub fn snapshot() -> TypeMappingSettings {
        let decimal_precision = Self::decimal_precision();
        TypeMappingSettings {
            string_length: Self::string_length(),
            binary_length: Self::binary_length(),
            decimal_precision,
            decimal_scale: Self::decimal_scale().min(decimal_precision),
        }
    }
}

/// Serialises tests that touch the process-wide defaults.
#[cfg(test)]
pub(crate) fn defaults_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_defaults() {
        let _guard = defaults_lock();
        TypeMappingDefaults::reset();
        assert_eq!(TypeMappingDefaults::snapshot(), TypeMappingSettings::default());
        assert_eq!(TypeMappingDefaults::string_length(), UNLIMITED);
        assert_eq!(TypeMappingDefaults::decimal_precision(), 16);
        assert_eq!(TypeMappingDefaults::decimal_scale(), 4);
    }

    #[test]
    fn setters_validate() {
        let _guard = defaults_lock();
        TypeMappingDefaults::reset();

        assert!(matches!(
            TypeMappingDefaults::set_decimal_precision(0),
            Err(SchemataError::Configuration(_))
        ));
        assert!(TypeMappingDefaults::set_decimal_precision(39).is_err());
        assert!(TypeMappingDefaults::set_decimal_scale(-1).is_err());
        assert!(TypeMappingDefaults::set_string_length(0).is_err());
        assert!(TypeMappingDefaults::set_binary_length(-5).is_err());

        TypeMappingDefaults::set_string_length(UNLIMITED).unwrap();
        TypeMappingDefaults::set_binary_length(-1).unwrap();
        assert_eq!(TypeMappingDefaults::binary_length(), UNLIMITED);

        // rejected writes leave the previous value
        assert_eq!(TypeMappingDefaults::decimal_precision(), 16);
        TypeMappingDefaults::reset();
    }

    #[test]
    fn snapshot_clamps_scale_to_precision() {
        let _guard = defaults_lock();
        TypeMappingDefaults::reset();
        TypeMappingDefaults::set_decimal_precision(2).unwrap();
        let snapshot = TypeMappingDefaults::snapshot();
        assert_eq!(snapshot.decimal_precision, 2);
        assert_eq!(snapshot.decimal_scale, 2);
        TypeMappingDefaults::reset();
    }

    #[test]
    fn loads_from_toml() {
        let settings = TypeMappingSettings::from_toml_str(
            r#"
            [type_mapping]
            string_length = 255
            decimal_precision = 18
            decimal_scale = 2
            "#,
        )
        .unwrap();
        assert_eq!(settings.string_length, 255);
        assert_eq!(settings.binary_length, UNLIMITED);
        assert_eq!(settings.decimal_precision, 18);
        assert_eq!(settings.decimal_scale, 2);

        let flat = TypeMappingSettings::from_toml_str("binary_length = -1\n").unwrap();
        assert_eq!(flat.binary_length, UNLIMITED);

        assert!(matches!(
            TypeMappingSettings::from_toml_str("decimal_precision = 40"),
            Err(SchemataError::Configuration(_))
        ));
        assert!(TypeMappingSettings::from_toml_str("string_length = \"long\"").is_err());
    }

    #[test]
    fn apply_is_all_or_nothing() {
        let _guard = defaults_lock();
        TypeMappingDefaults::reset();
        let bad = TypeMappingSettings {
            string_length: 100,
            decimal_scale: -2,
            ..TypeMappingSettings::default()
        };
        assert!(TypeMappingDefaults::apply(&bad).is_err());
        assert_eq!(TypeMappingDefaults::string_length(), UNLIMITED);

        let good = TypeMappingSettings {
            string_length: 100,
            ..TypeMappingSettings::default()
        };
        TypeMappingDefaults::apply(&good).unwrap();
        assert_eq!(TypeMappingDefaults::string_length(), 100);
        TypeMappingDefaults::reset();
    }
}
