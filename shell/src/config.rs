use std::time::Duration;

use feeling_location::UpdateConfig;
use serde::{Deserialize, Serialize};

use crate::ShellError;

/// Settings for the embedding layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Page loaded into the browser surface.
    pub start_url: String,
    /// Name under which the bridge is exposed to page scripts.
    pub bridge_name: String,
    /// Application name shown in the settings instructions.
    pub app_label: String,
    /// Live location update thresholds.
    pub location_update: LocationUpdateConfig,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            start_url: "http://192.168.1.4:3000".to_string(),
            bridge_name: "FeelingAndroidBridge".to_string(),
            app_label: "Feeling".to_string(),
            location_update: LocationUpdateConfig::default(),
        }
    }
}

/// Location update thresholds in serializable units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationUpdateConfig {
    /// Minimum time between updates, in milliseconds.
    pub min_interval_ms: u64,
    /// Minimum displacement between updates, in meters.
    pub min_distance_m: f32,
}

impl Default for LocationUpdateConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 5000,
            min_distance_m: 10.0,
        }
    }
}

impl From<LocationUpdateConfig> for UpdateConfig {
    fn from(config: LocationUpdateConfig) -> Self {
        Self {
            min_interval: Duration::from_millis(config.min_interval_ms),
            min_distance_m: config.min_distance_m,
        }
    }
}

impl ShellConfig {
    /// Parse and validate a JSON configuration. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns a [`ShellError`] if the JSON is malformed or a value is unusable.
    pub fn from_json_str(json: &str) -> Result<Self, ShellError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value can be used.
    ///
    /// # Errors
    /// Returns [`ShellError::Invalid`] describing the first unusable value.
    pub fn validate(&self) -> Result<(), ShellError> {
        if self.start_url.trim().is_empty() {
            return Err(ShellError::Invalid("start_url is empty".into()));
        }
        if !is_script_identifier(&self.bridge_name) {
            return Err(ShellError::Invalid(format!(
                "bridge_name {:?} is not a valid script identifier",
                self.bridge_name
            )));
        }
        let distance = self.location_update.min_distance_m;
        if !distance.is_finite() || distance < 0.0 {
            return Err(ShellError::Invalid(format!(
                "min_distance_m must be a non-negative number, got {distance}"
            )));
        }
        Ok(())
    }

    /// Update thresholds for the location tracker.
    #[must_use]
    pub fn update_config(&self) -> UpdateConfig {
        self.location_update.into()
    }
}

fn is_script_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_update_thresholds() {
        let config = ShellConfig::default();
        assert_eq!(config.update_config(), UpdateConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ShellConfig::from_json_str(
            r#"{ "start_url": "https://feeling.example", "location_update": { "min_interval_ms": 1000 } }"#,
        )
        .unwrap();

        assert_eq!(config.start_url, "https://feeling.example");
        assert_eq!(config.bridge_name, "FeelingAndroidBridge");
        assert_eq!(config.update_config().min_interval, Duration::from_secs(1));
        assert!((config.update_config().min_distance_m - 10.0).abs() < f32::EPSILON);
    }

    #[test]
    fn rejects_bad_bridge_name() {
        let err = ShellConfig::from_json_str(r#"{ "bridge_name": "1bridge" }"#).unwrap_err();
        assert!(matches!(err, ShellError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = ShellConfig::from_json_str("{ start_url: ").unwrap_err();
        assert!(matches!(err, ShellError::Parse(_)));
    }
}
