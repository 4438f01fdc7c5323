//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Produce an `ExperimentBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("experiment.toml")).unwrap();
//! println!("Display: {}", blueprint.display.name);
//! ```

mod parser;
mod validator;

pub use contracts::ExperimentBlueprint;
pub use parser::ConfigFormat;

use contracts::TimingError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<ExperimentBlueprint, TimingError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<ExperimentBlueprint, TimingError> {
        Self::parse_and_validate(content, format)
    }

    /// Serialize an ExperimentBlueprint to a TOML string
    pub fn to_toml(blueprint: &ExperimentBlueprint) -> Result<String, TimingError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| TimingError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize an ExperimentBlueprint to a JSON string
    pub fn to_json(blueprint: &ExperimentBlueprint) -> Result<String, TimingError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| TimingError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, TimingError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            TimingError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            TimingError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, TimingError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<ExperimentBlueprint, TimingError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_TOML: &str = r#"
[display]
name = "display"
refresh_rate_hz = 60.0
latency_ms = 1.5

[audio]
name = "audio"
sample_rate_hz = 44100.0
buffer_size = 256

[client]
data_collection_duration_ms = 1000.0
auto_update = true
swap_period_tolerance = 0.5
stoppage_period_multiplier = 4.0
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.display.name, "display");
        assert_eq!(bp.audio.as_ref().unwrap().buffer_size, 256);
    }

    #[test]
    fn test_load_produces_runtime_configs() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let store = bp.display.store_config();
        assert!((store.nominal_swap_period.as_millis_f64() - 16.6667).abs() < 1e-3);
        assert_eq!(store.units_per_swap, 1);

        let audio_store = bp.audio.as_ref().unwrap().store_config();
        assert_eq!(audio_store.units_per_swap, 256);
    }

    #[test]
    fn test_round_trip_toml() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.display.name, bp2.display.name);
        assert_eq!(
            bp.audio.as_ref().unwrap().buffer_size,
            bp2.audio.as_ref().unwrap().buffer_size
        );
    }

    #[test]
    fn test_round_trip_json() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(bp.display.name, bp2.display.name);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        // Duplicate source name should fail validation
        let content = r#"
[display]
name = "shared"
refresh_rate_hz = 60.0

[audio]
name = "shared"
sample_rate_hz = 44100.0
buffer_size = 256
"#;
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("duplicate"));
    }
}
