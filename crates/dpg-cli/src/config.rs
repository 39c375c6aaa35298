//! CLI configuration.
//!
//! Loaded from the `--config` path, else the file named by `DPG_CONFIG`,
//! else defaults (no features enabled). A `--features` flag replaces the
//! configured feature set.
//!
//! ```yaml
//! features: [contrib, floating-point]
//! calibration:
//!   lower: 0.0
//!   upper: 1.0
//!   max_expansions: 1024
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use dpg_core::{DpgError, FeatureSet};
use dpg_graph::SearchOptions;

/// Environment variable naming a configuration file.
pub const CONFIG_ENV_VAR: &str = "DPG_CONFIG";

/// Configuration for the `dpg` binary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DpgConfig {
    /// Features passed to every gated constructor.
    pub features: FeatureSet,
    pub calibration: CalibrationConfig,
}

/// Initial bracket for `dpg pipeline calibrate`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalibrationConfig {
    pub lower: f64,
    pub upper: f64,
    pub max_expansions: u32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        let SearchOptions {
            lower,
            upper,
            max_expansions,
        } = SearchOptions::default();
        Self {
            lower,
            upper,
            max_expansions,
        }
    }
}

impl CalibrationConfig {
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            lower: self.lower,
            upper: self.upper,
            max_expansions: self.max_expansions,
        }
    }
}

impl DpgConfig {
    /// Read a YAML (or JSON) configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_yaml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Resolve the configuration: explicit path, then `DPG_CONFIG`, then
    /// defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) if !path.is_empty() => Self::from_file(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }

    /// Replace the feature set with a comma-separated list, when given.
    /// An empty list disables every feature.
    pub fn with_features_override(mut self, features: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(list) = features {
            let names = list.split(',').map(str::trim).filter(|s| !s.is_empty());
            self.features = FeatureSet::from_names(names).map_err(ConfigError::Features)?;
        }
        Ok(self)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("invalid feature list: {0}")]
    Features(DpgError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpg_core::Feature;
    use std::io::Write;

    #[test]
    fn test_defaults_enable_nothing() {
        let config = DpgConfig::default();
        assert_eq!(config.features, FeatureSet::new());
        assert_eq!(config.calibration.search_options(), SearchOptions::default());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "features: [contrib, floating-point]\ncalibration:\n  upper: 64.0").unwrap();
        let config = DpgConfig::load(Some(file.path())).unwrap();
        assert!(config.features.is_enabled(Feature::Contrib));
        assert!(config.features.is_enabled(Feature::FloatingPoint));
        assert!(!config.features.is_enabled(Feature::HonestButCurious));
        assert_eq!(config.calibration.upper, 64.0);
        assert_eq!(config.calibration.lower, 0.0);
    }

    #[test]
    fn test_unknown_keys_and_features_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "feature: [contrib]").unwrap();
        assert!(matches!(
            DpgConfig::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "features: [telepathy]").unwrap();
        assert!(DpgConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            DpgConfig::from_file(Path::new("/nonexistent/dpg.yaml")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_features_override() {
        let config = DpgConfig::default()
            .with_features_override(Some("contrib, honest-but-curious"))
            .unwrap();
        assert!(config.features.is_enabled(Feature::HonestButCurious));
        assert!(!config.features.is_enabled(Feature::FloatingPoint));

        let cleared = config.with_features_override(Some("")).unwrap();
        assert_eq!(cleared.features, FeatureSet::new());

        assert!(matches!(
            DpgConfig::default().with_features_override(Some("contrib,bogus")),
            Err(ConfigError::Features(_))
        ));
    }
}
