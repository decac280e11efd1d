//! Configuration loading for road_lattice

use std::path::Path;

use serde::Deserialize;

use crate::common::{LatticeError, LatticeResult};
use crate::routing::RouteConfig;

/// Main configuration structure
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct LatticeConfig {
    #[serde(default)]
    pub lattice: LatticeSettings,
    #[serde(default)]
    pub route: RouteConfig,
}

/// Geometry of the lattice window
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct LatticeSettings {
    /// Longitudinal extent of the window in meters (default: 100.0)
    #[serde(default = "default_range")]
    pub range: f64,

    /// Spacing between consecutive nodes of one lane in meters (default: 1.0)
    #[serde(default = "default_resolution")]
    pub resolution: f64,

    /// How far a query point may lie from its node in meters (default: resolution)
    #[serde(default)]
    pub query_tolerance: Option<f64>,
}

fn default_range() -> f64 {
    100.0
}
fn default_resolution() -> f64 {
    1.0
}

impl Default for LatticeSettings {
    fn default() -> Self {
        Self {
            range: default_range(),
            resolution: default_resolution(),
            query_tolerance: None,
        }
    }
}

impl LatticeSettings {
    pub fn new(range: f64, resolution: f64) -> Self {
        Self {
            range,
            resolution,
            query_tolerance: None,
        }
    }

    pub fn query_tolerance(&self) -> f64 {
        self.query_tolerance.unwrap_or(self.resolution)
    }

    pub fn validate(&self) -> LatticeResult<()> {
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(LatticeError::InvalidArgument(format!(
                "resolution must be positive, got {}",
                self.resolution
            )));
        }
        if !self.range.is_finite() || self.range <= self.resolution {
            return Err(LatticeError::InvalidArgument(format!(
                "range {} must exceed the resolution {}",
                self.range, self.resolution
            )));
        }
        let tolerance = self.query_tolerance();
        if !(tolerance.is_finite() && tolerance >= 0.0) {
            return Err(LatticeError::InvalidArgument(format!(
                "query tolerance must be non-negative, got {}",
                tolerance
            )));
        }
        Ok(())
    }
}

impl LatticeConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> LatticeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> LatticeResult<Self> {
        let config: LatticeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LatticeResult<()> {
        self.lattice.validate()?;
        self.route.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::REFERENCE_LOOP;

    #[test]
    fn test_defaults() {
        let config = LatticeConfig::from_toml_str("").unwrap();
        assert_eq!(config.lattice.range, 100.0);
        assert_eq!(config.lattice.resolution, 1.0);
        assert_eq!(config.lattice.query_tolerance(), 1.0);
        assert_eq!(config.route.roads, REFERENCE_LOOP.to_vec());
    }

    #[test]
    fn test_parse_full() {
        let config = LatticeConfig::from_toml_str(
            r#"
            [lattice]
            range = 60.0
            resolution = 2.0
            query_tolerance = 0.5

            [route]
            roads = [3, 1, 2]
            "#,
        )
        .unwrap();
        assert_eq!(config.lattice.range, 60.0);
        assert_eq!(config.lattice.resolution, 2.0);
        assert_eq!(config.lattice.query_tolerance(), 0.5);
        assert_eq!(config.route.roads, vec![3, 1, 2]);
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = LatticeConfig::from_toml_str("[lattice]\nrange = 0.5\nresolution = 1.0\n");
        assert!(matches!(err, Err(LatticeError::InvalidArgument(_))));

        let err = LatticeConfig::from_toml_str("[lattice]\nresolution = -1.0\n");
        assert!(matches!(err, Err(LatticeError::InvalidArgument(_))));

        let err = LatticeConfig::from_toml_str("[route]\nroads = []\n");
        assert!(matches!(err, Err(LatticeError::Config(_))));

        let err = LatticeConfig::from_toml_str("[lattice]\nrange = \"far\"\n");
        assert!(matches!(err, Err(LatticeError::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let err = LatticeConfig::load(Path::new("/nonexistent/lattice.toml"));
        assert!(matches!(err, Err(LatticeError::Io(_))));
    }
}
