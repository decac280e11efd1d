//! Error types for road_lattice

use thiserror::Error;

use crate::common::types::RoadId;

/// Main error type for routing and lattice operations.
///
/// A query that simply finds nothing (a boundary miss, no adjacent lane)
/// is not an error; those come back as `Ok(None)`.
#[derive(Error, Debug)]
pub enum LatticeError {
    /// The road is not part of the configured loop
    #[error("Road {0} is not on route")]
    NotOnRoute(RoadId),

    /// A distance, range or resolution outside its legal domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A location that could not be matched to any point of the road network
    #[error("Location ({x:.3}, {y:.3}, {z:.3}) is not on the road network")]
    OffNetwork { x: f64, y: f64, z: f64 },

    /// Malformed or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Plot rendering failure
    #[error("Visualization error: {0}")]
    Visualization(String),

    /// Another thread panicked while holding the lattice lock
    #[error("Lattice lock poisoned")]
    LockPoisoned,
}

impl From<toml::de::Error> for LatticeError {
    fn from(e: toml::de::Error) -> Self {
        LatticeError::Config(e.to_string())
    }
}

/// Result type alias for lattice operations
pub type LatticeResult<T> = Result<T, LatticeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LatticeError::NotOnRoute(1021);
        assert_eq!(format!("{}", err), "Road 1021 is not on route");

        let err = LatticeError::OffNetwork { x: 1.0, y: -2.5, z: 0.0 };
        assert_eq!(
            format!("{}", err),
            "Location (1.000, -2.500, 0.000) is not on the road network"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LatticeError = io_err.into();
        assert!(matches!(err, LatticeError::Io(_)));
    }

    #[test]
    fn test_error_from_toml() {
        let toml_err = toml::from_str::<toml::Table>("range = ").unwrap_err();
        let err: LatticeError = toml_err.into();
        assert!(matches!(err, LatticeError::Config(_)));
    }
}
