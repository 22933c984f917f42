//! Error types for the indicator pipeline.

/// Result type for cube and indicator operations
pub type CubeResult<T> = Result<T, CubeError>;

/// Error type for cube and indicator operations
#[derive(Debug, thiserror::Error)]
pub enum CubeError {
    /// Wrong cube variant, malformed records, or a bad dimension type.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unrecognized spatial level, bad cell size, or a missing region name.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested indicator / dimension-type combination is not registered.
    #[error("Unsupported indicator: {0}")]
    UnsupportedIndicator(String),

    /// Occurrences and grid/region disagree on the reference system.
    #[error("Projection mismatch: {0}")]
    ProjectionMismatch(String),
}

impl From<String> for CubeError {
    fn from(s: String) -> Self {
        CubeError::InvalidInput(s)
    }
}

impl From<&str> for CubeError {
    fn from(s: &str) -> Self {
        CubeError::InvalidInput(s.to_string())
    }
}
