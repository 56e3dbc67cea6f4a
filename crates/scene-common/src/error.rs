//! Error types for the scene pipeline.

use thiserror::Error;

/// Result type alias using SceneError.
pub type SceneResult<T> = Result<T, SceneError>;

/// Primary error type for scene discovery, download and processing.
#[derive(Debug, Error)]
pub enum SceneError {
    // === Query Errors ===
    #[error("Catalog search failed: {0}")]
    Catalog(String),

    #[error("Projection error: {0}")]
    Projection(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Per-item Errors ===
    #[error("Download failed for {id}: {message}")]
    Download { id: String, message: String },

    #[error("Failed to decode raster: {0}")]
    Decode(String),

    #[error("Band processing failed: {0}")]
    Processing(String),

    // === Infrastructure Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SceneError {
    pub fn download(id: impl Into<String>, message: impl Into<String>) -> Self {
        SceneError::Download {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Errors scoped to a single download item; these never abort a batch.
    pub fn is_item_level(&self) -> bool {
        matches!(
            self,
            SceneError::Download { .. } | SceneError::Decode(_) | SceneError::Processing(_)
        )
    }

    /// Only transport-level failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SceneError::Download { .. })
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SceneError::Catalog(_) => "catalog",
            SceneError::Projection(_) => "projection",
            SceneError::InvalidConfig(_) => "config",
            SceneError::Download { .. } => "download",
            SceneError::Decode(_) => "decode",
            SceneError::Processing(_) => "processing",
            SceneError::Io(_) => "io",
        }
    }
}

impl From<serde_json::Error> for SceneError {
    fn from(err: serde_json::Error) -> Self {
        SceneError::Catalog(format!("invalid JSON: {}", err))
    }
}

impl From<crate::crs::CrsParseError> for SceneError {
    fn from(err: crate::crs::CrsParseError) -> Self {
        SceneError::Projection(err.to_string())
    }
}

impl From<crate::bbox::BboxParseError> for SceneError {
    fn from(err: crate::bbox::BboxParseError) -> Self {
        SceneError::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_level_classification() {
        assert!(SceneError::download("a", "503").is_item_level());
        assert!(SceneError::Decode("bad header".into()).is_item_level());
        assert!(SceneError::Processing("no nir band".into()).is_item_level());
        assert!(!SceneError::Catalog("timeout".into()).is_item_level());
        assert!(!SceneError::Projection("EPSG:1".into()).is_item_level());
    }

    #[test]
    fn test_only_downloads_retry() {
        assert!(SceneError::download("a", "reset").is_retryable());
        assert!(!SceneError::Decode("truncated".into()).is_retryable());
    }
}
