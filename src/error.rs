//! Error types for slide extraction, editing and export

use thiserror::Error;

use crate::extract::ParseReport;

/// Result type alias for slide tool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while turning markup into slides and exporting them
#[derive(Error, Debug)]
pub enum Error {
    /// The markup could not be turned into a document tree
    #[error("Failed to parse markup: {message}")]
    Parse {
        message: String,
        /// Pre-filled diagnostic payload suitable for a bug report
        report: Box<ParseReport>,
    },

    /// A style patch value was rejected
    #[error("Invalid style value: {0}")]
    InvalidStyle(String),

    /// A companion URL could not be accepted
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to lay out or rasterize a slide
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Failed to package snapshots into an archive or document
    #[error("Export failed: {0}")]
    ExportError(String),

    /// Another export is still running
    #[error("An export is already in progress")]
    ExportInProgress,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// I/O failure while writing artifacts
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::ExportError(format!("zip: {}", err))
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::RenderError(format!("png: {}", err))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::RenderError(format!("snapshot task failed: {}", err))
    }
}
