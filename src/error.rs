//! Error types for the manga reader

use thiserror::Error;

/// Main error type of the crate
#[derive(Error, Debug)]
pub enum MangaError {
    /// Malformed command payload, unknown language, or a URL no site owns
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The site answered but not in the shape the adapter expects
    #[error("Unexpected response from {site}: {detail}")]
    Upstream { site: String, detail: String },

    /// Transport failure or non-2xx status
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Cache storage failure
    #[error("Cache error: {0}")]
    Cache(#[from] std::io::Error),

    /// Image decoding/encoding or PDF assembly failure
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Template rendering failure
    #[error("Render error: {0}")]
    Render(#[from] upon::Error),

    /// Invalid configuration file
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MangaError {
    pub fn upstream(site: impl Into<String>, detail: impl Into<String>) -> Self {
        MangaError::Upstream {
            site: site.into(),
            detail: detail.into(),
        }
    }

    /// True when the user should get a "wrong usage" reply rather than a failure.
    pub fn is_usage(&self) -> bool {
        matches!(self, MangaError::InvalidArgument(_))
    }
}

impl From<image::ImageError> for MangaError {
    fn from(e: image::ImageError) -> Self {
        MangaError::Conversion(e.to_string())
    }
}

impl From<lopdf::Error> for MangaError {
    fn from(e: lopdf::Error) -> Self {
        MangaError::Conversion(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MangaError>;
