//! Typed per-request failures.
//!
//! None of these abort a fundamentals request: the aggregator converts
//! each one into a note or a per-document error in its result. Startup and
//! CLI plumbing use `anyhow` instead.

use std::path::PathBuf;

/// Failure reported by a [`MetricsStore`](crate::metrics::MetricsStore).
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("symbol not found in metrics store: {0}")]
    NotFound(String),

    #[error("metrics store unavailable: {0}")]
    Unavailable(String),
}

/// Failure turning a document into page text.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExtractionError {
    #[error("could not read {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("PDF extraction failed for {path}: {message}")]
    Pdf { path: PathBuf, message: String },

    #[error("extraction timed out after {secs}s for {path}")]
    Timeout { path: PathBuf, secs: u64 },

    #[error("extractor panicked on {path}")]
    Panicked { path: PathBuf },
}

/// Document-level error from the analyzer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DocumentError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("invalid document name: {0}")]
    InvalidName(String),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

impl DocumentError {
    /// Machine-readable code used in API error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            DocumentError::NotFound(_) => "not_found",
            DocumentError::InvalidName(_) => "bad_request",
            DocumentError::Extraction(ExtractionError::Timeout { .. }) => "timeout",
            DocumentError::Extraction(_) => "extraction_failed",
        }
    }
}
