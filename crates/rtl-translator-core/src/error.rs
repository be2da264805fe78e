use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for rtl-translator-core
///
/// Only a few of these are fatal to a run (unreadable input, unloadable font,
/// unwritable output, invalid configuration). Everything raised while
/// processing a single block is logged and recovered by the pipeline.
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Document Errors
    // ==========================================================================
    /// Failed to open or parse a PDF file
    #[error("failed to open PDF: {0}")]
    PdfOpen(String),

    /// Invalid page number requested
    #[error("invalid page number {page} (document has {total} pages)")]
    PdfInvalidPage { page: usize, total: usize },

    /// Page geometry could not be read; the page is treated as empty
    #[error("failed to extract text from page {page}: {reason}")]
    Extraction { page: usize, reason: String },

    /// Failed to rasterise a page for background sampling
    #[error("failed to render page {page}: {reason}")]
    PdfRender { page: usize, reason: String },

    /// Failed to save a PDF
    #[error("failed to save PDF: {0}")]
    PdfSave(String),

    /// Error from the lopdf library
    #[error("lopdf error: {0}")]
    Lopdf(String),

    /// The target-script font could not be read or parsed
    #[error("failed to load font {path}: {reason}")]
    FontLoad { path: PathBuf, reason: String },

    // ==========================================================================
    // Translation Errors
    // ==========================================================================
    /// Network-level failure talking to the translation service
    #[error("translation API request failed: {0}")]
    TranslationRequest(String),

    /// Translation request timed out
    #[error("translation request timed out")]
    TranslationTimeout,

    /// Rate limited by translation API
    #[error("translation rate limited{}", retry_after.map(|s| format!(", retry after {s} seconds")).unwrap_or_default())]
    TranslationRateLimited { retry_after: Option<u64> },

    /// The service answered with a payload we could not validate
    #[error("invalid translation API response: {0}")]
    TranslationInvalidResponse(String),

    /// The service refused the request (4xx other than 429)
    #[error("translation API rejected request with HTTP {status}: {body}")]
    TranslationRejected { status: u16, body: String },

    /// A batch could not be translated; its chunks keep their original text
    #[error("translation failed after {attempts} attempt(s): {reason}")]
    TranslationFailed { attempts: u32, reason: String },

    // ==========================================================================
    // Cache Errors
    // ==========================================================================
    /// Failed to open or create the cache file
    #[error("failed to initialize cache: {0}")]
    CacheInit(String),

    /// Failed to read from cache
    #[error("failed to read from cache: {0}")]
    CacheRead(String),

    /// Failed to write to cache
    #[error("failed to write to cache: {0}")]
    CacheWrite(String),

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    // ==========================================================================
    // Run Errors
    // ==========================================================================
    /// Output already exists and overwriting was not requested
    #[error("output already exists: {} (use --overwrite to replace)", .0.display())]
    OutputExists(PathBuf),

    /// Output could not be written
    #[error("failed to write output {}: {reason}", path.display())]
    OutputWrite { path: PathBuf, reason: String },

    /// The run was interrupted or hit its deadline
    #[error("operation cancelled")]
    Cancelled,

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether retrying the same request later may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TranslationRequest(_)
                | Self::TranslationTimeout
                | Self::TranslationRateLimited { .. }
        )
    }

    /// Short, stable name of the error kind for log context.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PdfOpen(_) | Self::PdfInvalidPage { .. } => "document",
            Self::Extraction { .. } => "extraction",
            Self::PdfRender { .. } => "render",
            Self::PdfSave(_) | Self::Lopdf(_) => "pdf_write",
            Self::FontLoad { .. } => "font",
            Self::TranslationRequest(_)
            | Self::TranslationTimeout
            | Self::TranslationRateLimited { .. } => "translation_transient",
            Self::TranslationInvalidResponse(_)
            | Self::TranslationRejected { .. }
            | Self::TranslationFailed { .. } => "translation_failed",
            Self::CacheInit(_) | Self::CacheRead(_) | Self::CacheWrite(_) => "cache_io",
            Self::ConfigLoad(_) | Self::ConfigInvalid { .. } => "config",
            Self::OutputExists(_) | Self::OutputWrite { .. } => "output_write",
            Self::Cancelled => "cancelled",
            Self::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::TranslationTimeout.is_transient());
        assert!(Error::TranslationRateLimited { retry_after: Some(3) }.is_transient());
        assert!(Error::TranslationRequest("connection reset".into()).is_transient());
        assert!(!Error::TranslationInvalidResponse("not an array".into()).is_transient());
        assert!(!Error::TranslationRejected { status: 400, body: String::new() }.is_transient());
    }

    #[test]
    fn test_rate_limit_message() {
        let e = Error::TranslationRateLimited { retry_after: Some(7) };
        assert_eq!(e.to_string(), "translation rate limited, retry after 7 seconds");
        let e = Error::TranslationRateLimited { retry_after: None };
        assert_eq!(e.to_string(), "translation rate limited");
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Error::CacheWrite("disk full".into()).kind(), "cache_io");
        assert_eq!(Error::OutputExists(PathBuf::from("a.pdf")).kind(), "output_write");
    }
}
