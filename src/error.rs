//! Error types for the ocr-extract library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`ExtractError`]: **Fatal**, the request cannot proceed at all
//!   (unsupported extension, staging failure, rasterizer failure, unknown
//!   language). Returned as `Err(ExtractError)` from the `Extractor::extract*`
//!   entry points.
//!
//! * [`PageError`]: **Non-fatal**, a single page could not be decoded or
//!   recognised. Stored inside [`crate::output::PageResult`]; the page
//!   contributes no tokens but every other page is still processed.
//!
//! * [`RecognitionError`]: what a [`crate::pipeline::recognize::Recognizer`]
//!   reports for one call. The page processor folds it into a [`PageError`].
//!
//! Persistence failures are constructed as [`ExtractError::PersistFailed`]
//! but never returned from a request; they are downgraded to
//! [`crate::output::ArtifactWarning`]s on the output.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the ocr-extract library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// Upload is larger than the accepted size policy.
    #[error("Upload is {size} bytes, larger than the {limit}-byte limit")]
    UploadTooLarge { size: u64, limit: u64 },

    /// Declared filename does not carry an accepted extension.
    #[error("Unsupported file '{filename}' (extension {extension:?}). Only PDF, PNG, JPG files are accepted")]
    UnsupportedFormat { filename: String, extension: String },

    // ── Staging errors ────────────────────────────────────────────────────
    /// The per-request staging directory or staged file could not be written.
    #[error("Failed to stage upload under '{path}': {source}")]
    StorageError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Rasterization errors ──────────────────────────────────────────────
    /// An image upload is not a supported raster format.
    #[error("Cannot decode image '{path}': {detail}")]
    DecodeError { path: PathBuf, detail: String },

    /// The PDF rasterizer reported an error or produced no pages.
    #[error("PDF rasterization failed: {detail}")]
    RasterizationFailed { detail: String },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The recognition engine does not know the requested language.
    #[error("Language '{language}' is not installed for the OCR engine (available: {})", available.join(", "))]
    UnsupportedLanguage {
        language: String,
        available: Vec<String>,
    },

    /// An external tool (tesseract, pdftoppm) is missing.
    #[error("'{tool}' is not available.\n{hint}")]
    EngineUnavailable { tool: String, hint: String },

    /// The request deadline expired before the pipeline could finish.
    #[error("Request cancelled: deadline exceeded after {elapsed_ms}ms")]
    Cancelled { elapsed_ms: u64 },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not write one of the persisted artifacts.
    #[error("Failed to write artifact '{path}': {source}")]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// Stored alongside [`crate::output::PageResult`] when a page fails.
/// The page is reported with zero tokens and the request continues.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The page raster could not be decoded.
    #[error("Page {page}: image decode failed: {detail}")]
    DecodeFailed { page: usize, detail: String },

    /// The recognition engine failed on this page.
    #[error("Page {page}: recognition failed: {detail}")]
    RecognitionFailed { page: usize, detail: String },

    /// The request deadline had already expired when the page was reached.
    #[error("Page {page}: skipped, request deadline exceeded")]
    Cancelled { page: usize },
}

impl PageError {
    /// 1-based page number the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::DecodeFailed { page, .. }
            | PageError::RecognitionFailed { page, .. }
            | PageError::Cancelled { page } => *page,
        }
    }
}

/// Error from a single recognition call.
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// The deadline was already expired (or expired mid-call).
    #[error("deadline exceeded")]
    Cancelled,

    /// The language hint is not one the engine validated at construction.
    #[error("language '{0}' is not supported by this engine")]
    UnsupportedLanguage(String),

    /// The engine ran but reported failure.
    #[error("engine failed: {0}")]
    EngineFailed(String),

    /// The page image could not be handed to the engine.
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecognitionError {
    /// Fold into the per-page error stored on a [`crate::output::PageResult`].
    pub fn into_page_error(self, page: usize) -> PageError {
        match self {
            RecognitionError::Cancelled => PageError::Cancelled { page },
            other => PageError::RecognitionFailed {
                page,
                detail: other.to_string(),
            },
        }
    }
}
