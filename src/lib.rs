//! # ocr-extract
//!
//! Extract text and word-level bounding boxes from PDFs and images with
//! tesseract, and persist the result as JSON, plain text and markdown.
//!
//! ## Why this crate?
//!
//! Scanned documents carry no text layer, so text-extraction tools return
//! nothing useful. This crate rasterises each PDF page with pdftoppm, runs
//! tesseract on every page in order, and merges the per-page words into one
//! document result with page-sectioned full text. A page that fails to decode
//! or recognise contributes an empty result instead of aborting the document.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (pdf / png / jpg)
//!  │
//!  ├─ 1. Intake     check extension + size, stage in a private temp dir
//!  ├─ 2. Rasterize  pdftoppm -png at the configured DPI (PDF only)
//!  ├─ 3. Recognize  tesseract TSV per page, one page at a time
//!  ├─ 4. Aggregate  full text with "--- Page N ---" headers, token list
//!  └─ 5. Persist    <id>.json / <id>.txt / <id>.md, best-effort
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ocr_extract::{ExtractionConfig, Extractor, UploadedDocument};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::builder().language("spa").build()?;
//!     let extractor = Extractor::new(config).await?;
//!
//!     let upload = UploadedDocument::new("scan.pdf", std::fs::read("scan.pdf")?);
//!     let output = extractor.extract(upload).await?;
//!     println!("{}", output.result.full_text);
//!     eprintln!("{} words on {} pages", output.result.total_tokens, output.result.total_pages);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr-extract` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ## External tools
//!
//! `tesseract` (with the traineddata for every configured language) and
//! `pdftoppm` (poppler-utils) must be on `PATH`, or configured explicitly via
//! [`ExtractionConfigBuilder::tesseract_bin`] and
//! [`ExtractionConfigBuilder::pdftoppm_bin`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod labels;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{ExtractError, PageError, RecognitionError};
pub use extract::Extractor;
pub use labels::Labels;
pub use output::{
    AggregateResult, ArtifactKind, ArtifactLocation, ArtifactWarning, BoundingBox, ExtractionOutput,
    ExtractionStats, PageResult, PersistedArtifactSet, RecognizedToken,
};
pub use pipeline::deadline::Deadline;
pub use pipeline::intake::UploadedDocument;
pub use pipeline::rasterize::{PageImage, PdfRasterizer, Pdftoppm};
pub use pipeline::recognize::{Recognizer, TesseractEngine};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::PageStream;
