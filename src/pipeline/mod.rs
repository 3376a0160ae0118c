//! Pipeline stages for document text extraction.
//!
//! Each submodule implements exactly one step, so each is testable on its own
//! and the external capabilities (rasterizer, OCR engine) can be swapped
//! behind their traits without touching the other stages.
//!
//! ## Data Flow
//!
//! ```text
//! intake ──▶ rasterize ──▶ page (×N, in order) ──▶ aggregate ──▶ persist
//! (staging)   (pdftoppm)    (tesseract)             (pure)        (json/txt/md)
//! ```
//!
//! 1. [`intake`]   : validate the extension and stage the upload in a private
//!    temporary directory that is removed when the request ends
//! 2. [`rasterize`]: one page image per PDF page, or the image itself
//! 3. [`page`]     : recognise one page; failures degrade to an empty result
//! 4. [`aggregate`]: merge pages into full text, token list and counters
//! 5. [`persist`]  : best-effort JSON / text / markdown artifacts
//!
//! [`recognize`] holds the OCR adapter used by [`page`], and [`deadline`] the
//! request budget shared by rasterization and recognition.

pub mod aggregate;
pub mod deadline;
pub mod intake;
pub mod page;
pub mod persist;
pub mod rasterize;
pub mod recognize;
