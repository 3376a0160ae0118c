//! Eager (full-document) extraction entry points.
//!
//! [`Extractor`] owns the validated OCR engine, the rasterizer and the
//! artifact store. Construct it once per process; every `extract*` call is an
//! independent request with its own staging directory and deadline.
//!
//! Use [`Extractor::extract_stream`] instead when you want page results as
//! they finish rather than one aggregate at the end.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::output::{ExtractionOutput, ExtractionStats, PageResult};
use crate::pipeline::aggregate::{aggregate, join_sections};
use crate::pipeline::deadline::Deadline;
use crate::pipeline::intake::{check_size, resolve_upload, stage_upload, UploadedDocument};
use crate::pipeline::page::{load_page, process_page};
use crate::pipeline::persist::ArtifactStore;
use crate::pipeline::rasterize::{rasterize, PageImage, PdfRasterizer, Pdftoppm};
use crate::pipeline::recognize::{Recognizer, TesseractEngine};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The extraction pipeline with its external capabilities bound.
pub struct Extractor {
    pub(crate) config: ExtractionConfig,
    pub(crate) rasterizer: Arc<dyn PdfRasterizer>,
    pub(crate) recognizer: Arc<dyn Recognizer>,
    store: ArtifactStore,
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Extractor {
    /// Build an extractor backed by tesseract and pdftoppm.
    ///
    /// # Errors
    /// - [`ExtractError::UnsupportedLanguage`]: `config.language` is not
    ///   installed; the engine is never used in that case
    /// - [`ExtractError::EngineUnavailable`]: tesseract cannot be run
    pub async fn new(config: ExtractionConfig) -> Result<Self, ExtractError> {
        info!("Initializing OCR engine with language: {}", config.language);
        let engine = TesseractEngine::new(&config.tesseract_bin, &config.language).await?;
        let rasterizer = Pdftoppm::new(&config.pdftoppm_bin);
        Ok(Self::with_backends(config, Arc::new(rasterizer), Arc::new(engine)))
    }

    /// Build an extractor from caller-supplied capabilities.
    pub fn with_backends(
        config: ExtractionConfig,
        rasterizer: Arc<dyn PdfRasterizer>,
        recognizer: Arc<dyn Recognizer>,
    ) -> Self {
        let store = ArtifactStore::from_config(&config);
        Self {
            config,
            rasterizer,
            recognizer,
            store,
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Process-wide recognition language.
    pub fn language(&self) -> &str {
        &self.config.language
    }

    /// Run the full pipeline on one upload.
    ///
    /// # Returns
    /// `Ok(ExtractionOutput)` whenever the document could be rasterized, even
    /// if some pages yielded nothing (see `output.stats.failed_pages`) or some
    /// artifacts could not be written (see `output.warnings`).
    ///
    /// # Errors
    /// Only request-fatal conditions: oversized upload, unsupported extension,
    /// staging failure, undecodable image, rasterizer failure or zero pages,
    /// and a deadline that expired during rasterization.
    pub async fn extract(&self, upload: UploadedDocument) -> Result<ExtractionOutput, ExtractError> {
        let total_start = Instant::now();
        let deadline = Deadline::after(self.config.timeout());
        check_size(upload.bytes.len() as u64, self.config.max_upload_bytes)?;

        let filename = upload.filename.clone();
        info!("Starting extraction: {} ({} bytes)", filename, upload.bytes.len());

        // ── Step 1: Stage ────────────────────────────────────────────────────
        let staged = stage_upload(upload, self.config.staging_dir.as_deref()).await?;

        // ── Step 2: Rasterize ────────────────────────────────────────────────
        let render_start = Instant::now();
        let pages = rasterize(&staged, self.rasterizer.as_ref(), self.config.dpi, deadline).await?;
        let rasterize_ms = render_start.elapsed().as_millis() as u64;
        info!("Document has {} pages ({}ms)", pages.len(), rasterize_ms);

        // ── Step 3: Recognize, strictly in page order ────────────────────────
        let recognize_start = Instant::now();
        let page_results = self.process_pages(pages, deadline).await;
        let recognize_ms = recognize_start.elapsed().as_millis() as u64;

        // ── Step 4: Aggregate ────────────────────────────────────────────────
        let result = aggregate(&page_results, &self.config.labels, Utc::now());

        // ── Step 5: Persist ──────────────────────────────────────────────────
        let outcome = self.store.persist(&result, &filename).await;
        drop(staged);

        let failed_pages = page_results.iter().filter(|p| p.error.is_some()).count();
        let stats = ExtractionStats {
            rasterize_ms,
            recognize_ms,
            total_ms: total_start.elapsed().as_millis() as u64,
            failed_pages,
        };

        info!(
            "Extraction complete: {} words on {} pages ({} failed), {} artifacts, {}ms",
            result.total_tokens,
            result.total_pages,
            failed_pages,
            outcome.artifacts.written(),
            stats.total_ms
        );

        Ok(ExtractionOutput {
            filename,
            result,
            downloads: outcome.artifacts,
            warnings: outcome.warnings,
            stats,
        })
    }

    /// Resolve a local path or HTTP(S) URL, then [`Extractor::extract`] it.
    pub async fn extract_input(&self, input: impl AsRef<str>) -> Result<ExtractionOutput, ExtractError> {
        let upload = resolve_upload(input.as_ref(), &self.config).await?;
        self.extract(upload).await
    }

    /// Synchronous wrapper around [`Extractor::extract`].
    ///
    /// Creates a temporary tokio runtime internally; do not call from async code.
    pub fn extract_sync(&self, upload: UploadedDocument) -> Result<ExtractionOutput, ExtractError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.extract(upload))
    }

    /// Plain-text extraction: same page headers, no boxes, no artifacts.
    pub async fn extract_text(&self, upload: UploadedDocument) -> Result<String, ExtractError> {
        let deadline = Deadline::after(self.config.timeout());
        check_size(upload.bytes.len() as u64, self.config.max_upload_bytes)?;

        let staged = stage_upload(upload, self.config.staging_dir.as_deref()).await?;
        let pages = rasterize(&staged, self.rasterizer.as_ref(), self.config.dpi, deadline).await?;

        let mut texts: Vec<(usize, String)> = Vec::with_capacity(pages.len());
        for page in pages {
            let page_num = page.index();
            if deadline.is_expired() {
                warn!("Page {}: deadline exceeded, skipping", page_num);
                continue;
            }
            let image = match load_page(page).await {
                Ok(img) => img,
                Err(e) => {
                    warn!("Page {}: decode failed, {}", page_num, e);
                    continue;
                }
            };
            match self
                .recognizer
                .extract_plain_text(&image, &self.config.language, deadline)
                .await
            {
                Ok(text) => texts.push((page_num, text.trim().to_string())),
                Err(e) => warn!("Page {}: recognition failed, {}", page_num, e),
            }
        }

        Ok(join_sections(
            texts.iter().map(|(n, t)| (*n, t.as_str())),
            &self.config.labels,
        ))
    }

    /// Process pages one at a time, in ascending page order.
    async fn process_pages(&self, pages: Vec<PageImage>, deadline: Deadline) -> Vec<PageResult> {
        let total_pages = pages.len();
        let cb = self.config.progress_callback.as_ref();
        if let Some(cb) = cb {
            cb.on_extraction_start(total_pages);
        }

        let mut results = Vec::with_capacity(total_pages);
        for page in pages {
            let page_num = page.index();
            if let Some(cb) = cb {
                cb.on_page_start(page_num, total_pages);
            }

            let result = process_page(
                self.recognizer.as_ref(),
                page,
                &self.config.language,
                deadline,
            )
            .await;

            if let Some(cb) = cb {
                match &result.error {
                    None => cb.on_page_complete(page_num, total_pages, result.token_count),
                    Some(e) => cb.on_page_error(page_num, total_pages, &e.to_string()),
                }
            }
            results.push(result);
        }

        let succeeded = results.iter().filter(|r| r.error.is_none()).count();
        debug!("{}/{} pages recognised", succeeded, total_pages);
        if let Some(cb) = cb {
            cb.on_extraction_complete(total_pages, succeeded);
        }
        results
    }
}
