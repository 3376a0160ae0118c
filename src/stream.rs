//! Streaming extraction: emit page results as each page finishes.
//!
//! Unlike [`crate::Extractor::extract`], which returns only after the whole
//! document is aggregated and persisted, [`crate::Extractor::extract_stream`]
//! yields one [`PageResult`] per page. Pages are still recognised one at a
//! time, so the stream is always in ascending page order. Nothing is
//! persisted; feed the collected results to
//! [`crate::pipeline::aggregate::aggregate`] if you need the aggregate.

use crate::error::ExtractError;
use crate::extract::Extractor;
use crate::output::PageResult;
use crate::pipeline::deadline::Deadline;
use crate::pipeline::intake::{check_size, stage_upload, UploadedDocument};
use crate::pipeline::page::process_page;
use crate::pipeline::rasterize::rasterize;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of page results, in page order.
pub type PageStream = Pin<Box<dyn Stream<Item = PageResult> + Send>>;

impl Extractor {
    /// Stage and rasterize `upload`, then stream per-page results.
    ///
    /// The staging directory stays alive until the stream is dropped.
    ///
    /// # Errors
    /// The same request-fatal conditions as [`Extractor::extract`]; they are
    /// reported before the stream is returned.
    pub async fn extract_stream(&self, upload: UploadedDocument) -> Result<PageStream, ExtractError> {
        let deadline = Deadline::after(self.config.timeout());
        check_size(upload.bytes.len() as u64, self.config.max_upload_bytes)?;
        info!("Starting streaming extraction: {}", upload.filename);

        let staged = stage_upload(upload, self.config.staging_dir.as_deref()).await?;
        let pages = rasterize(&staged, self.rasterizer.as_ref(), self.config.dpi, deadline).await?;

        let staged = Arc::new(staged);
        let recognizer = Arc::clone(&self.recognizer);
        let language = self.config.language.clone();

        let s = stream::iter(pages).then(move |page| {
            let recognizer = Arc::clone(&recognizer);
            let language = language.clone();
            let staged = Arc::clone(&staged);
            async move {
                let result = process_page(recognizer.as_ref(), page, &language, deadline).await;
                drop(staged);
                result
            }
        });

        Ok(Box::pin(s))
    }
}
