//! Page processing: one page image in, one [`PageResult`] out.
//!
//! Always returns a `PageResult`, never an error, so a single unreadable
//! page cannot abort the document. Failures are recorded in
//! `PageResult::error` and the page contributes zero tokens.

use crate::error::PageError;
use crate::output::{PageResult, RecognizedToken};
use crate::pipeline::deadline::Deadline;
use crate::pipeline::rasterize::PageImage;
use crate::pipeline::recognize::Recognizer;
use std::time::Instant;
use tracing::{debug, warn};

/// Recognise one page and stamp every token with its 1-based page number.
pub async fn process_page(
    recognizer: &dyn Recognizer,
    page: PageImage,
    language: &str,
    deadline: Deadline,
) -> PageResult {
    let start = Instant::now();
    let page_num = page.index();

    if deadline.is_expired() {
        warn!("Page {}: deadline exceeded, skipping", page_num);
        return PageResult::failed(page_num, PageError::Cancelled { page: page_num }, 0);
    }

    let image = match load_page(page).await {
        Ok(img) => img,
        Err(detail) => {
            warn!("Page {}: decode failed, {}", page_num, detail);
            return PageResult::failed(
                page_num,
                PageError::DecodeFailed {
                    page: page_num,
                    detail,
                },
                start.elapsed().as_millis() as u64,
            );
        }
    };

    match recognizer.extract_with_layout(&image, language, deadline).await {
        Ok(tokens) => {
            let tokens = stamp_tokens(tokens, page_num);
            let duration_ms = start.elapsed().as_millis() as u64;
            debug!("Page {}: {} tokens in {}ms", page_num, tokens.len(), duration_ms);
            PageResult::from_tokens(page_num, tokens, duration_ms)
        }
        Err(e) => {
            warn!("Page {}: recognition failed, {}", page_num, e);
            PageResult::failed(
                page_num,
                e.into_page_error(page_num),
                start.elapsed().as_millis() as u64,
            )
        }
    }
}

/// Decode a page off the async worker threads.
pub(crate) async fn load_page(page: PageImage) -> Result<image::DynamicImage, String> {
    tokio::task::spawn_blocking(move || page.load())
        .await
        .map_err(|e| format!("decode task panicked: {e}"))?
        .map_err(|e| e.to_string())
}

/// Assign the page number and re-assert the token invariants: non-blank
/// text, confidence within 0.0..=1.0.
fn stamp_tokens(tokens: Vec<RecognizedToken>, page_num: usize) -> Vec<RecognizedToken> {
    tokens
        .into_iter()
        .filter(|t| !t.text.trim().is_empty())
        .map(|mut t| {
            t.page = page_num;
            t.confidence = unit_confidence(t.confidence);
            t
        })
        .collect()
}

/// NaN and infinities carry no information and become 0.0.
fn unit_confidence(raw: f32) -> f32 {
    if raw.is_finite() {
        raw.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
