//! Aggregation: merge ordered page results into one document result.
//!
//! Pure and order-preserving. Pages arrive already sorted by page number
//! (the pipeline processes them one at a time, in order), so there is no
//! reordering step here; the output depends only on the input slice.

use crate::labels::Labels;
use crate::output::{AggregateResult, PageResult};
use chrono::{DateTime, Utc};

/// Merge `pages` into an [`AggregateResult`].
///
/// Every page counts toward `total_pages`; only pages with non-empty text get
/// a `--- {label} N ---` section in `full_text`. Sections are joined by a
/// blank line.
pub fn aggregate(pages: &[PageResult], labels: &Labels, completed_at: DateTime<Utc>) -> AggregateResult {
    AggregateResult {
        full_text: join_sections(pages.iter().map(|p| (p.page_num, p.text.as_str())), labels),
        tokens: pages.iter().flat_map(|p| p.tokens.iter().cloned()).collect(),
        total_tokens: pages.iter().map(|p| p.token_count).sum(),
        total_pages: pages.len(),
        completed_at,
    }
}

/// Build the sectioned full text from `(page_num, text)` pairs.
///
/// Shared with the plain-text entry point so both apply the same header policy.
pub fn join_sections<'a>(pages: impl Iterator<Item = (usize, &'a str)>, labels: &Labels) -> String {
    pages
        .filter(|(_, text)| !text.is_empty())
        .map(|(n, text)| format!("{}\n{}", labels.page_header(n), text))
        .collect::<Vec<_>>()
        .join("\n\n")
}
