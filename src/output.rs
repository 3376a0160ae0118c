//! Result types produced by the extraction pipeline.
//!
//! These are the strongly-typed entities every stage hands to the next. The
//! JSON payload returned to callers and the structured record artifact are
//! plain serde projections of them; the wire names (`boxes`, `total_lines`,
//! `processed_at`, `downloads`) are kept stable for existing clients.

use crate::error::PageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Axis-aligned word box in page pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// A detection is only meaningful with a non-zero area.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// One word-level detection.
///
/// `text` is never empty after trimming: recognizers drop such detections
/// before they reach this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedToken {
    /// 1-based page index. Recognizers leave it at 0; the page processor stamps it.
    pub page: usize,
    pub text: String,
    /// Normalised to 0.0–1.0.
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Outcome of recognising a single page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-based page number.
    pub page_num: usize,
    /// Tokens in detection order.
    pub tokens: Vec<RecognizedToken>,
    /// Token texts joined with single spaces.
    pub text: String,
    /// Always equal to `tokens.len()`.
    pub token_count: usize,
    /// Wall-clock time spent on this page.
    pub duration_ms: u64,
    /// Set when the page degraded to an empty result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<PageError>,
}

impl PageResult {
    /// Build a successful result from tokens already stamped with `page_num`.
    pub fn from_tokens(page_num: usize, tokens: Vec<RecognizedToken>, duration_ms: u64) -> Self {
        let text = tokens
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            page_num,
            token_count: tokens.len(),
            tokens,
            text,
            duration_ms,
            error: None,
        }
    }

    /// An empty result recording why the page produced nothing.
    pub fn failed(page_num: usize, error: PageError, duration_ms: u64) -> Self {
        Self {
            page_num,
            tokens: Vec::new(),
            text: String::new(),
            token_count: 0,
            duration_ms,
            error: Some(error),
        }
    }
}

/// Whole-document recognition outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    /// Page sections (`--- Page N ---` header + page text) joined by blank lines.
    pub full_text: String,
    /// All tokens, page order then detection order.
    #[serde(rename = "boxes")]
    pub tokens: Vec<RecognizedToken>,
    /// Sum of per-page token counts.
    #[serde(rename = "total_lines")]
    pub total_tokens: usize,
    /// Number of rasterized pages, including pages that yielded nothing.
    pub total_pages: usize,
    #[serde(rename = "processed_at")]
    pub completed_at: DateTime<Utc>,
}

/// The three artifact formats written per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Json,
    Txt,
    Markdown,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [ArtifactKind::Json, ArtifactKind::Txt, ArtifactKind::Markdown];

    /// File extension used on disk.
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Json => "json",
            ArtifactKind::Txt => "txt",
            ArtifactKind::Markdown => "md",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Json => write!(f, "json"),
            ArtifactKind::Txt => write!(f, "txt"),
            ArtifactKind::Markdown => write!(f, "markdown"),
        }
    }
}

/// Where one artifact was written and where it is served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLocation {
    pub path: PathBuf,
    pub url: String,
}

/// Artifact locations sharing one result identifier.
///
/// A `None` slot means that artifact could not be written; the matching
/// [`ArtifactWarning`] on [`ExtractionOutput`] says why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedArtifactSet {
    pub id: Uuid,
    pub json: Option<ArtifactLocation>,
    pub txt: Option<ArtifactLocation>,
    pub markdown: Option<ArtifactLocation>,
}

impl PersistedArtifactSet {
    pub fn get(&self, kind: ArtifactKind) -> Option<&ArtifactLocation> {
        match kind {
            ArtifactKind::Json => self.json.as_ref(),
            ArtifactKind::Txt => self.txt.as_ref(),
            ArtifactKind::Markdown => self.markdown.as_ref(),
        }
    }

    /// Number of artifacts that were written successfully.
    pub fn written(&self) -> usize {
        ArtifactKind::ALL.iter().filter(|k| self.get(**k).is_some()).count()
    }
}

/// A persistence failure attached to an otherwise successful result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactWarning {
    pub artifact: ArtifactKind,
    pub message: String,
}

/// Timing and failure counters for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub rasterize_ms: u64,
    pub recognize_ms: u64,
    pub total_ms: u64,
    /// Pages that degraded to an empty result.
    pub failed_pages: usize,
}

/// Everything returned to the caller for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub filename: String,
    #[serde(flatten)]
    pub result: AggregateResult,
    pub downloads: PersistedArtifactSet,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ArtifactWarning>,
    pub stats: ExtractionStats,
}

/// The structured record artifact: filename plus the aggregate.
#[derive(Debug, Serialize)]
pub struct DocumentRecord<'a> {
    pub filename: &'a str,
    #[serde(flatten)]
    pub result: &'a AggregateResult,
}
