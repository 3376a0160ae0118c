//! Text recognition: the adapter around the external OCR engine.
//!
//! The engine itself is opaque. [`Recognizer`] asks two things of it: plain
//! text for an image, and word-level detections with boxes and confidence.
//! [`TesseractEngine`] answers both by running the `tesseract` CLI.
//!
//! ## One session per call
//!
//! Every call gets its own scratch directory, writes the page there, runs one
//! tesseract process configured with the requested language, and removes the
//! directory on return. No engine state survives between calls, so concurrent
//! requests can never see each other's language configuration.
//!
//! ## Invariants upheld here
//!
//! - An already-expired deadline fails with [`RecognitionError::Cancelled`]
//!   before any process is spawned; a deadline that expires mid-call kills
//!   the process.
//! - Confidence is normalised from tesseract's 0–100 scale to 0.0–1.0.
//! - Words whose text is empty after trimming are never returned.

use crate::error::{ExtractError, RecognitionError};
use crate::output::{BoundingBox, RecognizedToken};
use crate::pipeline::deadline::Deadline;
use async_trait::async_trait;
use image::DynamicImage;
use std::path::PathBuf;
use tempfile::TempDir;
use tracing::{debug, info};

/// External text-recognition capability.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Recognise the whole image as plain text.
    async fn extract_plain_text(
        &self,
        image: &DynamicImage,
        language: &str,
        deadline: Deadline,
    ) -> Result<String, RecognitionError>;

    /// Recognise word-level tokens. Returned tokens have `page == 0`.
    async fn extract_with_layout(
        &self,
        image: &DynamicImage,
        language: &str,
        deadline: Deadline,
    ) -> Result<Vec<RecognizedToken>, RecognitionError>;
}

/// Tesseract OCR via its command-line interface.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: PathBuf,
    language: String,
    available: Vec<String>,
}

impl TesseractEngine {
    /// Probe the installed tesseract and validate `language` against it.
    ///
    /// # Errors
    /// - [`ExtractError::EngineUnavailable`]: the binary cannot be run
    /// - [`ExtractError::UnsupportedLanguage`]: a component of `language`
    ///   (`spa+eng` has two) has no installed traineddata
    pub async fn new(binary: impl Into<PathBuf>, language: &str) -> Result<Self, ExtractError> {
        let binary = binary.into();
        let output = tokio::process::Command::new(&binary)
            .arg("--list-langs")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExtractError::EngineUnavailable {
                tool: binary.display().to_string(),
                hint: if e.kind() == std::io::ErrorKind::NotFound {
                    "Tesseract not installed. Install with: apt install tesseract-ocr".to_string()
                } else {
                    format!("failed to run tesseract: {e}")
                },
            })?;

        // Older releases print the list on stderr.
        let mut listing = String::from_utf8_lossy(&output.stdout).to_string();
        listing.push('\n');
        listing.push_str(&String::from_utf8_lossy(&output.stderr));
        let available = parse_language_list(&listing);

        let engine = Self {
            binary,
            language: language.to_string(),
            available,
        };
        if !engine.supports(language) {
            return Err(ExtractError::UnsupportedLanguage {
                language: language.to_string(),
                available: engine.available.clone(),
            });
        }

        info!(
            "Tesseract ready: language '{}' ({} languages installed)",
            language,
            engine.available.len()
        );
        Ok(engine)
    }

    /// Language validated at construction.
    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn available_languages(&self) -> &[String] {
        &self.available
    }

    /// Whether every `+`-joined component of `language` is installed.
    pub fn supports(&self, language: &str) -> bool {
        !language.is_empty()
            && language
                .split('+')
                .all(|l| self.available.iter().any(|a| a == l))
    }

    /// Run one tesseract session over `image`, returning its stdout.
    async fn run_session(
        &self,
        image: &DynamicImage,
        language: &str,
        deadline: Deadline,
        tsv: bool,
    ) -> Result<String, RecognitionError> {
        if deadline.is_expired() {
            return Err(RecognitionError::Cancelled);
        }
        if !self.supports(language) {
            return Err(RecognitionError::UnsupportedLanguage(language.to_string()));
        }

        let (_session, input) = stage_session(image.clone()).await?;

        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.arg(&input).arg("stdout").args(["-l", language]);
        if tsv {
            cmd.arg("tsv");
        }
        cmd.kill_on_drop(true);

        let output = tokio::time::timeout_at(deadline.at(), cmd.output())
            .await
            .map_err(|_| RecognitionError::Cancelled)??;

        if !output.status.success() {
            return Err(RecognitionError::EngineFailed(format!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl Recognizer for TesseractEngine {
    async fn extract_plain_text(
        &self,
        image: &DynamicImage,
        language: &str,
        deadline: Deadline,
    ) -> Result<String, RecognitionError> {
        let text = self.run_session(image, language, deadline, false).await?;
        Ok(text.trim().to_string())
    }

    async fn extract_with_layout(
        &self,
        image: &DynamicImage,
        language: &str,
        deadline: Deadline,
    ) -> Result<Vec<RecognizedToken>, RecognitionError> {
        let tsv = self.run_session(image, language, deadline, true).await?;
        let tokens = parse_tsv(&tsv);
        debug!("tesseract returned {} words", tokens.len());
        Ok(tokens)
    }
}

/// Create a scratch directory and encode `image` into it as `page.png`.
///
/// PNG encoding of a full-resolution page is CPU-bound, so it runs on the
/// blocking pool. The directory lives as long as the returned [`TempDir`].
async fn stage_session(image: DynamicImage) -> Result<(TempDir, PathBuf), RecognitionError> {
    tokio::task::spawn_blocking(move || {
        let session = tempfile::Builder::new().prefix("ocr-session-").tempdir()?;
        let input = session.path().join("page.png");
        image.save_with_format(&input, image::ImageFormat::Png)?;
        Ok::<_, RecognitionError>((session, input))
    })
    .await
    .map_err(|e| RecognitionError::EngineFailed(format!("session setup task panicked: {e}")))?
}

/// Map a 0–100 engine confidence onto 0.0–1.0.
///
/// Tesseract reports `-1` for rows without a confidence; those and any
/// non-finite value become 0.0.
pub fn normalize_confidence(raw: f32) -> f32 {
    if !raw.is_finite() {
        return 0.0;
    }
    (raw / 100.0).clamp(0.0, 1.0)
}

/// Parse `tesseract … tsv` output into word tokens.
///
/// Only word rows (level 5) with non-blank text and a non-empty box are kept.
/// Malformed rows are skipped.
pub fn parse_tsv(tsv: &str) -> Vec<RecognizedToken> {
    tsv.lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() < 12 || cols[0] != "5" {
                return None;
            }
            let text = cols[11..].join("\t").trim().to_string();
            if text.is_empty() {
                return None;
            }
            let bbox = BoundingBox {
                x: cols[6].parse().ok()?,
                y: cols[7].parse().ok()?,
                width: cols[8].parse().ok()?,
                height: cols[9].parse().ok()?,
            };
            if !bbox.is_valid() {
                return None;
            }
            let confidence = normalize_confidence(cols[10].parse().ok()?);
            Some(RecognizedToken {
                page: 0,
                text,
                confidence,
                bbox,
            })
        })
        .collect()
}

/// Parse `tesseract --list-langs` output.
fn parse_language_list(listing: &str) -> Vec<String> {
    let mut langs: Vec<String> = listing
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("List of") && !l.contains(' '))
        .map(str::to_string)
        .collect();
    langs.sort();
    langs.dedup();
    langs
}
