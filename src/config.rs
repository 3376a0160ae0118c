//! Configuration types for document text extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share a config across concurrent requests and to log it.
//!
//! The only process-wide state the pipeline relies on is what lives here: the
//! configured language and the shared output directory.

use crate::error::ExtractError;
use crate::labels::Labels;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// 50 MiB, the default upload size policy.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 << 20;

/// Longest accepted request budget: one day.
pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Configuration for an extraction request.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use ocr_extract::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .language("eng")
///     .timeout_secs(60)
///     .output_dir("/var/lib/ocr/outputs")
///     .build()
///     .unwrap();
/// assert_eq!(config.labels.page, "Page");
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Recognition language in tesseract syntax, e.g. `spa` or `spa+eng`. Default: `spa`.
    pub language: String,

    /// Rasterization density for PDF pages. Range: 72–600. Default: 300.
    ///
    /// 300 DPI is the density tesseract is tuned for; lower values lose small
    /// glyphs, higher values mostly cost time.
    pub dpi: u32,

    /// Deadline budget in seconds for the rasterize + recognize phase. Default: 120.
    pub timeout_secs: u64,

    /// Directory receiving the `<id>.json`, `<id>.txt` and `<id>.md` artifacts.
    pub output_dir: PathBuf,

    /// URL prefix under which `output_dir` is served. Default: `/outputs`.
    pub public_base: String,

    /// Parent directory for per-request staging directories.
    /// If None, uses the system temp directory.
    pub staging_dir: Option<PathBuf>,

    /// Maximum accepted upload size in bytes. Default: 50 MiB.
    pub max_upload_bytes: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Path or name of the tesseract executable.
    pub tesseract_bin: PathBuf,

    /// Path or name of the pdftoppm executable.
    pub pdftoppm_bin: PathBuf,

    /// Localized labels for headers and markdown. Derived from `language` unless set.
    pub labels: Labels,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        let language = "spa".to_string();
        Self {
            labels: Labels::for_language(&language),
            language,
            dpi: 300,
            timeout_secs: 120,
            output_dir: PathBuf::from("outputs"),
            public_base: "/outputs".to_string(),
            staging_dir: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            download_timeout_secs: 120,
            tesseract_bin: PathBuf::from("tesseract"),
            pdftoppm_bin: PathBuf::from("pdftoppm"),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("language", &self.language)
            .field("dpi", &self.dpi)
            .field("timeout_secs", &self.timeout_secs)
            .field("output_dir", &self.output_dir)
            .field("public_base", &self.public_base)
            .field("staging_dir", &self.staging_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("tesseract_bin", &self.tesseract_bin)
            .field("pdftoppm_bin", &self.pdftoppm_bin)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
            labels_overridden: false,
        }
    }

    /// The request deadline budget as a `Duration`.
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
    labels_overridden: bool,
}

impl ExtractionConfigBuilder {
    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.language = lang.into().trim().to_string();
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn public_base(mut self, base: impl Into<String>) -> Self {
        self.config.public_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.staging_dir = Some(dir.into());
        self
    }

    pub fn max_upload_bytes(mut self, n: u64) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn tesseract_bin(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_bin = path.into();
        self
    }

    pub fn pdftoppm_bin(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdftoppm_bin = path.into();
        self
    }

    pub fn labels(mut self, labels: Labels) -> Self {
        self.config.labels = labels;
        self.labels_overridden = true;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.language.is_empty() {
            return Err(ExtractError::InvalidConfig(
                "Language must not be empty".into(),
            ));
        }
        if c.timeout_secs == 0 {
            return Err(ExtractError::InvalidConfig(
                "Timeout must be ≥ 1 second".into(),
            ));
        }
        if c.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(ExtractError::InvalidConfig(format!(
                "Timeout must be ≤ {} seconds, got {}",
                MAX_TIMEOUT_SECS, c.timeout_secs
            )));
        }
        if c.max_upload_bytes == 0 {
            return Err(ExtractError::InvalidConfig(
                "Maximum upload size must be ≥ 1 byte".into(),
            ));
        }
        if !self.labels_overridden {
            self.config.labels = Labels::for_language(&self.config.language);
        }
        Ok(self.config)
    }
}
