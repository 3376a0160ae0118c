//! Rasterization: turn a staged document into ordered page images.
//!
//! Image uploads become a single page. PDFs are handed to an external
//! rasterizer ([`Pdftoppm`] by default) that writes one `page-N.png` per page
//! into the staging directory. The lexicographic order of those file names is
//! the only source of truth for page numbering: pdftoppm zero-pads the
//! numbers, so sorting by name is sorting by page.
//!
//! ## Why lazy page images?
//!
//! A 300 DPI A4 page decodes to roughly 25 MB of pixels. PDF pages stay on
//! disk until the page processor loads them one at a time, so peak memory is
//! one page regardless of document length.

use crate::error::ExtractError;
use crate::pipeline::deadline::Deadline;
use crate::pipeline::intake::StagedFile;
use async_trait::async_trait;
use image::DynamicImage;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File prefix passed to the rasterizer; pages come back as `page-N.png`.
pub const PAGE_PREFIX: &str = "page";

static PAGE_FILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^page-\d+\.png$").expect("valid regex"));

/// One rasterized page.
#[derive(Debug)]
pub struct PageImage {
    index: usize,
    raster: Raster,
}

#[derive(Debug)]
enum Raster {
    Decoded(DynamicImage),
    File(PathBuf),
}

impl PageImage {
    /// A page whose pixels are already in memory.
    pub fn from_image(index: usize, image: DynamicImage) -> Self {
        Self {
            index,
            raster: Raster::Decoded(image),
        }
    }

    /// A page still on disk, decoded on [`PageImage::load`].
    pub fn from_file(index: usize, path: impl Into<PathBuf>) -> Self {
        Self {
            index,
            raster: Raster::File(path.into()),
        }
    }

    /// 1-based page index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Consume the page and return its pixels. Blocking when the page is on disk.
    pub fn load(self) -> Result<DynamicImage, image::ImageError> {
        match self.raster {
            Raster::Decoded(img) => Ok(img),
            Raster::File(path) => image::open(path),
        }
    }
}

/// External capability that rasterizes a PDF into numbered PNG files.
#[async_trait]
pub trait PdfRasterizer: Send + Sync {
    /// Write one `{PAGE_PREFIX}-N.png` per page into `out_dir`.
    async fn rasterize_pdf(&self, pdf: &Path, out_dir: &Path, dpi: u32) -> Result<(), ExtractError>;
}

/// Rasterizer backed by poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct Pdftoppm {
    binary: PathBuf,
}

impl Pdftoppm {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for Pdftoppm {
    fn default() -> Self {
        Self::new("pdftoppm")
    }
}

#[async_trait]
impl PdfRasterizer for Pdftoppm {
    async fn rasterize_pdf(&self, pdf: &Path, out_dir: &Path, dpi: u32) -> Result<(), ExtractError> {
        let output = tokio::process::Command::new(&self.binary)
            .args(["-png", "-r", &dpi.to_string()])
            .arg(pdf)
            .arg(out_dir.join(PAGE_PREFIX))
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => Ok(()),
            Ok(out) => Err(ExtractError::RasterizationFailed {
                detail: format!(
                    "pdftoppm exited with {}: {}",
                    out.status,
                    String::from_utf8_lossy(&out.stderr).trim()
                ),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ExtractError::EngineUnavailable {
                tool: self.binary.display().to_string(),
                hint: "pdftoppm not installed. Install with: apt install poppler-utils".to_string(),
            }),
            Err(e) => Err(ExtractError::RasterizationFailed {
                detail: format!("failed to run pdftoppm: {e}"),
            }),
        }
    }
}

/// Rasterize a staged document into 1-based, gap-free, ordered pages.
///
/// # Errors
/// - [`ExtractError::DecodeError`]: an image upload is not a PNG/JPEG
/// - [`ExtractError::RasterizationFailed`]: the PDF rasterizer failed or
///   produced zero pages
/// - [`ExtractError::Cancelled`]: the deadline expired during rasterization
pub async fn rasterize(
    staged: &StagedFile,
    rasterizer: &dyn PdfRasterizer,
    dpi: u32,
    deadline: Deadline,
) -> Result<Vec<PageImage>, ExtractError> {
    if !staged.kind().is_pdf() {
        let path = staged.path().to_path_buf();
        let decoded = tokio::task::spawn_blocking({
            let path = path.clone();
            move || image::open(path)
        })
        .await
        .map_err(|e| ExtractError::Internal(format!("Decode task panicked: {}", e)))?;

        let img = decoded.map_err(|e| ExtractError::DecodeError {
            path,
            detail: e.to_string(),
        })?;
        debug!("Decoded image upload → {}x{} px", img.width(), img.height());
        return Ok(vec![PageImage::from_image(1, img)]);
    }

    if deadline.is_expired() {
        return Err(ExtractError::Cancelled {
            elapsed_ms: deadline.elapsed_ms(),
        });
    }

    tokio::time::timeout_at(
        deadline.at(),
        rasterizer.rasterize_pdf(staged.path(), staged.dir(), dpi),
    )
    .await
    .map_err(|_| ExtractError::Cancelled {
        elapsed_ms: deadline.elapsed_ms(),
    })??;

    let files = collect_page_files(staged.dir()).await?;
    if files.is_empty() {
        return Err(ExtractError::RasterizationFailed {
            detail: "rasterizer produced no pages".to_string(),
        });
    }

    info!("Rasterized {} pages at {} DPI", files.len(), dpi);
    Ok(files
        .into_iter()
        .enumerate()
        .map(|(i, path)| PageImage::from_file(i + 1, path))
        .collect())
}

/// List `page-N.png` files in `dir`, sorted by file name.
pub async fn collect_page_files(dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ExtractError::RasterizationFailed {
            detail: format!("cannot list rasterizer output: {e}"),
        })?;

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ExtractError::RasterizationFailed {
            detail: format!("cannot list rasterizer output: {e}"),
        })?
    {
        let name = entry.file_name().to_string_lossy().to_string();
        if PAGE_FILE.is_match(&name) {
            names.push(name);
        }
    }
    names.sort();

    Ok(names.into_iter().map(|n| dir.join(n)).collect())
}
