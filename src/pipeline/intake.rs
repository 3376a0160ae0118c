//! Intake: turn an upload into a staged file inside a private directory.
//!
//! ## Why a directory per request?
//!
//! pdftoppm writes one PNG per page next to its input, so each request needs
//! a directory nobody else writes into. [`StagedFile`] owns a [`TempDir`];
//! dropping it removes the directory and everything the rasterizer put there,
//! on success, partial failure and early `?` returns alike.
//!
//! The extension allow-list is checked before anything touches the disk.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Extensions accepted at intake, lowercased and without the dot.
pub const ACCEPTED_EXTENSIONS: [&str; 4] = ["pdf", "png", "jpg", "jpeg"];

/// Raw upload as received from the caller.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    /// Filename declared by the client; only its extension is trusted.
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedDocument {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Lowercased text after the last `.` of the declared file name, empty
    /// if there is none. A bare `.pdf` counts as a pdf.
    pub fn extension(&self) -> String {
        Path::new(&self.filename)
            .file_name()
            .and_then(|name| {
                name.to_string_lossy()
                    .rsplit_once('.')
                    .map(|(_, ext)| ext.to_lowercase())
            })
            .unwrap_or_default()
    }

    /// Read a local file into an upload, enforcing the size policy first.
    pub async fn from_path(path: impl AsRef<Path>, max_bytes: u64) -> Result<Self, ExtractError> {
        let path = path.as_ref().to_path_buf();

        let meta = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ExtractError::FileNotFound { path });
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(ExtractError::PermissionDenied { path });
            }
            Err(_) => return Err(ExtractError::FileNotFound { path }),
        };
        check_size(meta.len(), max_bytes)?;

        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                ExtractError::PermissionDenied { path: path.clone() }
            } else {
                ExtractError::FileNotFound { path: path.clone() }
            }
        })?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());

        debug!("Read local upload {} ({} bytes)", path.display(), bytes.len());
        Ok(Self::new(filename, bytes))
    }

    /// Download a URL into an upload.
    pub async fn from_url(url: &str, timeout_secs: u64, max_bytes: u64) -> Result<Self, ExtractError> {
        info!("Downloading upload from: {}", url);

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ExtractError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let response = client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ExtractError::DownloadTimeout {
                    url: url.to_string(),
                    secs: timeout_secs,
                }
            } else {
                ExtractError::DownloadFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        if !response.status().is_success() {
            return Err(ExtractError::DownloadFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        if let Some(len) = response.content_length() {
            check_size(len, max_bytes)?;
        }

        // Content-Length may be missing or wrong; stop reading once over the limit.
        let filename = filename_from_url(url);
        let mut bytes = Vec::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| ExtractError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            check_size((bytes.len() + chunk.len()) as u64, max_bytes)?;
            bytes.extend_from_slice(&chunk);
        }

        info!("Downloaded {} ({} bytes)", filename, bytes.len());
        Ok(Self::new(filename, bytes))
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a local path or HTTP(S) URL into an upload.
pub async fn resolve_upload(
    input: &str,
    config: &ExtractionConfig,
) -> Result<UploadedDocument, ExtractError> {
    if input.trim().is_empty() {
        return Err(ExtractError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        UploadedDocument::from_url(input, config.download_timeout_secs, config.max_upload_bytes).await
    } else {
        UploadedDocument::from_path(input, config.max_upload_bytes).await
    }
}

/// Enforce the upload size policy.
pub fn check_size(size: u64, limit: u64) -> Result<(), ExtractError> {
    if size > limit {
        return Err(ExtractError::UploadTooLarge { size, limit });
    }
    Ok(())
}

/// Last path segment of the URL, or a generic name when it has no extension.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

/// What kind of document a staged file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Png,
    Jpeg,
}

impl DocumentKind {
    /// Map an accepted extension (lowercased, no dot) to a kind.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "pdf" => Some(DocumentKind::Pdf),
            "png" => Some(DocumentKind::Png),
            "jpg" | "jpeg" => Some(DocumentKind::Jpeg),
            _ => None,
        }
    }

    pub fn is_pdf(&self) -> bool {
        matches!(self, DocumentKind::Pdf)
    }
}

/// An upload written into its own temporary directory.
///
/// The directory and everything in it is removed when this value is dropped.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    kind: DocumentKind,
    dir: TempDir,
}

impl StagedFile {
    /// Path of the staged document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// The private directory; rasterizer output goes here.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

/// Validate the upload's extension and write it into a fresh staging directory.
///
/// # Errors
/// - [`ExtractError::UnsupportedFormat`] when the extension is not accepted;
///   nothing is created on disk in that case.
/// - [`ExtractError::StorageError`] when the directory or file cannot be written.
pub async fn stage_upload(
    upload: UploadedDocument,
    staging_root: Option<&Path>,
) -> Result<StagedFile, ExtractError> {
    let ext = upload.extension();
    let kind = DocumentKind::from_extension(&ext).ok_or_else(|| ExtractError::UnsupportedFormat {
        filename: upload.filename.clone(),
        extension: ext.clone(),
    })?;

    let root = staging_root
        .map(Path::to_path_buf)
        .unwrap_or_else(std::env::temp_dir);
    let dir = tempfile::Builder::new()
        .prefix("ocr-upload-")
        .tempdir_in(&root)
        .map_err(|e| ExtractError::StorageError {
            path: root.clone(),
            source: e,
        })?;

    let name = if kind.is_pdf() {
        "input.pdf".to_string()
    } else {
        format!("image.{ext}")
    };
    let path = dir.path().join(name);
    tokio::fs::write(&path, &upload.bytes)
        .await
        .map_err(|e| ExtractError::StorageError {
            path: path.clone(),
            source: e,
        })?;

    debug!(
        "Staged '{}' as {} ({} bytes)",
        upload.filename,
        path.display(),
        upload.bytes.len()
    );
    Ok(StagedFile { path, kind, dir })
}
