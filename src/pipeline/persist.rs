//! Output persistence: write the aggregate as JSON, text and markdown.
//!
//! All three artifacts share one fresh UUID, so concurrent requests writing
//! into the same output directory never collide. Each write is independent
//! and best-effort: a failure is reported as an [`ArtifactWarning`] and the
//! remaining artifacts are still attempted. Writes go to a `.tmp` sibling and
//! are renamed into place, so a reader never sees a half-written artifact.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::labels::Labels;
use crate::output::{
    AggregateResult, ArtifactKind, ArtifactLocation, ArtifactWarning, DocumentRecord,
    PersistedArtifactSet,
};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// What a persist call produced: the locations plus any write failures.
#[derive(Debug, Clone)]
pub struct PersistOutcome {
    pub artifacts: PersistedArtifactSet,
    pub warnings: Vec<ArtifactWarning>,
}

/// Append-only artifact directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    output_dir: PathBuf,
    public_base: String,
    labels: Labels,
}

impl ArtifactStore {
    pub fn new(output_dir: impl Into<PathBuf>, public_base: impl Into<String>, labels: Labels) -> Self {
        Self {
            output_dir: output_dir.into(),
            public_base: public_base.into(),
            labels,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(&config.output_dir, &config.public_base, config.labels.clone())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write all three artifacts for `result` under a new identifier.
    pub async fn persist(&self, result: &AggregateResult, filename: &str) -> PersistOutcome {
        self.persist_with_id(Uuid::new_v4(), result, filename).await
    }

    pub(crate) async fn persist_with_id(
        &self,
        id: Uuid,
        result: &AggregateResult,
        filename: &str,
    ) -> PersistOutcome {
        let mut artifacts = PersistedArtifactSet {
            id,
            json: None,
            txt: None,
            markdown: None,
        };
        let mut warnings = Vec::new();

        if let Err(e) = tokio::fs::create_dir_all(&self.output_dir).await {
            // Every write below will fail too; they report individually.
            warn!("Cannot create output dir {}: {}", self.output_dir.display(), e);
        }

        for kind in ArtifactKind::ALL {
            let path = self.output_dir.join(format!("{id}.{}", kind.extension()));
            let outcome = match self.render(kind, result, filename) {
                Ok(bytes) => write_atomic(&path, &bytes).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => {
                    debug!("Wrote {} artifact {}", kind, path.display());
                    let location = ArtifactLocation {
                        url: format!("{}/{}.{}", self.public_base, id, kind.extension()),
                        path,
                    };
                    match kind {
                        ArtifactKind::Json => artifacts.json = Some(location),
                        ArtifactKind::Txt => artifacts.txt = Some(location),
                        ArtifactKind::Markdown => artifacts.markdown = Some(location),
                    }
                }
                Err(e) => {
                    warn!("Artifact {} not written: {}", kind, e);
                    warnings.push(ArtifactWarning {
                        artifact: kind,
                        message: e.to_string(),
                    });
                }
            }
        }

        PersistOutcome {
            artifacts,
            warnings,
        }
    }

    fn render(&self, kind: ArtifactKind, result: &AggregateResult, filename: &str) -> Result<Vec<u8>, ExtractError> {
        match kind {
            ArtifactKind::Json => {
                let record = DocumentRecord { filename, result };
                serde_json::to_vec_pretty(&record)
                    .map_err(|e| ExtractError::Internal(format!("record serialisation: {e}")))
            }
            ArtifactKind::Txt => Ok(result.full_text.clone().into_bytes()),
            ArtifactKind::Markdown => Ok(render_markdown(result, filename, &self.labels).into_bytes()),
        }
    }
}

/// Title, summary block, separator, then the full text.
pub fn render_markdown(result: &AggregateResult, filename: &str, labels: &Labels) -> String {
    let mut md = String::new();
    md.push_str(&format!("# {}\n\n", filename));
    md.push_str(&format!("**{}:** {}  \n", labels.total_pages, result.total_pages));
    md.push_str(&format!("**{}:** {}  \n", labels.words_detected, result.total_tokens));
    md.push_str(&format!(
        "**{}:** {}\n\n",
        labels.date,
        result.completed_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    md.push_str("---\n\n");
    md.push_str(&result.full_text);
    md
}

/// Write to `<path>.tmp`, then rename over `path`.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ExtractError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let written = match tokio::fs::write(&tmp, bytes).await {
        Ok(()) => tokio::fs::rename(&tmp, path).await,
        Err(e) => Err(e),
    };

    // A short write or failed rename must not leave the `.tmp` behind.
    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(ExtractError::PersistFailed {
            path: path.to_path_buf(),
            source: e,
        });
    }
    Ok(())
}
