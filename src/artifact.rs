//! Model artifacts and their durable store.
//!
//! An artifact bundles a fitted model with every piece of preprocessing
//! state it depends on; it is written once at the end of a successful fit
//! and read-only afterwards. Artifacts are opaque binary blobs under
//! collision-free names; publishing is atomic (temp file, then rename) so a
//! partially written artifact is never visible under a finished identifier.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::algorithm::{FittedModel, ProblemType};
use crate::error::{Result, TabmlError};
use crate::features::FeatureSpace;
use crate::target::TargetCodec;

/// Current artifact layout version. Bumped on incompatible changes; load
/// rejects anything else instead of misinterpreting it.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

const ARTIFACT_EXTENSION: &str = "model";

/// A trained model plus the exact preprocessing state used to produce it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub workspace_id: String,
    pub dataset_id: String,
    pub algorithm: String,
    pub problem_type: ProblemType,
    pub target_column: Option<String>,
    pub feature_space: FeatureSpace,
    pub target_codec: TargetCodec,
    /// Capability flag recorded at training time: the model exposes
    /// class-probability output.
    pub supports_probability: bool,
    pub model: FittedModel,
    pub trained_at: DateTime<Utc>,
}

/// Metadata summary for one stored artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub algorithm: String,
    pub problem_type: ProblemType,
    pub feature_columns: Vec<String>,
    pub trained_at: DateTime<Utc>,
    pub file_size: u64,
}

/// Listing entry for one workspace artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredModelInfo {
    pub id: String,
    pub size: u64,
    pub created: DateTime<Utc>,
}

/// Directory-backed artifact store.
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Open (creating if needed) a store rooted at the given directory.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(ArtifactStore { dir })
    }

    /// The directory backing this store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist an artifact and return its identifier.
    ///
    /// The identifier encodes workspace, dataset, algorithm and a UTC
    /// timestamp; a random suffix keeps two saves within the same second
    /// from colliding.
    pub fn save(&self, artifact: &ModelArtifact) -> Result<String> {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let id = format!(
            "{}_{}_{}_{}_{}.{ARTIFACT_EXTENSION}",
            artifact.workspace_id,
            artifact.dataset_id,
            artifact.algorithm,
            artifact.trained_at.format("%Y%m%d_%H%M%S"),
            &suffix[..8],
        );

        let bytes = bincode::serialize(artifact)
            .map_err(|e| TabmlError::serialization(e.to_string()))?;

        // Write to a temporary name, then rename: readers never observe a
        // partial artifact under a finished identifier.
        let final_path = self.path_for(&id)?;
        let temp_path = final_path.with_extension("tmp");
        std::fs::write(&temp_path, &bytes)?;
        std::fs::rename(&temp_path, &final_path)?;

        info!(artifact_id = %id, size = bytes.len(), "artifact saved");
        Ok(id)
    }

    /// Load an artifact by identifier.
    pub fn load(&self, id: &str) -> Result<ModelArtifact> {
        let path = self.path_for(id)?;
        if !path.is_file() {
            return Err(TabmlError::artifact_not_found(id));
        }

        let bytes = std::fs::read(&path)?;
        let artifact: ModelArtifact = bincode::deserialize(&bytes).map_err(|e| {
            TabmlError::artifact_format(format!("{id}: not a valid model artifact: {e}"))
        })?;

        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(TabmlError::artifact_format(format!(
                "{id}: unsupported artifact format version {} (expected {ARTIFACT_FORMAT_VERSION})",
                artifact.format_version
            )));
        }

        Ok(artifact)
    }

    /// Metadata for a stored artifact without exposing the model itself.
    pub fn metadata(&self, id: &str) -> Result<ArtifactMetadata> {
        let artifact = self.load(id)?;
        let file_size = std::fs::metadata(self.path_for(id)?)?.len();

        Ok(ArtifactMetadata {
            algorithm: artifact.algorithm,
            problem_type: artifact.problem_type,
            feature_columns: artifact.feature_space.feature_columns().to_vec(),
            trained_at: artifact.trained_at,
            file_size,
        })
    }

    /// List all artifacts belonging to a workspace.
    pub fn list(&self, workspace_id: &str) -> Result<Vec<StoredModelInfo>> {
        let prefix = format!("{workspace_id}_");
        let mut entries = Vec::new();

        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(&prefix) || !name.ends_with(&format!(".{ARTIFACT_EXTENSION}")) {
                continue;
            }
            let meta = entry.metadata()?;
            let created = meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            entries.push(StoredModelInfo {
                id: name,
                size: meta.len(),
                created,
            });
        }

        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entries)
    }

    /// Export a stored artifact to a file outside the store.
    ///
    /// `binary` copies the opaque blob as-is; `json` writes a readable dump
    /// of the artifact. Any other format name is a validation error.
    pub fn export(&self, id: &str, format: &str, output: &Path) -> Result<()> {
        match format {
            "binary" => {
                let source = self.path_for(id)?;
                if !source.is_file() {
                    return Err(TabmlError::artifact_not_found(id));
                }
                std::fs::copy(&source, output)?;
            }
            "json" => {
                let artifact = self.load(id)?;
                let json = serde_json::to_string_pretty(&artifact)?;
                std::fs::write(output, json)?;
            }
            other => {
                return Err(TabmlError::validation(format!(
                    "unsupported export format: {other}"
                )));
            }
        }
        Ok(())
    }

    /// Resolve an identifier to a path inside the store directory,
    /// rejecting identifiers that would escape it.
    fn path_for(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains('/') || id.contains('\\') || id.contains("..") {
            return Err(TabmlError::validation(format!(
                "invalid artifact identifier: {id}"
            )));
        }
        Ok(self.dir.join(id))
    }
}
