//! The unit of work that flows through every pipeline stage.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A single source file moving through the pipeline.
///
/// `original_filename` is fixed at load time. `filename` is the logical name
/// processors may rewrite (e.g. `.md` → `.html`), and `working_filename` is
/// the path used for root matching and output placement; [`rename`] keeps the
/// two in step.
///
/// `contents` is never absent once loaded: an empty string is a valid payload
/// and makes the stripper and rebaser no-ops. `metadata` is `None` until a
/// front-matter block has been stripped.
///
/// [`rename`]: PipelineFile::rename
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineFile {
    pub original_filename: PathBuf,
    pub filename: PathBuf,
    pub working_filename: PathBuf,
    pub contents: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_yaml::Value>,
}

impl PipelineFile {
    /// Create a file whose three names all start as `path`.
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            original_filename: path.clone(),
            filename: path.clone(),
            working_filename: path,
            contents: contents.into(),
            metadata: None,
        }
    }

    /// Read a file from disk.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::new(path, contents))
    }

    /// Point both `filename` and `working_filename` at a new path.
    pub fn rename(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.working_filename = path.clone();
        self.filename = path;
    }

    /// Lowercased extension of the current `filename`, if any.
    pub fn extension(&self) -> Option<String> {
        self.filename
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }

    /// Look up a top-level metadata key as a string.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(key)?.as_str()
    }
}
