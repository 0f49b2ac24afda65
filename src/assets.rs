//! Static asset build: content copying and script tooling.
//!
//! Content files are copied verbatim to `target/<path relative to project>`.
//! A copy is skipped when the target already holds identical bytes (compared
//! by SHA-256), which keeps modification times stable for unchanged assets.
//!
//! Script files are handed to an external tool as `tool <source> <dest>`, the
//! tool being responsible for writing `dest` (bundling, minifying, ...).
//!
//! One file failing never stops the rest; failures are listed in the
//! [`AssetSummary`].

use crate::pipeline::copy_atomic;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("{0} is not inside the project directory")]
    OutsideProject(PathBuf),
    #[error("Failed to run {tool}: {source}")]
    ToolSpawn { tool: PathBuf, source: io::Error },
    #[error("{tool} exited with {status}: {stderr}")]
    ToolExit {
        tool: PathBuf,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Parameters of one asset build. At least one of `content_dir` and
/// `scripts_dir` must be set; `tool` is only consulted for scripts.
#[derive(Debug, Clone)]
pub struct AssetRequest {
    pub content_dir: Option<PathBuf>,
    pub scripts_dir: Option<PathBuf>,
    pub tool: PathBuf,
    pub target_dir: PathBuf,
    pub project_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AssetFailure {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct AssetSummary {
    /// Content files written to the target.
    pub copied: Vec<PathBuf>,
    /// Content files whose target was already up to date.
    pub unchanged: Vec<PathBuf>,
    /// Script files passed through the tool.
    pub scripts: Vec<PathBuf>,
    pub failed: Vec<AssetFailure>,
}

impl AssetSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    fn fail(&mut self, path: &Path, error: AssetError) {
        warn!(path = %path.display(), %error, "asset failed");
        self.failed.push(AssetFailure {
            path: path.to_path_buf(),
            message: error.to_string(),
        });
    }
}

/// SHA-256 hash of a file's contents, returned as a hex string.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{:x}", digest))
}

pub fn build_assets(request: &AssetRequest) -> Result<AssetSummary, AssetError> {
    if request.content_dir.is_none() && request.scripts_dir.is_none() {
        return Err(AssetError::InvalidArgument(
            "a content directory or a scripts directory is required".into(),
        ));
    }
    require("target directory", &request.target_dir)?;
    require("project directory", &request.project_dir)?;
    if request.scripts_dir.is_some() {
        require("tool path", &request.tool)?;
    }
    for dir in [&request.content_dir, &request.scripts_dir].into_iter().flatten() {
        if !dir.is_dir() {
            return Err(AssetError::DirectoryNotFound(dir.clone()));
        }
    }

    let mut summary = AssetSummary::default();

    if let Some(dir) = &request.content_dir {
        for source in files_under(dir, &mut summary) {
            match copy_if_changed(&source, request) {
                Ok(true) => summary.copied.push(source),
                Ok(false) => summary.unchanged.push(source),
                Err(e) => summary.fail(&source, e),
            }
        }
    }

    if let Some(dir) = &request.scripts_dir {
        for source in files_under(dir, &mut summary) {
            match run_tool(&source, request) {
                Ok(()) => summary.scripts.push(source),
                Err(e) => summary.fail(&source, e),
            }
        }
    }

    info!(
        copied = summary.copied.len(),
        unchanged = summary.unchanged.len(),
        scripts = summary.scripts.len(),
        failed = summary.failed.len(),
        "assets built"
    );
    Ok(summary)
}

fn require(what: &str, path: &Path) -> Result<(), AssetError> {
    if path.as_os_str().to_string_lossy().trim().is_empty() {
        return Err(AssetError::InvalidArgument(format!("{what} is blank")));
    }
    Ok(())
}

fn files_under(dir: &Path, summary: &mut AssetSummary) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        match entry {
            Ok(e) if e.file_type().is_file() => files.push(e.into_path()),
            Ok(_) => {}
            Err(e) => {
                let path = e.path().unwrap_or(dir).to_path_buf();
                summary.fail(&path, AssetError::Io(io::Error::other(e.to_string())));
            }
        }
    }
    files
}

fn target_for(source: &Path, request: &AssetRequest) -> Result<PathBuf, AssetError> {
    let relative = source
        .strip_prefix(&request.project_dir)
        .map_err(|_| AssetError::OutsideProject(source.to_path_buf()))?;
    Ok(request.target_dir.join(relative))
}

/// Copy `source` unless the target already has the same hash. Returns
/// whether a copy happened.
fn copy_if_changed(source: &Path, request: &AssetRequest) -> Result<bool, AssetError> {
    let dest = target_for(source, request)?;
    if dest.is_file() && hash_file(&dest)? == hash_file(source)? {
        debug!(path = %source.display(), "asset unchanged");
        return Ok(false);
    }
    copy_atomic(source, &dest)?;
    debug!(path = %source.display(), dest = %dest.display(), "asset copied");
    Ok(true)
}

fn run_tool(source: &Path, request: &AssetRequest) -> Result<(), AssetError> {
    let dest = target_for(source, request)?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let output = Command::new(&request.tool)
        .arg(source)
        .arg(&dest)
        .output()
        .map_err(|source| AssetError::ToolSpawn {
            tool: request.tool.clone(),
            source,
        })?;
    if !output.status.success() {
        return Err(AssetError::ToolExit {
            tool: request.tool.clone(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    debug!(path = %source.display(), dest = %dest.display(), "script built");
    Ok(())
}
