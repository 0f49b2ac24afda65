//! The project's root directories.
//!
//! A project has one project directory, one output directory and several
//! logical roots (views, content, scripts, images) that all sit inside the
//! project. Every root maps onto the output directory: a file at
//! `<root>/a/b.html` is written to `<output>/a/b.html`.
//!
//! Containment is decided on path segments alone (see [`segments`]), never by
//! touching the filesystem, so the same answers come back whether or not the
//! files exist yet.

use crate::config::{ConfigError, ProjectConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Which logical root a directory plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RootKind {
    Views,
    Content,
    Scripts,
    Images,
}

impl fmt::Display for RootKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RootKind::Views => "views",
            RootKind::Content => "content",
            RootKind::Scripts => "scripts",
            RootKind::Images => "images",
        };
        f.write_str(name)
    }
}

/// A configured root with its pre-split segments.
#[derive(Debug, Clone)]
pub struct RootDir {
    pub kind: RootKind,
    pub path: PathBuf,
    segments: Vec<String>,
}

impl RootDir {
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

/// Absolute project, output and root directories.
#[derive(Debug, Clone)]
pub struct RootDirectorySet {
    project_dir: PathBuf,
    output_dir: PathBuf,
    roots: Vec<RootDir>,
}

impl RootDirectorySet {
    /// Build a set from absolute paths.
    ///
    /// Every root must lie under `project_dir`.
    pub fn new(
        project_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        roots: impl IntoIterator<Item = (RootKind, PathBuf)>,
    ) -> Result<Self, ConfigError> {
        let project_dir = project_dir.into();
        let project_segments = resolved(&project_dir)?;

        let mut dirs = Vec::new();
        for (kind, path) in roots {
            let root_segments = resolved(&path)?;
            if !is_under(&root_segments, &project_segments) {
                return Err(ConfigError::Validation(format!(
                    "{kind} root {} is not inside the project directory {}",
                    path.display(),
                    project_dir.display()
                )));
            }
            dirs.push(RootDir {
                kind,
                path,
                segments: root_segments,
            });
        }

        Ok(Self {
            project_dir,
            output_dir: output_dir.into(),
            roots: dirs,
        })
    }

    /// Resolve the configured relative paths against `project_dir`.
    pub fn from_config(project_dir: &Path, config: &ProjectConfig) -> Result<Self, ConfigError> {
        let r = &config.roots;
        Self::new(
            project_dir,
            project_dir.join(&config.output),
            [
                (RootKind::Views, project_dir.join(&r.views)),
                (RootKind::Content, project_dir.join(&r.content)),
                (RootKind::Scripts, project_dir.join(&r.scripts)),
                (RootKind::Images, project_dir.join(&r.images)),
            ],
        )
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn roots(&self) -> &[RootDir] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Path of the first root of the given kind.
    pub fn root(&self, kind: RootKind) -> Option<&Path> {
        self.roots
            .iter()
            .find(|r| r.kind == kind)
            .map(|r| r.path.as_path())
    }
}

/// Split a path into its non-empty segments, accepting both `/` and `\`.
///
/// `.` segments are dropped and `..` pops the segment before it, purely
/// lexically. `None` when a `..` would climb above the start of the path.
pub fn segments(path: &Path) -> Option<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for segment in path.to_string_lossy().split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop()?;
            }
            s => out.push(s.to_string()),
        }
    }
    Some(out)
}

fn resolved(path: &Path) -> Result<Vec<String>, ConfigError> {
    segments(path).ok_or_else(|| {
        ConfigError::Validation(format!("{} climbs above its root", path.display()))
    })
}

/// `true` when `inner` equals `outer` or sits below it.
fn is_under(inner: &[String], outer: &[String]) -> bool {
    inner.len() >= outer.len() && inner[..outer.len()] == *outer
}
