//! Root-relative path rewriting.
//!
//! Views are written to the output tree at various depths, but they all need
//! to reference shared assets at the output root. Authors write the marker
//! [`ROOT_MARKER`] wherever a root-relative prefix belongs:
//!
//! ```html
//! <link rel="stylesheet" href="PATHTOROOT(~)content/site.css">
//! ```
//!
//! and [`PathRebaser::replace_roots_in_file`] swaps it for the prefix that
//! climbs from the file's location back to the root:
//!
//! ```text
//! views/index.html            →  ./content/site.css
//! views/blog/post.html        →  ../content/site.css
//! views/blog/2024/jan.html    →  ../../content/site.css
//! ```
//!
//! Depth is counted on path segments beyond the matching root. When roots
//! nest, the deepest matching root wins. `..` segments are resolved
//! lexically first, so `views/../other/x.html` is judged as `other/x.html`.
//! The filesystem is never consulted.

use crate::roots::{RootDirectorySet, RootDir, RootKind, segments};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Placeholder replaced with the relative prefix to the output root. The
/// `(~)` argument is reserved and carries no meaning.
pub const ROOT_MARKER: &str = "PATHTOROOT(~)";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RebaseError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Where a path landed among the configured roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootMatch {
    pub kind: RootKind,
    pub root: PathBuf,
    /// Segments below the root, file name last.
    pub relative: Vec<String>,
}

impl RootMatch {
    /// Number of directories between the root and the file.
    pub fn depth(&self) -> usize {
        self.relative.len().saturating_sub(1)
    }
}

/// Computes root-relative prefixes and output locations.
#[derive(Debug, Clone)]
pub struct PathRebaser {
    roots: Arc<RootDirectorySet>,
}

impl PathRebaser {
    /// Fails when the set has no roots configured.
    pub fn new(roots: Arc<RootDirectorySet>) -> Result<Self, RebaseError> {
        if roots.is_empty() {
            return Err(RebaseError::InvalidArgument(
                "no root directories configured".into(),
            ));
        }
        Ok(Self { roots })
    }

    pub fn roots(&self) -> &RootDirectorySet {
        &self.roots
    }

    /// Find the deepest configured root that contains `path`.
    pub fn match_root(&self, path: &Path) -> Result<RootMatch, RebaseError> {
        let file = checked_segments(path)?;

        self.roots
            .roots()
            .iter()
            .filter(|r| contains(r, &file))
            .max_by_key(|r| r.segments().len())
            .map(|r| RootMatch {
                kind: r.kind,
                root: r.path.clone(),
                relative: file[r.segments().len()..].to_vec(),
            })
            .ok_or_else(|| {
                RebaseError::InvalidArgument(format!(
                    "{} is not inside any configured root directory",
                    path.display()
                ))
            })
    }

    /// Relative prefix from `path`'s directory back to its root:
    /// `"./"` at depth 0, otherwise one `"../"` per directory level.
    pub fn get_path_to_root(&self, path: &Path) -> Result<String, RebaseError> {
        let depth = self.match_root(path)?.depth();
        Ok(prefix_for_depth(depth))
    }

    /// Replace every [`ROOT_MARKER`] in `contents` with the prefix for `path`.
    ///
    /// Contents without a marker come back unchanged, and in that case `path`
    /// only has to be non-blank.
    pub fn replace_roots_in_file(&self, path: &Path, contents: &str) -> Result<String, RebaseError> {
        check_not_blank(path)?;
        if contents.is_empty() || !contents.contains(ROOT_MARKER) {
            return Ok(contents.to_string());
        }
        let prefix = self.get_path_to_root(path)?;
        Ok(contents.replace(ROOT_MARKER, &prefix))
    }

    /// Where `path` lands in the output tree.
    pub fn output_path(&self, path: &Path) -> Result<PathBuf, RebaseError> {
        let matched = self.match_root(path)?;
        let mut out = self.roots.output_dir().to_path_buf();
        out.extend(&matched.relative);
        Ok(out)
    }
}

/// `"./"` for depth 0, `"../"` repeated `depth` times otherwise.
pub fn prefix_for_depth(depth: usize) -> String {
    if depth == 0 {
        "./".to_string()
    } else {
        "../".repeat(depth)
    }
}

fn check_not_blank(path: &Path) -> Result<(), RebaseError> {
    if path.as_os_str().to_string_lossy().trim().is_empty() {
        return Err(RebaseError::InvalidArgument(
            "file path must not be empty".into(),
        ));
    }
    Ok(())
}

/// Segments of `path` with `..` resolved; climbing above the path's start
/// is rejected.
fn checked_segments(path: &Path) -> Result<Vec<String>, RebaseError> {
    check_not_blank(path)?;
    segments(path).ok_or_else(|| {
        RebaseError::InvalidArgument(format!(
            "{} climbs above its starting directory",
            path.display()
        ))
    })
}

/// Strictly below the root: at least a file name past the root's segments.
fn contains(root: &RootDir, file: &[String]) -> bool {
    let root = root.segments();
    file.len() > root.len() && file[..root.len()] == *root
}
