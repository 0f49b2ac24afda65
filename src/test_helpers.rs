//! Shared test utilities for the sitepipe test suite.
//!
//! Provides a throwaway project layout, a processor that records what it
//! sees, and a renderer that needs no partials or external programs.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let project = TestProject::new();
//! let src = project.write("views/blog/post.html", "PATHTOROOT(~)x");
//!
//! let pipeline = ViewPipeline::new(
//!     project.rebaser(),
//!     Arc::new(ProcessorRegistry::new()),
//!     Arc::new(MockRenderer::new()),
//! );
//! pipeline.process_file(&src).unwrap();
//! assert_eq!(project.read("dist/blog/post.html"), "../x");
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use crate::config::ProjectConfig;
use crate::processors::{Processor, ProcessorError};
use crate::rebase::PathRebaser;
use crate::render::{RenderError, RenderRequest, TemplateRenderer};
use crate::roots::RootDirectorySet;
use crate::types::PipelineFile;

// =========================================================================
// Fixture setup
// =========================================================================

/// A project directory with the four stock roots created and an output
/// directory of `dist`.
pub struct TestProject {
    tmp: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        for dir in ["views", "content", "scripts", "images"] {
            fs::create_dir_all(tmp.path().join(dir)).unwrap();
        }
        Self { tmp }
    }

    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.tmp.path().join(relative)
    }

    /// Write a file (creating parents) and return its absolute path.
    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.path(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    /// Read a file, panicking with the path if it is missing.
    pub fn read(&self, relative: &str) -> String {
        let path = self.path(relative);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
    }

    pub fn roots(&self) -> Arc<RootDirectorySet> {
        Arc::new(RootDirectorySet::from_config(self.root(), &ProjectConfig::default()).unwrap())
    }

    pub fn rebaser(&self) -> Arc<PathRebaser> {
        Arc::new(PathRebaser::new(self.roots()).unwrap())
    }
}

/// Write an executable shell script.
#[cfg(unix)]
pub fn write_script(path: &Path, script: &str) {
    use std::os::unix::fs::PermissionsExt;
    fs::write(path, script).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

// =========================================================================
// Mock processor
// =========================================================================

/// Records the contents of every file it processes, then appends a suffix
/// or fails.
pub struct RecordingProcessor {
    id: String,
    suffix: Option<String>,
    seen: Mutex<Vec<String>>,
}

impl RecordingProcessor {
    pub fn appending(id: &str, suffix: &str) -> Self {
        Self {
            id: id.to_string(),
            suffix: Some(suffix.to_string()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(id: &str) -> Self {
        Self {
            id: id.to_string(),
            suffix: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

impl Processor for RecordingProcessor {
    fn id(&self) -> &str {
        &self.id
    }

    fn process(&self, file: &mut PipelineFile) -> Result<(), ProcessorError> {
        self.seen.lock().unwrap().push(file.contents.clone());
        match &self.suffix {
            Some(suffix) => {
                file.contents.push_str(suffix);
                Ok(())
            }
            None => Err(ProcessorError::Failed(format!("{} refused", self.id))),
        }
    }
}

// =========================================================================
// Mock renderer
// =========================================================================

/// Returns the contents unchanged, prefixed with `[title]\n` when the
/// metadata has a `title`. Fails for templates with a given file name.
pub struct MockRenderer {
    fail_on: Option<String>,
    calls: Arc<Mutex<Vec<PathBuf>>>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self {
            fail_on: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing_on(file_name: &str) -> Self {
        Self {
            fail_on: Some(file_name.to_string()),
            ..Self::new()
        }
    }

    /// Templates rendered so far, shared with the renderer.
    pub fn calls(&self) -> Arc<Mutex<Vec<PathBuf>>> {
        Arc::clone(&self.calls)
    }
}

impl TemplateRenderer for MockRenderer {
    fn render(&self, request: &RenderRequest<'_>) -> Result<String, RenderError> {
        self.calls.lock().unwrap().push(request.template.to_path_buf());

        let name = request.template.file_name().and_then(|n| n.to_str());
        if name.is_some() && name == self.fail_on.as_deref() {
            return Err(RenderError::Failed(format!("cannot render {name:?}")));
        }

        let title = request
            .metadata
            .and_then(|m| m.get("title"))
            .and_then(|t| t.as_str());
        Ok(match title {
            Some(title) => format!("[{title}]\n{}", request.contents),
            None => request.contents.to_string(),
        })
    }
}
