//! View pipeline: turns source views into files in the output tree.
//!
//! Each file moves through a fixed sequence of stages:
//!
//! ```text
//! load → strip → render → rebase → process(n) → write
//! ```
//!
//! - **strip** removes the front-matter block into `metadata`
//! - **render** only runs for files whose extension marks them as templates
//! - **rebase** replaces `PATHTOROOT(~)` markers for the file's location
//! - **process** runs every registered processor in registration order
//! - **write** lands the result under the output directory, atomically
//!
//! A failure at any stage stops that file and is reported with the stage it
//! happened in. Nothing is retried.
//!
//! [`ViewPipeline::process_directory`] walks a directory recursively and
//! processes eligible files in parallel with rayon. One file failing never
//! stops its siblings; every outcome ends up in the [`BuildSummary`].

use crate::front_matter;
use crate::processors::{ProcessorError, ProcessorRegistry};
use crate::rebase::{PathRebaser, RebaseError};
use crate::render::{RenderError, RenderRequest, TemplateRenderer};
use crate::types::PipelineFile;
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Rebase(#[from] RebaseError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("Processor {id} failed: {source}")]
    Processor {
        id: String,
        #[source]
        source: ProcessorError,
    },
    #[error("{stage} failed for {path}: {source}")]
    File {
        path: PathBuf,
        stage: Stage,
        #[source]
        source: Box<PipelineError>,
    },
}

/// Where in the per-file sequence something happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Load,
    Strip,
    Render,
    Rebase,
    Process,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Strip => "strip",
            Stage::Render => "render",
            Stage::Rebase => "rebase",
            Stage::Process => "process",
            Stage::Write => "write",
        };
        f.write_str(name)
    }
}

/// Shared flag that stops files from starting or being written.
///
/// Files already written stay intact; a file caught mid-flight is
/// abandoned before its write.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipReason {
    Missing,
    Cancelled,
}

/// What happened to one file that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Written {
        source: PathBuf,
        output: PathBuf,
        processors: usize,
    },
    Skipped {
        path: PathBuf,
        reason: SkipReason,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenFile {
    pub source: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub stage: Stage,
    pub message: String,
}

/// Aggregate result of a build, each list sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub processed: Vec<WrittenFile>,
    pub skipped: Vec<SkippedFile>,
    pub failed: Vec<FileFailure>,
}

impl BuildSummary {
    pub fn record(&mut self, path: &Path, result: Result<FileOutcome, PipelineError>) {
        match result {
            Ok(FileOutcome::Written { source, output, .. }) => {
                self.processed.push(WrittenFile { source, output })
            }
            Ok(FileOutcome::Skipped { path, reason }) => {
                self.skipped.push(SkippedFile { path, reason })
            }
            Err(PipelineError::File {
                path,
                stage,
                source,
            }) => self.failed.push(FileFailure {
                path,
                stage,
                message: source.to_string(),
            }),
            Err(other) => self.failed.push(FileFailure {
                path: path.to_path_buf(),
                stage: Stage::Load,
                message: other.to_string(),
            }),
        }
    }

    fn sort(&mut self) {
        self.processed.sort_by(|a, b| a.source.cmp(&b.source));
        self.skipped.sort_by(|a, b| a.path.cmp(&b.path));
        self.failed.sort_by(|a, b| a.path.cmp(&b.path));
    }

    pub fn total(&self) -> usize {
        self.processed.len() + self.skipped.len() + self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Runs views through the stages and writes them out.
pub struct ViewPipeline {
    rebaser: Arc<PathRebaser>,
    registry: Arc<ProcessorRegistry>,
    renderer: Arc<dyn TemplateRenderer>,
    template_extensions: Vec<String>,
    view_extensions: Vec<String>,
    excluded: Vec<PathBuf>,
    cancellation: Cancellation,
}

impl ViewPipeline {
    pub fn new(
        rebaser: Arc<PathRebaser>,
        registry: Arc<ProcessorRegistry>,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Self {
        let excluded = vec![rebaser.roots().output_dir().to_path_buf()];
        Self {
            rebaser,
            registry,
            renderer,
            template_extensions: lowercase(["md", "html", "htm"]),
            view_extensions: lowercase(["html", "htm", "md"]),
            excluded,
            cancellation: Cancellation::new(),
        }
    }

    /// Extensions whose files go through the render stage.
    pub fn with_template_extensions<S: AsRef<str>>(mut self, exts: &[S]) -> Self {
        self.template_extensions = lowercase(exts);
        self
    }

    /// Extensions picked up by [`process_directory`](Self::process_directory).
    pub fn with_view_extensions<S: AsRef<str>>(mut self, exts: &[S]) -> Self {
        self.view_extensions = lowercase(exts);
        self
    }

    /// Leave `dir` and everything below it out of directory builds.
    pub fn exclude_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.excluded.push(dir.into());
        self
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    pub fn rebaser(&self) -> &PathRebaser {
        &self.rebaser
    }

    /// Build one file. A file that does not exist is skipped, not an error.
    pub fn process_file(&self, path: &Path) -> Result<FileOutcome, PipelineError> {
        let path = self.resolve(path)?;

        if self.cancellation.is_cancelled() {
            return Ok(skipped(path, SkipReason::Cancelled));
        }
        if !path.is_file() {
            info!(path = %path.display(), "skipping missing file");
            return Ok(skipped(path, SkipReason::Missing));
        }

        let fail = |stage: Stage| {
            let path = path.clone();
            move |e: PipelineError| {
                warn!(path = %path.display(), %stage, error = %e, "file failed");
                PipelineError::File {
                    path,
                    stage,
                    source: Box::new(e),
                }
            }
        };

        let file = PipelineFile::load(&path)
            .map_err(PipelineError::from)
            .map_err(fail(Stage::Load))?;
        debug!(path = %path.display(), stage = %Stage::Load);

        let mut file = front_matter::strip(file);
        debug!(path = %path.display(), stage = %Stage::Strip, metadata = file.metadata.is_some());

        if self.is_template(&file.working_filename) {
            file.contents = self.render(&file).map_err(fail(Stage::Render))?;
            debug!(path = %path.display(), stage = %Stage::Render);
        }

        file.contents = self
            .rebaser
            .replace_roots_in_file(&file.working_filename, &file.contents)
            .map_err(PipelineError::from)
            .map_err(fail(Stage::Rebase))?;
        debug!(path = %path.display(), stage = %Stage::Rebase);

        let mut processors = 0;
        for entry in self.registry.entries() {
            entry
                .processor
                .process(&mut file)
                .map_err(|source| PipelineError::Processor {
                    id: entry.id().to_string(),
                    source,
                })
                .map_err(fail(Stage::Process))?;
            processors += 1;
            debug!(path = %path.display(), stage = %Stage::Process, processor = entry.id());
        }

        if self.cancellation.is_cancelled() {
            return Ok(skipped(path, SkipReason::Cancelled));
        }

        let output = self
            .rebaser
            .output_path(&file.working_filename)
            .map_err(PipelineError::from)
            .and_then(|out| {
                write_atomic(&out, &file.contents)?;
                Ok(out)
            })
            .map_err(fail(Stage::Write))?;
        debug!(path = %path.display(), stage = %Stage::Write, output = %output.display());

        Ok(FileOutcome::Written {
            source: path,
            output,
            processors,
        })
    }

    /// Build every eligible file below `dir`.
    ///
    /// Fails only when `dir` is blank or missing; per-file failures land in
    /// the summary.
    pub fn process_directory(&self, dir: &Path) -> Result<BuildSummary, PipelineError> {
        let dir = self.resolve(dir)?;
        if !dir.is_dir() {
            return Err(PipelineError::DirectoryNotFound(dir));
        }

        let mut summary = BuildSummary::default();
        let mut files = Vec::new();
        let walker = WalkDir::new(&dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_excluded(e.path()));
        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() && self.is_view(entry.path()) => {
                    files.push(entry.into_path())
                }
                Ok(_) => {}
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.clone());
                    warn!(path = %path.display(), error = %e, "cannot read directory entry");
                    summary.failed.push(FileFailure {
                        path,
                        stage: Stage::Load,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(dir = %dir.display(), files = files.len(), "building views");
        let results: Vec<_> = files
            .par_iter()
            .map(|path| (path, self.process_file(path)))
            .collect();
        for (path, result) in results {
            summary.record(path, result);
        }
        summary.sort();
        Ok(summary)
    }

    fn render(&self, file: &PipelineFile) -> Result<String, PipelineError> {
        let path_to_root = self.rebaser.get_path_to_root(&file.working_filename).ok();
        let request = RenderRequest {
            template: &file.working_filename,
            contents: &file.contents,
            metadata: file.metadata.as_ref(),
            path_to_root: path_to_root.as_deref(),
        };
        Ok(self.renderer.render(&request)?)
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf, PipelineError> {
        if path.as_os_str().to_string_lossy().trim().is_empty() {
            return Err(PipelineError::InvalidArgument("path is blank".into()));
        }
        Ok(if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.rebaser.roots().project_dir().join(path)
        })
    }

    fn is_template(&self, path: &Path) -> bool {
        has_extension(path, &self.template_extensions)
    }

    fn is_view(&self, path: &Path) -> bool {
        has_extension(path, &self.view_extensions)
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.excluded.iter().any(|ex| path.starts_with(ex))
    }
}

fn skipped(path: PathBuf, reason: SkipReason) -> FileOutcome {
    FileOutcome::Skipped { path, reason }
}

fn lowercase<S: AsRef<str>>(exts: impl IntoIterator<Item = S>) -> Vec<String> {
    exts.into_iter()
        .map(|e| e.as_ref().to_ascii_lowercase())
        .collect()
}

fn has_extension(path: &Path, exts: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| exts.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write `contents` to `path` via a temporary sibling and a rename, so
/// readers never see a half-written file.
pub fn write_atomic(path: &Path, contents: impl AsRef<[u8]>) -> io::Result<()> {
    replace_atomic(path, |temp| fs::write(temp, contents.as_ref()))
}

/// Copy `source` over `path` the same way as [`write_atomic`]: an
/// interrupted copy leaves the previous target in place.
pub fn copy_atomic(source: &Path, path: &Path) -> io::Result<()> {
    replace_atomic(path, |temp| fs::copy(source, temp).map(|_| ()))
}

fn replace_atomic(path: &Path, fill: impl FnOnce(&Path) -> io::Result<()>) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = parent.join(format!(
        ".{name}.{}-{}.tmp",
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    fill(&temp)
        .and_then(|()| fs::rename(&temp, path))
        .inspect_err(|_| {
            let _ = fs::remove_file(&temp);
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::{ExtensionProcessor, Origin, Processor};
    use crate::test_helpers::{MockRenderer, RecordingProcessor, TestProject};

    fn pipeline(project: &TestProject, renderer: MockRenderer) -> ViewPipeline {
        pipeline_with(project, renderer, ProcessorRegistry::new())
    }

    fn pipeline_with(
        project: &TestProject,
        renderer: MockRenderer,
        registry: ProcessorRegistry,
    ) -> ViewPipeline {
        ViewPipeline::new(project.rebaser(), Arc::new(registry), Arc::new(renderer))
            .exclude_dir(project.path("views/partials"))
    }

    fn registry(processors: Vec<Arc<dyn Processor>>) -> ProcessorRegistry {
        let mut registry = ProcessorRegistry::new();
        for p in processors {
            registry.register(p, Origin::Builtin);
        }
        registry
    }

    // =========================================================================
    // process_file
    // =========================================================================

    #[test]
    fn writes_rendered_and_rebased_output() {
        let project = TestProject::new();
        let src = project.write(
            "views/blog/post.html",
            "---\ntitle: Post\n---\n<a href=\"PATHTOROOT(~)index.html\">home</a>",
        );

        let outcome = pipeline(&project, MockRenderer::new())
            .process_file(&src)
            .unwrap();

        let out = project.path("dist/blog/post.html");
        assert!(matches!(outcome, FileOutcome::Written { ref output, .. } if *output == out));
        assert_eq!(
            project.read("dist/blog/post.html"),
            "[Post]\n<a href=\"../index.html\">home</a>"
        );
    }

    #[test]
    fn relative_paths_resolve_against_project() {
        let project = TestProject::new();
        project.write("views/index.html", "PATHTOROOT(~)x");
        pipeline(&project, MockRenderer::new())
            .process_file(Path::new("views/index.html"))
            .unwrap();
        assert_eq!(project.read("dist/index.html"), "./x");
    }

    #[test]
    fn missing_file_is_skipped() {
        let project = TestProject::new();
        let outcome = pipeline(&project, MockRenderer::new())
            .process_file(&project.path("views/nope.html"))
            .unwrap();
        assert!(matches!(
            outcome,
            FileOutcome::Skipped {
                reason: SkipReason::Missing,
                ..
            }
        ));
        assert!(!project.path("dist").exists());
    }

    #[test]
    fn blank_path_is_invalid() {
        let project = TestProject::new();
        let err = pipeline(&project, MockRenderer::new())
            .process_file(Path::new("  "))
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));
    }

    #[test]
    fn non_template_skips_render() {
        let project = TestProject::new();
        let src = project.write("views/site.css", "body{} /* PATHTOROOT(~) */");
        let renderer = MockRenderer::new();
        let calls = renderer.calls();
        pipeline(&project, renderer).process_file(&src).unwrap();
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(project.read("dist/site.css"), "body{} /* ./ */");
    }

    #[test]
    fn processors_run_in_registration_order() {
        let project = TestProject::new();
        let src = project.write("views/a.html", "x");
        let first = Arc::new(RecordingProcessor::appending("test::first", "1"));
        let second = Arc::new(RecordingProcessor::appending("test::second", "2"));
        let processors: Vec<Arc<dyn Processor>> = vec![first.clone(), second.clone()];
        let registry = registry(processors);

        pipeline_with(&project, MockRenderer::new(), registry)
            .process_file(&src)
            .unwrap();

        assert_eq!(project.read("dist/a.html"), "x12");
        assert_eq!(first.seen(), vec!["x"]);
        assert_eq!(second.seen(), vec!["x1"]);
    }

    #[test]
    fn renamed_file_written_under_new_name() {
        let project = TestProject::new();
        let src = project.write("views/docs/guide.md", "PATHTOROOT(~)");
        let processors: Vec<Arc<dyn Processor>> =
            vec![Arc::new(ExtensionProcessor::new(["md"], "html"))];
        let registry = registry(processors);

        pipeline_with(&project, MockRenderer::new(), registry)
            .process_file(&src)
            .unwrap();

        assert_eq!(project.read("dist/docs/guide.html"), "../");
        assert!(!project.path("dist/docs/guide.md").exists());
    }

    #[test]
    fn processor_failure_stops_the_file() {
        let project = TestProject::new();
        let src = project.write("views/a.html", "x");
        let after = Arc::new(RecordingProcessor::appending("test::after", "!"));
        let processors: Vec<Arc<dyn Processor>> = vec![
            Arc::new(RecordingProcessor::failing("test::broken")),
            after.clone(),
        ];
        let registry = registry(processors);

        let err = pipeline_with(&project, MockRenderer::new(), registry)
            .process_file(&src)
            .unwrap_err();

        match err {
            PipelineError::File { stage, source, .. } => {
                assert_eq!(stage, Stage::Process);
                assert!(source.to_string().contains("test::broken"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(after.seen().is_empty());
        assert!(!project.path("dist/a.html").exists());
    }

    #[test]
    fn render_failure_reports_stage() {
        let project = TestProject::new();
        let src = project.write("views/bad.html", "x");
        let err = pipeline(&project, MockRenderer::failing_on("bad.html"))
            .process_file(&src)
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::File {
                stage: Stage::Render,
                ..
            }
        ));
    }

    #[test]
    fn file_outside_roots_fails_at_rebase() {
        let project = TestProject::new();
        let src = project.write("elsewhere/a.html", "PATHTOROOT(~)");
        let err = pipeline(&project, MockRenderer::new())
            .process_file(&src)
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::File {
                stage: Stage::Rebase,
                ..
            }
        ));
    }

    #[test]
    fn parent_dir_escape_from_root_is_rejected() {
        let project = TestProject::new();
        let src = project.write("other/x.html", "PATHTOROOT(~)");
        let plain = project.write("other/y.html", "no marker");
        let p = pipeline(&project, MockRenderer::new());

        let err = p.process_file(&project.path("views/../other/x.html")).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::File {
                stage: Stage::Rebase,
                ..
            }
        ));

        let err = p.process_file(&project.path("views/../other/y.html")).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::File {
                stage: Stage::Write,
                ..
            }
        ));

        assert_eq!(fs::read_to_string(&src).unwrap(), "PATHTOROOT(~)");
        assert_eq!(fs::read_to_string(&plain).unwrap(), "no marker");
        assert!(!project.path("dist").exists());
    }

    #[test]
    fn cancelled_pipeline_writes_nothing() {
        let project = TestProject::new();
        let src = project.write("views/a.html", "x");
        let p = pipeline(&project, MockRenderer::new());
        p.cancellation().cancel();
        let outcome = p.process_file(&src).unwrap();
        assert!(matches!(
            outcome,
            FileOutcome::Skipped {
                reason: SkipReason::Cancelled,
                ..
            }
        ));
        assert!(!project.path("dist/a.html").exists());
    }

    #[test]
    fn rewrite_replaces_existing_output_without_temp_leftovers() {
        let project = TestProject::new();
        let src = project.write("views/a.html", "new");
        project.write("dist/a.html", "old");

        pipeline(&project, MockRenderer::new())
            .process_file(&src)
            .unwrap();

        assert_eq!(project.read("dist/a.html"), "new");
        let names: Vec<_> = fs::read_dir(project.path("dist"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    // =========================================================================
    // process_directory
    // =========================================================================

    #[test]
    fn missing_directory_is_not_found() {
        let project = TestProject::new();
        let err = pipeline(&project, MockRenderer::new())
            .process_directory(&project.path("views/nope"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::DirectoryNotFound(_)));
    }

    #[test]
    fn directory_failure_does_not_stop_siblings() {
        let project = TestProject::new();
        project.write("views/a.html", "a");
        project.write("views/bad.html", "b");
        project.write("views/sub/c.htm", "c");

        let summary = pipeline(&project, MockRenderer::failing_on("bad.html"))
            .process_directory(&project.path("views"))
            .unwrap();

        assert_eq!(summary.processed.len(), 2);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].path, project.path("views/bad.html"));
        assert_eq!(summary.failed[0].stage, Stage::Render);
        assert_eq!(project.read("dist/a.html"), "a");
        assert_eq!(project.read("dist/sub/c.htm"), "c");
        assert!(!summary.is_success());
    }

    #[test]
    fn directory_build_filters_extensions_and_partials() {
        let project = TestProject::new();
        project.write("views/a.html", "a");
        project.write("views/notes.txt", "skip me");
        project.write("views/partials/nav.html", "<nav/>");

        let summary = pipeline(&project, MockRenderer::new())
            .process_directory(&project.path("views"))
            .unwrap();

        let sources: Vec<_> = summary.processed.iter().map(|w| w.source.clone()).collect();
        assert_eq!(sources, vec![project.path("views/a.html")]);
        assert!(!project.path("dist/partials").exists());
        assert!(!project.path("dist/notes.txt").exists());
    }

    #[test]
    fn directory_results_sorted_by_path() {
        let project = TestProject::new();
        for name in ["views/c.html", "views/a.html", "views/b/z.html", "views/b.html"] {
            project.write(name, "x");
        }

        let summary = pipeline(&project, MockRenderer::new())
            .process_directory(&project.path("views"))
            .unwrap();

        let sources: Vec<_> = summary.processed.iter().map(|w| w.source.clone()).collect();
        let mut sorted = sources.clone();
        sorted.sort();
        assert_eq!(sources, sorted);
        assert_eq!(summary.total(), 4);
    }

    #[test]
    fn summary_records_stage_of_failure() {
        let mut summary = BuildSummary::default();
        summary.record(
            Path::new("/p/a.html"),
            Err(PipelineError::File {
                path: PathBuf::from("/p/a.html"),
                stage: Stage::Write,
                source: Box::new(PipelineError::Io(io::Error::other("disk full"))),
            }),
        );
        assert_eq!(summary.failed[0].stage, Stage::Write);
        assert_eq!(summary.failed[0].message, "IO error: disk full");
    }

    #[test]
    fn write_atomic_creates_parents() {
        let project = TestProject::new();
        let target = project.path("dist/deep/er/file.html");
        write_atomic(&target, "ok").unwrap();
        assert_eq!(fs::read_to_string(target).unwrap(), "ok");
    }

    #[test]
    fn copy_atomic_replaces_target() {
        let project = TestProject::new();
        let source = project.write("content/site.css", "new");
        let target = project.path("dist/content/site.css");
        write_atomic(&target, "old").unwrap();

        copy_atomic(&source, &target).unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
        let names: Vec<_> = fs::read_dir(project.path("dist/content"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["site.css"]);
    }

    #[test]
    fn failed_copy_keeps_previous_target() {
        let project = TestProject::new();
        let target = project.path("dist/content/site.css");
        write_atomic(&target, "previous").unwrap();

        assert!(copy_atomic(&project.path("content/missing.css"), &target).is_err());

        assert_eq!(fs::read_to_string(&target).unwrap(), "previous");
        assert_eq!(fs::read_dir(project.path("dist/content")).unwrap().count(), 1);
    }
}
