//! Build commands and the dispatcher that routes them.
//!
//! A [`Dispatcher`] owns one fully wired pipeline for a project. It is built
//! once and reused across commands, so the partial cache stays warm until a
//! [`Command::FlushPartialCache`] arrives.
//!
//! Commands are plain serde values so the CLI's `run` mode can read them as
//! newline-delimited JSON:
//!
//! ```json
//! {"command": "build_view", "file": "views/index.html"}
//! {"command": "build_views", "directory": "views/blog"}
//! {"command": "flush_partial_cache"}
//! ```

use crate::assets::{self, AssetError, AssetRequest, AssetSummary};
use crate::config::{self, ConfigError, ProjectConfig};
use crate::partials::PartialCache;
use crate::pipeline::{BuildSummary, PipelineError, ViewPipeline};
use crate::processors::{
    CommandDiscovery, LoadPolicy, ProcessorError, ProcessorRegistry, RegistryError,
    builtin_processors,
};
use crate::rebase::{PathRebaser, RebaseError};
use crate::render::{BuiltinRenderer, CommandRenderer, TemplateRenderer};
use crate::roots::{RootDirectorySet, RootKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Rebase(#[from] RebaseError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Processor(#[from] ProcessorError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Asset(#[from] AssetError),
}

/// One discrete build operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    BuildView {
        file: PathBuf,
    },
    BuildViews {
        directory: PathBuf,
    },
    BuildAssets {
        #[serde(default)]
        content_dir: Option<PathBuf>,
        #[serde(default)]
        scripts_dir: Option<PathBuf>,
        tool: PathBuf,
        target_dir: PathBuf,
        project_dir: PathBuf,
    },
    FlushPartialCache,
    ReportNonexistentFile {
        file: PathBuf,
    },
}

/// What a command did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Built(BuildSummary),
    Assets(AssetSummary),
    Flushed { evicted: usize },
    Reported { file: PathBuf },
}

/// Routes [`Command`]s to the pipeline, the asset builder and the cache.
pub struct Dispatcher {
    pipeline: ViewPipeline,
    cache: Arc<PartialCache>,
}

impl Dispatcher {
    pub fn new(pipeline: ViewPipeline, cache: Arc<PartialCache>) -> Self {
        Self { pipeline, cache }
    }

    /// Load `sitepipe.toml` from `project_dir` and wire everything up.
    pub fn from_project(project_dir: &Path) -> Result<Self, CommandError> {
        let project_dir = std::path::absolute(project_dir)?;
        let config = config::load_config(&project_dir)?;
        Self::from_config(&project_dir, &config)
    }

    /// Wire a dispatcher for an absolute `project_dir` and a loaded config.
    pub fn from_config(project_dir: &Path, config: &ProjectConfig) -> Result<Self, CommandError> {
        config.validate()?;
        let roots = Arc::new(RootDirectorySet::from_config(project_dir, config)?);
        let rebaser = Arc::new(PathRebaser::new(Arc::clone(&roots))?);

        let mut registry = ProcessorRegistry::with_builtins(builtin_processors(config)?);
        let dirs: Vec<PathBuf> = config
            .processors
            .dirs
            .iter()
            .map(|d| project_dir.join(d))
            .collect();
        let report = registry.discover(
            &CommandDiscovery::new(),
            &dirs,
            LoadPolicy::from_strict(config.processors.strict),
        )?;
        info!(
            processors = registry.len(),
            discovered = report.registered.len(),
            duplicates = report.duplicates.len(),
            failed = report.failed.len(),
            "processor registry ready"
        );

        let cache = Arc::new(PartialCache::new());
        let views_root = roots
            .root(RootKind::Views)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| project_dir.to_path_buf());
        let partials_dir = views_root.join(&config.views.partials);

        let renderer: Arc<dyn TemplateRenderer> =
            match CommandRenderer::from_argv(&config.templating.command) {
                Some(renderer) => Arc::new(renderer),
                None => Arc::new(BuiltinRenderer::new(&partials_dir, Arc::clone(&cache))),
            };

        let pipeline = ViewPipeline::new(rebaser, Arc::new(registry), renderer)
            .with_template_extensions(config.templating.extensions.as_slice())
            .with_view_extensions(config.views.extensions.as_slice())
            .exclude_dir(partials_dir);

        Ok(Self::new(pipeline, cache))
    }

    pub fn pipeline(&self) -> &ViewPipeline {
        &self.pipeline
    }

    pub fn cache(&self) -> &PartialCache {
        &self.cache
    }

    pub fn dispatch(&self, command: &Command) -> Result<Outcome, CommandError> {
        match command {
            Command::BuildView { file } => self.build_view(file),
            Command::BuildViews { directory } => self.build_views(directory),
            Command::BuildAssets {
                content_dir,
                scripts_dir,
                tool,
                target_dir,
                project_dir,
            } => self.build_assets(AssetRequest {
                content_dir: content_dir.clone(),
                scripts_dir: scripts_dir.clone(),
                tool: tool.clone(),
                target_dir: target_dir.clone(),
                project_dir: project_dir.clone(),
            }),
            Command::FlushPartialCache => Ok(self.flush_partial_cache()),
            Command::ReportNonexistentFile { file } => self.report_nonexistent_file(file),
        }
    }

    fn build_view(&self, file: &Path) -> Result<Outcome, CommandError> {
        let mut summary = BuildSummary::default();
        match self.pipeline.process_file(file) {
            Err(e @ PipelineError::InvalidArgument(_)) => return Err(e.into()),
            result => summary.record(file, result),
        }
        info!(
            file = %file.display(),
            processed = summary.processed.len(),
            skipped = summary.skipped.len(),
            failed = summary.failed.len(),
            "view built"
        );
        Ok(Outcome::Built(summary))
    }

    fn build_views(&self, directory: &Path) -> Result<Outcome, CommandError> {
        let summary = self.pipeline.process_directory(directory)?;
        info!(
            directory = %directory.display(),
            processed = summary.processed.len(),
            skipped = summary.skipped.len(),
            failed = summary.failed.len(),
            partials = %self.cache.stats(),
            "views built"
        );
        Ok(Outcome::Built(summary))
    }

    fn build_assets(&self, mut request: AssetRequest) -> Result<Outcome, CommandError> {
        let project = self.pipeline.rebaser().roots().project_dir();
        for path in [
            request.content_dir.as_mut(),
            request.scripts_dir.as_mut(),
            Some(&mut request.target_dir),
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() && !path.as_os_str().is_empty() {
                *path = project.join(&*path);
            }
        }
        if request.project_dir.as_os_str().is_empty() {
            request.project_dir = project.to_path_buf();
        }
        Ok(Outcome::Assets(assets::build_assets(&request)?))
    }

    fn flush_partial_cache(&self) -> Outcome {
        let evicted = self.cache.flush();
        info!(evicted, "partial cache flushed");
        Outcome::Flushed { evicted }
    }

    fn report_nonexistent_file(&self, file: &Path) -> Result<Outcome, CommandError> {
        if file.as_os_str().to_string_lossy().trim().is_empty() {
            return Err(CommandError::InvalidArgument("file is blank".into()));
        }
        warn!(file = %file.display(), "file does not exist");
        Ok(Outcome::Reported {
            file: file.to_path_buf(),
        })
    }
}
