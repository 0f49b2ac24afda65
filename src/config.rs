//! Project configuration.
//!
//! Settings are read from `sitepipe.toml` in the project directory. Every key
//! is optional; a missing file means stock defaults.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! output = "dist"               # Output directory, relative to the project
//!
//! [roots]
//! views = "views"               # Page templates
//! content = "content"           # Static content (css, fonts, downloads)
//! scripts = "scripts"           # Scripts handed to the asset tool
//! images = "images"
//!
//! [views]
//! extensions = ["html", "htm", "md"]  # Files picked up by directory builds
//! partials = "partials"         # Partials directory under the views root
//!
//! [templating]
//! extensions = ["md", "html", "htm"]  # Files that go through the render step
//! command = []                  # External renderer argv; empty = built-in
//!
//! [processors]
//! dirs = ["processors"]         # Where to look for sitepipe-processor-* binaries
//! strict = false                # Abort discovery on the first broken plugin
//! timestamp_format = "%Y%m%d%H%M%S"
//!
//! [processing]
//! max_processes = 4             # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path};
use thiserror::Error;

/// Name of the settings file inside the project directory.
pub const CONFIG_FILENAME: &str = "sitepipe.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Project configuration loaded from `sitepipe.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Output directory, relative to the project directory.
    pub output: String,
    /// Logical root directories, relative to the project directory.
    pub roots: RootsConfig,
    /// View discovery settings.
    pub views: ViewsConfig,
    /// Render step settings.
    pub templating: TemplatingConfig,
    /// Processor discovery settings.
    pub processors: ProcessorsConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            output: "dist".to_string(),
            roots: RootsConfig::default(),
            views: ViewsConfig::default(),
            templating: TemplatingConfig::default(),
            processors: ProcessorsConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl ProjectConfig {
    /// Validate values that serde cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output.trim().is_empty() {
            return Err(ConfigError::Validation("output must not be empty".into()));
        }
        for (name, value) in self.roots.named() {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "roots.{name} must not be empty"
                )));
            }
            if escapes_project(value) {
                return Err(ConfigError::Validation(format!(
                    "roots.{name} = \"{value}\" must stay inside the project directory"
                )));
            }
        }
        if escapes_project(&self.output) {
            return Err(ConfigError::Validation(format!(
                "output = \"{}\" must stay inside the project directory",
                self.output
            )));
        }
        let partials = &self.views.partials;
        if partials.trim().is_empty()
            || Path::new(partials)
                .components()
                .all(|c| c == Component::CurDir)
        {
            return Err(ConfigError::Validation(
                "views.partials must name a directory below the views root".into(),
            ));
        }
        if escapes_project(partials) {
            return Err(ConfigError::Validation(format!(
                "views.partials = \"{partials}\" must stay inside the views root"
            )));
        }
        validate_extensions("views.extensions", &self.views.extensions)?;
        validate_extensions("templating.extensions", &self.templating.extensions)?;
        if self.processors.timestamp_format.is_empty() {
            return Err(ConfigError::Validation(
                "processors.timestamp_format must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Absolute paths and `..` segments would leave the project directory.
fn escapes_project(relative: &str) -> bool {
    let path = Path::new(relative);
    path.has_root()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
}

fn validate_extensions(key: &str, extensions: &[String]) -> Result<(), ConfigError> {
    if extensions.is_empty() {
        return Err(ConfigError::Validation(format!("{key} must not be empty")));
    }
    if let Some(bad) = extensions
        .iter()
        .find(|e| e.is_empty() || e.starts_with('.'))
    {
        return Err(ConfigError::Validation(format!(
            "{key}: \"{bad}\" must be a bare extension like \"html\""
        )));
    }
    Ok(())
}

/// Logical root directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RootsConfig {
    pub views: String,
    pub content: String,
    pub scripts: String,
    pub images: String,
}

impl RootsConfig {
    /// Roots paired with their key names, in declaration order.
    pub fn named(&self) -> [(&'static str, &str); 4] {
        [
            ("views", self.views.as_str()),
            ("content", self.content.as_str()),
            ("scripts", self.scripts.as_str()),
            ("images", self.images.as_str()),
        ]
    }
}

impl Default for RootsConfig {
    fn default() -> Self {
        Self {
            views: "views".to_string(),
            content: "content".to_string(),
            scripts: "scripts".to_string(),
            images: "images".to_string(),
        }
    }
}

/// Which files a directory build picks up.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewsConfig {
    /// Extensions (without dot) eligible for directory builds.
    pub extensions: Vec<String>,
    /// Partials directory, relative to the views root. Never emitted.
    pub partials: String,
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["html".into(), "htm".into(), "md".into()],
            partials: "partials".to_string(),
        }
    }
}

/// Render step settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplatingConfig {
    /// Extensions (without dot) that mark a file as a template.
    pub extensions: Vec<String>,
    /// External renderer command line. Empty selects the built-in renderer.
    pub command: Vec<String>,
}

impl Default for TemplatingConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["md".into(), "html".into(), "htm".into()],
            command: Vec::new(),
        }
    }
}

/// Processor discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessorsConfig {
    /// Directories (relative to the project) scanned for processor plugins.
    pub dirs: Vec<String>,
    /// Abort discovery when a plugin fails to load instead of skipping it.
    pub strict: bool,
    /// `chrono` format string for the build stamp.
    pub timestamp_format: String,
}

impl Default for ProcessorsConfig {
    fn default() -> Self {
        Self {
            dirs: vec!["processors".to_string()],
            strict: false,
            timestamp_format: "%Y%m%d%H%M%S".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers for directory builds.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, never below 1
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Load `sitepipe.toml` from the project directory.
///
/// Returns stock defaults when the file doesn't exist. Unknown keys and
/// invalid values are errors.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let path = project_dir.join(CONFIG_FILENAME);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }
    let content = fs::read_to_string(&path)?;
    let config: ProjectConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `sitepipe.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# sitepipe configuration
# ======================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Output directory, relative to the project directory.
output = "dist"

# ---------------------------------------------------------------------------
# Root directories
# ---------------------------------------------------------------------------
# Each root is relative to the project directory and must stay inside it.
# Files are written to the output directory at the same path they have
# relative to their root, and PATHTOROOT(~) in their contents becomes the
# relative prefix back to the output root ("./", "../", "../../", ...).
[roots]
views = "views"
content = "content"
scripts = "scripts"
images = "images"

# ---------------------------------------------------------------------------
# Views
# ---------------------------------------------------------------------------
[views]
# Extensions picked up when building a whole directory.
extensions = ["html", "htm", "md"]

# Reusable fragments, relative to the views root. Included with {{> name}}
# and never written to the output on their own.
partials = "partials"

# ---------------------------------------------------------------------------
# Templating
# ---------------------------------------------------------------------------
[templating]
# Extensions that go through the render step.
extensions = ["md", "html", "htm"]

# External renderer. Receives a JSON request on stdin and answers with
# {"success": true, "output": "..."} on stdout. Leave empty for the built-in
# renderer (partial includes + Markdown).
# command = ["node", "render.js"]
command = []

# ---------------------------------------------------------------------------
# Processors
# ---------------------------------------------------------------------------
[processors]
# Directories scanned for sitepipe-processor-* executables.
dirs = ["processors"]

# When true, a plugin that fails to load aborts the build.
strict = false

# Format of the stamp that replaces TIMESTAMP(~).
timestamp_format = "%Y%m%d%H%M%S"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for directory builds.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
