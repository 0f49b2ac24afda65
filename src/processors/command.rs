//! Processor plugins as external executables.
//!
//! Any executable named `sitepipe-processor-*` in a processor directory is a
//! plugin module. Plugins talk JSON over stdin/stdout (see
//! [`exchange`](crate::exchange)):
//!
//! ```text
//! sitepipe                          sitepipe-processor-minify
//!  │                                     │
//!  ├── --manifest ──────────────────────▶│
//!  │◀── {"name": "minify", "processors": ["html", "css"]}
//!  │                                     │
//!  ├── process html  + stdin {"processor": "html", "file": {...}}
//!  │◀── {"success": true, "contents": "...", "filename": "index.html"}
//! ```
//!
//! Each declared processor becomes a [`CommandProcessor`] with id
//! `<name>::<processor>`, so the same plugin found in two directories is
//! recognised as a duplicate by the registry.

use super::registry::{LoadError, ModuleHandle, ProcessorDiscovery};
use super::{Processor, ProcessorError};
use crate::exchange;
use crate::types::PipelineFile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

/// File-name prefix that marks a plugin executable.
pub const PLUGIN_PREFIX: &str = "sitepipe-processor-";

/// What a plugin prints for `--manifest`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PluginManifest {
    pub name: String,
    pub processors: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ProcessRequest<'a> {
    processor: &'a str,
    file: &'a PipelineFile,
}

#[derive(Debug, Deserialize)]
struct ProcessResponse {
    success: bool,
    #[serde(default)]
    contents: Option<String>,
    /// New file name (no directories) for the file.
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Finds `sitepipe-processor-*` executables and loads them via `--manifest`.
#[derive(Debug, Default, Clone)]
pub struct CommandDiscovery;

impl CommandDiscovery {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessorDiscovery for CommandDiscovery {
    fn modules(&self, dirs: &[PathBuf]) -> Vec<ModuleHandle> {
        let mut modules = Vec::new();
        for dir in dirs {
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            let mut found: Vec<ModuleHandle> = entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.is_file() && is_executable(p))
                .filter_map(|path| {
                    let stem = path.file_stem()?.to_str()?;
                    let name = stem.strip_prefix(PLUGIN_PREFIX)?;
                    (!name.is_empty()).then(|| ModuleHandle {
                        name: name.to_string(),
                        path: path.clone(),
                    })
                })
                .collect();
            // read_dir order is unspecified
            found.sort_by(|a, b| a.path.cmp(&b.path));
            modules.extend(found);
        }
        modules
    }

    fn load(&self, module: &ModuleHandle) -> Result<Vec<Arc<dyn Processor>>, LoadError> {
        let mut command = Command::new(&module.path);
        command.arg("--manifest");
        let manifest: PluginManifest = exchange::query(command).map_err(|e| LoadError {
            module: module.name.clone(),
            message: e.to_string(),
        })?;

        if manifest.name.trim().is_empty() {
            return Err(LoadError {
                module: module.name.clone(),
                message: "manifest has an empty name".into(),
            });
        }

        Ok(manifest
            .processors
            .iter()
            .map(|processor| {
                Arc::new(CommandProcessor::new(&module.path, &manifest.name, processor))
                    as Arc<dyn Processor>
            })
            .collect())
    }
}

/// One processor exposed by a plugin executable.
#[derive(Debug, Clone)]
pub struct CommandProcessor {
    id: String,
    program: PathBuf,
    processor: String,
}

impl CommandProcessor {
    pub fn new(program: &Path, plugin: &str, processor: &str) -> Self {
        Self {
            id: format!("{plugin}::{processor}"),
            program: program.to_path_buf(),
            processor: processor.to_string(),
        }
    }
}

impl Processor for CommandProcessor {
    fn id(&self) -> &str {
        &self.id
    }

    fn process(&self, file: &mut PipelineFile) -> Result<(), ProcessorError> {
        let mut command = Command::new(&self.program);
        command.arg("process").arg(&self.processor);

        let response: ProcessResponse = exchange::exchange(
            command,
            &ProcessRequest {
                processor: &self.processor,
                file,
            },
        )?;

        if !response.success {
            return Err(ProcessorError::Failed(
                response
                    .error
                    .unwrap_or_else(|| format!("{} reported failure", self.id)),
            ));
        }

        if let Some(name) = response.filename {
            if name.is_empty() || name.contains(['/', '\\']) {
                return Err(ProcessorError::Failed(format!(
                    "{} returned an invalid file name: {name:?}",
                    self.id
                )));
            }
            let renamed = file.filename.with_file_name(name);
            file.rename(renamed);
        }
        if let Some(contents) = response.contents {
            file.contents = contents;
        }
        Ok(())
    }
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        path.metadata()
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }

    #[cfg(windows)]
    {
        path.extension()
            .map(|ext| ext.eq_ignore_ascii_case("exe") || ext.eq_ignore_ascii_case("cmd"))
            .unwrap_or(false)
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = path;
        false
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::processors::{LoadPolicy, ProcessorRegistry};
    use crate::test_helpers::write_script;
    use tempfile::TempDir;

    const UPPERCASE_PLUGIN: &str = r#"#!/bin/sh
if [ "$1" = "--manifest" ]; then
  echo '{"name": "shout", "processors": ["upper"]}'
  exit 0
fi
# Ignore the request and answer with fixed output.
cat > /dev/null
echo '{"success": true, "contents": "LOUD", "filename": "loud.txt"}'
"#;

    const FAILING_PLUGIN: &str = r#"#!/bin/sh
if [ "$1" = "--manifest" ]; then
  echo '{"name": "grumpy", "processors": ["no"]}'
  exit 0
fi
cat > /dev/null
echo '{"success": false, "error": "not today"}'
"#;

    #[test]
    fn modules_found_by_prefix_and_exec_bit() {
        let tmp = TempDir::new().unwrap();
        write_script(&tmp.path().join("sitepipe-processor-b"), UPPERCASE_PLUGIN);
        write_script(&tmp.path().join("sitepipe-processor-a"), UPPERCASE_PLUGIN);
        write_script(&tmp.path().join("other-tool"), UPPERCASE_PLUGIN);
        std::fs::write(tmp.path().join("sitepipe-processor-noexec"), "").unwrap();

        let modules = CommandDiscovery::new().modules(&[tmp.path().to_path_buf()]);
        let names: Vec<&str> = modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn missing_dir_yields_no_modules() {
        let modules = CommandDiscovery::new().modules(&[PathBuf::from("/no/such/dir")]);
        assert!(modules.is_empty());
    }

    #[test]
    fn load_and_run_plugin() {
        let tmp = TempDir::new().unwrap();
        write_script(&tmp.path().join("sitepipe-processor-shout"), UPPERCASE_PLUGIN);

        let mut registry = ProcessorRegistry::new();
        let report = registry
            .discover(
                &CommandDiscovery::new(),
                &[tmp.path().to_path_buf()],
                LoadPolicy::Strict,
            )
            .unwrap();
        assert_eq!(report.registered, vec!["shout::upper"]);

        let mut file = PipelineFile::new("/p/views/dir/quiet.txt", "quiet");
        registry.entries()[0].processor.process(&mut file).unwrap();
        assert_eq!(file.contents, "LOUD");
        assert_eq!(file.filename, PathBuf::from("/p/views/dir/loud.txt"));
        assert_eq!(file.working_filename, file.filename);
    }

    #[test]
    fn plugin_failure_surfaces_message() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sitepipe-processor-grumpy");
        write_script(&path, FAILING_PLUGIN);

        let processor = CommandProcessor::new(&path, "grumpy", "no");
        let mut file = PipelineFile::new("/p/views/a.html", "x");
        let err = processor.process(&mut file).unwrap_err();
        assert_eq!(err.to_string(), "not today");
        assert_eq!(file.contents, "x");
    }

    #[test]
    fn broken_manifest_is_load_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sitepipe-processor-broken");
        write_script(&path, "#!/bin/sh\necho nope\n");

        let module = ModuleHandle {
            name: "broken".into(),
            path,
        };
        let err = CommandDiscovery::new().load(&module).err().unwrap();
        assert_eq!(err.module, "broken");
    }
}
