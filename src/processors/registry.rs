//! Ordered processor registry.
//!
//! The registry holds processors in the order they will run. Built-ins are
//! registered first, then whatever a [`ProcessorDiscovery`] finds on disk.
//!
//! # Ordering
//!
//! Entries run in registration order. Discovered modules are sorted by module
//! name (stable, so equal names keep the order the discovery returned them in)
//! and each module's processors keep the order the module declares.
//!
//! # Deduplication
//!
//! A processor whose [`id`](super::Processor::id) is already registered is
//! skipped, whether it came from an earlier module, a copy of the same plugin
//! in another directory, or a built-in.
//!
//! # Failure policy
//!
//! With [`LoadPolicy::SkipFailures`] (the default) a module that fails to load
//! is logged, recorded in the [`DiscoveryReport`] and skipped. With
//! [`LoadPolicy::Strict`] the first failure aborts discovery and the registry
//! is left exactly as it was before the call.

use super::Processor;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Where an entry came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Builtin,
    Discovered { module: String },
}

/// A registered processor and its position in the run order.
#[derive(Clone)]
pub struct ProcessorEntry {
    pub processor: Arc<dyn Processor>,
    pub origin: Origin,
    pub order: usize,
}

impl ProcessorEntry {
    pub fn id(&self) -> &str {
        self.processor.id()
    }
}

impl fmt::Debug for ProcessorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorEntry")
            .field("id", &self.id())
            .field("origin", &self.origin)
            .field("order", &self.order)
            .finish()
    }
}

/// What to do when a plugin module fails to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPolicy {
    #[default]
    SkipFailures,
    Strict,
}

impl LoadPolicy {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            LoadPolicy::Strict
        } else {
            LoadPolicy::SkipFailures
        }
    }
}

/// A loadable unit found by discovery, e.g. one plugin executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleHandle {
    /// Stable module name, used for ordering.
    pub name: String,
    pub path: PathBuf,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to load processor module {module}: {message}")]
pub struct LoadError {
    pub module: String,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Finds and loads processor modules. How loading works (subprocesses,
/// static factories, dynamic libraries) is up to the implementation.
pub trait ProcessorDiscovery {
    /// Every candidate module under `dirs`.
    fn modules(&self, dirs: &[PathBuf]) -> Vec<ModuleHandle>;

    /// The processors `module` provides, in declared order.
    fn load(&self, module: &ModuleHandle) -> Result<Vec<Arc<dyn Processor>>, LoadError>;
}

/// Outcome of one [`ProcessorRegistry::discover`] call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Ids registered by this call, in run order.
    pub registered: Vec<String>,
    /// Ids skipped because they were already registered.
    pub duplicates: Vec<String>,
    /// Modules skipped under [`LoadPolicy::SkipFailures`].
    pub failed: Vec<LoadError>,
}

#[derive(Debug, Default, Clone)]
pub struct ProcessorRegistry {
    entries: Vec<ProcessorEntry>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-loaded with `builtins` in the given order.
    pub fn with_builtins(builtins: impl IntoIterator<Item = Arc<dyn Processor>>) -> Self {
        let mut registry = Self::new();
        for processor in builtins {
            registry.register(processor, Origin::Builtin);
        }
        registry
    }

    /// Append a processor. Returns `false` (and changes nothing) if its id is
    /// already registered.
    pub fn register(&mut self, processor: Arc<dyn Processor>, origin: Origin) -> bool {
        push_unique(&mut self.entries, processor, origin)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.id() == id)
    }

    /// Load every module `discovery` finds under `dirs` and register its
    /// processors, subject to `policy`.
    pub fn discover(
        &mut self,
        discovery: &dyn ProcessorDiscovery,
        dirs: &[PathBuf],
        policy: LoadPolicy,
    ) -> Result<DiscoveryReport, RegistryError> {
        let mut modules = discovery.modules(dirs);
        modules.sort_by(|a, b| a.name.cmp(&b.name));

        let mut staged = self.entries.clone();
        let mut report = DiscoveryReport::default();

        for module in &modules {
            let processors = match discovery.load(module) {
                Ok(processors) => processors,
                Err(e) => match policy {
                    LoadPolicy::Strict => return Err(e.into()),
                    LoadPolicy::SkipFailures => {
                        warn!(
                            module = %module.name,
                            path = %module.path.display(),
                            error = %e.message,
                            "skipping processor module"
                        );
                        report.failed.push(e);
                        continue;
                    }
                },
            };

            for processor in processors {
                let id = processor.id().to_string();
                let origin = Origin::Discovered {
                    module: module.name.clone(),
                };
                if push_unique(&mut staged, processor, origin) {
                    debug!(processor = %id, module = %module.name, "registered processor");
                    report.registered.push(id);
                } else {
                    debug!(processor = %id, module = %module.name, "processor already registered");
                    report.duplicates.push(id);
                }
            }
        }

        self.entries = staged;
        Ok(report)
    }

    /// Entries in run order.
    pub fn entries(&self) -> &[ProcessorEntry] {
        &self.entries
    }

    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(ProcessorEntry::id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn push_unique(
    entries: &mut Vec<ProcessorEntry>,
    processor: Arc<dyn Processor>,
    origin: Origin,
) -> bool {
    if entries.iter().any(|e| e.id() == processor.id()) {
        return false;
    }
    let order = entries.len();
    entries.push(ProcessorEntry {
        processor,
        origin,
        order,
    });
    true
}
