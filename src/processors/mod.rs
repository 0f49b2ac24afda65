//! File processors: the extensible tail of the per-file pipeline.
//!
//! After a view has been stripped, rendered and rebased, every registered
//! [`Processor`] runs over it in registration order. A processor may rewrite
//! the contents, rename the file, or fail, which aborts that file.
//!
//! The module is split into:
//! - **Trait**: [`Processor`] and [`ProcessorError`] (this file)
//! - **Built-ins**: [`ExtensionProcessor`], [`TimestampProcessor`]
//! - **Registry**: ordered, deduplicated entries plus the discovery contract
//! - **Command plugins**: `sitepipe-processor-*` executables found on disk

mod builtin;
pub mod command;
pub mod registry;

pub use builtin::{ExtensionProcessor, TIMESTAMP_MARKER, TimestampProcessor, builtin_processors};
pub use command::{CommandDiscovery, CommandProcessor};
pub use registry::{
    DiscoveryReport, LoadError, LoadPolicy, ModuleHandle, Origin, ProcessorDiscovery,
    ProcessorEntry, ProcessorRegistry, RegistryError,
};

use crate::exchange::ExchangeError;
use crate::types::PipelineFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
    #[error("Invalid timestamp format: {0}")]
    TimestampFormat(String),
    #[error("{0}")]
    Failed(String),
}

/// One transformation step applied to a [`PipelineFile`].
///
/// `id` is the processor's stable identity. The registry uses it to refuse a
/// second registration of the same implementation, so two instances of one
/// processor type must return the same id.
pub trait Processor: Send + Sync {
    fn id(&self) -> &str;

    fn process(&self, file: &mut PipelineFile) -> Result<(), ProcessorError>;
}
