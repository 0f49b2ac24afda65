//! Processors that ship with the binary.

use super::{Processor, ProcessorError};
use crate::config::ProjectConfig;
use crate::types::PipelineFile;
use chrono::format::{Item, StrftimeItems};
use std::sync::Arc;

/// Token replaced with the build stamp.
pub const TIMESTAMP_MARKER: &str = "TIMESTAMP(~)";

/// The processors every registry starts with, in execution order.
pub fn builtin_processors(
    config: &ProjectConfig,
) -> Result<Vec<Arc<dyn Processor>>, ProcessorError> {
    let processors: Vec<Arc<dyn Processor>> = vec![
        Arc::new(ExtensionProcessor::new(["md"], "html")),
        Arc::new(TimestampProcessor::now(&config.processors.timestamp_format)?),
    ];
    Ok(processors)
}

/// Renames files whose extension is in `from` to use `to` instead.
///
/// Markdown views come out of the render step as HTML, so `page.md` must be
/// written as `page.html`.
#[derive(Debug, Clone)]
pub struct ExtensionProcessor {
    from: Vec<String>,
    to: String,
}

impl ExtensionProcessor {
    pub fn new<I, S>(from: I, to: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            from: from.into_iter().map(Into::into).collect(),
            to: to.into(),
        }
    }
}

impl Processor for ExtensionProcessor {
    fn id(&self) -> &str {
        "builtin::extension"
    }

    fn process(&self, file: &mut PipelineFile) -> Result<(), ProcessorError> {
        if let Some(ext) = file.extension()
            && self.from.iter().any(|f| f.eq_ignore_ascii_case(&ext))
        {
            let renamed = file.filename.with_extension(&self.to);
            file.rename(renamed);
        }
        Ok(())
    }
}

/// Replaces every [`TIMESTAMP_MARKER`] with a stamp fixed at construction,
/// so all files of one build carry the same value (handy for cache-busting
/// query strings like `site.css?v=TIMESTAMP(~)`).
#[derive(Debug, Clone)]
pub struct TimestampProcessor {
    stamp: String,
}

impl TimestampProcessor {
    pub fn new(stamp: impl Into<String>) -> Self {
        Self {
            stamp: stamp.into(),
        }
    }

    /// Stamp the current local time with a `strftime`-style format.
    pub fn now(format: &str) -> Result<Self, ProcessorError> {
        if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            return Err(ProcessorError::TimestampFormat(format.to_string()));
        }
        Ok(Self::new(chrono::Local::now().format(format).to_string()))
    }

    pub fn stamp(&self) -> &str {
        &self.stamp
    }
}

impl Processor for TimestampProcessor {
    fn id(&self) -> &str {
        "builtin::timestamp"
    }

    fn process(&self, file: &mut PipelineFile) -> Result<(), ProcessorError> {
        if file.contents.contains(TIMESTAMP_MARKER) {
            file.contents = file.contents.replace(TIMESTAMP_MARKER, &self.stamp);
        }
        Ok(())
    }
}
