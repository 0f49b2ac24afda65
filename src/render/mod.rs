//! The render step.
//!
//! Rendering is an opaque collaborator: the pipeline hands over a
//! [`RenderRequest`] and gets text back or a [`RenderError`], which is fatal
//! for that file. Two implementations exist:
//!
//! | Renderer | When | What it does |
//! |---|---|---|
//! | [`BuiltinRenderer`] | `templating.command` is empty | `{{> partial}}` includes, Markdown → HTML for `.md` |
//! | [`CommandRenderer`] | `templating.command` is set | JSON request to an external program |

mod builtin;
mod command;

pub use builtin::{BuiltinRenderer, MAX_INCLUDE_DEPTH};
pub use command::CommandRenderer;

use crate::exchange::ExchangeError;
use crate::partials::PartialError;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Partial(#[from] PartialError),
    #[error("Partial includes nested too deeply at {0}")]
    IncludeDepth(String),
    #[error("Invalid partial name: {0:?}")]
    PartialName(String),
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
    #[error("Renderer failed: {0}")]
    Failed(String),
}

/// Everything a renderer gets to see about one file.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RenderRequest<'a> {
    /// Source path of the template.
    pub template: &'a Path,
    /// Contents after front matter has been stripped.
    pub contents: &'a str,
    pub metadata: Option<&'a serde_yaml::Value>,
    /// Prefix from this file back to the output root, when known.
    pub path_to_root: Option<&'a str>,
}

/// Turns a template into its final text.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, request: &RenderRequest<'_>) -> Result<String, RenderError>;
}
