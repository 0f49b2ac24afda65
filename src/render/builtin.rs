//! Built-in renderer: partial includes plus Markdown.
//!
//! An include is `{{> name}}` (whitespace inside the braces is optional).
//! `name` is a path relative to the partials directory; `.html` is assumed
//! when it has no extension. Included partials may include others, up to
//! [`MAX_INCLUDE_DEPTH`] levels, which also stops include cycles.
//!
//! After includes are expanded, templates with a Markdown extension are
//! converted to HTML with pulldown-cmark. Other templates are returned as
//! expanded text. Markers (`PATHTOROOT(~)`, `TIMESTAMP(~)`) come out of the
//! conversion intact for the later stages.

use super::{RenderError, RenderRequest, TemplateRenderer};
use crate::partials::PartialCache;
use pulldown_cmark::{Options, Parser, html as md_html};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// How deep partials may include other partials.
pub const MAX_INCLUDE_DEPTH: usize = 8;

const INCLUDE_OPEN: &str = "{{>";
const INCLUDE_CLOSE: &str = "}}";

#[derive(Debug, Clone)]
pub struct BuiltinRenderer {
    partials_dir: PathBuf,
    cache: Arc<PartialCache>,
    markdown_extensions: Vec<String>,
}

impl BuiltinRenderer {
    pub fn new(partials_dir: impl Into<PathBuf>, cache: Arc<PartialCache>) -> Self {
        Self {
            partials_dir: partials_dir.into(),
            cache,
            markdown_extensions: vec!["md".to_string(), "markdown".to_string()],
        }
    }

    /// Absolute path of the partial called `name`.
    pub fn partial_path(&self, name: &str) -> Result<PathBuf, RenderError> {
        let relative = Path::new(name);
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if name.is_empty() || !plain {
            return Err(RenderError::PartialName(name.to_string()));
        }
        let mut path = self.partials_dir.join(relative);
        if path.extension().is_none() {
            path.set_extension("html");
        }
        Ok(path)
    }

    fn expand(&self, text: &str, depth: usize, at: &str) -> Result<String, RenderError> {
        if !text.contains(INCLUDE_OPEN) {
            return Ok(text.to_string());
        }
        if depth >= MAX_INCLUDE_DEPTH {
            return Err(RenderError::IncludeDepth(at.to_string()));
        }

        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find(INCLUDE_OPEN) {
            let after_open = &rest[start + INCLUDE_OPEN.len()..];
            let Some(end) = after_open.find(INCLUDE_CLOSE) else {
                break;
            };
            out.push_str(&rest[..start]);

            let name = after_open[..end].trim();
            let partial = self.cache.get(&self.partial_path(name)?)?;
            out.push_str(&self.expand(&partial.contents, depth + 1, name)?);

            rest = &after_open[end + INCLUDE_CLOSE.len()..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn is_markdown(&self, template: &Path) -> bool {
        template
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                self.markdown_extensions
                    .iter()
                    .any(|m| m.eq_ignore_ascii_case(e))
            })
            .unwrap_or(false)
    }
}

impl TemplateRenderer for BuiltinRenderer {
    fn render(&self, request: &RenderRequest<'_>) -> Result<String, RenderError> {
        let template = request.template.display().to_string();
        let expanded = self.expand(request.contents, 0, &template)?;

        if !self.is_markdown(request.template) {
            return Ok(expanded);
        }

        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        // No strikethrough: `~` inside `PATHTOROOT(~)` and `TIMESTAMP(~)`
        // would pair up as a delimiter and split the markers.
        let parser = Parser::new_ext(&expanded, options);
        let mut html = String::new();
        md_html::push_html(&mut html, parser);
        Ok(html)
    }
}
