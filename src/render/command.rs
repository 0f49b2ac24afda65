//! External renderer, configured as `[templating] command = [...]`.
//!
//! One process is started per file. It reads a JSON request on stdin:
//!
//! ```json
//! {"template": "/p/views/post.md", "contents": "# Hi", "metadata": {"title": "Hi"}, "path_to_root": "../"}
//! ```
//!
//! and writes a single JSON response on stdout:
//!
//! ```json
//! {"success": true, "output": "<h1>Hi</h1>"}
//! {"success": false, "error": "unknown helper"}
//! ```
//!
//! Anything on stderr is kept for the error message when the process exits
//! non-zero.

use super::{RenderError, RenderRequest, TemplateRenderer};
use crate::exchange;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Command;

#[derive(Debug, Deserialize)]
struct RenderResponse {
    success: bool,
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Renders by handing the request to an external program.
///
/// The program receives the [`RenderRequest`] as JSON on stdin and answers
/// with `{"success": bool, "output": string?, "error": string?}`. A run that
/// exits non-zero, prints something unparseable or reports `success: false`
/// fails the file. There are no retries.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandRenderer {
    /// Build from an argv (program first). Returns `None` for an empty argv.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: PathBuf::from(program),
            args: args.to_vec(),
        })
    }
}

impl TemplateRenderer for CommandRenderer {
    fn render(&self, request: &RenderRequest<'_>) -> Result<String, RenderError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args);

        let response: RenderResponse = exchange::exchange(command, request)?;
        if !response.success {
            return Err(RenderError::Failed(response.error.unwrap_or_else(|| {
                format!("{} reported failure", self.program.display())
            })));
        }
        Ok(response.output.unwrap_or_default())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::Path;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn request<'a>(contents: &'a str) -> RenderRequest<'a> {
        RenderRequest {
            template: Path::new("/p/views/index.html"),
            contents,
            metadata: None,
            path_to_root: Some("./"),
        }
    }

    #[test]
    fn empty_argv_has_no_renderer() {
        assert!(CommandRenderer::from_argv(&[]).is_none());
    }

    #[test]
    fn successful_render_returns_output() {
        let r = CommandRenderer::from_argv(&argv(&[
            "sh",
            "-c",
            r#"cat > /dev/null; echo '{"success": true, "output": "<html>ok</html>"}'"#,
        ]))
        .unwrap();
        assert_eq!(r.render(&request("x")).unwrap(), "<html>ok</html>");
    }

    #[test]
    fn request_reaches_the_program() {
        // Echo the contents field back as the output.
        let script = r#"read line; c=$(printf '%s' "$line" | sed 's/.*"contents":"\([^"]*\)".*/\1/'); printf '{"success": true, "output": "%s"}' "$c""#;
        let r = CommandRenderer::from_argv(&argv(&["sh", "-c", script])).unwrap();
        assert_eq!(r.render(&request("hello")).unwrap(), "hello");
    }

    #[test]
    fn reported_failure_is_render_error() {
        let r = CommandRenderer::from_argv(&argv(&[
            "sh",
            "-c",
            r#"cat > /dev/null; echo '{"success": false, "error": "bad template"}'"#,
        ]))
        .unwrap();
        let err = r.render(&request("x")).unwrap_err();
        assert!(matches!(err, RenderError::Failed(ref m) if m == "bad template"));
    }

    #[test]
    fn non_zero_exit_is_render_error() {
        let r = CommandRenderer::from_argv(&argv(&["sh", "-c", "cat > /dev/null; exit 3"])).unwrap();
        assert!(matches!(
            r.render(&request("x")).unwrap_err(),
            RenderError::Exchange(_)
        ));
    }

    #[test]
    fn malformed_response_is_render_error() {
        let r = CommandRenderer::from_argv(&argv(&["sh", "-c", "cat > /dev/null; echo nope"])).unwrap();
        assert!(matches!(
            r.render(&request("x")).unwrap_err(),
            RenderError::Exchange(_)
        ));
    }
}
