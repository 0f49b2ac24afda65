//! Front-matter extraction.
//!
//! A file may open with a YAML metadata block fenced by two lines that contain
//! exactly `---`:
//!
//! ```text
//! ---
//! title: About
//! layout: page
//! ---
//! # About me
//! ```
//!
//! [`strip`] moves the block into [`PipelineFile::metadata`] and leaves only
//! the text after the closing fence in `contents`. The block is recognised
//! only at offset 0; a fence further down the file is ordinary content.
//!
//! Anything that is not a well-formed block (no closing fence, fence sharing
//! a line with other text, YAML that does not parse to a mapping) counts as
//! "no metadata" and the file passes through untouched.

use crate::types::PipelineFile;
use serde_yaml::{Mapping, Value};
use tracing::debug;

/// The fence line, without its line break.
pub const DELIMITER: &str = "---";

/// Strip a leading metadata block from `file`.
///
/// Returns the file unchanged when `contents` is empty or holds no valid
/// leading block.
pub fn strip(mut file: PipelineFile) -> PipelineFile {
    if file.contents.is_empty() {
        return file;
    }

    let Some(block) = find_block(&file.contents) else {
        return file;
    };

    let Some(metadata) = parse_metadata(block.yaml) else {
        debug!(
            path = %file.filename.display(),
            "front matter is not a YAML mapping, leaving contents as-is"
        );
        return file;
    };

    let body = file.contents[block.body_start..].to_string();
    file.metadata = Some(metadata);
    file.contents = body;
    file
}

/// Location of a recognised block inside the contents.
struct Block<'a> {
    /// Text strictly between the two fence lines.
    yaml: &'a str,
    /// Byte offset of the first byte after the closing fence line.
    body_start: usize,
}

/// Length of the opening fence line including its line break, if the
/// contents start with one.
fn opening_fence_len(contents: &str) -> Option<usize> {
    let rest = contents.strip_prefix(DELIMITER)?;
    if rest.starts_with("\r\n") {
        Some(DELIMITER.len() + 2)
    } else if rest.starts_with('\n') {
        Some(DELIMITER.len() + 1)
    } else {
        None
    }
}

fn find_block(contents: &str) -> Option<Block<'_>> {
    let open = opening_fence_len(contents)?;

    let mut line_start = open;
    loop {
        let rest = &contents[line_start..];
        let (line, next) = match rest.find('\n') {
            Some(i) => (&rest[..i], line_start + i + 1),
            None => (rest, contents.len()),
        };

        if line.strip_suffix('\r').unwrap_or(line) == DELIMITER {
            return Some(Block {
                yaml: &contents[open..line_start],
                body_start: next,
            });
        }

        if next >= contents.len() {
            return None;
        }
        line_start = next;
    }
}

/// Parse block text as a key/value mapping. An empty block is an empty
/// mapping; scalars, sequences and syntax errors are rejected.
fn parse_metadata(yaml: &str) -> Option<Value> {
    match serde_yaml::from_str::<Value>(yaml) {
        Ok(Value::Mapping(map)) => Some(Value::Mapping(map)),
        Ok(Value::Null) => Some(Value::Mapping(Mapping::new())),
        Ok(_) => None,
        Err(e) => {
            debug!(error = %e, "front matter failed to parse");
            None
        }
    }
}
