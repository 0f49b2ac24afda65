//! CLI output formatting for build commands.
//!
//! # Information-First Display
//!
//! Every line leads with what a reader cares about (which source became
//! which output) and shows paths relative to the project directory. Failures
//! name the stage they happened in so they can be diagnosed without turning
//! on debug logging.
//!
//! # Output Format
//!
//! ## Views
//!
//! ```text
//! 001 views/index.html → dist/index.html
//! 002 views/blog/post.md → dist/blog/post.html
//!
//! Skipped
//!     views/gone.html (missing)
//!
//! Failed
//!     views/bad.html [render] Renderer failed: unknown helper
//!
//! Built 2 views, 1 skipped, 1 failed
//! ```
//!
//! ## Assets
//!
//! ```text
//! 001 content/site.css (copied)
//! 002 content/logo.svg (unchanged)
//! 003 scripts/app.js (script)
//!
//! Copied 1 file, 1 unchanged, 1 script, 0 failed
//! ```
//!
//! # Architecture
//!
//! Each outcome has a `format_*` function (returns `Vec<String>`) for
//! testability and [`print_outcome`] writes to stdout. Format functions are
//! pure: no I/O, no side effects.

use crate::assets::AssetSummary;
use crate::commands::Outcome;
use crate::pipeline::{BuildSummary, SkipReason};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `path` relative to `base` when it lies below it, unchanged otherwise.
fn display_path(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{n} {}", if n == 1 { one } else { many })
}

// ============================================================================
// Views
// ============================================================================

pub fn format_build_summary(summary: &BuildSummary, project_dir: &Path) -> Vec<String> {
    let mut lines = Vec::new();

    for (i, written) in summary.processed.iter().enumerate() {
        lines.push(format!(
            "{} {} → {}",
            format_index(i + 1),
            display_path(&written.source, project_dir),
            display_path(&written.output, project_dir)
        ));
    }

    if !summary.skipped.is_empty() {
        push_gap(&mut lines);
        lines.push("Skipped".to_string());
        for skipped in &summary.skipped {
            let reason = match skipped.reason {
                SkipReason::Missing => "missing",
                SkipReason::Cancelled => "cancelled",
            };
            lines.push(format!(
                "{}{} ({reason})",
                indent(1),
                display_path(&skipped.path, project_dir)
            ));
        }
    }

    if !summary.failed.is_empty() {
        push_gap(&mut lines);
        lines.push("Failed".to_string());
        for failure in &summary.failed {
            lines.push(format!(
                "{}{} [{}] {}",
                indent(1),
                display_path(&failure.path, project_dir),
                failure.stage,
                failure.message
            ));
        }
    }

    push_gap(&mut lines);
    lines.push(format!(
        "Built {}, {} skipped, {} failed",
        plural(summary.processed.len(), "view", "views"),
        summary.skipped.len(),
        summary.failed.len()
    ));
    lines
}

// ============================================================================
// Assets
// ============================================================================

pub fn format_asset_summary(summary: &AssetSummary, project_dir: &Path) -> Vec<String> {
    let mut entries: Vec<(&Path, &str)> = summary
        .copied
        .iter()
        .map(|p| (p.as_path(), "copied"))
        .chain(summary.unchanged.iter().map(|p| (p.as_path(), "unchanged")))
        .chain(summary.scripts.iter().map(|p| (p.as_path(), "script")))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let mut lines: Vec<String> = entries
        .iter()
        .enumerate()
        .map(|(i, (path, what))| {
            format!(
                "{} {} ({what})",
                format_index(i + 1),
                display_path(path, project_dir)
            )
        })
        .collect();

    if !summary.failed.is_empty() {
        push_gap(&mut lines);
        lines.push("Failed".to_string());
        for failure in &summary.failed {
            lines.push(format!(
                "{}{} {}",
                indent(1),
                display_path(&failure.path, project_dir),
                failure.message
            ));
        }
    }

    push_gap(&mut lines);
    lines.push(format!(
        "Copied {}, {} unchanged, {}, {} failed",
        plural(summary.copied.len(), "file", "files"),
        summary.unchanged.len(),
        plural(summary.scripts.len(), "script", "scripts"),
        summary.failed.len()
    ));
    lines
}

// ============================================================================
// Any outcome
// ============================================================================

pub fn format_outcome(outcome: &Outcome, project_dir: &Path) -> Vec<String> {
    match outcome {
        Outcome::Built(summary) => format_build_summary(summary, project_dir),
        Outcome::Assets(summary) => format_asset_summary(summary, project_dir),
        Outcome::Flushed { evicted } => vec![format!(
            "Flushed {}",
            plural(*evicted, "cached partial", "cached partials")
        )],
        Outcome::Reported { file } => {
            vec![format!("Missing: {}", display_path(file, project_dir))]
        }
    }
}

pub fn print_outcome(outcome: &Outcome, project_dir: &Path) {
    for line in format_outcome(outcome, project_dir) {
        println!("{}", line);
    }
}

fn push_gap(lines: &mut Vec<String>) {
    if !lines.is_empty() {
        lines.push(String::new());
    }
}
