//! # sitepipe
//!
//! A static-site build pipeline. A project keeps its sources in a few root
//! directories (views, content, scripts, images); sitepipe runs each view
//! through a chain of transformations and writes a deployable output tree
//! that mirrors the roots.
//!
//! # Architecture: Per-File Stage Pipeline
//!
//! Every view goes through the same strictly ordered stages:
//!
//! ```text
//! 1. Load      views/blog/post.md  →  PipelineFile
//! 2. Strip     ---\ntitle: x\n---  →  metadata + body
//! 3. Render    body                →  HTML            (templates only)
//! 4. Rebase    PATHTOROOT(~)       →  ../
//! 5. Process   registered processors, in registration order
//! 6. Write     dist/blog/post.html (atomic rename)
//! ```
//!
//! Directory builds run files in parallel; a failing file never stops its
//! siblings and every outcome lands in a per-run summary.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`types`] | `PipelineFile`, the unit of work |
//! | [`config`] | `sitepipe.toml` loading and validation |
//! | [`roots`] | The configured root directories and output directory |
//! | [`front_matter`] | Strips a leading `---` YAML block into metadata |
//! | [`rebase`] | `PATHTOROOT(~)` replacement and output path mapping |
//! | [`partials`] | Cache of reusable template fragments with explicit flush |
//! | [`processors`] | Processor trait, built-ins, registry and plugin discovery |
//! | [`render`] | Render step: built-in includes + Markdown, or an external program |
//! | [`exchange`] | JSON over stdin/stdout with external programs |
//! | [`pipeline`] | Stage sequencing, directory builds, cancellation |
//! | [`assets`] | Content copying and script tooling |
//! | [`commands`] | Build commands and the dispatcher that wires everything up |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Path Arithmetic Only
//!
//! Root matching and depth counting split paths on separators and compare
//! segments. Nothing is canonicalised and the filesystem is never consulted,
//! so a path rebases the same way whether or not the file exists yet.
//!
//! ## Plugins Are Executables
//!
//! Processor plugins are programs named `sitepipe-processor-*` that speak
//! JSON over stdin/stdout. Discovery sits behind the
//! [`ProcessorDiscovery`](processors::ProcessorDiscovery) trait, so the
//! registry only sees an ordered list of processors and per-module failures.
//!
//! ## No Templating Language
//!
//! The built-in renderer only expands `{{> partial}}` includes and converts
//! Markdown. Anything richer is delegated to an external renderer configured
//! in `[templating] command`.

pub mod assets;
pub mod commands;
pub mod config;
pub mod exchange;
pub mod front_matter;
pub mod output;
pub mod partials;
pub mod pipeline;
pub mod processors;
pub mod rebase;
pub mod render;
pub mod roots;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
