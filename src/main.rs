use clap::{Parser, Subcommand};
use serde_json::json;
use sitepipe::commands::{Command as BuildCommand, Dispatcher, Outcome};
use sitepipe::{config, output};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the log filter (`info`, `sitepipe=debug`, ...).
const LOG_ENV: &str = "SITEPIPE_LOG";

fn version_string() -> &'static str {
    let on_tag = env!("SITEPIPE_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("SITEPIPE_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "sitepipe")]
#[command(about = "Static site build pipeline")]
#[command(long_about = "\
Static site build pipeline

Views are run through front-matter stripping, rendering, path rebasing and
processors, then written to the output directory at the same path they have
below their root.

Project structure:

  project/
  ├── sitepipe.toml                # Settings (optional)
  ├── views/                       # Pages: html, htm, md
  │   ├── index.html               # → dist/index.html
  │   ├── blog/post.md             # → dist/blog/post.html
  │   └── partials/                # {{> name}} fragments, never emitted
  ├── content/                     # Static files, copied by `assets`
  ├── scripts/                     # Handed to the asset tool
  └── processors/                  # sitepipe-processor-* plugins

Markers replaced in every view:
  PATHTOROOT(~)  relative prefix back to the output root (./, ../, ...)
  TIMESTAMP(~)   build stamp

Logging goes to stderr and is filtered by SITEPIPE_LOG (default: info).
Run 'sitepipe gen-config' to generate a documented sitepipe.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Project directory
    #[arg(long, default_value = ".", global = true)]
    project: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a single view
    View {
        /// View file, relative to the project or absolute
        file: PathBuf,
    },
    /// Build every view below a directory (default: the views root)
    Views { dir: Option<PathBuf> },
    /// Copy content files and run scripts through the asset tool
    Assets {
        /// Content directory to copy
        #[arg(long)]
        content: Option<PathBuf>,
        /// Scripts directory to pass through the tool
        #[arg(long)]
        scripts: Option<PathBuf>,
        /// Tool invoked as `tool <source> <dest>` for each script
        #[arg(long, default_value = "")]
        tool: PathBuf,
        /// Target directory (default: the configured output directory)
        #[arg(long)]
        target: Option<PathBuf>,
    },
    /// Drop every cached partial
    FlushCache,
    /// Log that a file no longer exists
    ReportMissing { file: PathBuf },
    /// Read newline-delimited JSON commands from stdin, one JSON outcome per line
    Run,
    /// Print a stock sitepipe.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    // Defaults that depend on sitepipe.toml are filled in once it is loaded.
    let command = match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            return Ok(());
        }
        Command::Run => None,
        Command::View { file } => Some(BuildCommand::BuildView { file }),
        Command::Views { dir } => Some(BuildCommand::BuildViews {
            directory: dir.unwrap_or_default(),
        }),
        Command::Assets {
            content,
            scripts,
            tool,
            target,
        } => Some(BuildCommand::BuildAssets {
            content_dir: content,
            scripts_dir: scripts,
            tool,
            target_dir: target.unwrap_or_default(),
            project_dir: PathBuf::new(),
        }),
        Command::FlushCache => Some(BuildCommand::FlushPartialCache),
        Command::ReportMissing { file } => Some(BuildCommand::ReportNonexistentFile { file }),
    };

    let project = std::path::absolute(&cli.project)?;
    let config = config::load_config(&project)?;
    init_thread_pool(&config.processing);
    let dispatcher = Dispatcher::from_config(&project, &config)?;

    let Some(mut command) = command else {
        return run_stream(&dispatcher);
    };
    match &mut command {
        BuildCommand::BuildViews { directory } if directory.as_os_str().is_empty() => {
            *directory = project.join(&config.roots.views);
        }
        BuildCommand::BuildAssets {
            target_dir,
            project_dir,
            ..
        } => {
            if target_dir.as_os_str().is_empty() {
                *target_dir = project.join(&config.output);
            }
            *project_dir = project.clone();
        }
        _ => {}
    }

    let outcome = dispatcher.dispatch(&command)?;
    output::print_outcome(&outcome, &project);
    let failed = failures(&outcome);
    if failed > 0 {
        return Err(format!("{failed} file(s) failed").into());
    }
    Ok(())
}

/// Install the stderr log subscriber.
fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn failures(outcome: &Outcome) -> usize {
    match outcome {
        Outcome::Built(summary) => summary.failed.len(),
        Outcome::Assets(summary) => summary.failed.len(),
        Outcome::Flushed { .. } | Outcome::Reported { .. } => 0,
    }
}

/// Serve commands from stdin until EOF. The dispatcher (and its partial
/// cache) lives for the whole stream. Bad lines get an error object and do
/// not end the stream.
fn run_stream(dispatcher: &Dispatcher) -> Result<(), Box<dyn std::error::Error>> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<BuildCommand>(&line) {
            Ok(command) => match dispatcher.dispatch(&command) {
                Ok(outcome) => serde_json::to_value(&outcome)?,
                Err(e) => json!({ "outcome": "error", "error": e.to_string() }),
            },
            Err(e) => json!({ "outcome": "error", "error": format!("invalid command: {e}") }),
        };
        writeln!(stdout, "{}", response)?;
        stdout.flush()?;
    }
    Ok(())
}
