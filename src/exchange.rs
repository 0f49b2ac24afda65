//! JSON over stdin/stdout with external programs.
//!
//! Both the external renderer and plugin processors speak the same tiny
//! protocol: one JSON request on stdin, one JSON response on stdout, a zero
//! exit status on success. Anything on stderr is kept for error messages.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Failed to run {program}: {source}")]
    Spawn { program: PathBuf, source: io::Error },
    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: PathBuf,
        status: ExitStatus,
        stderr: String,
    },
    #[error("Invalid JSON from {program}: {source}")]
    Json {
        program: PathBuf,
        source: serde_json::Error,
    },
}

/// Send `request` to `command` and parse its stdout as `Resp`.
///
/// stdin is written from a separate thread so a child that starts answering
/// before it has read everything cannot deadlock us.
pub fn exchange<Req, Resp>(mut command: Command, request: &Req) -> Result<Resp, ExchangeError>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let program = PathBuf::from(command.get_program());
    let spawn_err = |source| ExchangeError::Spawn {
        program: program.clone(),
        source,
    };

    let payload = serde_json::to_vec(request).map_err(|source| ExchangeError::Json {
        program: program.clone(),
        source,
    })?;

    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(spawn_err)?;

    let stdin = child.stdin.take();
    let output = std::thread::scope(|s| {
        if let Some(mut stdin) = stdin {
            let payload = &payload;
            s.spawn(move || {
                // A child that exits without reading closes the pipe; its
                // exit status tells the real story.
                let _ = stdin.write_all(payload).and_then(|_| stdin.write_all(b"\n"));
            });
        }
        child.wait_with_output()
    })
    .map_err(spawn_err)?;

    if !output.status.success() {
        return Err(ExchangeError::Exit {
            program,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    serde_json::from_slice(&output.stdout).map_err(|source| ExchangeError::Json { program, source })
}

/// Run `command` with no input and parse its stdout as `Resp`.
pub fn query<Resp: DeserializeOwned>(mut command: Command) -> Result<Resp, ExchangeError> {
    let program = PathBuf::from(command.get_program());
    let output = command
        .stdin(Stdio::null())
        .output()
        .map_err(|source| ExchangeError::Spawn {
            program: program.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(ExchangeError::Exit {
            program,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    serde_json::from_slice(&output.stdout).map_err(|source| ExchangeError::Json { program, source })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Echo {
        value: u32,
    }

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn exchange_round_trips_through_cat() {
        let resp: Echo = exchange(Command::new("cat"), &serde_json::json!({"value": 7})).unwrap();
        assert_eq!(resp, Echo { value: 7 });
    }

    #[test]
    fn non_zero_exit_reports_stderr() {
        let err = exchange::<_, Echo>(sh("echo boom >&2; exit 3"), &serde_json::json!({}))
            .unwrap_err();
        match err {
            ExchangeError::Exit { stderr, .. } => assert_eq!(stderr, "boom"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn garbage_output_is_json_error() {
        let err = query::<Echo>(sh("echo not-json")).unwrap_err();
        assert!(matches!(err, ExchangeError::Json { .. }));
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let err = query::<Echo>(Command::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, ExchangeError::Spawn { .. }));
    }
}
