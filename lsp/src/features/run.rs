//! Running a program through the external interpreter.
//!
//! The document text is written to a temp file and handed to the configured
//! interpreter command. This never touches compiler state, so it belongs on
//! the background pool, not the sequential worker. The child is polled and
//! killed when the caller's ceiling elapses; a timeout is a normal outcome,
//! not an error.

use crate::core::config::ServerConfig;
use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct RunOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

pub fn run_program(
    config: &ServerConfig,
    text: &str,
    timeout: Option<Duration>,
) -> Result<RunOutcome, String> {
    let ceiling = timeout.unwrap_or(config.run_ceiling);

    let run_id = NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!(
        "lume-run-{}-{}.lume",
        std::process::id(),
        run_id
    ));
    std::fs::write(&path, text).map_err(|e| format!("cannot write temp file: {e}"))?;

    let mut parts = config.interpreter.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| "empty interpreter command".to_string())?;
    let spawned = Command::new(program)
        .args(parts)
        .arg(&path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();
    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            std::fs::remove_file(&path).ok();
            return Err(format!("cannot launch `{}`: {e}", config.interpreter));
        }
    };

    let started = Instant::now();
    let mut timed_out = false;
    let exit_status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {
                if started.elapsed() >= ceiling {
                    timed_out = true;
                    child.kill().ok();
                    break child.wait().ok();
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(e) => {
                std::fs::remove_file(&path).ok();
                return Err(format!("wait failed: {e}"));
            }
        }
    };

    let mut stdout = String::new();
    let mut stderr = String::new();
    if let Some(mut out) = child.stdout.take() {
        out.read_to_string(&mut stdout).ok();
    }
    if let Some(mut err) = child.stderr.take() {
        err.read_to_string(&mut stderr).ok();
    }
    std::fs::remove_file(&path).ok();

    Ok(RunOutcome {
        stdout,
        stderr,
        exit_code: exit_status.and_then(|s| s.code()),
        timed_out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(interpreter: &str) -> ServerConfig {
        ServerConfig {
            interpreter: interpreter.to_string(),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn captured_output_comes_back() {
        // `cat` stands in for the interpreter: it echoes the temp file.
        let outcome = run_program(&config_with("cat"), "say \"hi\"\n", None).unwrap();
        assert_eq!(outcome.stdout, "say \"hi\"\n");
        assert_eq!(outcome.exit_code, Some(0));
        assert!(!outcome.timed_out);
    }

    #[test]
    fn a_hanging_interpreter_is_killed_at_the_ceiling() {
        // `tail -f` follows the temp file forever.
        let outcome = run_program(
            &config_with("tail -f"),
            "x is\n",
            Some(Duration::from_millis(200)),
        )
        .unwrap();
        assert!(outcome.timed_out);
    }

    #[test]
    fn missing_interpreter_is_an_error() {
        let result = run_program(&config_with("definitely-not-a-real-binary"), "", None);
        assert!(result.is_err());
    }
}
