//! Internal-error reporting.
//!
//! Compile errors, invalid requests, cancellations and timeouts are all
//! typed results and never come through here. What does come through is a
//! genuinely unexpected failure, which usually means shared compiler state
//! went bad; the report captures a backtrace and is appended to a crash
//! artifact so the state at failure survives the session.

use std::backtrace::Backtrace;
use std::io::Write;

/// Where crash reports are appended.
pub fn crash_artifact_path() -> std::path::PathBuf {
    std::env::temp_dir().join("lume-lsp-crash.log")
}

/// Log an internal error with a captured backtrace and append it to the
/// crash artifact. With `abort` set, the process exits instead of serving
/// on from possibly corrupted shared state.
pub fn report_internal_error(context: &str, detail: &str, abort: bool) {
    let backtrace = Backtrace::force_capture();
    tracing::error!(context, detail, "internal error");

    let path = crash_artifact_path();
    let report = format!(
        "=== lume-lsp internal error ===\ncontext: {context}\ndetail: {detail}\nthread: {:?}\nbacktrace:\n{backtrace}\n\n",
        std::thread::current().name().unwrap_or("<unnamed>"),
    );
    let written = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .and_then(|mut f| f.write_all(report.as_bytes()));
    if let Err(e) = written {
        tracing::warn!(error = %e, "could not write crash artifact");
    } else {
        tracing::error!(path = %path.display(), "crash artifact written");
    }

    if abort {
        tracing::error!("exiting on internal error as configured");
        std::process::exit(70);
    }
}
