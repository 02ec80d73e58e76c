//! Server configuration.
//!
//! Everything is env-var driven so deployments can tune ceilings without a
//! client-side settings protocol:
//! - `LUME_LSP_POLL_INTERVAL_MS`: completion-poll interval for tracked work
//! - `LUME_LSP_QUERY_CEILING_MS`: ceiling for cursor queries
//! - `LUME_LSP_DIAGNOSTICS_CEILING_MS`: ceiling for diagnostics compiles
//! - `LUME_LSP_RUN_CEILING_MS`: default ceiling for `lume/run`
//! - `LUME_INTERPRETER`: command used to run a program
//! - `LUME_LSP_ABORT_ON_INTERNAL_ERROR`: exit instead of serving on from a
//!   possibly corrupted process

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub poll_interval: Duration,
    pub query_ceiling: Duration,
    pub diagnostics_ceiling: Duration,
    pub run_ceiling: Duration,
    pub interpreter: String,
    pub abort_on_internal_error: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(30),
            query_ceiling: Duration::from_secs(4),
            diagnostics_ceiling: Duration::from_secs(10),
            run_ceiling: Duration::from_secs(10),
            interpreter: "lume".to_string(),
            abort_on_internal_error: false,
        }
    }
}

fn env_millis(name: &str) -> Option<Duration> {
    std::env::var(name).ok()?.parse().ok().map(Duration::from_millis)
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(d) = env_millis("LUME_LSP_POLL_INTERVAL_MS") {
            config.poll_interval = d;
        }
        if let Some(d) = env_millis("LUME_LSP_QUERY_CEILING_MS") {
            config.query_ceiling = d;
        }
        if let Some(d) = env_millis("LUME_LSP_DIAGNOSTICS_CEILING_MS") {
            config.diagnostics_ceiling = d;
        }
        if let Some(d) = env_millis("LUME_LSP_RUN_CEILING_MS") {
            config.run_ceiling = d;
        }
        if let Ok(cmd) = std::env::var("LUME_INTERPRETER") {
            if !cmd.is_empty() {
                config.interpreter = cmd;
            }
        }
        if std::env::var("LUME_LSP_ABORT_ON_INTERNAL_ERROR").is_ok() {
            config.abort_on_internal_error = true;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let c = ServerConfig::default();
        assert!(c.poll_interval < Duration::from_millis(100));
        assert!(c.query_ceiling > c.poll_interval);
        assert!(!c.abort_on_internal_error);
    }
}
