//! Headless delve process supervision
//!
//! Spawns `dlv` as a headless JSON-RPC server, captures its output in a
//! temporary log file, and discovers the endpoint it listens on from the
//! banner it prints at startup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tempfile::NamedTempFile;
use tokio::process::{Child, Command};

use crate::common::{config::Config, parse_listen_address, Error, Result};

/// What to debug
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Package or file handed to `dlv debug`; the working directory's
    /// package when unset
    pub target: Option<String>,
    /// Arguments for the debuggee
    pub args: Vec<String>,
    /// Extra environment variables for dlv and the debuggee
    pub env: HashMap<String, String>,
    /// Working directory for dlv
    pub cwd: Option<PathBuf>,
}

/// A running headless delve server
pub struct DebuggerProcess {
    /// dlv subprocess
    child: Child,
    /// Captured stdout/stderr, removed on drop
    log: NamedTempFile,
    /// host:port the JSON-RPC server listens on
    endpoint: String,
}

/// Build the dlv command line
pub fn dlv_args(config: &Config, opts: &LaunchOptions) -> Vec<String> {
    let mut args = vec!["debug".to_string()];
    if let Some(target) = &opts.target {
        args.push(target.clone());
    }
    args.extend(
        [
            "--headless",
            "--api-version",
            "2",
            "--log",
            "--log-output",
            "rpc",
            "--accept-multiclient",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args.extend(config.dlv.args.iter().cloned());

    if !opts.args.is_empty() {
        args.push("--".to_string());
        args.extend(opts.args.iter().cloned());
    }
    args
}

/// Find the listen address in captured output
pub fn scan_log(content: &str) -> Option<String> {
    content.lines().find_map(parse_listen_address)
}

impl DebuggerProcess {
    /// Spawn dlv and wait until it reports its endpoint
    #[tracing::instrument(skip_all, fields(target = ?opts.target))]
    pub async fn spawn(config: &Config, opts: &LaunchOptions) -> Result<Self> {
        let dlv = config.dlv_path().ok_or(Error::DebuggerNotFound)?;
        let args = dlv_args(config, opts);

        let log = tempfile::Builder::new()
            .prefix("dlvctl-")
            .suffix(".log")
            .tempfile()?;
        let stdout = log.reopen()?;
        let stderr = stdout.try_clone()?;

        tracing::info!(
            dlv = %dlv.display(),
            args = ?args,
            log = %log.path().display(),
            "Starting headless delve"
        );

        let mut cmd = Command::new(&dlv);
        cmd.args(&args)
            .envs(&opts.env)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);
        if let Some(cwd) = &opts.cwd {
            cmd.current_dir(cwd);
        }

        let child = cmd.spawn().map_err(|e| {
            Error::DebuggerStartFailed(format!("failed to run {}: {}", dlv.display(), e))
        })?;

        let mut process = Self {
            child,
            log,
            endpoint: String::new(),
        };
        process.endpoint = process.wait_for_endpoint(config).await?;
        tracing::info!(endpoint = %process.endpoint, "Delve is listening");

        Ok(process)
    }

    async fn wait_for_endpoint(&mut self, config: &Config) -> Result<String> {
        let attempts = config.timeouts.listen_poll_attempts.max(1);
        let interval = config.timeouts.listen_poll_interval();

        for attempt in 1..=attempts {
            let content = self.read_log()?;
            if let Some(endpoint) = scan_log(&content) {
                return Ok(endpoint);
            }

            if let Ok(Some(status)) = self.child.try_wait() {
                return Err(Error::DebuggerStartFailed(format!(
                    "dlv exited with {} before listening:\n{}",
                    status,
                    tail(&content, 20)
                )));
            }

            tracing::debug!(attempt, "Delve not listening yet");
            tokio::time::sleep(interval).await;
        }

        let _ = self.child.start_kill();
        Err(Error::DebuggerStartFailed(format!(
            "no listen address after {} attempts, see {}",
            attempts,
            self.log_path().display()
        )))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn log_path(&self) -> &Path {
        self.log.path()
    }

    /// Everything dlv has printed so far
    pub fn read_log(&self) -> Result<String> {
        std::fs::read(self.log.path())
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .map_err(|e| Error::FileRead {
                path: self.log.path().display().to_string(),
                error: e.to_string(),
            })
    }

    /// Last `lines` lines of the log
    pub fn log_tail(&self, lines: usize) -> Result<String> {
        Ok(tail(&self.read_log()?, lines))
    }

    /// Check if dlv is still running
    pub fn is_running(&mut self) -> bool {
        self.child.try_wait().ok().flatten().is_none()
    }

    /// Kill dlv and reap it
    pub async fn kill(&mut self) -> Result<()> {
        if self.is_running() {
            tracing::debug!("Killing delve");
            self.child.kill().await?;
        }
        Ok(())
    }
}

fn tail(content: &str, lines: usize) -> String {
    let all: Vec<&str> = content.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dlv_args() {
        let mut config = Config::default();
        config.dlv.args = vec!["--check-go-version=false".to_string()];
        let opts = LaunchOptions {
            target: Some("./cmd/server".to_string()),
            args: vec!["-port".to_string(), "8080".to_string()],
            ..Default::default()
        };

        assert_eq!(
            dlv_args(&config, &opts),
            vec![
                "debug",
                "./cmd/server",
                "--headless",
                "--api-version",
                "2",
                "--log",
                "--log-output",
                "rpc",
                "--accept-multiclient",
                "--check-go-version=false",
                "--",
                "-port",
                "8080",
            ]
        );
    }

    #[test]
    fn test_dlv_args_without_target_or_program_args() {
        let args = dlv_args(&Config::default(), &LaunchOptions::default());
        assert_eq!(args[0], "debug");
        assert_eq!(args[1], "--headless");
        assert!(!args.contains(&"--".to_string()));
    }

    #[test]
    fn test_scan_log() {
        let log = "2024-05-01T10:00:00Z warning layer=rpc Listening for remote connections\n\
                   API server listening at: 127.0.0.1:36427\n\
                   2024-05-01T10:00:01Z debug layer=rpc <- RPCServer.State\n";
        assert_eq!(scan_log(log), Some("127.0.0.1:36427".to_string()));
        assert_eq!(scan_log("could not launch process: not a Go package\n"), None);
    }

    #[test]
    fn test_tail() {
        assert_eq!(tail("a\nb\nc\n", 2), "b\nc");
        assert_eq!(tail("a", 5), "a");
        assert_eq!(tail("", 5), "");
    }
}
