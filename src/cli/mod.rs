//! CLI command handling
//!
//! Starts or connects to delve, registers the breakpoints given on the
//! command line, then hands control to the interactive prompt.

mod repl;

use std::path::Path;

use colored::Colorize;

use crate::commands::Commands;
use crate::common::{config::Config, envfile, Error, Result};
use crate::rpc::{ExecutionState, LoadConfig, TcpConnector};
use crate::server::{DebuggerProcess, LaunchOptions};
use crate::session::{BreakpointKey, DebugSession, FlushReport};

pub use repl::Repl;

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Debug {
            target,
            args,
            env_file,
            breakpoints,
        } => {
            let env = match &env_file {
                Some(path) => envfile::load(path)?,
                None => Default::default(),
            };
            let opts = LaunchOptions {
                target,
                args,
                env,
                cwd: None,
            };

            let mut session = new_session(config);
            add_initial_breakpoints(&mut session, &breakpoints).await?;

            let mut process = DebuggerProcess::spawn(config, &opts).await?;
            let report = match session.connect(process.endpoint()).await {
                Ok(report) => report,
                Err(e) => {
                    let _ = process.kill().await;
                    return Err(e);
                }
            };

            println!("dlv started, listening at {}", process.endpoint());
            print_flush_report(&report);
            print_state(session.state());

            Repl::new(session, Some(process)).run_stdin().await
        }

        Commands::Connect {
            address,
            breakpoints,
        } => {
            let mut session = new_session(config);
            add_initial_breakpoints(&mut session, &breakpoints).await?;

            let report = session.connect(&address).await?;
            println!("Connected to {}", address);
            print_flush_report(&report);
            print_state(session.state());

            Repl::new(session, None).run_stdin().await
        }
    }
}

/// Create a session wired to the configured transport
pub fn new_session(config: &Config) -> DebugSession {
    DebugSession::new(Box::new(TcpConnector::new(config.timeouts.connect())))
        .with_load_config(LoadConfig::from(&config.eval))
}

/// Parse `file:line` relative to the working directory
pub fn resolve_location(location: &str) -> Result<BreakpointKey> {
    let key = BreakpointKey::parse(location)?;
    let cwd = std::env::current_dir()?;
    Ok(key.absolutize(&cwd))
}

async fn add_initial_breakpoints(session: &mut DebugSession, locations: &[String]) -> Result<()> {
    for location in locations {
        let key = resolve_location(location)?;
        let text = source_line(&key.file, key.line);
        session.create_breakpoint(key.file, key.line, text, None).await?;
    }
    Ok(())
}

fn print_flush_report(report: &FlushReport) {
    for bp in &report.registered {
        if let Some(id) = bp.id {
            println!("Breakpoint {} set at {}", id, bp.key());
        }
    }
    for failure in &report.failed {
        eprintln!(
            "{} breakpoint at {} is still pending: {}",
            "Warning:".yellow(),
            failure.key,
            failure.message
        );
    }
}

/// Print where the debuggee is, with source context
pub(crate) fn print_state(state: Option<&ExecutionState>) {
    let Some(state) = state else {
        println!("Not connected");
        return;
    };

    if state.exited {
        println!("Process {} has exited with status {}", state.pid, state.exit_status);
        return;
    }
    if state.running {
        println!("Process {} is running", state.pid);
        return;
    }

    match &state.current_thread {
        Some(thread) if !thread.file.is_empty() => {
            println!("> {}:{} (goroutine {})", thread.file, thread.line, thread.goroutine_id);
            print_source_context(Path::new(&thread.file), thread.line, 2);
        }
        _ => println!("Process {} is halted", state.pid),
    }
}

/// Print lines around `line`, highlighting it
fn print_source_context(file: &Path, line: u32, radius: u32) {
    let Ok(content) = std::fs::read_to_string(file) else {
        return;
    };

    let first = line.saturating_sub(radius).max(1);
    let last = line.saturating_add(radius);
    for (idx, text) in content.lines().enumerate() {
        let number = idx as u32 + 1;
        if number < first {
            continue;
        }
        if number > last {
            break;
        }
        if number == line {
            println!("{}", format!("=> {:>4}: {}", number, text).bold().yellow());
        } else {
            println!("   {:>4}: {}", number, text);
        }
    }
}

/// Text of a single source line, trimmed
pub(crate) fn source_line(file: &Path, line: u32) -> Option<String> {
    let content = std::fs::read_to_string(file).ok()?;
    let index = usize::try_from(line).ok()?.checked_sub(1)?;
    content.lines().nth(index).map(|l| l.trim().to_string())
}

/// Location of the current thread, for commands defaulting to it
pub(crate) fn current_location(session: &DebugSession) -> Result<BreakpointKey> {
    session
        .state()
        .and_then(|s| s.current_thread.as_ref())
        .filter(|t| !t.file.is_empty())
        .map(|t| BreakpointKey::new(t.file.clone(), t.line))
        .ok_or_else(|| Error::Usage("No current location; give FILE:LINE".to_string()))
}
