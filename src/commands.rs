//! CLI command definitions
//!
//! Defines the clap commands for the dlvctl binary and for the lines typed
//! at its interactive prompt.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Build and debug a Go package with a headless delve
    Debug {
        /// Package or file to debug (default: package in the current directory)
        target: Option<String>,

        /// Arguments to pass to the program
        #[arg(last = true)]
        args: Vec<String>,

        /// Load environment variables for the program from a KEY=VALUE file
        #[arg(long)]
        env_file: Option<PathBuf>,

        /// Set breakpoint(s) before the program starts (file:line)
        /// Can be specified multiple times: -b main.go:12 -b server.go:40
        #[arg(long = "break", short = 'b')]
        breakpoints: Vec<String>,
    },

    /// Connect to a headless delve that is already listening
    Connect {
        /// Address of the delve server (host:port)
        address: String,

        /// Set breakpoint(s) once connected (file:line)
        #[arg(long = "break", short = 'b')]
        breakpoints: Vec<String>,
    },
}

/// One line typed at the prompt
#[derive(Parser, Debug)]
#[command(multicall = true)]
pub struct ReplLine {
    #[command(subcommand)]
    pub command: ReplCommand,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum ReplCommand {
    /// Set a breakpoint (default: current line)
    #[command(alias = "b")]
    Break {
        /// Location: file:line
        location: Option<String>,
    },

    /// Clear a breakpoint (default: current line)
    Clear {
        /// Location: file:line
        location: Option<String>,
    },

    /// Clear every confirmed breakpoint
    #[command(name = "clearall")]
    ClearAll,

    /// List breakpoints
    #[command(alias = "bps")]
    Breakpoints,

    /// Continue execution
    #[command(alias = "c")]
    Continue,

    /// Step over (execute current line, step over function calls)
    #[command(alias = "n")]
    Next,

    /// Step into (execute current line, step into function calls)
    #[command(alias = "s")]
    Step,

    /// Step out (run until current function returns)
    #[command(name = "stepout", alias = "so")]
    StepOut,

    /// Print/evaluate expression
    #[command(alias = "p")]
    Print {
        /// Expression to evaluate
        #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
        expression: Vec<String>,
    },

    /// Assign a variable: set SYMBOL=VALUE
    Set {
        #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
        assignment: Vec<String>,
    },

    /// Show session and debuggee state
    State,

    /// Restart the program
    Restart {
        /// Rebuild the program before restarting
        #[arg(long)]
        rebuild: bool,
    },

    /// Show the tail of delve's log
    Log {
        /// Number of lines to show
        #[arg(long, short = 'n', default_value = "20")]
        lines: usize,
    },

    /// Stop debugging (kills the program) and exit
    #[command(alias = "quit", alias = "exit", alias = "q")]
    Stop,
}

impl ReplLine {
    /// Parse a prompt line; Ok(None) for blank input
    pub fn parse_line(line: &str) -> Result<Option<ReplCommand>, clap::Error> {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            return Ok(None);
        }
        Self::try_parse_from(words).map(|l| Some(l.command))
    }
}
