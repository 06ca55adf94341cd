//! Interactive prompt
//!
//! Reads one command per line and maps it onto the session. Command errors
//! are printed and the prompt continues; `stop` or end of input ends it.

use std::io::Write;

use colored::Colorize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use super::{current_location, print_state, resolve_location, source_line};
use crate::commands::{ReplCommand, ReplLine};
use crate::common::{Error, Result};
use crate::format::format;
use crate::server::DebuggerProcess;
use crate::session::{DebugSession, StepCommand};

const PROMPT: &str = "(dlv) ";

/// Whether the prompt keeps going after a command
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

pub struct Repl {
    session: DebugSession,
    process: Option<DebuggerProcess>,
}

impl Repl {
    pub fn new(session: DebugSession, process: Option<DebuggerProcess>) -> Self {
        Self { session, process }
    }

    /// Run the prompt on standard input
    pub async fn run_stdin(self) -> Result<()> {
        self.run(BufReader::new(tokio::io::stdin())).await
    }

    /// Run the prompt until `stop` or end of input
    pub async fn run<R: AsyncBufRead + Unpin>(mut self, input: R) -> Result<()> {
        let mut lines = input.lines();

        loop {
            print!("{}", PROMPT);
            let _ = std::io::stdout().flush();

            let Some(line) = lines.next_line().await? else {
                println!();
                break;
            };

            let command = match ReplLine::parse_line(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    let _ = e.print();
                    continue;
                }
            };

            match self.execute(command).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => return Ok(()),
                Err(e) => eprintln!("{} {}", "Error:".red(), e),
            }
        }

        self.shutdown().await
    }

    async fn execute(&mut self, command: ReplCommand) -> Result<Flow> {
        match command {
            ReplCommand::Break { location } => {
                let key = match location {
                    Some(loc) => resolve_location(&loc)?,
                    None => current_location(&self.session)?,
                };
                let text = source_line(&key.file, key.line);
                let bp = self
                    .session
                    .create_breakpoint(key.file, key.line, text, None)
                    .await?;
                match bp.id {
                    Some(id) => println!("Breakpoint {} set at {}", id, bp.key()),
                    None => println!("Breakpoint pending at {}", bp.key()),
                }
            }

            ReplCommand::Clear { location } => {
                let key = match location {
                    Some(loc) => resolve_location(&loc)?,
                    None => current_location(&self.session)?,
                };
                self.session.clear_breakpoint(&key).await?;
                println!("Breakpoint at {} cleared", key);
            }

            ReplCommand::ClearAll => {
                self.session.clear_all_breakpoints().await?;
                println!("All breakpoints cleared");
            }

            ReplCommand::Breakpoints => {
                let breakpoints = self.session.breakpoints();
                if breakpoints.is_empty() {
                    println!("No breakpoints");
                }
                for bp in breakpoints {
                    let id = bp
                        .id
                        .map_or_else(|| "pending".dimmed().to_string(), |id| id.to_string());
                    match &bp.source_text {
                        Some(text) => println!("{:>8}  {}  {}", id, bp.key(), text.dimmed()),
                        None => println!("{:>8}  {}", id, bp.key()),
                    }
                }
            }

            ReplCommand::Continue => self.step(StepCommand::Continue).await?,
            ReplCommand::Next => self.step(StepCommand::Next).await?,
            ReplCommand::Step => self.step(StepCommand::Step).await?,
            ReplCommand::StepOut => self.step(StepCommand::StepOut).await?,

            ReplCommand::Print { expression } => {
                let var = self.session.evaluate(&expression.join(" ")).await?;
                println!("{}", format(&var));
            }

            ReplCommand::Set { assignment } => {
                let joined = assignment.join(" ");
                let (symbol, value) = parse_assignment(&joined)?;
                self.session.set_variable(symbol, value).await?;
            }

            ReplCommand::State => {
                println!("Session: {}", self.session.status());
                if let Some(endpoint) = self.session.endpoint() {
                    println!("Endpoint: {}", endpoint);
                }
                print_state(self.session.state());
            }

            ReplCommand::Restart { rebuild } => {
                let state = self.session.restart(rebuild).await?;
                println!("Process restarted");
                print_state(Some(&state));
            }

            ReplCommand::Log { lines } => match &self.process {
                Some(process) => println!("{}", process.log_tail(lines)?),
                None => {
                    return Err(Error::Usage(
                        "No log: delve was not started by this session".to_string(),
                    ))
                }
            },

            ReplCommand::Stop => {
                self.shutdown().await?;
                return Ok(Flow::Exit);
            }
        }

        Ok(Flow::Continue)
    }

    async fn step(&mut self, command: StepCommand) -> Result<()> {
        let state = self.session.step(command).await?;
        print_state(Some(&state));
        Ok(())
    }

    /// Detach from delve and reap the process we started
    async fn shutdown(&mut self) -> Result<()> {
        let stopped = if self.session.is_connected() {
            self.session.stop().await
        } else {
            Ok(())
        };

        if let Some(process) = self.process.as_mut() {
            process.kill().await?;
        }
        self.process = None;

        stopped
    }
}

/// Split `SYMBOL=VALUE`, trimming both sides
fn parse_assignment(input: &str) -> Result<(&str, &str)> {
    let (symbol, value) = input
        .split_once('=')
        .ok_or_else(|| Error::Usage("Usage: set SYMBOL=VALUE".to_string()))?;
    let (symbol, value) = (symbol.trim(), value.trim());
    if symbol.is_empty() || value.is_empty() {
        return Err(Error::Usage("Usage: set SYMBOL=VALUE".to_string()));
    }
    Ok((symbol, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fake::FakeDelve;
    use crate::session::SessionState;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(parse_assignment("x = 5").unwrap(), ("x", "5"));
        assert_eq!(parse_assignment("s.name=\"a=b\"").unwrap(), ("s.name", "\"a=b\""));
        assert!(parse_assignment("x").is_err());
        assert!(parse_assignment("=5").is_err());
    }

    async fn connected(delve: &FakeDelve) -> Repl {
        let mut session = DebugSession::new(Box::new(delve.clone()));
        session.connect("127.0.0.1:40000").await.unwrap();
        Repl::new(session, None)
    }

    #[tokio::test]
    async fn test_commands_drive_the_session() {
        let delve = FakeDelve::new();
        let mut repl = connected(&delve).await;
        delve.clear_calls();

        let next = ReplLine::parse_line("n").unwrap().unwrap();
        assert_eq!(repl.execute(next).await.unwrap(), Flow::Continue);
        assert_eq!(delve.calls(), vec!["halt", "next"]);

        let set = ReplLine::parse_line("set x = 3").unwrap().unwrap();
        repl.execute(set).await.unwrap();
        assert_eq!(delve.last_params("Set")["Symbol"], "x");
        assert_eq!(delve.last_params("Set")["Value"], "3");
    }

    #[tokio::test]
    async fn test_break_without_location_uses_current_line() {
        let delve = FakeDelve::new();
        let mut repl = connected(&delve).await;

        let cmd = ReplLine::parse_line("break").unwrap().unwrap();
        repl.execute(cmd).await.unwrap();
        assert_eq!(delve.server_breakpoints(), vec![(1, "/app/main.go".to_string(), 5)]);
    }

    #[tokio::test]
    async fn test_command_error_keeps_prompt_alive() {
        let delve = FakeDelve::new();
        let repl = connected(&delve).await;
        delve.fail("Eval", "could not find symbol value for nope");

        let input = b"p nope\nfrobnicate\nstop\n";
        repl.run(&input[..]).await.unwrap();

        let calls = delve.calls();
        assert!(calls.contains(&"Eval".to_string()));
        assert_eq!(calls.last().map(String::as_str), Some("Detach"));
        assert!(delve.closed());
    }

    #[tokio::test]
    async fn test_end_of_input_stops_session() {
        let delve = FakeDelve::new();
        let repl = connected(&delve).await;

        repl.run(&b"state\n"[..]).await.unwrap();
        assert!(delve.closed());
    }

    #[tokio::test]
    async fn test_log_without_process_is_usage_error() {
        let delve = FakeDelve::new();
        let mut repl = connected(&delve).await;

        let cmd = ReplLine::parse_line("log").unwrap().unwrap();
        assert!(matches!(repl.execute(cmd).await, Err(Error::Usage(_))));
        assert_eq!(repl.session.status(), SessionState::Halted);
    }
}
