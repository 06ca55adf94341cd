//! Debug session state machine
//!
//! The session is the single authority over whether the debuggee is
//! running, halted or gone, and the only place control RPCs are issued.
//!
//! Delve requires the target to be stopped for most commands, so every
//! control RPC except the halt command itself is sent as two sequential
//! round trips: halt (adopting the returned state), then the request.

pub mod breakpoints;

#[cfg(test)]
pub(crate) mod fake;

use serde_json::Value;

use crate::common::{Error, Result};
use crate::rpc::{
    method, BreakpointBody, BreakpointSpec, ClearBreakpointArgs, CommandArgs, Connector,
    CreateBreakpointArgs, DetachArgs, EvalArgs, EvalScope, ExecutionState, LoadConfig,
    RestartArgs, SetArgs, StateArgs, StateBody, Transport, Variable, VariableBody,
};

pub use breakpoints::{Breakpoint, BreakpointKey, BreakpointRegistry};

/// Debug session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No RPC connection
    Disconnected,
    /// Connection being established
    Connecting,
    /// Debuggee is stopped; inspection commands are valid
    Halted,
    /// Debuggee is running
    Running,
    /// Debuggee has exited; the server is still reachable
    Exited,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Halted => write!(f, "halted"),
            Self::Running => write!(f, "running"),
            Self::Exited => write!(f, "exited"),
        }
    }
}

/// Execution commands that move the debuggee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepCommand {
    Continue,
    Next,
    Step,
    StepOut,
}

impl StepCommand {
    /// Name delve's Command RPC expects
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Next => "next",
            Self::Step => "step",
            Self::StepOut => "stepOut",
        }
    }
}

impl std::fmt::Display for StepCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const HALT: &str = "halt";

/// A pending breakpoint that could not be registered on connect
#[derive(Debug, Clone)]
pub struct FlushFailure {
    pub key: BreakpointKey,
    pub message: String,
}

/// Outcome of registering pending breakpoints on connect
#[derive(Debug, Clone, Default)]
pub struct FlushReport {
    /// Breakpoints promoted to confirmed
    pub registered: Vec<Breakpoint>,
    /// Breakpoints left pending
    pub failed: Vec<FlushFailure>,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Debug session managing one delve connection
pub struct DebugSession {
    /// Opens the RPC connection
    connector: Box<dyn Connector>,
    /// Live RPC connection, if any
    transport: Option<Box<dyn Transport>>,
    /// Endpoint of the live connection
    endpoint: Option<String>,
    /// Current session state
    status: SessionState,
    /// Last state reported by the server; None while disconnected
    state: Option<ExecutionState>,
    /// Breakpoints across connections
    breakpoints: BreakpointRegistry,
    /// Load limits sent with Eval
    load_config: LoadConfig,
}

impl DebugSession {
    pub fn new(connector: Box<dyn Connector>) -> Self {
        Self {
            connector,
            transport: None,
            endpoint: None,
            status: SessionState::Disconnected,
            state: None,
            breakpoints: BreakpointRegistry::new(),
            load_config: LoadConfig::default(),
        }
    }

    pub fn with_load_config(mut self, load_config: LoadConfig) -> Self {
        self.load_config = load_config;
        self
    }

    pub fn status(&self) -> SessionState {
        self.status
    }

    /// Last known execution state
    pub fn state(&self) -> Option<&ExecutionState> {
        self.state.as_ref()
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    pub fn registry(&self) -> &BreakpointRegistry {
        &self.breakpoints
    }

    /// Pending and confirmed breakpoints, for listing
    pub fn breakpoints(&self) -> Vec<Breakpoint> {
        self.breakpoints.all_pending_and_confirmed()
    }

    /// Whether a connected, not-exited debuggee can take breakpoints
    fn is_live(&self) -> bool {
        self.transport.is_some() && self.state.as_ref().is_some_and(|s| !s.exited)
    }

    /// Connect to a delve server and register pending breakpoints
    ///
    /// Breakpoint registration is best-effort: a failure leaves that
    /// breakpoint pending, is listed in the report, and does not stop the
    /// remaining registrations or fail the connect.
    #[tracing::instrument(skip(self))]
    pub async fn connect(&mut self, endpoint: &str) -> Result<FlushReport> {
        if self.transport.is_some() {
            return Err(Error::SessionAlreadyActive);
        }

        self.status = SessionState::Connecting;
        let transport = match self.connector.connect(endpoint).await {
            Ok(t) => t,
            Err(e) => {
                self.status = SessionState::Disconnected;
                return Err(e);
            }
        };
        self.transport = Some(transport);
        self.endpoint = Some(endpoint.to_string());

        if let Err(e) = self.establish_baseline().await {
            tracing::warn!(error = %e, "Failed to obtain initial state, disconnecting");
            self.teardown().await;
            return Err(e);
        }
        tracing::info!(endpoint, state = %self.status, "Connected to delve");

        Ok(self.flush_pending().await)
    }

    /// Query state without halting; halt only if the debuggee runs
    async fn establish_baseline(&mut self) -> Result<()> {
        let state = self.get_state(true).await?;
        if state.running {
            tracing::debug!("Debuggee is running, halting");
            self.halt().await?;
        } else {
            self.adopt(state);
        }
        Ok(())
    }

    async fn flush_pending(&mut self) -> FlushReport {
        let mut report = FlushReport::default();

        for bp in self.breakpoints.pending() {
            let key = bp.key();
            match self.register(&key).await {
                Ok(id) => {
                    self.breakpoints.promote(&key, id);
                    report.registered.push(Breakpoint { id: Some(id), ..bp });
                }
                Err(e) => {
                    tracing::warn!(breakpoint = %key, error = %e, "Failed to register pending breakpoint");
                    report.failed.push(FlushFailure {
                        key,
                        message: e.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Query the execution state without halting
    ///
    /// With `non_blocking = false` the server may wait until the debuggee
    /// reaches a reportable state.
    pub async fn get_state(&mut self, non_blocking: bool) -> Result<ExecutionState> {
        let body: StateBody = self
            .raw(method::STATE, to_params(&StateArgs { non_blocking })?)
            .await?;
        Ok(body.state)
    }

    /// Halt the debuggee and adopt the state it reports
    pub async fn halt(&mut self) -> Result<ExecutionState> {
        let args = CommandArgs {
            name: HALT.to_string(),
        };
        let body: StateBody = self.raw(method::COMMAND, to_params(&args)?).await?;
        Ok(self.adopt(body.state))
    }

    /// Run a step command and adopt the resulting state
    pub async fn step(&mut self, command: StepCommand) -> Result<ExecutionState> {
        let args = CommandArgs {
            name: command.as_str().to_string(),
        };
        let body: StateBody = self.call(method::COMMAND, to_params(&args)?).await?;
        let state = self.adopt(body.state);

        if state.exited {
            tracing::info!(status = state.exit_status, "Debuggee exited");
        }
        Ok(state)
    }

    /// Create a breakpoint at `file:line`
    ///
    /// Without a live session the breakpoint is kept pending and registered
    /// on the next connect. Re-creating an existing breakpoint is forwarded
    /// to the server, which decides whether that is an error.
    pub async fn create_breakpoint(
        &mut self,
        file: impl Into<std::path::PathBuf>,
        line: u32,
        source_text: Option<String>,
        buffer: Option<u64>,
    ) -> Result<Breakpoint> {
        let bp = Breakpoint {
            id: None,
            file: file.into(),
            line,
            source_text,
            buffer,
        };

        if !self.is_live() {
            tracing::debug!(breakpoint = %bp.key(), "No live session, breakpoint pending");
            self.breakpoints.add_pending(bp.clone());
            return Ok(bp);
        }

        let id = self.register(&bp.key()).await?;
        self.breakpoints.add_confirmed(bp.clone(), id);
        Ok(Breakpoint { id: Some(id), ..bp })
    }

    /// Send CreateBreakpoint and return the server-assigned id
    async fn register(&mut self, key: &BreakpointKey) -> Result<i64> {
        let args = CreateBreakpointArgs {
            breakpoint: BreakpointSpec {
                file: key.file.to_string_lossy().into_owned(),
                line: key.line,
            },
        };
        let body: BreakpointBody = self
            .call(method::CREATE_BREAKPOINT, to_params(&args)?)
            .await?;

        if body.breakpoint.line != key.line {
            tracing::debug!(
                requested = key.line,
                actual = body.breakpoint.line,
                "Server moved breakpoint"
            );
        }
        Ok(body.breakpoint.id)
    }

    /// Clear the breakpoint at `file:line`
    pub async fn clear_breakpoint(&mut self, key: &BreakpointKey) -> Result<()> {
        if self.is_live() {
            if let Some(id) = self.breakpoints.lookup_confirmed(key).and_then(|bp| bp.id) {
                self.call::<BreakpointBody>(
                    method::CLEAR_BREAKPOINT,
                    to_params(&ClearBreakpointArgs { id })?,
                )
                .await?;
                self.breakpoints.remove(key);
                return Ok(());
            }
        }

        // Pending, or confirmed by a debuggee that has exited
        self.breakpoints
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| Error::breakpoint_not_found(key))
    }

    /// Clear every confirmed breakpoint, stopping at the first failure
    pub async fn clear_all_breakpoints(&mut self) -> Result<()> {
        for bp in self.breakpoints.confirmed() {
            self.clear_breakpoint(&bp.key()).await?;
        }
        Ok(())
    }

    /// Evaluate an expression in the current goroutine
    pub async fn evaluate(&mut self, expr: &str) -> Result<Variable> {
        let goroutine_id = self
            .state
            .as_ref()
            .and_then(|s| s.goroutine_id())
            .ok_or(Error::NoCurrentThread)?;

        let args = EvalArgs {
            scope: EvalScope::goroutine(goroutine_id),
            expr: expr.to_string(),
            cfg: self.load_config.clone(),
        };
        let body: VariableBody = self.call(method::EVAL, to_params(&args)?).await?;
        Ok(body.variable.unwrap_or_default())
    }

    /// Assign `value` to `symbol` in the current goroutine
    ///
    /// Does nothing when there is no current goroutine; the UI may issue
    /// this speculatively.
    pub async fn set_variable(&mut self, symbol: &str, value: &str) -> Result<()> {
        let goroutine_id = match self.state.as_ref().and_then(|s| s.goroutine_id()) {
            Some(id) if id != 0 => id,
            _ => {
                tracing::debug!(symbol, "No current goroutine, ignoring set");
                return Ok(());
            }
        };

        let args = SetArgs {
            scope: EvalScope::goroutine(goroutine_id),
            symbol: symbol.to_string(),
            value: value.to_string(),
        };
        self.call::<Value>(method::SET, to_params(&args)?).await?;
        Ok(())
    }

    /// Restart the debuggee, optionally rebuilding it
    ///
    /// Delve keeps its breakpoints across a restart, so confirmed entries
    /// stay confirmed. An exited debuggee refuses the implicit halt; the
    /// restart is sent anyway.
    pub async fn restart(&mut self, rebuild: bool) -> Result<ExecutionState> {
        if let Err(e) = self.halt().await {
            if self.status != SessionState::Exited {
                return Err(e);
            }
            tracing::warn!(error = %e, "Halt before restart failed, debuggee has exited");
        }
        self.raw::<Value>(method::RESTART, to_params(&RestartArgs { rebuild })?)
            .await?;
        let state = self.get_state(true).await?;
        Ok(self.adopt(state))
    }

    /// Detach from delve, killing the debuggee, and drop the connection
    ///
    /// Local teardown always happens: the state is cleared and confirmed
    /// breakpoints return to pending, since the next server assigns new ids.
    /// A detach error is returned after teardown.
    pub async fn stop(&mut self) -> Result<()> {
        if self.transport.is_none() {
            return Err(Error::SessionNotActive);
        }

        // An exited debuggee refuses to halt; that must not block teardown
        if let Err(e) = self.halt().await {
            tracing::warn!(error = %e, "Halt before detach failed");
        }
        let detached = self
            .raw::<Value>(method::DETACH, to_params(&DetachArgs { kill: true })?)
            .await;

        self.teardown().await;
        tracing::info!("Debug session stopped");

        detached.map(|_| ())
    }

    async fn teardown(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                tracing::debug!(error = %e, "Error closing transport");
            }
        }
        self.endpoint = None;
        self.state = None;
        self.status = SessionState::Disconnected;
        self.breakpoints.demote_all();
    }

    /// Record a state reported by the server
    fn adopt(&mut self, state: ExecutionState) -> ExecutionState {
        let state = state.normalized();
        self.status = if state.exited {
            SessionState::Exited
        } else if state.running {
            SessionState::Running
        } else {
            SessionState::Halted
        };
        self.state = Some(state.clone());
        state
    }

    /// Halt, then send the request
    async fn call<T: serde::de::DeserializeOwned>(
        &mut self,
        rpc_method: &str,
        params: Value,
    ) -> Result<T> {
        self.halt().await?;
        self.raw(rpc_method, params).await
    }

    /// Send one request without the implicit halt
    async fn raw<T: serde::de::DeserializeOwned>(
        &mut self,
        rpc_method: &str,
        params: Value,
    ) -> Result<T> {
        let transport = self.transport.as_mut().ok_or(Error::SessionNotActive)?;
        let response = transport.request(rpc_method, params).await?;
        response.into_body(rpc_method)
    }
}

fn to_params<T: serde::Serialize>(args: &T) -> Result<Value> {
    Ok(serde_json::to_value(args)?)
}
