//! In-memory delve server for session tests
//!
//! Records every request and answers the way delve's RPCServer does, with
//! hooks to inject errors.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::common::{Error, Result};
use crate::rpc::{
    method, Connector, CurrentThread, ExecutionState, Kind, RpcResponse, Transport, Variable,
};

const PID: i64 = 4242;

struct FakeState {
    /// Short method names, with Command recorded as its command name
    calls: Vec<String>,
    params: HashMap<String, Value>,
    running: bool,
    exited: bool,
    exit_status: i64,
    thread: Option<CurrentThread>,
    next_bp_id: i64,
    breakpoints: BTreeMap<i64, (String, u32)>,
    failures: HashMap<String, (String, bool)>,
    rejected_files: HashSet<String>,
    steps: VecDeque<ExecutionState>,
    eval: Option<Variable>,
    refuse: bool,
    connections: usize,
    closed: bool,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            params: HashMap::new(),
            running: false,
            exited: false,
            exit_status: 0,
            thread: Some(main_thread(5)),
            next_bp_id: 1,
            breakpoints: BTreeMap::new(),
            failures: HashMap::new(),
            rejected_files: HashSet::new(),
            steps: VecDeque::new(),
            eval: None,
            refuse: false,
            connections: 0,
            closed: false,
        }
    }
}

fn main_thread(line: u32) -> CurrentThread {
    CurrentThread {
        id: 1,
        file: "/app/main.go".to_string(),
        line,
        goroutine_id: 1,
    }
}

impl FakeState {
    fn state(&self) -> ExecutionState {
        ExecutionState {
            pid: PID,
            running: self.running,
            recording: false,
            current_thread: if self.running || self.exited {
                None
            } else {
                self.thread.clone()
            },
            exited: self.exited,
            exit_status: self.exit_status,
        }
    }

    fn state_body(&self) -> Value {
        json!({ "State": self.state() })
    }

    fn exited_error(&self) -> String {
        format!("Process {} has exited with status {}", PID, self.exit_status)
    }

    fn handle(&mut self, short: &str, params: &Value) -> std::result::Result<Value, String> {
        match short {
            "State" => Ok(self.state_body()),
            "Command" => {
                if self.exited {
                    return Err(self.exited_error());
                }
                match params["name"].as_str().unwrap_or_default() {
                    "halt" => self.running = false,
                    _ => match self.steps.pop_front() {
                        Some(next) => {
                            self.running = next.running;
                            self.exited = next.exited;
                            self.exit_status = next.exit_status;
                            if next.current_thread.is_some() {
                                self.thread = next.current_thread;
                            }
                        }
                        None => {
                            let line = self.thread.as_ref().map_or(1, |t| t.line + 1);
                            self.thread = Some(main_thread(line));
                        }
                    },
                }
                Ok(self.state_body())
            }
            "CreateBreakpoint" => {
                let file = params["Breakpoint"]["file"].as_str().unwrap_or_default().to_string();
                let line = params["Breakpoint"]["line"].as_u64().unwrap_or_default() as u32;
                if self.rejected_files.contains(&file) {
                    return Err(format!("could not find {}:{}", file, line));
                }
                if self.breakpoints.values().any(|(f, l)| *f == file && *l == line) {
                    return Err(format!("Breakpoint exists at {}:{}", file, line));
                }
                let id = self.next_bp_id;
                self.next_bp_id += 1;
                self.breakpoints.insert(id, (file.clone(), line));
                Ok(json!({ "Breakpoint": { "id": id, "file": file, "line": line } }))
            }
            "ClearBreakpoint" => {
                let id = params["Id"].as_i64().unwrap_or_default();
                match self.breakpoints.remove(&id) {
                    Some((file, line)) => {
                        Ok(json!({ "Breakpoint": { "id": id, "file": file, "line": line } }))
                    }
                    None => Err(format!("no breakpoint with id {}", id)),
                }
            }
            "Eval" => {
                let var = self
                    .eval
                    .clone()
                    .unwrap_or_else(|| Variable::leaf("", Kind::Int, "1"));
                Ok(json!({ "Variable": var }))
            }
            "Set" => Ok(json!({})),
            "Restart" => {
                self.running = false;
                self.exited = false;
                self.thread = Some(main_thread(1));
                Ok(json!({ "DiscardedBreakpoints": [] }))
            }
            "Detach" => {
                // Killing the debuggee: the next process starts clean
                self.breakpoints.clear();
                self.next_bp_id = 1;
                self.running = false;
                self.exited = false;
                self.thread = Some(main_thread(5));
                Ok(json!({}))
            }
            other => Err(format!("unknown method {}", other)),
        }
    }
}

/// Shared handle to the fake server; clones see the same state
#[derive(Clone, Default)]
pub struct FakeDelve {
    inner: Arc<Mutex<FakeState>>,
}

fn short_name(rpc_method: &str) -> &str {
    rpc_method.trim_start_matches("RPCServer.")
}

impl FakeDelve {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Params of the last request to `rpc_method` (short or qualified)
    pub fn last_params(&self, rpc_method: &str) -> Value {
        self.lock()
            .params
            .get(short_name(rpc_method))
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn set_running(&self, running: bool) {
        self.lock().running = running;
    }

    pub fn set_thread(&self, thread: Option<CurrentThread>) {
        self.lock().thread = thread;
    }

    pub fn set_eval(&self, var: Variable) {
        self.lock().eval = Some(var);
    }

    /// Queue the state the next step command reports
    pub fn push_step(&self, state: ExecutionState) {
        self.lock().steps.push_back(state);
    }

    /// Answer every `rpc_method` request with an error
    pub fn fail(&self, rpc_method: &str, message: &str) {
        self.lock()
            .failures
            .insert(short_name(rpc_method).to_string(), (message.to_string(), false));
    }

    /// Like `fail`, but the response carries a result as well
    pub fn fail_with_result(&self, rpc_method: &str, message: &str) {
        self.lock()
            .failures
            .insert(short_name(rpc_method).to_string(), (message.to_string(), true));
    }

    pub fn unfail(&self, rpc_method: &str) {
        self.lock().failures.remove(short_name(rpc_method));
    }

    /// Fail CreateBreakpoint for every line of `file`
    pub fn reject_file(&self, file: &str) {
        self.lock().rejected_files.insert(file.to_string());
    }

    pub fn refuse_connections(&self) {
        self.lock().refuse = true;
    }

    pub fn connections(&self) -> usize {
        self.lock().connections
    }

    /// Whether the last connection was closed by the client
    pub fn closed(&self) -> bool {
        self.lock().closed
    }

    /// Breakpoints registered on the server as (id, file, line)
    pub fn server_breakpoints(&self) -> Vec<(i64, String, u32)> {
        self.lock()
            .breakpoints
            .iter()
            .map(|(id, (file, line))| (*id, file.clone(), *line))
            .collect()
    }
}

#[async_trait]
impl Connector for FakeDelve {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn Transport>> {
        let mut state = self.lock();
        if state.refuse {
            return Err(Error::Connection(format!(
                "failed to connect to {}: connection refused",
                endpoint
            )));
        }
        state.connections += 1;
        state.closed = false;
        Ok(Box::new(FakeTransport {
            delve: self.clone(),
            next_id: 1,
            closed: false,
        }))
    }
}

struct FakeTransport {
    delve: FakeDelve,
    next_id: u64,
    closed: bool,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn request(&mut self, rpc_method: &str, params: Value) -> Result<RpcResponse> {
        if self.closed {
            return Err(Error::Connection("connection already closed".to_string()));
        }
        let id = self.next_id;
        self.next_id += 1;

        let mut state = self.delve.lock();
        let short = short_name(rpc_method).to_string();
        let label = if rpc_method == method::COMMAND {
            params["name"].as_str().unwrap_or_default().to_string()
        } else {
            short.clone()
        };
        state.calls.push(label);
        state.params.insert(short.clone(), params.clone());

        if let Some((message, with_result)) = state.failures.get(&short).cloned() {
            let mut resp = RpcResponse::error(id, &message);
            if with_result {
                resp.result = Some(json!({ "Variable": Variable::leaf("", Kind::Int, "0") }));
            }
            return Ok(resp);
        }

        Ok(match state.handle(&short, &params) {
            Ok(result) => RpcResponse::ok(id, result),
            Err(message) => RpcResponse::error(id, &message),
        })
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.delve.lock().closed = true;
        Ok(())
    }
}
