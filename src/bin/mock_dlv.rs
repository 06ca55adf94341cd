//! Mock delve binary for integration testing
//!
//! Accepts the `dlv debug ... --headless` command line, prints the listen
//! banner, and serves a minimal JSON-RPC RPCServer over TCP that walks a
//! pretend `main.go` line by line.

use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};

const PID: i64 = 31337;
const LAST_LINE: u32 = 20;

fn main() {
    let listener = match TcpListener::bind("127.0.0.1:0") {
        Ok(l) => l,
        Err(e) => {
            eprintln!("could not listen: {}", e);
            std::process::exit(1);
        }
    };
    let addr = listener.local_addr().map(|a| a.to_string()).unwrap_or_default();

    let file = std::env::current_dir()
        .map(|d| d.join("main.go").display().to_string())
        .unwrap_or_else(|_| "main.go".to_string());

    println!("API server listening at: {}", addr);
    std::io::stdout().flush().ok();

    let mut state = MockState::new(file);

    for stream in listener.incoming() {
        let Ok(stream) = stream else { continue };
        if serve(stream, &mut state) {
            break;
        }
    }
}

/// Serve one client; true once it detached with kill
fn serve(stream: TcpStream, state: &mut MockState) -> bool {
    let Ok(read_half) = stream.try_clone() else {
        return false;
    };
    let mut reader = BufReader::new(read_half);
    let mut writer = stream;

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            return false; // EOF
        }
        if line.trim().is_empty() {
            continue;
        }

        let request: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(_) => continue,
        };

        let id = request["id"].clone();
        let method = request["method"].as_str().unwrap_or_default().to_string();
        let params = request["params"][0].clone();

        eprintln!("layer=rpc <- {}({})", method, params);
        let response = match state.handle(&method, &params) {
            Ok(result) => json!({ "id": id, "result": result, "error": null }),
            Err(message) => json!({ "id": id, "result": null, "error": message }),
        };

        let body = response.to_string();
        writer.write_all(body.as_bytes()).ok();
        writer.write_all(b"\n").ok();
        writer.flush().ok();

        if method == "RPCServer.Detach" && params["Kill"].as_bool().unwrap_or(false) {
            return true;
        }
    }
}

struct MockState {
    file: String,
    line: u32,
    exited: bool,
    next_bp_id: i64,
    breakpoints: BTreeMap<i64, u32>,
    variables: HashMap<String, i64>,
}

impl MockState {
    fn new(file: String) -> Self {
        Self {
            file,
            line: 1,
            exited: false,
            next_bp_id: 1,
            breakpoints: BTreeMap::new(),
            variables: HashMap::from([("x".to_string(), 10), ("count".to_string(), 0)]),
        }
    }

    fn state(&self) -> Value {
        let thread = if self.exited {
            Value::Null
        } else {
            json!({ "id": 1, "file": self.file, "line": self.line, "goroutineID": 1 })
        };
        json!({
            "State": {
                "Pid": PID,
                "Running": false,
                "Recording": false,
                "currentThread": thread,
                "exited": self.exited,
                "exitStatus": 0,
            }
        })
    }

    fn handle(&mut self, method: &str, params: &Value) -> Result<Value, String> {
        match method {
            "RPCServer.State" => Ok(self.state()),
            "RPCServer.Command" => self.command(params["name"].as_str().unwrap_or_default()),
            "RPCServer.CreateBreakpoint" => {
                let file = params["Breakpoint"]["file"].as_str().unwrap_or_default();
                let line = params["Breakpoint"]["line"].as_u64().unwrap_or(0) as u32;
                if file != self.file || line == 0 || line > LAST_LINE {
                    return Err(format!("could not find statement at {}:{}", file, line));
                }
                if self.breakpoints.values().any(|l| *l == line) {
                    return Err(format!("Breakpoint exists at {}:{}", file, line));
                }
                let id = self.next_bp_id;
                self.next_bp_id += 1;
                self.breakpoints.insert(id, line);
                Ok(json!({ "Breakpoint": { "id": id, "file": file, "line": line } }))
            }
            "RPCServer.ClearBreakpoint" => {
                let id = params["Id"].as_i64().unwrap_or(0);
                match self.breakpoints.remove(&id) {
                    Some(line) => {
                        Ok(json!({ "Breakpoint": { "id": id, "file": self.file, "line": line } }))
                    }
                    None => Err(format!("Non existent breakpoint {}", id)),
                }
            }
            "RPCServer.Eval" => self.eval(params["Expr"].as_str().unwrap_or_default()),
            "RPCServer.Set" => {
                let symbol = params["Symbol"].as_str().unwrap_or_default();
                let value = params["Value"].as_str().unwrap_or_default();
                let Ok(parsed) = value.parse::<i64>() else {
                    return Err(format!("cannot convert {} to int", value));
                };
                match self.variables.get_mut(symbol) {
                    Some(slot) => {
                        *slot = parsed;
                        Ok(json!({}))
                    }
                    None => Err(format!("could not find symbol value for {}", symbol)),
                }
            }
            "RPCServer.Restart" => {
                self.line = 1;
                self.exited = false;
                Ok(json!({ "DiscardedBreakpoints": [] }))
            }
            "RPCServer.Detach" => Ok(json!({})),
            other => Err(format!("unknown method {}", other)),
        }
    }

    fn command(&mut self, name: &str) -> Result<Value, String> {
        if self.exited {
            return Err(format!("Process {} has exited with status 0", PID));
        }
        match name {
            "halt" => {}
            "continue" => {
                let current = self.line;
                let next = self.breakpoints.values().copied().filter(|l| *l > current).min();
                match next {
                    Some(line) => self.line = line,
                    None => self.exited = true,
                }
            }
            "next" | "step" => self.advance(1),
            "stepOut" => self.advance(3),
            other => return Err(format!("unknown command {}", other)),
        }
        Ok(self.state())
    }

    fn advance(&mut self, lines: u32) {
        self.line += lines;
        if self.line > LAST_LINE {
            self.exited = true;
        }
    }

    fn eval(&self, expr: &str) -> Result<Value, String> {
        let variable = match expr {
            "point" => json!({
                "name": "point",
                "type": "main.Point",
                "realType": "main.Point",
                "kind": 25,
                "value": "",
                "children": [
                    { "name": "x", "type": "int", "realType": "int", "kind": 2, "value": "1", "children": [] },
                    { "name": "y", "type": "int", "realType": "int", "kind": 2, "value": "2", "children": [] },
                ],
            }),
            "name" => json!({
                "name": "name",
                "type": "string",
                "realType": "string",
                "kind": 24,
                "value": "gopher",
                "children": null,
            }),
            _ => match self.variables.get(expr) {
                Some(value) => json!({
                    "name": expr,
                    "type": "int",
                    "realType": "int",
                    "kind": 2,
                    "value": value.to_string(),
                    "children": [],
                }),
                None => return Err(format!("could not find symbol value for {}", expr)),
            },
        };
        Ok(json!({ "Variable": variable }))
    }
}
