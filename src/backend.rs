use crate::error::InterpreterError;
use crate::{t, t_args};
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tracing::debug;
use wait_timeout::ChildExt;

/// 30 seconds per statement
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a driver gets to exit on its own once stdin is closed.
const TEARDOWN_GRACE: Duration = Duration::from_millis(500);

pub const DEFAULT_COMMAND: &str = "node";

/// Evaluation driver for node, speaking the line protocol below.
pub const NODE_DRIVER: &str = include_str!("../driver/repl.js");

/// A persistent set of bindings. Dropping it tears the scope down.
pub trait Scope {
    /// Evaluate one statement; returns everything it printed, including the
    /// auto-printed result value.
    fn evaluate(&mut self, source: &str) -> Result<String, InterpreterError>;
}

pub trait Interpreter: Send + Sync {
    type Scope: Scope;

    /// A scope sharing no state with any other scope.
    fn new_scope(&self) -> Result<Self::Scope>;

    fn validate(&self) -> Result<()>;
}

/// One request per line on the driver's stdin.
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Request<'a> {
    Eval { source: &'a str },
    Reset,
}

impl Request<'_> {
    pub fn encode(&self) -> Result<String, InterpreterError> {
        let mut line =
            serde_json::to_string(self).map_err(|e| InterpreterError::Protocol(e.to_string()))?;
        line.push('\n');
        Ok(line)
    }
}

/// One reply per line on the driver's stdout.
#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct Reply {
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl Reply {
    pub fn decode(line: &str) -> Result<Self, InterpreterError> {
        serde_json::from_str(line.trim_end())
            .map_err(|e| InterpreterError::Protocol(format!("{e}: {}", line.trim_end())))
    }

    pub fn into_result(self) -> Result<String, InterpreterError> {
        match self.error {
            Some(message) => Err(InterpreterError::Thrown(message)),
            None => Ok(self.output),
        }
    }
}

/// Runs an external driver process per scope (node by default).
#[derive(Debug, Clone)]
pub struct ProcessInterpreter {
    pub command: String,
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
    pub quiet: bool, // silence driver stderr when true
}

impl Default for ProcessInterpreter {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND.to_string(),
            args: node_driver_args(),
            timeout: Some(DEFAULT_TIMEOUT),
            quiet: false,
        }
    }
}

pub fn node_driver_args() -> Vec<String> {
    vec!["-e".to_string(), NODE_DRIVER.to_string()]
}

impl ProcessInterpreter {
    fn spawn(&self) -> Result<Child> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(if self.quiet {
                Stdio::null()
            } else {
                Stdio::inherit()
            });
        cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                anyhow!(t_args!("backend-not-found", "cmd" => &self.command))
            } else {
                anyhow!(t_args!("backend-failed-to-start", "cmd" => &self.command, "error" => e))
            }
        })
    }
}

impl Interpreter for ProcessInterpreter {
    type Scope = ProcessScope;

    fn new_scope(&self) -> Result<ProcessScope> {
        let mut child = self.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!(t!("backend-missing-stdin")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!(t!("backend-missing-stdout")))?;

        let (tx, replies) = mpsc::channel();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        debug!(pid = child.id(), cmd = %self.command, "spawned interpreter scope");

        Ok(ProcessScope {
            child,
            stdin: Some(stdin),
            replies,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
        })
    }

    fn validate(&self) -> Result<()> {
        let mut scope = self.new_scope()?;
        scope
            .reset()
            .with_context(|| t_args!("backend-handshake-failed", "cmd" => &self.command))
    }
}

pub struct ProcessScope {
    child: Child,
    stdin: Option<ChildStdin>,
    replies: Receiver<std::io::Result<String>>,
    timeout: Duration,
}

impl ProcessScope {
    fn round_trip(&mut self, request: &Request<'_>) -> Result<String, InterpreterError> {
        let stdin = self.stdin.as_mut().ok_or(InterpreterError::Exited)?;
        stdin.write_all(request.encode()?.as_bytes())?;
        stdin.flush()?;
        match self.replies.recv_timeout(self.timeout) {
            Ok(Ok(line)) => Reply::decode(&line)?.into_result(),
            Ok(Err(e)) => Err(e.into()),
            Err(RecvTimeoutError::Timeout) => Err(InterpreterError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(InterpreterError::Exited),
        }
    }

    /// Drop all bindings, keeping the process.
    pub fn reset(&mut self) -> Result<(), InterpreterError> {
        self.round_trip(&Request::Reset).map(|_| ())
    }
}

impl Scope for ProcessScope {
    fn evaluate(&mut self, source: &str) -> Result<String, InterpreterError> {
        self.round_trip(&Request::Eval { source })
    }
}

impl Drop for ProcessScope {
    fn drop(&mut self) {
        // closing stdin asks the driver to exit
        drop(self.stdin.take());
        match self.child.wait_timeout(TEARDOWN_GRACE) {
            Ok(Some(_)) => {}
            _ => {
                let _ = self.child.kill();
                let _ = self.child.wait();
            }
        }
    }
}
