use crate::backend::{DEFAULT_TIMEOUT, Reply, Request};
use crate::error::InterpreterError;
use crate::executor::Replay;
use crate::normalize::Normalizer;
use crate::types::{Execution, RawOutcome, Session};
use crate::{t, t_args};
use anyhow::{Context, Result, anyhow};
use deadpool::managed::{Manager, Metrics, Object, Pool, RecycleError, RecycleResult};
use std::borrow::Cow;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::debug;

/// A persistent driver process; one scope at a time.
pub struct DriverProcess {
    pub child: Child,
    pub stdin: BufWriter<ChildStdin>,
    pub stdout: BufReader<ChildStdout>,
}

impl DriverProcess {
    async fn round_trip(
        &mut self,
        request: &Request<'_>,
        timeout: Duration,
    ) -> Result<String, InterpreterError> {
        self.stdin.write_all(request.encode()?.as_bytes()).await?;
        self.stdin.flush().await?;

        let mut line = String::new();
        match tokio::time::timeout(timeout, self.stdout.read_line(&mut line)).await {
            Ok(Ok(0)) => Err(InterpreterError::Exited),
            Ok(Ok(_)) => Reply::decode(&line)?.into_result(),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(InterpreterError::Timeout(timeout)),
        }
    }

    pub async fn evaluate(
        &mut self,
        source: &str,
        timeout: Duration,
    ) -> Result<String, InterpreterError> {
        self.round_trip(&Request::Eval { source }, timeout).await
    }

    /// Replace the global scope with a fresh one.
    pub async fn reset(&mut self, timeout: Duration) -> Result<(), InterpreterError> {
        self.round_trip(&Request::Reset, timeout).await.map(|_| ())
    }
}

/// Manager for creating and recycling driver processes
pub struct DriverManager {
    pub command: String,
    pub args: Vec<String>,
    pub quiet: bool,
    pub timeout: Duration,
}

impl Manager for DriverManager {
    type Type = DriverProcess;
    type Error = anyhow::Error;

    async fn create(&self) -> Result<DriverProcess> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(if self.quiet {
                Stdio::null()
            } else {
                Stdio::inherit()
            })
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(
            |e| anyhow!(t_args!("backend-failed-to-start", "cmd" => &self.command, "error" => e)),
        )?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!(t!("backend-missing-stdin")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!(t!("backend-missing-stdout")))?;
        debug!("{}", t_args!("debug-pool-spawned", "pid" => child.id().unwrap_or_default()));

        Ok(DriverProcess {
            child,
            stdin: BufWriter::new(stdin),
            stdout: BufReader::new(stdout),
        })
    }

    // Every reuse starts from a clean scope.
    async fn recycle(
        &self,
        obj: &mut DriverProcess,
        _metrics: &Metrics,
    ) -> RecycleResult<Self::Error> {
        match obj.child.try_wait() {
            Ok(Some(_)) => return Err(RecycleError::Message(Cow::Owned(t!("pool-process-exited")))),
            Ok(None) => {}
            Err(_e) => {
                return Err(RecycleError::Message(Cow::Owned(t!(
                    "pool-process-status-error"
                ))));
            }
        }
        obj.reset(self.timeout)
            .await
            .map_err(|e| RecycleError::Message(Cow::Owned(t_args!("pool-reset-failed", "error" => e))))
    }
}

impl Drop for DriverProcess {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
    }
}

/// Interpreter backed by a pool of long-lived driver processes.
pub struct PooledInterpreter {
    pool: Pool<DriverManager>,
    timeout: Duration,
}

fn errored(message: String) -> Execution {
    Execution {
        steps: Vec::new(),
        outcome: RawOutcome::Errored {
            index: None,
            message,
        },
    }
}

// Timeouts and protocol errors leave the process in an unknown state.
fn poisons(result: &Result<String, InterpreterError>) -> bool {
    matches!(result, Err(e) if !e.is_recoverable())
}

impl PooledInterpreter {
    pub fn new(
        command: String,
        args: Vec<String>,
        quiet: bool,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        Self::with_size(command, args, quiet, timeout, num_cpus::get())
    }

    /// Like `new`, with at most `pool_size` processes alive at once.
    pub fn with_size(
        command: String,
        args: Vec<String>,
        quiet: bool,
        timeout: Option<Duration>,
        pool_size: usize,
    ) -> Result<Self> {
        let pool_size = pool_size.max(1);
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let manager = DriverManager {
            command,
            args,
            quiet,
            timeout,
        };
        let pool = Pool::builder(manager)
            .max_size(pool_size)
            .build()
            .context(t!("pool-create-failed"))?;
        Ok(Self { pool, timeout })
    }

    pub fn max_size(&self) -> usize {
        self.pool.status().max_size
    }

    /// Driver processes currently owned by the pool.
    pub fn live_processes(&self) -> usize {
        self.pool.status().size
    }

    pub async fn validate(&self) -> Result<()> {
        let mut process = self
            .pool
            .get()
            .await
            .map_err(|e| anyhow!(t_args!("pool-validate-failed", "error" => &e)))?;
        process
            .reset(self.timeout)
            .await
            .map_err(|e| anyhow!(t_args!("pool-validate-failed", "error" => e)))
    }

    /// Replays `session` on a pooled process. A process that timed out or
    /// misbehaved is discarded instead of going back to the pool.
    pub async fn run_session(
        &self,
        session: &Session,
        prologue: Option<&str>,
        normalizer: &Normalizer,
    ) -> Execution {
        let mut process = match self.pool.get().await {
            Ok(process) => process,
            Err(e) => return errored(t_args!("pool-get-failed", "error" => &e)),
        };

        let mut replay = Replay::new(session, normalizer);
        let mut poisoned = false;
        let outcome = 'run: {
            if let Some(src) = prologue {
                let result = process.evaluate(src, self.timeout).await;
                poisoned |= poisons(&result);
                if let Some(outcome) = replay.prologue(result) {
                    break 'run outcome;
                }
            }
            for (index, statement) in session.statements.iter().enumerate() {
                let result = process.evaluate(&statement.source(), self.timeout).await;
                poisoned |= poisons(&result);
                if let Some(outcome) = replay.step(index, result) {
                    break 'run outcome;
                }
            }
            RawOutcome::Matched
        };

        if poisoned {
            drop(Object::take(process));
            debug!(
                session = %session.source_tag,
                live = self.live_processes(),
                "discarded driver process"
            );
        }
        replay.finish(outcome)
    }
}
