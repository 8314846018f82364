//! Process orchestrator: launches one strategy process and folds its output
//! into a `RunResult`.
//!
//! Lifecycle: `Idle → Starting → Running → {Succeeded, Failed}`.
//!
//! - stdout is read in fixed-size chunks by a pump thread and fed to a
//!   `StreamSession` on the calling thread, so lines are processed strictly
//!   in arrival order. Reading stops once the process has exited, even if a
//!   descendant still holds the pipe.
//! - On unix the process leads its own process group; terminating a run
//!   kills the whole group.
//! - stderr is forwarded verbatim to the sink by a dedicated thread.
//! - Metrics are computed once, and only when the process exits with code 0.
//! - A temporary artifact is released as soon as the process has exited,
//!   whatever the outcome.

use std::io::{self, Read};
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use stratrun_core::protocol::{EventParser, StreamReader};
use stratrun_core::{Diagnostic, DiagnosticSink, StreamKind, StreamSession};
use thiserror::Error;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::artifact::RunArtifact;
use crate::config::{ConfigError, RunConfig};
use crate::metrics::PerformanceSnapshot;
use crate::profile::EngineProfile;
use crate::result::{RunResult, SCHEMA_VERSION};

/// Bytes requested from stdout per read.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Quiet period after exit before a pipe something else still holds is
/// abandoned.
const PIPE_DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Upper bound on reading after exit, for descendants that never go quiet.
const PIPE_DRAIN_LIMIT: Duration = Duration::from_secs(2);

/// Errors from a run. Any of them means no metrics were computed.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("could not start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("process exited with error")]
    Terminated,
    #[error("process exited with code {0}")]
    ExitCode(i32),
    #[error("I/O error while running: {0}")]
    Io(#[from] io::Error),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("orchestrator has already run")]
    AlreadyRun,
}

impl RunError {
    /// Exit code of the failed process, if it exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            RunError::ExitCode(code) => Some(*code),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    Starting,
    Running,
    Succeeded,
    Failed,
}

/// State shared with `Terminator` handles.
#[derive(Debug)]
struct Shared {
    state: Mutex<RunState>,
    child: Mutex<Option<Child>>,
    terminate_requested: AtomicBool,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn child(&self) -> MutexGuard<'_, Option<Child>> {
        self.child.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Kill the child and, on unix, every process in its group. A wrapper
    /// script's grandchildren would otherwise keep the output pipes open.
    fn kill(&self) -> bool {
        match self.child().as_mut() {
            Some(child) => {
                kill_process_group(child);
                child.kill().is_ok()
            }
            None => false,
        }
    }
}

#[cfg(unix)]
fn kill_process_group(child: &Child) {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    // SAFETY: plain syscall; the group was created by `process_group(0)` at
    // spawn and the child is not yet reaped, so the id cannot be reused.
    unsafe {
        libc::kill(-pgid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}

/// Cancels a run by killing its process. Cloneable and `Send`; a terminated
/// run fails with `RunError::Terminated`.
#[derive(Debug, Clone)]
pub struct Terminator {
    shared: Arc<Shared>,
}

impl Terminator {
    /// Kill the process. Returns `true` if a live process was signalled; a
    /// request made before launch kills the process as soon as it starts.
    pub fn terminate(&self) -> bool {
        self.shared.terminate_requested.store(true, Ordering::SeqCst);
        self.shared.kill()
    }

    pub fn state(&self) -> RunState {
        *self.shared.state()
    }
}

/// Runs one configured strategy process. Single use.
pub struct Orchestrator {
    config: RunConfig,
    profile: EngineProfile,
    sink: Arc<dyn DiagnosticSink>,
    shared: Arc<Shared>,
    chunk_size: usize,
}

impl Orchestrator {
    pub fn new(config: RunConfig, sink: Arc<dyn DiagnosticSink>) -> Result<Self, ConfigError> {
        config.validate()?;
        let profile = config.profile()?;
        Ok(Self {
            config,
            profile,
            sink,
            shared: Arc::new(Shared {
                state: Mutex::new(RunState::Idle),
                child: Mutex::new(None),
                terminate_requested: AtomicBool::new(false),
            }),
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Override the stdout read size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn state(&self) -> RunState {
        *self.shared.state()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn profile(&self) -> &EngineProfile {
        &self.profile
    }

    pub fn terminator(&self) -> Terminator {
        Terminator {
            shared: Arc::clone(&self.shared),
        }
    }

    fn transition(&self, to: RunState) {
        let mut state = self.shared.state();
        let from = *state;
        debug!(?from, ?to, "state transition");
        *state = to;
    }

    /// Launch `program args… <artifact>` and block until it exits.
    pub fn run(&mut self, artifact: RunArtifact) -> Result<RunResult, RunError> {
        if self.state() != RunState::Idle {
            return Err(RunError::AlreadyRun);
        }

        let id = Uuid::new_v4();
        let span = info_span!("run", run_id = %id, strategy = %self.config.strategy);
        let _enter = span.enter();
        let started_at = Utc::now();

        self.transition(RunState::Starting);
        info!(
            program = %self.config.program,
            engine = %self.profile.name,
            artifact = %artifact.path().display(),
            "run started"
        );

        let mut child = match self.command(&artifact).spawn() {
            Ok(child) => child,
            Err(source) => {
                self.transition(RunState::Failed);
                warn!(error = %source, "spawn failed");
                artifact.release(self.config.keep_artifacts, self.sink.as_ref());
                return Err(RunError::Spawn {
                    program: self.config.program.clone(),
                    source,
                });
            }
        };
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        debug!(pid = child.id(), "process spawned");
        *self.shared.child() = Some(child);
        if self.shared.terminate_requested.load(Ordering::SeqCst) {
            self.shared.kill();
        }
        self.transition(RunState::Running);

        let stderr_thread = stderr.map(|pipe| forward_stderr(pipe, Arc::clone(&self.sink)));

        let mut session = StreamSession::new(EventParser::new(self.profile.tags.clone()));
        let (read_error, status) = match stdout {
            Some(pipe) => self.pump_stdout(pipe, &mut session),
            None => (None, self.wait_for_exit()),
        };

        if let Some(handle) = stderr_thread {
            join_with_grace(handle, self.sink.as_ref());
        }
        let output = session.finish(self.sink.as_ref());
        let kept = artifact.release(self.config.keep_artifacts, self.sink.as_ref());

        let failure = match (read_error, status) {
            (Some(err), _) | (None, Err(err)) => Some(RunError::Io(err)),
            (None, Ok(status)) => self.classify_exit(status),
        };
        if let Some(err) = failure {
            self.transition(RunState::Failed);
            warn!(error = %err, lines = output.stats.lines, "run failed");
            return Err(err);
        }

        let equity = output.equity.into_samples();
        let values: Vec<f64> = equity.iter().map(|s| s.value).collect();
        let trades = output.ledger.into_records();
        let performance = PerformanceSnapshot::compute(trades.values(), &values, self.profile.capabilities);
        info!(
            trades = performance.trade_count,
            equity_samples = values.len(),
            total_return = performance.total_return,
            sharpe = performance.sharpe_ratio,
            max_drawdown = performance.max_drawdown,
            "analytics complete"
        );

        let result = RunResult {
            schema_version: SCHEMA_VERSION,
            id,
            started_at,
            finished_at: Utc::now(),
            strategy_id: self.config.strategy.clone(),
            engine: self.profile.name.clone(),
            config_hash: self.config.config_hash(),
            exit_code: 0,
            performance,
            equity,
            trades,
            stats: output.stats,
            artifact: kept,
        };
        self.transition(RunState::Succeeded);
        Ok(result)
    }

    fn command(&self, artifact: &RunArtifact) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .arg(artifact.path())
            .envs(self.profile.environment(&self.config))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd
    }

    /// Feed stdout into the session until EOF, or until the process has
    /// exited and the pipe has stayed quiet for `PIPE_DRAIN_GRACE`. Output a
    /// lingering descendant writes after that is not read.
    fn pump_stdout(
        &self,
        pipe: ChildStdout,
        session: &mut StreamSession,
    ) -> (Option<io::Error>, io::Result<ExitStatus>) {
        let chunks = spawn_pump(pipe, self.chunk_size);
        let mut read_error = None;
        let mut status = None;
        let mut exited_at: Option<Instant> = None;

        loop {
            let quiet = match chunks.recv_timeout(EXIT_POLL_INTERVAL) {
                Ok(Ok(chunk)) => {
                    session.feed(&chunk, self.sink.as_ref());
                    false
                }
                Ok(Err(err)) => {
                    read_error = Some(err);
                    self.shared.kill();
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => true,
            };

            if status.is_none() {
                match self.poll_exit() {
                    Ok(Some(exit)) => {
                        status = Some(Ok(exit));
                        exited_at = Some(Instant::now());
                    }
                    Ok(None) => {}
                    Err(err) => {
                        status = Some(Err(err));
                        break;
                    }
                }
            }
            if let Some(exited) = exited_at {
                let waited = exited.elapsed();
                if (quiet && waited >= PIPE_DRAIN_GRACE) || waited >= PIPE_DRAIN_LIMIT {
                    debug!("stdout still held open after exit; stopped reading");
                    break;
                }
            }
        }

        let status = match status {
            Some(status) => status,
            None => self.wait_for_exit(),
        };
        (read_error, status)
    }

    /// Reap the child if it has exited. The lock is held only for the check,
    /// so a `Terminator` can still reach the process.
    fn poll_exit(&self) -> io::Result<Option<ExitStatus>> {
        let mut guard = self.shared.child();
        let Some(child) = guard.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::NotFound, "process handle missing"));
        };
        let status = child.try_wait()?;
        if status.is_some() {
            guard.take();
        }
        Ok(status)
    }

    fn wait_for_exit(&self) -> io::Result<ExitStatus> {
        loop {
            if let Some(status) = self.poll_exit()? {
                return Ok(status);
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }

    fn classify_exit(&self, status: ExitStatus) -> Option<RunError> {
        let terminated = self.shared.terminate_requested.load(Ordering::SeqCst);
        info!(code = ?status.code(), terminated, "process exited");
        match status.code() {
            Some(0) if !terminated => None,
            Some(code) if !terminated => Some(RunError::ExitCode(code)),
            _ => Some(RunError::Terminated),
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("strategy", &self.config.strategy)
            .field("engine", &self.profile.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Read `pipe` on its own thread, one message per chunk. The channel closes
/// at EOF or after the first read error.
fn spawn_pump(mut pipe: ChildStdout, chunk_size: usize) -> Receiver<io::Result<Vec<u8>>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = vec![0u8; chunk_size];
        loop {
            let message = match pipe.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => Ok(buf[..n].to_vec()),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => Err(err),
            };
            let failed = message.is_err();
            if tx.send(message).is_err() || failed {
                break;
            }
        }
    });
    rx
}

/// Wait for the stderr forwarder, but not past `PIPE_DRAIN_GRACE` once the
/// process is gone; a descendant may still hold the pipe.
fn join_with_grace(handle: thread::JoinHandle<()>, sink: &dyn DiagnosticSink) {
    let deadline = Instant::now() + PIPE_DRAIN_GRACE;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            debug!("stderr still held open after exit; detached forwarder");
            return;
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
    if handle.join().is_err() {
        sink.warn("stderr forwarder panicked".into());
    }
}

fn forward_stderr(mut pipe: ChildStderr, sink: Arc<dyn DiagnosticSink>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let emit = |line: String| {
            sink.emit(Diagnostic::Output {
                stream: StreamKind::Stderr,
                line,
            })
        };
        let mut reader = StreamReader::new();
        let mut buf = [0u8; 4096];
        loop {
            match pipe.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => reader.feed(&buf[..n]).into_iter().for_each(emit),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    sink.warn(format!("stderr read failed: {err}"));
                    break;
                }
            }
        }
        debug!(lines = reader.lines_emitted(), "stderr closed");
        if let Some(tail) = reader.into_remainder() {
            emit(tail);
        }
    })
}
