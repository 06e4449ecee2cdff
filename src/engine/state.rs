use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

use crate::parser::Direction;

use super::execution::Launch;

/// Exit status reported for a stage whose program could not be started.
pub const EXEC_FAILED_CODE: i32 = 127;

/// How a stage's process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Exited(i32),
    Signaled(i32),
}

impl Termination {
    /// Shell-style numeric status: the exit code, or 128 + signal number.
    pub fn code(self) -> i32 {
        match self {
            Termination::Exited(code) => code,
            Termination::Signaled(sig) => 128 + sig,
        }
    }
}

impl From<ExitStatus> for Termination {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(sig) = status.signal() {
                return Termination::Signaled(sig);
            }
        }
        Termination::Exited(status.code().unwrap_or(1))
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Exited(code) => write!(f, "exit {}", code),
            Termination::Signaled(sig) => write!(f, "signal {}", sig),
        }
    }
}

/// Lifecycle of one stage. Transitions only move forward:
/// `Planned → Spawned → Running → Terminated`, or `Planned → Aborted` when the
/// launch is abandoned before anything was spawned.
///
/// `Spawned` means the process exists but the interpreter still holds its
/// copies of the stage's descriptors; `Running` means they were released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Planned,
    Spawned,
    Running,
    Terminated(Termination),
    Aborted,
}

impl StageState {
    pub fn is_finished(self) -> bool {
        matches!(self, StageState::Terminated(_) | StageState::Aborted)
    }

    /// Position in the lifecycle; a stage never moves to a lower rank.
    pub fn rank(self) -> u8 {
        match self {
            StageState::Planned => 0,
            StageState::Spawned => 1,
            StageState::Running => 2,
            StageState::Terminated(_) | StageState::Aborted => 3,
        }
    }

    pub fn termination(self) -> Option<Termination> {
        match self {
            StageState::Terminated(t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageState::Planned => write!(f, "Planned"),
            StageState::Spawned => write!(f, "Spawned"),
            StageState::Running => write!(f, "Running"),
            StageState::Terminated(t) => write!(f, "Terminated({})", t),
            StageState::Aborted => write!(f, "Aborted"),
        }
    }
}

/// Final word on one stage after it was joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub program: String,
    /// `None` when the program never started.
    pub pid: Option<u32>,
    pub state: StageState,
}

impl StageReport {
    pub fn code(&self) -> i32 {
        self.state.termination().map(Termination::code).unwrap_or(1)
    }
}

/// Status of a whole pipeline: that of its last stage.
pub fn pipeline_status(reports: &[StageReport]) -> i32 {
    reports.last().map(StageReport::code).unwrap_or(0)
}

/// Failures that stop a pipeline before any stage is spawned.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("{}: cannot open for {direction}: {source}", .path.display())]
    FileOpenFailed {
        path: PathBuf,
        direction: Direction,
        #[source]
        source: io::Error,
    },
    #[error("cannot create pipe: {0}")]
    Pipe(#[source] io::Error),
}

/// A launch abandoned before any stage was spawned, with every stage
/// reported as [`StageState::Aborted`].
#[derive(Debug, Error)]
#[error("{error}")]
pub struct LaunchAborted {
    #[source]
    pub error: LaunchError,
    pub reports: Vec<StageReport>,
}

/// A single stage whose program could not be started. Siblings keep running.
#[derive(Debug, Error)]
#[error("{program}: {}", describe_exec_error(.source))]
pub struct ExecError {
    pub program: String,
    #[source]
    pub source: io::Error,
}

fn describe_exec_error(e: &io::Error) -> String {
    if e.kind() == io::ErrorKind::NotFound {
        "command not found".to_string()
    } else {
        e.to_string()
    }
}

/// Interpreter state that outlives a single line.
pub struct ShellState {
    /// Background launches not yet reaped.
    pub background: Vec<Launch>,
}

impl ShellState {
    pub fn new() -> Self {
        ShellState { background: Vec::new() }
    }
}

impl Default for ShellState {
    fn default() -> Self {
        Self::new()
    }
}
