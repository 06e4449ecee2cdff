use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::thread;
use std::time::{Duration, Instant};

use crate::parser::{self, Pipeline};
#[cfg(unix)]
use crate::signals;

use super::fd::{self, Wiring};
use super::path::find_executable;
use super::redirect::resolve_redirects;
use super::state::{
    ExecError, LaunchAborted, LaunchError, StageReport, StageState, Termination,
    EXEC_FAILED_CODE,
};

/// How often a bounded join re-checks its stages.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

// ── Stage ─────────────────────────────────────────────────────────────────

struct Stage {
    program: String,
    pid: Option<u32>,
    child: Option<Child>,
    state: StageState,
}

impl Stage {
    fn planned(cmd: &parser::Command) -> Self {
        Stage {
            program: cmd.program().to_string(),
            pid: None,
            child: None,
            state: StageState::Planned,
        }
    }

    fn advance(&mut self, next: StageState) {
        debug_assert!(
            next.rank() > self.state.rank(),
            "{}: {} -> {} moves backward",
            self.program,
            self.state,
            next
        );
        tracing::trace!(
            program = %self.program,
            pid = ?self.pid,
            from = %self.state,
            to = %next,
            "stage state"
        );
        self.state = next;
    }

    fn terminate(&mut self, termination: Termination) {
        tracing::debug!(program = %self.program, pid = ?self.pid, %termination, "stage terminated");
        self.advance(StageState::Terminated(termination));
        self.child = None;
    }

    /// Non-blocking check. Returns `true` once the stage has finished.
    fn poll(&mut self) -> bool {
        if self.state.is_finished() {
            return true;
        }
        let Some(child) = self.child.as_mut() else {
            return true;
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                self.terminate(status.into());
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(program = %self.program, error = %e, "lost track of stage");
                self.terminate(Termination::Exited(1));
                true
            }
        }
    }

    fn wait(&mut self) {
        if self.state.is_finished() {
            return;
        }
        let Some(child) = self.child.as_mut() else {
            return;
        };
        match child.wait() {
            Ok(status) => self.terminate(status.into()),
            Err(e) => {
                tracing::warn!(program = %self.program, error = %e, "lost track of stage");
                self.terminate(Termination::Exited(1));
            }
        }
    }

    fn report(&self) -> StageReport {
        StageReport {
            program: self.program.clone(),
            pid: self.pid,
            state: self.state,
        }
    }
}

// ── Launch handle ─────────────────────────────────────────────────────────

/// A pipeline whose stages have all been spawned.
///
/// Dropping a `Launch` does not kill or reap anything; join it, or keep it
/// around and call [`Launch::try_reap`] until it reports completion.
pub struct Launch {
    command: String,
    stages: Vec<Stage>,
}

impl Launch {
    /// The pipeline as it was typed, for status messages.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn pids(&self) -> Vec<u32> {
        self.stages.iter().filter_map(|s| s.pid).collect()
    }

    pub fn last_pid(&self) -> Option<u32> {
        self.stages.iter().rev().find_map(|s| s.pid)
    }

    #[cfg(test)]
    pub fn states(&self) -> Vec<StageState> {
        self.stages.iter().map(|s| s.state).collect()
    }

    /// Wait for every stage, in spawn order.
    pub fn join(mut self) -> Vec<StageReport> {
        for stage in &mut self.stages {
            stage.wait();
        }
        self.reports()
    }

    /// Wait at most `timeout` for every stage to finish. On timeout the
    /// launch is handed back untouched apart from stages that already ended.
    pub fn join_timeout(mut self, timeout: Duration) -> Result<Vec<StageReport>, Launch> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(reports) = self.try_reap() {
                return Ok(reports);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(self);
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Reap whatever has finished without blocking. Returns the reports once
    /// every stage is done.
    pub fn try_reap(&mut self) -> Option<Vec<StageReport>> {
        let mut done = true;
        for stage in &mut self.stages {
            done &= stage.poll();
        }
        done.then(|| self.reports())
    }

    fn reports(&self) -> Vec<StageReport> {
        self.stages.iter().map(Stage::report).collect()
    }
}

// ── Spawning ──────────────────────────────────────────────────────────────

/// Start every stage of `pipeline`, connected by pipes.
///
/// All redirection files are opened and all pipes allocated before the first
/// process starts, so an error here means nothing was spawned and every stage
/// is reported as aborted. A stage whose program cannot be started is
/// reported and marked as exited with status 127; the remaining stages are
/// still launched.
pub fn spawn(pipeline: &Pipeline) -> Result<Launch, LaunchAborted> {
    let mut stages: Vec<Stage> = pipeline.commands.iter().map(Stage::planned).collect();

    let wiring = match wire(pipeline) {
        Ok(w) => w,
        Err(error) => {
            for stage in &mut stages {
                stage.advance(StageState::Aborted);
            }
            tracing::debug!(pipeline = %pipeline, %error, "launch aborted");
            let reports = stages.iter().map(Stage::report).collect();
            return Err(LaunchAborted { error, reports });
        }
    };

    for ((stage, cmd), wiring) in stages.iter_mut().zip(&pipeline.commands).zip(wiring) {
        spawn_stage(stage, cmd, wiring);
    }

    Ok(Launch {
        command: pipeline.to_string(),
        stages,
    })
}

fn wire(pipeline: &Pipeline) -> Result<Vec<Wiring>, LaunchError> {
    let mut wiring = resolve_redirects(&pipeline.commands)?;
    fd::connect(&mut wiring).map_err(LaunchError::Pipe)?;
    Ok(wiring)
}

fn spawn_stage(stage: &mut Stage, cmd: &parser::Command, wiring: Wiring) {
    let program = cmd.program();
    let resolved = find_executable(program).unwrap_or_else(|| PathBuf::from(program));
    tracing::debug!(
        program,
        resolved = %resolved.display(),
        stdin = wiring.stdin.describe(),
        stdout = wiring.stdout.describe(),
        "spawning stage"
    );

    let mut command = Command::new(&resolved);
    command
        .args(cmd.args())
        .stdin(Stdio::from(wiring.stdin))
        .stdout(Stdio::from(wiring.stdout));

    #[cfg(unix)]
    {
        command.arg0(program);
        // SAFETY: `restore_default` only calls sigaction, which is
        // async-signal-safe.
        unsafe {
            command.pre_exec(signals::restore_default);
        }
    }

    match command.spawn() {
        Ok(child) => {
            stage.pid = Some(child.id());
            stage.child = Some(child);
            stage.advance(StageState::Spawned);
            // The Command holds the parent's copies of this stage's
            // descriptors; releasing them is what lets downstream readers
            // see EOF.
            drop(command);
            stage.advance(StageState::Running);
        }
        Err(source) => {
            drop(command);
            let err = ExecError { program: program.to_string(), source };
            eprintln!("pipesh: {}", err);
            tracing::warn!(error = %err, "stage failed to start");
            stage.terminate(Termination::Exited(EXEC_FAILED_CODE));
        }
    }
}

// ── Pipeline execution ────────────────────────────────────────────────────

/// Outcome of [`execute`].
pub enum Execution {
    /// Every stage was joined.
    Completed(Vec<StageReport>),
    /// Stages are still running; the caller owns the handle.
    Background(Launch),
}

/// Spawn `pipeline` and, unless it runs in the background, wait for it.
pub fn execute(pipeline: &Pipeline) -> Result<Execution, LaunchAborted> {
    let launch = spawn(pipeline)?;
    if pipeline.background {
        Ok(Execution::Background(launch))
    } else {
        Ok(Execution::Completed(launch.join()))
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────
