use std::time::Duration;

use crate::config::Config;
use crate::engine::{self, Execution, Reaped, ShellState};
use crate::parser;

/// How long the interpreter waits on exit for background pipelines.
pub const EXIT_GRACE: Duration = Duration::from_millis(500);

/// What happened to one input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    /// Nothing to run.
    Empty,
    /// The line did not tokenize or compile.
    Rejected,
    /// A redirection file or pipe could not be set up; nothing was spawned.
    LaunchFailed,
    /// Foreground pipeline finished with this status.
    Completed(i32),
    /// Pipeline left running in the background.
    Background,
}

impl LineStatus {
    /// Exit status for `pipesh -c`.
    pub fn code(self) -> i32 {
        match self {
            LineStatus::Empty | LineStatus::Background => 0,
            LineStatus::Rejected => 2,
            LineStatus::LaunchFailed => 1,
            LineStatus::Completed(code) => code,
        }
    }
}

/// Parse and run a single line. Errors are reported on stderr and never
/// end the session.
pub fn run_line(line: &str, config: &Config, state: &mut ShellState) -> LineStatus {
    let compiled = match parser::parse_line(line, &config.limits(), config.redirect_policy) {
        Ok(Some(compiled)) => compiled,
        Ok(None) => return LineStatus::Empty,
        Err(e) => {
            eprintln!("pipesh: {}", e);
            return LineStatus::Rejected;
        }
    };
    for warning in &compiled.warnings {
        eprintln!("pipesh: warning: {}", warning);
    }

    match engine::execute(&compiled.pipeline) {
        Ok(Execution::Completed(reports)) => {
            tracing::debug!(?reports, "pipeline finished");
            LineStatus::Completed(engine::pipeline_status(&reports))
        }
        Ok(Execution::Background(launch)) => {
            tracing::debug!(
                pids = ?launch.pids(),
                command = launch.command(),
                "background launch"
            );
            if let Some(pid) = launch.last_pid() {
                println!("[{}]", pid);
            }
            state.background.push(launch);
            LineStatus::Background
        }
        Err(e) => {
            eprintln!("pipesh: {}", e);
            tracing::debug!(stages = ?e.reports, "launch aborted");
            LineStatus::LaunchFailed
        }
    }
}

fn announce(done: &Reaped) {
    let outcome = match done.status() {
        0 => "Done".to_string(),
        code => format!("Exit {}", code),
    };
    match done.last_pid {
        Some(pid) => println!("[{}] {}  {}", pid, outcome, done.command),
        None => println!("{}  {}", outcome, done.command),
    }
}

/// Reap finished background pipelines and tell the user about them.
pub fn announce_finished(state: &mut ShellState) {
    for done in engine::reap_background(state) {
        announce(&done);
    }
}

/// On exit, wait up to `grace` for background pipelines and announce the ones
/// that finish. Returns how many are left running.
pub fn finish_session(state: &mut ShellState, grace: Duration) -> usize {
    for done in engine::settle_background(state, grace) {
        announce(&done);
    }
    state.background.len()
}
