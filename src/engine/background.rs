use std::time::{Duration, Instant};

use super::execution::Launch;
use super::state::{pipeline_status, ShellState, StageReport};

/// A background pipeline whose stages have all terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaped {
    pub command: String,
    pub last_pid: Option<u32>,
    pub reports: Vec<StageReport>,
}

impl Reaped {
    fn new(launch: &Launch, reports: Vec<StageReport>) -> Self {
        Reaped {
            command: launch.command().to_string(),
            last_pid: launch.last_pid(),
            reports,
        }
    }

    pub fn status(&self) -> i32 {
        pipeline_status(&self.reports)
    }
}

/// Reap background launches that have finished, without blocking.
///
/// Finished launches are removed from `state`; the rest stay for the next call.
pub fn reap_background(state: &mut ShellState) -> Vec<Reaped> {
    let mut reaped = Vec::new();
    state.background.retain_mut(|launch| match launch.try_reap() {
        Some(reports) => {
            tracing::debug!(command = launch.command(), "background pipeline finished");
            reaped.push(Reaped::new(launch, reports));
            false
        }
        None => true,
    });
    reaped
}

/// Give background launches up to `grace` in total to finish.
///
/// Launches that finish in time are removed from `state` and returned; the
/// rest are left running and stay in `state`.
pub fn settle_background(state: &mut ShellState, grace: Duration) -> Vec<Reaped> {
    let deadline = Instant::now() + grace;
    let mut reaped = Vec::new();
    let mut pending = Vec::new();
    for launch in state.background.drain(..) {
        let command = launch.command().to_string();
        let last_pid = launch.last_pid();
        let remaining = deadline.saturating_duration_since(Instant::now());
        match launch.join_timeout(remaining) {
            Ok(reports) => {
                tracing::debug!(%command, "background pipeline finished");
                reaped.push(Reaped { command, last_pid, reports });
            }
            Err(launch) => pending.push(launch),
        }
    }
    if !pending.is_empty() {
        tracing::debug!(count = pending.len(), "background pipelines left running");
    }
    state.background = pending;
    reaped
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::engine::execution::spawn;
    use crate::parser::{parse_line, Limits, RedirectPolicy};

    fn launch(state: &mut ShellState, line: &str) {
        let compiled = parse_line(line, &Limits::default(), RedirectPolicy::Reject)
            .unwrap()
            .unwrap();
        state.background.push(spawn(&compiled.pipeline).ok().unwrap());
    }

    #[test]
    fn test_reaps_only_finished_launches() {
        let mut state = ShellState::new();
        launch(&mut state, "true &");
        launch(&mut state, "sleep 5 &");

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut reaped = Vec::new();
        while reaped.is_empty() && Instant::now() < deadline {
            reaped = reap_background(&mut state);
            std::thread::sleep(Duration::from_millis(10));
        }

        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].command, "true &");
        assert_eq!(reaped[0].status(), 0);
        assert!(reaped[0].last_pid.is_some());
        assert_eq!(state.background.len(), 1);

        // Don't leave the sleeper behind.
        for pid in state.background[0].pids() {
            let _ = nix::sys::signal::kill(
                nix::unistd::Pid::from_raw(pid as i32),
                nix::sys::signal::Signal::SIGKILL,
            );
        }
        let leftover = state.background.remove(0).join();
        assert_eq!(leftover[0].code(), 128 + 9);
    }

    #[test]
    fn test_settle_waits_within_grace() {
        let mut state = ShellState::new();
        launch(&mut state, "sleep 0 | true &");
        launch(&mut state, "sleep 5 &");

        let started = Instant::now();
        let settled = settle_background(&mut state, Duration::from_millis(500));
        assert!(started.elapsed() < Duration::from_secs(3));

        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].command, "sleep 0 | true &");
        assert_eq!(settled[0].reports.len(), 2);
        assert_eq!(state.background.len(), 1);
        assert_eq!(state.background[0].command(), "sleep 5 &");

        for pid in state.background[0].pids() {
            let _ = nix::sys::signal::kill(
                nix::unistd::Pid::from_raw(pid as i32),
                nix::sys::signal::Signal::SIGKILL,
            );
        }
        state.background.remove(0).join();
    }

    #[test]
    fn test_empty_state_reaps_nothing() {
        let mut state = ShellState::new();
        assert!(reap_background(&mut state).is_empty());
    }
}
