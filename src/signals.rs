#[cfg(unix)]
use nix::sys::signal::{signal, SigHandler, Signal};

/// Keyboard signals the interpreter ignores so that Ctrl+C / Ctrl+\ only
/// reach the foreground pipeline.
#[cfg(unix)]
const SHIELDED: [Signal; 2] = [Signal::SIGINT, Signal::SIGQUIT];

/// Initialize shell signal handlers
#[cfg(unix)]
pub fn init() -> std::io::Result<()> {
    // Rustyline installs its own SIGINT handler during readline(), which is fine.
    for sig in SHIELDED {
        unsafe { signal(sig, SigHandler::SigIgn) }?;
    }
    Ok(())
}

/// Restore default signal handlers (for child processes, between fork and
/// exec). SIGPIPE is included: an ignored disposition survives exec and would
/// stop writers in a broken pipeline from dying.
#[cfg(unix)]
pub fn restore_default() -> std::io::Result<()> {
    for sig in SHIELDED.into_iter().chain([Signal::SIGPIPE]) {
        unsafe { signal(sig, SigHandler::SigDfl) }?;
    }
    Ok(())
}

#[cfg(windows)]
pub fn init() -> std::io::Result<()> {
    // Basic Windows console handling is handled by rustyline for Ctrl-C
    Ok(())
}

