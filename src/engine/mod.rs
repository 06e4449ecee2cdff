mod background;
mod execution;
mod fd;
mod path;
mod redirect;
mod state;

// Re-export the public API so that `main.rs` and the driver only ever name
// `engine::*`.
pub use background::{reap_background, settle_background, Reaped};
pub use execution::{execute, Execution};
pub use state::{pipeline_status, ShellState};
