use std::fs::File;
use std::io::{self, PipeReader, PipeWriter};
use std::process::Stdio;

/// One end of a stage's stdin or stdout.
///
/// Every variant owns its descriptor, so dropping an `Endpoint` closes it.
/// Pipe descriptors are created close-on-exec; a child only ever keeps the
/// copy duplicated onto fd 0 or 1.
#[derive(Debug)]
pub enum Endpoint {
    /// Use the interpreter's own stdin/stdout.
    Inherit,
    File(File),
    PipeRead(PipeReader),
    PipeWrite(PipeWriter),
}

impl Endpoint {
    pub fn is_inherit(&self) -> bool {
        matches!(self, Endpoint::Inherit)
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Endpoint::Inherit => "inherit",
            Endpoint::File(_) => "file",
            Endpoint::PipeRead(_) => "pipe-read",
            Endpoint::PipeWrite(_) => "pipe-write",
        }
    }
}

impl From<Endpoint> for Stdio {
    fn from(endpoint: Endpoint) -> Stdio {
        match endpoint {
            Endpoint::Inherit => Stdio::inherit(),
            Endpoint::File(f) => Stdio::from(f),
            Endpoint::PipeRead(r) => Stdio::from(r),
            Endpoint::PipeWrite(w) => Stdio::from(w),
        }
    }
}

/// The descriptors a single stage is launched with.
#[derive(Debug)]
pub struct Wiring {
    pub stdin: Endpoint,
    pub stdout: Endpoint,
}

/// Hand out one pipe per stage boundary.
///
/// Stage `i` gets the write end of pipe `i` and stage `i + 1` its read end,
/// unless that side already carries a redirection file; the unused end is
/// then dropped (closed) here so the neighbour sees EOF or a broken pipe.
pub fn connect(wiring: &mut [Wiring]) -> io::Result<()> {
    for i in 1..wiring.len() {
        let (reader, writer) = io::pipe()?;
        tracing::debug!(boundary = i - 1, "allocated pipe");
        if wiring[i - 1].stdout.is_inherit() {
            wiring[i - 1].stdout = Endpoint::PipeWrite(writer);
        }
        if wiring[i].stdin.is_inherit() {
            wiring[i].stdin = Endpoint::PipeRead(reader);
        }
    }
    Ok(())
}
