use std::fs::{File, OpenOptions};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use crate::parser::{Command, Direction};

use super::fd::{Endpoint, Wiring};
use super::state::LaunchError;

/// rw-r--r--, before the umask.
#[cfg(unix)]
const OUTPUT_MODE: u32 = 0o644;

/// Open a file for an input redirect (stdin). The file must already exist.
pub fn open_stdin_redirect(path: &Path) -> Result<File, LaunchError> {
    File::open(path).map_err(|source| LaunchError::FileOpenFailed {
        path: path.to_path_buf(),
        direction: Direction::Input,
        source,
    })
}

/// Open a file for an output redirect (stdout), creating or truncating it.
pub fn open_stdout_redirect(path: &Path) -> Result<File, LaunchError> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(OUTPUT_MODE);
    options.open(path).map_err(|source| LaunchError::FileOpenFailed {
        path: path.to_path_buf(),
        direction: Direction::Output,
        source,
    })
}

/// Open every redirection file of every stage, in stage order.
///
/// Sides without a redirection start out inherited; pipes are attached later.
/// The first failure drops whatever was already opened.
pub fn resolve_redirects(commands: &[Command]) -> Result<Vec<Wiring>, LaunchError> {
    commands
        .iter()
        .map(|cmd| {
            let stdin = match &cmd.input {
                Some(path) => Endpoint::File(open_stdin_redirect(path)?),
                None => Endpoint::Inherit,
            };
            let stdout = match &cmd.output {
                Some(path) => Endpoint::File(open_stdout_redirect(path)?),
                None => Endpoint::Inherit,
            };
            Ok(Wiring { stdin, stdout })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_input_fails() {
        let err = open_stdin_redirect(Path::new("/nonexistent/pipesh-input")).unwrap_err();
        assert!(matches!(
            err,
            LaunchError::FileOpenFailed { direction: Direction::Input, .. }
        ));
    }

    #[test]
    fn test_output_truncates_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "a much longer previous content\n").unwrap();

        let mut f = open_stdout_redirect(&path).unwrap();
        f.write_all(b"new\n").unwrap();
        drop(f);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_output_is_created_without_exec_bits() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("created.txt");
        open_stdout_redirect(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o600, 0o600);
        assert_eq!(mode & 0o111, 0);
    }
}
