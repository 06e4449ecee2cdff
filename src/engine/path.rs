use std::path::{Path, PathBuf};

/// Locate `cmd` the way `execvp` would: names containing a separator are
/// taken as-is, anything else is searched for on `PATH`.
pub fn find_executable(cmd: &str) -> Option<PathBuf> {
    if cmd.contains('/') || (cfg!(windows) && cmd.contains('\\')) {
        return check_path(PathBuf::from(cmd));
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(cmd))
        .find_map(check_path)
}

fn check_path(p: PathBuf) -> Option<PathBuf> {
    if is_executable(&p) { Some(p) } else { None }
}

#[cfg(unix)]
fn is_executable(p: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    match std::fs::metadata(p) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(windows)]
fn is_executable(p: &Path) -> bool {
    p.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_finds_program_on_path() {
        let found = find_executable("sh").expect("sh should be on PATH");
        assert!(found.ends_with("sh"));
    }

    #[test]
    fn test_unknown_program() {
        assert_eq!(find_executable("pipesh-no-such-program-xyzzy"), None);
    }

    #[test]
    fn test_explicit_path_checked_directly() {
        assert_eq!(find_executable("/bin/sh"), Some(PathBuf::from("/bin/sh")));
        assert_eq!(find_executable("./pipesh-missing"), None);
    }

    #[test]
    fn test_plain_file_is_not_executable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        std::fs::write(&path, "not a program").unwrap();
        assert_eq!(find_executable(path.to_str().unwrap()), None);
    }
}
