use std::fmt;
use std::path::PathBuf;

// ── AST types ──────────────────────────────────────────────────────────────

/// Which standard stream a redirection replaces.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Direction {
    /// `< file` — read stdin from file
    Input,
    /// `> file` — truncate-write stdout to file
    Output,
}

impl Direction {
    pub fn stream(self) -> &'static str {
        match self {
            Direction::Input => "stdin",
            Direction::Output => "stdout",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => write!(f, "input"),
            Direction::Output => write!(f, "output"),
        }
    }
}

/// One pipeline stage. `argv` is never empty once compiled and `argv[0]` is
/// the program name.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Command {
    pub argv: Vec<String>,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

impl Command {
    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }

    pub fn redirect(&self, direction: Direction) -> Option<&PathBuf> {
        match direction {
            Direction::Input => self.input.as_ref(),
            Direction::Output => self.output.as_ref(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.argv.join(" "))?;
        if let Some(path) = &self.input {
            write!(f, " < {}", path.display())?;
        }
        if let Some(path) = &self.output {
            write!(f, " > {}", path.display())?;
        }
        Ok(())
    }
}

/// A pipeline is one or more commands connected by `|`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Pipeline {
    pub commands: Vec<Command>, // length ≥ 1
    pub background: bool,
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cmd) in self.commands.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{}", cmd)?;
        }
        if self.background {
            write!(f, " &")?;
        }
        Ok(())
    }
}
