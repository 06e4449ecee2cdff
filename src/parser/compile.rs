use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use super::ast::{Command, Direction, Pipeline};

const PIPE: &str = "|";
const BACKGROUND: &str = "&";
const REDIRECT_IN: &str = "<";
const REDIRECT_OUT: &str = ">";

/// What to do with a redirection that sits on a pipe-connected end of a
/// stage: input on any stage but the first, output on any stage but the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RedirectPolicy {
    /// Fail compilation with [`CompileError::MisplacedRedirect`].
    #[default]
    Reject,
    /// Accept it; the file replaces the pipe for that stage and the unused
    /// pipe end is closed.
    Override,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("can't have pipe be first token")]
    LeadingPipe,
    #[error("can't have two pipes in a row")]
    DoublePipe,
    #[error("nothing to run before '&'")]
    EmptyPipeline,
    #[error("need to specify file for {direction} redirection")]
    MissingRedirectTarget { stage: usize, direction: Direction },
    #[error("stage {} has no command", .stage + 1)]
    EmptyCommand { stage: usize },
    #[error("stage {} cannot redirect {direction}: it is connected to a pipe", .stage + 1)]
    MisplacedRedirect { stage: usize, direction: Direction },
}

/// Non-fatal findings; the pipeline still compiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileWarning {
    DuplicateRedirect { stage: usize, direction: Direction },
}

impl fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileWarning::DuplicateRedirect { direction, .. } => {
                write!(f, "ignoring additional {} redirect operator", direction.stream())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compiled {
    pub pipeline: Pipeline,
    pub warnings: Vec<CompileWarning>,
}

/// Compile a token sequence into a [`Pipeline`].
///
/// Returns `Ok(None)` when there are no tokens at all; the caller should
/// treat that as a no-op.
pub fn compile(tokens: &[&str], policy: RedirectPolicy) -> Result<Option<Compiled>, CompileError> {
    let Some(&first) = tokens.first() else {
        return Ok(None);
    };
    if first == PIPE {
        return Err(CompileError::LeadingPipe);
    }

    let (tokens, background) = match tokens.split_last() {
        Some((&BACKGROUND, rest)) => (rest, true),
        _ => (tokens, false),
    };
    if tokens.is_empty() {
        return Err(CompileError::EmptyPipeline);
    }

    let groups = split_stages(tokens)?;
    let mut warnings = Vec::new();
    let commands = groups
        .iter()
        .enumerate()
        .map(|(stage, group)| compile_stage(stage, group, &mut warnings))
        .collect::<Result<Vec<_>, _>>()?;

    check_placement(&commands, policy)?;

    Ok(Some(Compiled {
        pipeline: Pipeline { commands, background },
        warnings,
    }))
}

fn split_stages<'t, 'a>(tokens: &'t [&'a str]) -> Result<Vec<&'t [&'a str]>, CompileError> {
    let groups: Vec<_> = tokens.split(|&t| t == PIPE).collect();
    // An empty group sits between two pipes or after a trailing one.
    if groups.iter().any(|g| g.is_empty()) {
        return Err(CompileError::DoublePipe);
    }
    Ok(groups)
}

fn compile_stage(
    stage: usize,
    tokens: &[&str],
    warnings: &mut Vec<CompileWarning>,
) -> Result<Command, CompileError> {
    let mut argv = Vec::new();
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;

    let mut iter = tokens.iter();
    while let Some(&token) = iter.next() {
        let (direction, slot) = match token {
            REDIRECT_IN => (Direction::Input, &mut input),
            REDIRECT_OUT => (Direction::Output, &mut output),
            _ => {
                argv.push(token.to_string());
                continue;
            }
        };
        let Some(&target) = iter.next() else {
            return Err(CompileError::MissingRedirectTarget { stage, direction });
        };
        if slot.is_some() {
            let warning = CompileWarning::DuplicateRedirect { stage, direction };
            tracing::warn!(stage, %direction, ignored = target, "{}", warning);
            warnings.push(warning);
        } else {
            *slot = Some(PathBuf::from(target));
        }
    }

    if argv.is_empty() {
        return Err(CompileError::EmptyCommand { stage });
    }
    Ok(Command { argv, input, output })
}

fn check_placement(commands: &[Command], policy: RedirectPolicy) -> Result<(), CompileError> {
    let last = commands.len() - 1;
    for (stage, cmd) in commands.iter().enumerate() {
        let misplaced = [
            (Direction::Input, stage > 0),
            (Direction::Output, stage < last),
        ];
        for (direction, piped) in misplaced {
            if !piped || cmd.redirect(direction).is_none() {
                continue;
            }
            match policy {
                RedirectPolicy::Reject => {
                    return Err(CompileError::MisplacedRedirect { stage, direction });
                }
                RedirectPolicy::Override => {
                    tracing::debug!(stage, %direction, "redirection replaces pipe connection");
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(line: &str, policy: RedirectPolicy) -> Result<Option<Compiled>, CompileError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        compile(&tokens, policy)
    }

    fn pipeline(line: &str) -> Pipeline {
        run(line, RedirectPolicy::Reject).unwrap().unwrap().pipeline
    }

    #[test]
    fn test_no_tokens_is_noop() {
        assert_eq!(run("", RedirectPolicy::Reject), Ok(None));
    }

    #[test]
    fn test_single_command() {
        let p = pipeline("ls -la /tmp");
        assert_eq!(p.commands.len(), 1);
        assert!(!p.background);
        assert_eq!(p.commands[0].program(), "ls");
        assert_eq!(p.commands[0].args(), ["-la", "/tmp"]);
    }

    #[test]
    fn test_stages_split_on_pipe() {
        let p = pipeline("cat f | grep x | wc -l");
        let argvs: Vec<_> = p.commands.iter().map(|c| c.argv.clone()).collect();
        assert_eq!(argvs, vec![vec!["cat", "f"], vec!["grep", "x"], vec!["wc", "-l"]]);
    }

    #[test]
    fn test_background_flag_and_trim() {
        let p = pipeline("sleep 10 | cat &");
        assert!(p.background);
        assert_eq!(p.commands[1].argv, vec!["cat"]);
    }

    #[test]
    fn test_ampersand_mid_line_is_an_argument() {
        let p = pipeline("echo & done");
        assert!(!p.background);
        assert_eq!(p.commands[0].args(), ["&", "done"]);
    }

    #[test]
    fn test_leading_pipe() {
        assert_eq!(run("| ls", RedirectPolicy::Reject), Err(CompileError::LeadingPipe));
        assert_eq!(run("| &", RedirectPolicy::Reject), Err(CompileError::LeadingPipe));
    }

    #[test]
    fn test_lone_ampersand_is_empty_pipeline() {
        assert_eq!(run("&", RedirectPolicy::Reject), Err(CompileError::EmptyPipeline));
    }

    #[test]
    fn test_double_pipe() {
        assert_eq!(run("ls | | wc", RedirectPolicy::Reject), Err(CompileError::DoublePipe));
        assert_eq!(run("ls |", RedirectPolicy::Reject), Err(CompileError::DoublePipe));
        assert_eq!(run("ls | &", RedirectPolicy::Reject), Err(CompileError::DoublePipe));
    }

    #[test]
    fn test_redirects_removed_from_argv() {
        let p = pipeline("sort -r < in.txt > out.txt");
        let cmd = &p.commands[0];
        assert_eq!(cmd.argv, vec!["sort", "-r"]);
        assert_eq!(cmd.input, Some(PathBuf::from("in.txt")));
        assert_eq!(cmd.output, Some(PathBuf::from("out.txt")));
    }

    #[test]
    fn test_redirects_at_pipeline_ends() {
        let p = pipeline("cat < a | tr a b | sort > c");
        assert_eq!(p.commands[0].input, Some(PathBuf::from("a")));
        assert_eq!(p.commands[2].output, Some(PathBuf::from("c")));
        assert_eq!(p.commands[1].input, None);
        assert_eq!(p.commands[1].output, None);
    }

    #[test]
    fn test_missing_redirect_target() {
        assert_eq!(
            run("ls >", RedirectPolicy::Reject),
            Err(CompileError::MissingRedirectTarget { stage: 0, direction: Direction::Output })
        );
        assert_eq!(
            run("cat < | wc", RedirectPolicy::Reject),
            Err(CompileError::MissingRedirectTarget { stage: 0, direction: Direction::Input })
        );
    }

    #[test]
    fn test_duplicate_redirect_keeps_first_and_warns() {
        let compiled = run("cat < a < b", RedirectPolicy::Reject).unwrap().unwrap();
        assert_eq!(compiled.pipeline.commands[0].input, Some(PathBuf::from("a")));
        assert_eq!(compiled.pipeline.commands[0].argv, vec!["cat"]);
        assert_eq!(
            compiled.warnings,
            vec![CompileWarning::DuplicateRedirect { stage: 0, direction: Direction::Input }]
        );
        assert_eq!(
            compiled.warnings[0].to_string(),
            "ignoring additional stdin redirect operator"
        );
    }

    #[test]
    fn test_duplicate_output_redirect_keeps_first() {
        let compiled = run("ls > a > b", RedirectPolicy::Reject).unwrap().unwrap();
        assert_eq!(compiled.pipeline.commands[0].output, Some(PathBuf::from("a")));
        assert_eq!(compiled.pipeline.commands[0].argv, vec!["ls"]);
        assert_eq!(
            compiled.warnings,
            vec![CompileWarning::DuplicateRedirect { stage: 0, direction: Direction::Output }]
        );
        assert!(compiled.warnings[0].to_string().contains("stdout"));
    }

    #[test]
    fn test_empty_command_after_redirects() {
        assert_eq!(
            run("ls | > out", RedirectPolicy::Reject),
            Err(CompileError::EmptyCommand { stage: 1 })
        );
    }

    #[test]
    fn test_misplaced_redirect_rejected() {
        assert_eq!(
            run("ls > a | wc", RedirectPolicy::Reject),
            Err(CompileError::MisplacedRedirect { stage: 0, direction: Direction::Output })
        );
        assert_eq!(
            run("ls | wc < a", RedirectPolicy::Reject),
            Err(CompileError::MisplacedRedirect { stage: 1, direction: Direction::Input })
        );
    }

    #[test]
    fn test_misplaced_redirect_overridden() {
        let compiled = run("ls > a | wc < b", RedirectPolicy::Override).unwrap().unwrap();
        let p = compiled.pipeline;
        assert_eq!(p.commands[0].output, Some(PathBuf::from("a")));
        assert_eq!(p.commands[1].input, Some(PathBuf::from("b")));
    }

    #[test]
    fn test_display_round_trips_shape() {
        let p = pipeline("cat < a | sort > b &");
        assert_eq!(p.to_string(), "cat < a | sort > b &");
    }
}
