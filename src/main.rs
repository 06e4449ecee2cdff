mod config;
mod driver;
mod engine;
mod parser;
mod signals;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use config::{Config, DEFAULT_LOG_FILTER};
use engine::ShellState;
use parser::RedirectPolicy;

/// A small interactive shell: pipelines, `<` / `>` redirection and `&`.
#[derive(Debug, clap::Parser)]
#[command(name = "pipesh", version, about)]
struct Cli {
    /// Read settings from this file instead of the per-user config.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// How to treat a redirection on a pipe-connected end of a stage.
    #[arg(long, value_enum)]
    redirect_policy: Option<RedirectPolicy>,

    /// Run one line and exit with its status.
    #[arg(short = 'c', value_name = "LINE")]
    command: Option<String>,
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_env("PIPESH_LOG").unwrap_or_else(|_| {
        EnvFilter::new(config.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn repl(config: &Config, state: &mut ShellState) -> rustyline::Result<()> {
    let mut rl = DefaultEditor::new()?;

    loop {
        driver::announce_finished(state);
        match rl.readline(&config.prompt) {
            Ok(line) => {
                driver::run_line(&line, config, state);
            }
            Err(ReadlineError::Interrupted) => {
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("exit");
                break;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("pipesh: config: {}", e);
            return ExitCode::from(2);
        }
    };
    if let Some(policy) = cli.redirect_policy {
        config.redirect_policy = policy;
    }
    init_logging(&config);

    let mut state = ShellState::new();

    if let Some(line) = cli.command {
        let status = driver::run_line(&line, &config, &mut state);
        driver::finish_session(&mut state, driver::EXIT_GRACE);
        return ExitCode::from(status.code().clamp(0, 255) as u8);
    }

    if let Err(e) = signals::init() {
        tracing::warn!(error = %e, "could not install signal dispositions");
    }
    tracing::debug!(?config, "pipesh starting");

    let outcome = repl(&config, &mut state);
    let left = driver::finish_session(&mut state, driver::EXIT_GRACE);
    if left > 0 {
        tracing::info!(left, "leaving background pipelines running");
    }
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pipesh: {:?}", e);
            ExitCode::FAILURE
        }
    }
}
