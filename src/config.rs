use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::parser::{Limits, RedirectPolicy};

/// Default log filter: quiet unless something is badly wrong.
pub const DEFAULT_LOG_FILTER: &str = "pipesh=error";

/// User-tunable settings, read from `~/.config/pipesh/config.toml`.
///
/// Every field is optional in the file; missing ones take the defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub prompt: String,
    pub max_line_length: usize,
    pub max_token_count: usize,
    pub redirect_policy: RedirectPolicy,
    /// `tracing_subscriber::EnvFilter` directive; `PIPESH_LOG` wins over it.
    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let limits = Limits::default();
        Config {
            prompt: "pipesh $ ".to_string(),
            max_line_length: limits.max_line_length,
            max_token_count: limits.max_token_count,
            redirect_policy: RedirectPolicy::default(),
            log_filter: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl Config {
    pub fn limits(&self) -> Limits {
        Limits {
            max_line_length: self.max_line_length,
            max_token_count: self.max_token_count,
        }
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the per-user file is used
    /// if present, otherwise the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) if p.is_file() => p,
                _ => return Ok(Config::default()),
            },
        };
        let text = std::fs::read_to_string(&path)
            .map_err(|source| ConfigError::Read { path: path.clone(), source })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Return the path to `<config dir>/pipesh/config.toml`.
    fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("pipesh").join("config.toml"))
    }
}
