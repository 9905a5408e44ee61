//! Tool configuration.
//!
//! Loaded from an optional YAML file; every field has a default so an empty
//! file (or none at all) is a valid configuration.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Funcons whose semantics are left to the runtime rather than generated.
pub const DEFAULT_SKIP: &[&str] = &[
    "left-to-right",
    "right-to-left",
    "choice",
    "sequential",
    "some-element",
    "stuck",
    "abstraction",
];

pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory searched for `.cbs` files when no paths are given.
    pub funcon_dir: PathBuf,
    /// Where JSON dumps are written.
    pub output_dir: PathBuf,
    /// Maximum bracket nesting accepted in one component.
    pub max_depth: usize,
    /// Optional cap on grammar rule invocations per component.
    pub call_limit: Option<usize>,
    /// Funcon names excluded from lowering.
    pub skip: Vec<String>,
    /// Lower built-in funcons to signatures only.
    pub skip_builtin: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            funcon_dir: PathBuf::from("."),
            output_dir: PathBuf::from("out"),
            max_depth: DEFAULT_MAX_DEPTH,
            call_limit: None,
            skip: DEFAULT_SKIP.iter().map(|s| s.to_string()).collect(),
            skip_builtin: true,
        }
    }
}

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("cannot read config file '{path}'")]
    #[diagnostic(code(cbs::config::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file '{path}'")]
    #[diagnostic(code(cbs::config::yaml), help("see the README for the accepted keys"))]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("max_depth must be at least 1")]
    #[diagnostic(code(cbs::config::max_depth))]
    ZeroDepth,
}

impl Config {
    pub fn from_yaml(path: &str, text: &str) -> Result<Self, ConfigError> {
        let config: Config = if text.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
                path: path.to_string(),
                source,
            })?
        };
        if config.max_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        Self::from_yaml(&display, &text)
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            max_depth: self.max_depth,
            call_limit: self.call_limit.and_then(NonZeroUsize::new),
        }
    }

    pub fn lower_options(&self) -> LowerOptions {
        LowerOptions {
            skip: self.skip.clone(),
            skip_builtin: self.skip_builtin,
        }
    }
}

/// Limits applied while parsing one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    pub max_depth: usize,
    pub call_limit: Option<NonZeroUsize>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            call_limit: None,
        }
    }
}

/// Which declarations the lowering engine leaves without a body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LowerOptions {
    pub skip: Vec<String>,
    pub skip_builtin: bool,
}

impl LowerOptions {
    pub fn skips(&self, name: &str) -> bool {
        self.skip.iter().any(|s| s == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_yaml("cbsgen.yaml", "").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.lower_options().skips("sequential"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = Config::from_yaml("cbsgen.yaml", "max_depth: 8\nskip: [print]\n").unwrap();
        assert_eq!(config.max_depth, 8);
        assert_eq!(config.skip, vec!["print".to_string()]);
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.parse_options().max_depth, 8);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_yaml("cbsgen.yaml", "depth: 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[test]
    fn zero_depth_is_rejected() {
        let err = Config::from_yaml("cbsgen.yaml", "max_depth: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroDepth));
    }

    #[test]
    fn zero_call_limit_means_unlimited() {
        let config = Config::from_yaml("cbsgen.yaml", "call_limit: 0\n").unwrap();
        assert_eq!(config.parse_options().call_limit, None);
    }
}
