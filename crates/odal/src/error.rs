//! Result and Error types for the crate.
use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

/// Result containing an error variant from this module.
pub type Result<T> = std::result::Result<T, Error>;

/// Which of the two config files an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKind {
    Main,
    Overlay,
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigKind::Main => write!(f, "main"),
            ConfigKind::Overlay => write!(f, "overlay"),
        }
    }
}

/// An error for the config named `name`.
#[derive(Debug, Error, Diagnostic)]
#[error("config `{name}`: {kind}")]
pub struct Error {
    pub name: String,
    #[source]
    pub kind: ErrorKind,
}

impl Error {
    pub(crate) fn new(name: impl Into<String>, kind: ErrorKind) -> Self {
        Error {
            name: name.into(),
            kind,
        }
    }
}

/// Configuration error variants
#[derive(Debug, Error, Diagnostic)]
pub enum ErrorKind {
    /// The file could not be read.
    #[error("failed to read {config_kind} config from `{path}`")]
    Load {
        path: String,
        config_kind: ConfigKind,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML.
    #[error("failed to parse {config_kind} config `{path}`")]
    Parse {
        path: String,
        config_kind: ConfigKind,
        #[source]
        source: toml::de::Error,
    },

    /// The (merged) TOML table does not match the config type.
    #[error("config does not match the expected layout")]
    #[diagnostic(help("check for misspelled or missing keys"))]
    Deserialize(#[source] toml::de::Error),

    /// The config could not be represented as TOML.
    #[error("failed to serialize config")]
    Serialize(#[from] toml::ser::Error),

    /// The overlay file could not be written.
    #[error("failed to write overlay to `{path}`")]
    Store {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
