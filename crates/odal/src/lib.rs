//! Layered TOML configuration.
//!
//! A config type is stored as a main file, shared by every deployment, and an optional overlay
//! file in a separate directory that overrides individual keys of the main file.

mod error;


use std::fs;
use std::path::Path;

use serde::{Serialize, de::DeserializeOwned};
use toml::{Table, Value};

pub use error::{ConfigKind, Error, ErrorKind, Result};

/// A configuration that is loaded from the TOML file [`Config::PATH`].
pub trait Config: DeserializeOwned {
    /// File name of the config, relative to the config directories.
    const PATH: &'static str;

    /// Load the config from `root`.
    fn load(root: &Path) -> Result<Self> {
        let main = read_table(&root.join(Self::PATH), ConfigKind::Main, Self::PATH)?;
        from_table(main, Self::PATH)
    }

    /// Load the config from `main`, with the keys of the overlay in `overlay` applied on top.
    fn load_with_overlay(main: &Path, overlay: &Path) -> Result<Self> {
        let main_table = read_table(&main.join(Self::PATH), ConfigKind::Main, Self::PATH)?;
        let overlay_table = read_table(&overlay.join(Self::PATH), ConfigKind::Overlay, Self::PATH)?;

        from_table(merge(main_table, overlay_table), Self::PATH)
    }

    /// Same as [`Config::load_with_overlay`], but falls back to the main config if there is no
    /// readable overlay.
    fn load_or_main(main: &Path, overlay: &Path) -> Result<Self> {
        match Self::load_with_overlay(main, overlay) {
            Err(Error {
                name,
                kind:
                    ErrorKind::Load {
                        path,
                        config_kind: ConfigKind::Overlay,
                        ..
                    },
            }) => {
                tracing::debug!("`{name}`: Failed to read overlay from `{path}`");
                Self::load(main)
            }
            result => result,
        }
    }

    /// Store the keys in which `self` differs from `main` as an overlay in `overlay`.
    fn save_as_overlay(&self, main: &Self, overlay: &Path) -> Result<()>
    where
        Self: Serialize,
    {
        let to_table = |config: &Self| {
            Table::try_from(config).map_err(|e| Error::new(Self::PATH, ErrorKind::Serialize(e)))
        };

        let diff = extract_diff(&to_table(main)?, &to_table(self)?);
        let content = toml::to_string_pretty(&diff)
            .map_err(|e| Error::new(Self::PATH, ErrorKind::Serialize(e)))?;

        let path = overlay.join(Self::PATH);
        let store_error = |source| {
            Error::new(
                Self::PATH,
                ErrorKind::Store {
                    path: path.display().to_string(),
                    source,
                },
            )
        };

        fs::create_dir_all(overlay).map_err(store_error)?;
        fs::write(&path, content).map_err(store_error)?;

        tracing::debug!(
            "`{}`: Stored {} overlay key(s) in `{}`",
            Self::PATH,
            diff.len(),
            path.display()
        );
        Ok(())
    }
}

fn read_table(path: &Path, config_kind: ConfigKind, name: &str) -> Result<Table> {
    let display = path.display().to_string();

    let content = fs::read_to_string(path).map_err(|source| {
        Error::new(
            name,
            ErrorKind::Load {
                path: display.clone(),
                config_kind,
                source,
            },
        )
    })?;

    content.parse::<Table>().map_err(|source| {
        Error::new(
            name,
            ErrorKind::Parse {
                path: display,
                config_kind,
                source,
            },
        )
    })
}

fn from_table<T: DeserializeOwned>(table: Table, name: &str) -> Result<T> {
    T::deserialize(Value::Table(table)).map_err(|e| Error::new(name, ErrorKind::Deserialize(e)))
}

/// Merge `overlay` into `main`.
///
/// Nested tables are merged recursively, any other value in `overlay` replaces the value in
/// `main`. Keys that only exist in `overlay` are added.
#[must_use]
pub fn merge(main: Table, overlay: Table) -> Table {
    let mut merged = main;

    for (key, overlay_value) in overlay {
        let value = match (merged.remove(&key), overlay_value) {
            (Some(Value::Table(main_table)), Value::Table(overlay_table)) => {
                Value::Table(merge(main_table, overlay_table))
            }
            (_, overlay_value) => overlay_value,
        };

        merged.insert(key, value);
    }

    merged
}

/// Extract the minimal overlay that turns `main` into `changed`.
///
/// Only keys whose value differs are kept, nested tables are compared key by key.
#[must_use]
pub fn extract_diff(main: &Table, changed: &Table) -> Table {
    let mut diff = Table::new();

    for (key, changed_value) in changed {
        match (main.get(key), changed_value) {
            (Some(main_value), _) if main_value == changed_value => {}
            (Some(Value::Table(main_table)), Value::Table(changed_table)) => {
                let nested = extract_diff(main_table, changed_table);
                if !nested.is_empty() {
                    diff.insert(key.clone(), Value::Table(nested));
                }
            }
            _ => {
                diff.insert(key.clone(), changed_value.clone());
            }
        }
    }

    diff
}

/// Deserialize a config directly from a TOML string, without overlays.
pub fn from_str<T: Config>(content: &str) -> Result<T> {
    let table = content.parse::<Table>().map_err(|source| {
        Error::new(
            T::PATH,
            ErrorKind::Parse {
                path: String::from("<string>"),
                config_kind: ConfigKind::Main,
                source,
            },
        )
    })?;

    from_table(table, T::PATH)
}
