//! Debugger configuration loading.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use smol_str::SmolStr;

use crate::control::UnitFilter;
use crate::error::DebugError;

pub const DEFAULT_LABEL_WIDTH: usize = 120;
pub const DEFAULT_INTERNAL_PREFIX: &str = "<internal>";
const MIN_LABEL_WIDTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebuggerConfig {
    pub stop_on_entry: bool,
    pub trace_unknown_units: bool,
    pub internal_units: Vec<SmolStr>,
    /// Maximum characters of a variable label.
    pub label_width: usize,
    pub session_file: Option<PathBuf>,
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            stop_on_entry: false,
            trace_unknown_units: false,
            internal_units: vec![DEFAULT_INTERNAL_PREFIX.into()],
            label_width: DEFAULT_LABEL_WIDTH,
            session_file: None,
        }
    }
}

impl DebuggerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DebugError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| DebugError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, DebugError> {
        let raw: DebuggerToml = toml::from_str(text)
            .map_err(|err| DebugError::InvalidConfig(format!("lantern.toml: {err}").into()))?;
        raw.into_config()
    }

    /// Filter for trace dispatch. The debugger's own prefix is always
    /// internal, whatever `internal_units` lists.
    #[must_use]
    pub fn unit_filter(&self) -> UnitFilter {
        let mut internal_prefixes = self.internal_units.clone();
        if !internal_prefixes.iter().any(|prefix| prefix == DEFAULT_INTERNAL_PREFIX) {
            internal_prefixes.insert(0, DEFAULT_INTERNAL_PREFIX.into());
        }
        UnitFilter {
            trace_unknown_units: self.trace_unknown_units,
            internal_prefixes,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DebuggerToml {
    #[serde(default)]
    debugger: DebuggerSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DebuggerSection {
    stop_on_entry: Option<bool>,
    trace_unknown_units: Option<bool>,
    internal_units: Option<Vec<String>>,
    label_width: Option<usize>,
    session_file: Option<String>,
}

impl DebuggerToml {
    fn into_config(self) -> Result<DebuggerConfig, DebugError> {
        let defaults = DebuggerConfig::default();
        let section = self.debugger;

        let label_width = section.label_width.unwrap_or(defaults.label_width);
        if label_width < MIN_LABEL_WIDTH {
            return Err(DebugError::InvalidConfig(
                format!("debugger.label_width must be at least {MIN_LABEL_WIDTH}").into(),
            ));
        }

        let internal_units = match section.internal_units {
            Some(prefixes) => {
                if prefixes.iter().any(|prefix| prefix.trim().is_empty()) {
                    return Err(DebugError::InvalidConfig(
                        "debugger.internal_units entries must not be empty".into(),
                    ));
                }
                let mut units = defaults.internal_units;
                for prefix in prefixes {
                    if !units.iter().any(|known| known == prefix.as_str()) {
                        units.push(prefix.into());
                    }
                }
                units
            }
            None => defaults.internal_units,
        };

        let session_file = match section.session_file {
            Some(path) if path.trim().is_empty() => {
                return Err(DebugError::InvalidConfig(
                    "debugger.session_file must not be empty".into(),
                ));
            }
            Some(path) => Some(PathBuf::from(path)),
            None => None,
        };

        Ok(DebuggerConfig {
            stop_on_entry: section.stop_on_entry.unwrap_or(defaults.stop_on_entry),
            trace_unknown_units: section
                .trace_unknown_units
                .unwrap_or(defaults.trace_unknown_units),
            internal_units,
            label_width,
            session_file,
        })
    }
}
