// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Engine configuration
//!
//! A string-keyed property set read by analyses (`chord.datarace.exclude.type`
//! and the like) plus a few engine knobs. Sources, lowest precedence first:
//! defaults, a TOML file, then `FACTDB_*` environment variables.

use crate::error::{FactError, FactResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Prefix of environment variables read by [`EngineConfig::from_env`]
pub const ENV_PREFIX: &str = "FACTDB_";

const ENV_CONFIG: &str = "FACTDB_CONFIG";
const ENV_STRATEGY: &str = "FACTDB_STRATEGY";
const ENV_VERBOSITY: &str = "FACTDB_VERBOSITY";

/// How the scheduler executes a resolved order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStrategy {
    /// One descriptor at a time, in resolved order
    #[default]
    Sequential,
    /// Independent descriptors of a batch run concurrently on the rayon pool
    Parallel,
}

impl FromStr for ExecutionStrategy {
    type Err = FactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(ExecutionStrategy::Sequential),
            "parallel" => Ok(ExecutionStrategy::Parallel),
            other => Err(FactError::Config(format!("unknown execution strategy '{other}'"))),
        }
    }
}

impl fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStrategy::Sequential => f.write_str("sequential"),
            ExecutionStrategy::Parallel => f.write_str("parallel"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub strategy: ExecutionStrategy,
    /// 0 = warnings only, 1 = info, 2 = debug, 3+ = trace
    pub verbosity: u8,
    pub properties: BTreeMap<String, String>,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_property(key, value);
        self
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn property_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.property(key).unwrap_or(default)
    }

    /// Boolean property: true only when set to `true`, ignoring case
    pub fn flag(&self, key: &str) -> bool {
        self.property(key).is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
    }

    /// Configuration from the process environment
    pub fn from_env() -> FactResult<Self> {
        Self::default().merge_env(std::env::vars())
    }

    /// Apply `FACTDB_*` variables on top of this configuration.
    ///
    /// `FACTDB_STRATEGY` and `FACTDB_VERBOSITY` set the knobs. Any other
    /// variable becomes a property: the prefix is dropped, the rest is
    /// lowercased and `_` becomes `.`, so
    /// `FACTDB_CHORD_DATARACE_EXCLUDE_TYPE` sets `chord.datarace.exclude.type`.
    pub fn merge_env<I, K, V>(mut self, vars: I) -> FactResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let key = key.as_ref();
            let value: String = value.into();
            match key {
                ENV_CONFIG => {}
                ENV_STRATEGY => self.strategy = value.parse()?,
                ENV_VERBOSITY => {
                    self.verbosity = value.trim().parse().map_err(|_| FactError::Config(format!("{ENV_VERBOSITY} must be a small integer, got '{value}'")))?;
                }
                _ => {
                    if let Some(rest) = key.strip_prefix(ENV_PREFIX).filter(|rest| !rest.is_empty()) {
                        self.set_property(rest.to_ascii_lowercase().replace('_', "."), value);
                    }
                }
            }
        }
        Ok(self)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> FactResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| FactError::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&content).map_err(|e| FactError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> FactResult<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| FactError::Config(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| FactError::Config(format!("failed to write {}: {e}", path.display())))
    }

    /// Resolve the effective configuration.
    ///
    /// Reads `path` if given, else the file named by `FACTDB_CONFIG`, else
    /// starts from defaults; environment variables are applied last.
    pub fn resolve(path: Option<PathBuf>) -> FactResult<Self> {
        Self::resolve_with(path, std::env::vars())
    }

    pub fn resolve_with<I, K, V>(path: Option<PathBuf>, vars: I) -> FactResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let vars: Vec<(String, String)> = vars.into_iter().map(|(k, v)| (k.as_ref().to_string(), v.into())).collect();
        let env_path = vars.iter().find(|(key, _)| key == ENV_CONFIG).map(|(_, value)| PathBuf::from(value));

        let config = match path.or(env_path) {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.merge_env(vars)
    }
}
