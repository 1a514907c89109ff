use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::attrs::StateLabel;
use crate::error::Error;

/// Largest `K` whose labels all fit in a [`StateLabel`].
pub const MAX_STATES: usize = StateLabel::MAX as usize;

/// Parameters of one propagation run.
///
/// Loaded from TOML (every field optional) and validated with
/// [`PropagationConfig::validate`] before any seeding happens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropagationConfig {
    /// Dimension `K` of the per-edge state vector.
    #[serde(default = "default_states")]
    pub states: usize,
    /// Probability that an edge becomes a background seed.
    #[serde(default = "default_percent_zero")]
    pub percent_zero: f64,
    /// Probability, drawn only when the background draw fails, that an edge
    /// becomes a labeled seed.
    #[serde(default = "default_percent_nonzero")]
    pub percent_nonzero: f64,
    /// Background seeds carry `1 - alpha` at state 0.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Number of synchronous rounds. Signed so that a negative value in a
    /// config file is reported instead of failing to parse.
    #[serde(default = "default_iterations")]
    pub iterations: i64,
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,
    /// Count an edge's own previous vector once per endpoint.
    #[serde(default = "default_true")]
    pub include_self_twice: bool,
    /// Fan rounds out over a thread pool when built with `parallel`.
    #[serde(default)]
    pub parallel: bool,
    /// Emit a debug progress line every this many rounds (0 disables).
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            states: default_states(),
            percent_zero: default_percent_zero(),
            percent_nonzero: default_percent_nonzero(),
            alpha: default_alpha(),
            iterations: default_iterations(),
            random_seed: default_random_seed(),
            include_self_twice: default_true(),
            parallel: false,
            progress_every: default_progress_every(),
        }
    }
}

const fn default_states() -> usize {
    10
}

const fn default_percent_zero() -> f64 {
    0.05
}

const fn default_percent_nonzero() -> f64 {
    0.01
}

const fn default_alpha() -> f64 {
    0.8
}

const fn default_iterations() -> i64 {
    200
}

const fn default_random_seed() -> u64 {
    0x5EED
}

const fn default_true() -> bool {
    true
}

const fn default_progress_every() -> usize {
    50
}

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("states must be at least 2, got {0}")]
    TooFewStates(usize),

    #[error("states must be at most {max}, got {states}")]
    TooManyStates { states: usize, max: usize },

    #[error("{edges} edges x {states} states does not fit in memory")]
    StateTableTooLarge { edges: usize, states: usize },

    #[error("iterations must be non-negative, got {0}")]
    NegativeIterations(i64),

    #[error("{name} must be within [0, 1], got {value}")]
    ProbabilityOutOfRange { name: &'static str, value: f64 },

    #[error("known seed for edge {edge} has state {state}, but only {states} states exist")]
    SeedStateOutOfRange {
        edge: usize,
        state: usize,
        states: usize,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

impl PropagationConfig {
    /// Check every field against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns the first offending field as a [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.states < 2 {
            return Err(ConfigError::TooFewStates(self.states));
        }
        if self.states > MAX_STATES {
            return Err(ConfigError::TooManyStates {
                states: self.states,
                max: MAX_STATES,
            });
        }
        if self.iterations < 0 {
            return Err(ConfigError::NegativeIterations(self.iterations));
        }
        for (name, value) in [
            ("percent_zero", self.percent_zero),
            ("percent_nonzero", self.percent_nonzero),
            ("alpha", self.alpha),
        ] {
            // NaN fails the range check as well.
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ProbabilityOutOfRange { name, value });
            }
        }
        Ok(())
    }

    /// Round count as a `usize`. Negative values map to zero; call
    /// [`validate`](Self::validate) first to reject them.
    #[must_use]
    pub fn rounds(&self) -> usize {
        usize::try_from(self.iterations).unwrap_or(0)
    }
}

/// Parse a config from TOML text. `path` is only used in error messages.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for invalid TOML or unknown keys.
pub fn parse_config(text: &str, path: &Path) -> Result<PropagationConfig, ConfigError> {
    toml::from_str::<PropagationConfig>(text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Location of the per-user default config, if the platform has one.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("edgeprop/config.toml"))
}

/// Resolve the run configuration.
///
/// An explicit path must exist. Without one, the per-user config is used
/// when present, otherwise the defaults.
///
/// # Errors
///
/// Fails when the chosen file cannot be read or parsed.
pub fn load_config(explicit: Option<&Path>) -> Result<PropagationConfig, Error> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match user_config_path() {
            Some(path) if path.exists() => path,
            _ => {
                debug!("no config file found, using defaults");
                return Ok(PropagationConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path).map_err(|e| Error::read(&path, e))?;
    let config = parse_config(&content, &path)?;
    debug!(path = %path.display(), "loaded config");
    Ok(config)
}
