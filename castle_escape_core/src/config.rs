//! Run configuration for training, estimation and evaluation.
//!
//! All three are plain serde structs so that a run can be described in a
//! JSON file and overridden piecemeal from the command line.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{Error, Result};

/// Configuration for a Q-learning run.
///
/// # Examples
///
/// ```
/// use castle_escape_core::config::TrainingConfig;
///
/// let config = TrainingConfig::default()
///     .with_episodes(5_000)
///     .with_decay_rate(0.999)
///     .with_seed(42);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of episodes to play
    pub episodes: usize,
    /// Discount factor γ
    pub gamma: f64,
    /// Initial exploration rate ε
    pub epsilon: f64,
    /// Multiplicative decay applied to ε after every episode
    pub decay_rate: f64,
    /// Lower bound ε never decays below
    pub epsilon_floor: f64,
    /// Seed of the run's random stream
    pub seed: u64,
    /// Log progress every this many episodes (0 disables progress lines)
    pub log_every: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            episodes: 100_000,
            gamma: 0.9,
            epsilon: 1.0,
            decay_rate: 0.999_999,
            epsilon_floor: 0.001,
            seed: 0,
            log_every: 10_000,
        }
    }
}

impl TrainingConfig {
    pub fn with_episodes(mut self, episodes: usize) -> Self {
        self.episodes = episodes;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_decay_rate(mut self, decay_rate: f64) -> Self {
        self.decay_rate = decay_rate;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Checks that every rate lies in its meaningful range.
    pub fn validate(&self) -> Result<()> {
        check_unit("gamma", self.gamma)?;
        check_unit("epsilon", self.epsilon)?;
        check_unit("epsilon_floor", self.epsilon_floor)?;
        if !(self.decay_rate > 0.0 && self.decay_rate <= 1.0) {
            return Err(Error::config(format!(
                "decay_rate must be in (0, 1], got {}",
                self.decay_rate
            )));
        }
        Ok(())
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }
}

/// Configuration for Monte Carlo estimation of combat odds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimationConfig {
    pub episodes: usize,
    pub seed: u64,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            episodes: 10_000,
            seed: 0,
        }
    }
}

impl EstimationConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        read_json(path.as_ref())
    }
}

/// Configuration for evaluating a fixed policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub episodes: usize,
    pub seed: u64,
    /// Episodes still running after this many steps are abandoned.
    pub max_steps: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            episodes: 1_000,
            seed: 0,
            max_steps: 1_000,
        }
    }
}

impl EvaluationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(Error::config("max_steps must be positive"));
        }
        Ok(())
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::config(format!("{name} must be in [0, 1], got {value}")))
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path)
        .map_err(|source| Error::io(format!("read config {}", path.display()), source))?;
    Ok(serde_json::from_str(&contents)?)
}
