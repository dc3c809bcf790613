// Configuration for the bracket simulator
// Supports YAML configuration files for simulation runs, the rating curve, scoring and pool size

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::error::{SimError, SimResult};
use crate::outcome::{OutcomeModel, RatingCurve, DEFAULT_RATING_SCALE};
use crate::pool::ScoringConfig;

pub const DEFAULT_CONFIG_PATHS: [&str; 3] = ["bracket-sim.yaml", "bracket-sim.yml", ".bracket-sim.yaml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to access config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] SimError),
}

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub simulation: SimulationSettings,
    #[serde(default)]
    pub rating: RatingSettings,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub pool: PoolSettings,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load an explicitly named file, failing if it is missing or invalid.
    /// Without a path, the first usable default location is loaded, and
    /// defaults are used when there is none.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(p) = path {
            let config = Self::from_file(p)?;
            log::info!("loaded configuration from {}", p.display());
            return Ok(config);
        }
        for default_path in DEFAULT_CONFIG_PATHS {
            if Path::new(default_path).exists() {
                match Self::from_file(default_path) {
                    Ok(config) => {
                        log::info!("loaded configuration from {}", default_path);
                        return Ok(config);
                    }
                    Err(e) => log::warn!("skipping {}: {}", default_path, e),
                }
            }
        }
        Ok(Self::default())
    }

    /// Check the settings that serde alone cannot.
    pub fn validate(&self) -> SimResult<()> {
        self.rating.to_curve()?;
        self.scoring.validate()
    }

    /// Save configuration to a YAML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn outcome_model(&self) -> SimResult<OutcomeModel> {
        Ok(OutcomeModel::new(self.rating.to_curve()?))
    }
}

/// Simulation run settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Number of simulations per request
    #[serde(default = "default_count")]
    pub count: usize,

    /// Master seed; runs with the same seed produce the same brackets.
    /// Leave unset to seed from entropy.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Simulations per batch; progress is reported after each batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        SimulationSettings {
            count: default_count(),
            seed: None,
            batch_size: default_batch_size(),
        }
    }
}

fn default_count() -> usize { 1000 }
fn default_batch_size() -> usize { 100 }

/// How ratings become win probabilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSettings {
    /// "logistic" or "uniform"
    #[serde(default = "default_curve")]
    pub curve: String,

    /// Rating difference that gives 10:1 odds (logistic only)
    #[serde(default = "default_scale")]
    pub scale: f64,
}

impl Default for RatingSettings {
    fn default() -> Self {
        RatingSettings {
            curve: default_curve(),
            scale: default_scale(),
        }
    }
}

fn default_curve() -> String { "logistic".to_string() }
fn default_scale() -> f64 { DEFAULT_RATING_SCALE }

impl RatingSettings {
    pub fn to_curve(&self) -> SimResult<RatingCurve> {
        let curve = match self.curve.to_lowercase().as_str() {
            "logistic" | "elo" => RatingCurve::Logistic { scale: self.scale },
            "uniform" | "coin" => RatingCurve::Uniform,
            _ => {
                return Err(SimError::UnknownVariant {
                    kind: "rating curve",
                    value: self.curve.clone(),
                })
            }
        };
        curve.validate()?;
        Ok(curve)
    }
}

/// Candidate pool settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Backward-generated brackets per pool
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        PoolSettings {
            pool_size: default_pool_size(),
        }
    }
}

fn default_pool_size() -> usize { 100 }

/// Generate a sample configuration file
pub fn generate_sample_config() -> String {
    r#"# Bracket simulator configuration
# All values shown are defaults - uncomment and modify as needed

# Simulation runs
simulation:
  # Simulations per request
  count: 1000
  # Master seed for reproducible runs (omit to seed from entropy)
  # seed: 42
  # Simulations per batch; progress is reported after each batch
  batch_size: 100

# Rating model
rating:
  # "logistic" = 1 / (1 + 10^(-(r1 - r2) / scale))
  # "uniform"  = fair coin, ratings ignored
  curve: logistic
  scale: 400.0

# Bracket scoring
scoring:
  # Points for a correct First Round pick; each later round doubles it
  points_unit: 1

# Candidate pools
pool:
  # Backward-generated brackets per pool
  pool_size: 100
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.simulation.count, 1000);
        assert_eq!(config.simulation.seed, None);
        assert_eq!(config.pool.pool_size, 100);
        assert_eq!(config.scoring.points_unit, 1);
        assert_eq!(config.outcome_model().unwrap(), OutcomeModel::default());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
simulation:
  count: 250
  seed: 7
rating:
  curve: uniform
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.simulation.count, 250);
        assert_eq!(config.simulation.seed, Some(7));
        // Defaults should still work
        assert_eq!(config.simulation.batch_size, 100);
        assert_eq!(config.outcome_model().unwrap().rating_curve, RatingCurve::Uniform);
    }

    #[test]
    fn test_sample_config_matches_defaults() {
        let config: Config = serde_yaml::from_str(&generate_sample_config()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_unknown_curve_is_an_error() {
        let config: Config = serde_yaml::from_str("rating:\n  curve: sigmoid\n").unwrap();
        assert_eq!(
            config.outcome_model().unwrap_err(),
            SimError::UnknownVariant {
                kind: "rating curve",
                value: "sigmoid".to_string()
            }
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_scale_is_an_error() {
        let config: Config = serde_yaml::from_str("rating:\n  curve: logistic\n  scale: 0\n").unwrap();
        assert_eq!(config.outcome_model().unwrap_err(), SimError::InvalidRatingScale(0.0));

        // scale is ignored by the uniform curve
        let config: Config = serde_yaml::from_str("rating:\n  curve: uniform\n  scale: 0\n").unwrap();
        assert_eq!(config.outcome_model().unwrap().rating_curve, RatingCurve::Uniform);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let path = std::env::temp_dir().join(format!("bracket_sim_bad_config_{}.yaml", std::process::id()));
        std::fs::write(&path, "scoring:\n  points_unit: 0\n").unwrap();
        let explicit = Config::load_or_default(Some(path.as_path()));
        let direct = Config::from_file(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(
            explicit,
            Err(ConfigError::Invalid(SimError::InvalidPointsUnit(0)))
        ));
        assert!(matches!(direct, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("bracket_sim_config_{}.yaml", std::process::id()));
        let mut config = Config::default();
        config.simulation.seed = Some(99);
        config.pool.pool_size = 12;
        config.save_to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::from_file("/nonexistent/bracket-sim.yaml"),
            Err(ConfigError::NotFound(_))
        ));
        assert!(matches!(
            Config::load_or_default(Some(Path::new("/nonexistent/bracket-sim.yaml"))),
            Err(ConfigError::NotFound(_))
        ));
    }
}
