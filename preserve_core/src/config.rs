//! Run configuration.
//!
//! Loaded from `run_config.json` (builtin copy embedded at compile time) with
//! an optional file override named by `PRESERVE_RUN_CONFIG_PATH`. The raw
//! [`RunConfig`] mirrors the tool's parameter surface; [`RunConfig::validate`]
//! turns it into a typed [`ValidatedRun`] before any round executes.

use std::{
    env, fmt, fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{patient::PatientWeights, selection::TiePolicy, service::AreaUnit};

pub const BUILTIN_RUN_CONFIG: &str = include_str!("data/run_config.json");
pub const RUN_CONFIG_PATH_ENV: &str = "PRESERVE_RUN_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub status_field: String,
    pub deprioritize_large_blobs: bool,
    pub method: String,
    pub jump_distance: f64,
    pub access_weight: f64,
    pub average_neighbor_weight: f64,
    pub greedy_weight: f64,
    pub averaging_iterations: i64,
    pub simulate: bool,
    pub simulations: i64,
    pub parcels_to_preserve: i64,
    pub area_unit: AreaUnit,
    pub tie_policy: TiePolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        let weights = PatientWeights::default();
        Self {
            status_field: "Status".to_string(),
            deprioritize_large_blobs: false,
            method: Method::Greedy.to_string(),
            jump_distance: 0.0,
            access_weight: weights.access,
            average_neighbor_weight: weights.average_neighbor,
            greedy_weight: weights.greedy,
            averaging_iterations: 3,
            simulate: false,
            simulations: 1,
            parcels_to_preserve: 5,
            area_unit: AreaUnit::Native,
            tie_policy: TiePolicy::IncludeTies,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse run config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read run config from {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("status_field must name an attribute")]
    EmptyStatusField,
    #[error("unrecognised method {0:?}, expected \"Greedy\" or \"Patient\"")]
    UnknownMethod(String),
    #[error("jump_distance must be finite and non-negative, got {0}")]
    InvalidJumpDistance(f64),
    #[error("{field} must be finite, got {value}")]
    NonFiniteWeight { field: &'static str, value: f64 },
    #[error("averaging_iterations must be non-negative, got {0}")]
    NegativeIterations(i64),
    #[error("simulations must be at least 1, got {0}")]
    InvalidSimulationCount(i64),
    #[error("parcels_to_preserve must be at least 1, got {0}")]
    InvalidPreserveCount(i64),
    #[error("parcels_to_preserve ({requested}) must be below the unpreserved parcel count ({unpreserved})")]
    PreserveCountTooLarge { requested: usize, unpreserved: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Greedy,
    Patient,
}

impl Method {
    /// Attribute the final score is written to.
    pub fn score_field(self) -> &'static str {
        match self {
            Method::Greedy => GREEDY_SCORE_FIELD,
            Method::Patient => PATIENT_SCORE_FIELD,
        }
    }
}

pub const GREEDY_SCORE_FIELD: &str = "GreedyScr";
pub const PATIENT_SCORE_FIELD: &str = "PatientScr";

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Greedy => f.write_str("Greedy"),
            Method::Patient => f.write_str("Patient"),
        }
    }
}

impl FromStr for Method {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "greedy" => Ok(Method::Greedy),
            "patient" => Ok(Method::Patient),
            _ => Err(ConfigError::UnknownMethod(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatientParams {
    pub weights: PatientWeights,
    pub iterations: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationParams {
    pub rounds: u32,
    pub parcels_to_preserve: usize,
}

/// Scoring algorithm together with the parameters only it uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scoring {
    Greedy,
    Patient(PatientParams),
}

impl Scoring {
    pub fn method(&self) -> Method {
        match self {
            Scoring::Greedy => Method::Greedy,
            Scoring::Patient(_) => Method::Patient,
        }
    }
}

/// A configuration that passed validation. Simulation parameters are present
/// only when simulating.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRun {
    pub status_field: String,
    pub deprioritize_large_blobs: bool,
    pub scoring: Scoring,
    pub jump_distance: f64,
    pub simulation: Option<SimulationParams>,
    pub area_unit: AreaUnit,
    pub tie_policy: TiePolicy,
}

impl ValidatedRun {
    pub fn method(&self) -> Method {
        self.scoring.method()
    }

    /// Number of rounds to execute; one when not simulating.
    pub fn rounds(&self) -> u32 {
        self.simulation.map_or(1, |sim| sim.rounds)
    }

    /// Checks the per-round preserve count against the unpreserved parcels
    /// currently available.
    pub fn check_preserve_count(&self, unpreserved: usize) -> Result<(), ConfigError> {
        match self.simulation {
            Some(sim) if sim.parcels_to_preserve >= unpreserved => {
                Err(ConfigError::PreserveCountTooLarge {
                    requested: sim.parcels_to_preserve,
                    unpreserved,
                })
            }
            _ => Ok(()),
        }
    }
}

impl RunConfig {
    pub fn builtin() -> Self {
        serde_json::from_str(BUILTIN_RUN_CONFIG).expect("builtin run config should parse")
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let config = RunConfig::from_json_str(&contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<ValidatedRun, ConfigError> {
        if self.status_field.trim().is_empty() {
            return Err(ConfigError::EmptyStatusField);
        }
        let method: Method = self.method.parse()?;
        if !self.jump_distance.is_finite() || self.jump_distance < 0.0 {
            return Err(ConfigError::InvalidJumpDistance(self.jump_distance));
        }

        let scoring = match method {
            Method::Greedy => Scoring::Greedy,
            Method::Patient => {
                for (field, value) in [
                    ("access_weight", self.access_weight),
                    ("average_neighbor_weight", self.average_neighbor_weight),
                    ("greedy_weight", self.greedy_weight),
                ] {
                    if !value.is_finite() {
                        return Err(ConfigError::NonFiniteWeight { field, value });
                    }
                }
                let iterations = u32::try_from(self.averaging_iterations)
                    .map_err(|_| ConfigError::NegativeIterations(self.averaging_iterations))?;
                Scoring::Patient(PatientParams {
                    weights: PatientWeights {
                        access: self.access_weight,
                        average_neighbor: self.average_neighbor_weight,
                        greedy: self.greedy_weight,
                    },
                    iterations,
                })
            }
        };

        let simulation = if self.simulate {
            let rounds = u32::try_from(self.simulations)
                .ok()
                .filter(|&rounds| rounds >= 1)
                .ok_or(ConfigError::InvalidSimulationCount(self.simulations))?;
            let parcels_to_preserve = usize::try_from(self.parcels_to_preserve)
                .ok()
                .filter(|&k| k >= 1)
                .ok_or(ConfigError::InvalidPreserveCount(self.parcels_to_preserve))?;
            Some(SimulationParams {
                rounds,
                parcels_to_preserve,
            })
        } else {
            None
        };

        Ok(ValidatedRun {
            status_field: self.status_field.clone(),
            deprioritize_large_blobs: self.deprioritize_large_blobs,
            scoring,
            jump_distance: self.jump_distance,
            simulation,
            area_unit: self.area_unit,
            tie_policy: self.tie_policy,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunConfigMetadata {
    path: Option<PathBuf>,
}

impl RunConfigMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

/// Loads the run config from `PRESERVE_RUN_CONFIG_PATH` when set, falling
/// back to the builtin document if the override cannot be read or parsed.
pub fn load_run_config_from_env() -> (RunConfig, RunConfigMetadata) {
    if let Some(path) = env::var(RUN_CONFIG_PATH_ENV).ok().map(PathBuf::from) {
        match RunConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!(
                    target: "block_grower::config",
                    path = %path.display(),
                    "run_config.loaded=file"
                );
                return (config, RunConfigMetadata::new(Some(path)));
            }
            Err(err) => {
                tracing::warn!(
                    target: "block_grower::config",
                    path = %path.display(),
                    error = %err,
                    "run_config.load_failed"
                );
            }
        }
    }

    tracing::info!(
        target: "block_grower::config",
        "run_config.loaded=builtin"
    );
    (RunConfig::builtin(), RunConfigMetadata::new(None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_matches_default() {
        assert_eq!(RunConfig::builtin(), RunConfig::default());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = RunConfig::from_json_str(r#"{ "method": "Patient", "jump_distance": 25 }"#)
            .expect("parse");
        let run = config.validate().expect("valid");
        assert_eq!(run.method(), Method::Patient);
        assert_eq!(run.jump_distance, 25.0);
        let Scoring::Patient(patient) = run.scoring else {
            panic!("expected patient scoring, got {:?}", run.scoring);
        };
        assert_eq!(patient.iterations, 3);
        assert_eq!(patient.weights, PatientWeights::default());
        assert_eq!(run.simulation, None);
        assert_eq!(run.rounds(), 1);
    }

    #[test]
    fn method_names_are_case_insensitive() {
        assert_eq!("greedy".parse::<Method>().expect("method"), Method::Greedy);
        assert_eq!(" PATIENT ".parse::<Method>().expect("method"), Method::Patient);
        assert!(matches!(
            "Lazy".parse::<Method>(),
            Err(ConfigError::UnknownMethod(name)) if name == "Lazy"
        ));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = RunConfig {
            jump_distance: -1.0,
            ..RunConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidJumpDistance(_))));

        config.jump_distance = 10.0;
        config.method = "Patient".to_string();
        config.averaging_iterations = -2;
        assert!(matches!(config.validate(), Err(ConfigError::NegativeIterations(-2))));

        config.averaging_iterations = 2;
        config.simulate = true;
        config.simulations = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSimulationCount(0))));

        config.simulations = 2;
        config.parcels_to_preserve = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPreserveCount(0))));
    }

    #[test]
    fn ignored_parameters_are_not_validated() {
        let config = RunConfig {
            averaging_iterations: -5,
            simulations: 0,
            parcels_to_preserve: -1,
            ..RunConfig::default()
        };
        let run = config.validate().expect("greedy single run ignores them");
        assert_eq!(run.scoring, Scoring::Greedy);
        assert_eq!(run.simulation, None);
    }

    #[test]
    fn preserve_count_must_leave_unpreserved_parcels() {
        let config = RunConfig {
            simulate: true,
            simulations: 3,
            parcels_to_preserve: 4,
            ..RunConfig::default()
        };
        let run = config.validate().expect("valid");
        assert!(run.check_preserve_count(5).is_ok());
        assert!(matches!(
            run.check_preserve_count(4),
            Err(ConfigError::PreserveCountTooLarge {
                requested: 4,
                unpreserved: 4
            })
        ));
    }
}
