use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::{
    config::ConfigError,
    features::{FeatureId, StatusError},
    normalize::NormalizeError,
    selection::SelectionError,
    service::GeometryError,
};

/// Step of a round in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStage {
    Init,
    Partition,
    NeighborBlob,
    Score,
    Select,
    Merge,
    Output,
}

impl fmt::Display for RoundStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoundStage::Init => "init",
            RoundStage::Partition => "partition",
            RoundStage::NeighborBlob => "neighbor_blob",
            RoundStage::Score => "score",
            RoundStage::Select => "select",
            RoundStage::Merge => "merge",
            RoundStage::Output => "output",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum RankingError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),
    #[error("cannot normalise {field}: every unpreserved parcel has raw value {value}")]
    DegenerateNormalization { field: &'static str, value: f64 },
    #[error("raw {field} of parcel {id} is not finite")]
    NonFiniteScore { field: &'static str, id: FeatureId },
    #[error("geometry service failed: {0}")]
    GeometryService(#[from] GeometryError),
    #[error("no {side} parcels to rank")]
    EmptyPartition { side: &'static str },
    #[error(transparent)]
    InvalidStatus(#[from] StatusError),
    #[error("parcel {id} has no numeric {field} value")]
    MissingScore { id: FeatureId, field: String },
}

impl RankingError {
    /// Maps a normalisation failure on `field` over parcels listed in `ids`.
    pub fn from_normalize(err: NormalizeError, field: &'static str, ids: &[FeatureId]) -> Self {
        match err {
            NormalizeError::Empty => RankingError::EmptyPartition { side: "unpreserved" },
            NormalizeError::Degenerate { value } => {
                RankingError::DegenerateNormalization { field, value }
            }
            NormalizeError::NonFinite { index } => RankingError::NonFiniteScore {
                field,
                id: ids.get(index).copied().unwrap_or(FeatureId(index as u64)),
            },
        }
    }
}

impl From<SelectionError> for RankingError {
    fn from(err: SelectionError) -> Self {
        match err {
            SelectionError::TooMany {
                requested,
                available,
            } => RankingError::Configuration(ConfigError::PreserveCountTooLarge {
                requested,
                unpreserved: available,
            }),
            SelectionError::NothingRequested => {
                RankingError::Configuration(ConfigError::InvalidPreserveCount(0))
            }
            SelectionError::MissingScore { id, field } => RankingError::MissingScore { id, field },
        }
    }
}

/// A fatal failure, tagged with where in the run it happened. Configuration
/// problems found before the first round report round 0 at `init`.
#[derive(Debug, Error)]
#[error("round {round} failed during {stage}: {source}")]
pub struct SimulationError {
    pub round: u32,
    pub stage: RoundStage,
    #[source]
    pub source: RankingError,
}

impl SimulationError {
    pub fn new(round: u32, stage: RoundStage, source: impl Into<RankingError>) -> Self {
        Self {
            round,
            stage,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> &RankingError {
        &self.source
    }
}
