//! Core ranking engine for the block-grower conservation model.
//!
//! Scores unpreserved land parcels by how much they would grow nearby
//! preserved land, using either the one-pass greedy measure or the patient
//! measure that smooths scores across neighboring parcels. [`run_simulation`]
//! optionally repeats the scoring for several rounds, preserving the top
//! parcels at the end of each.

pub mod blobs;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod geometry;
pub mod greedy;
pub mod metrics;
pub mod neighbors;
pub mod normalize;
pub mod patient;
pub mod selection;
pub mod service;
pub mod simulation;

pub use blobs::{BlobLayer, BlobWeighter};
pub use config::{
    load_run_config_from_env, Method, RunConfig, RunConfigMetadata, Scoring, ValidatedRun,
    GREEDY_SCORE_FIELD, PATIENT_SCORE_FIELD,
};
pub use dataset::{
    feature_collection_to_string, parse_feature_collection, read_feature_collection,
    write_feature_collection,
};
pub use error::{RankingError, RoundStage, SimulationError};
pub use features::{Feature, FeatureId, FeatureSet};
pub use geometry::{MultiPolygon, Polygon};
pub use metrics::{RoundMetrics, SimulationMetrics};
pub use patient::{PatientScorer, PatientWeights};
pub use selection::TiePolicy;
pub use service::{AreaUnit, GeometryError, GeometryService, PlanarGeometryService};
pub use simulation::{run_simulation, SimulationLoop, SimulationOutcome};
