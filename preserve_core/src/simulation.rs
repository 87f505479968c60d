//! The round loop.
//!
//! Each round partitions the parcel layer by status, aggregates preserved
//! parcels into weighted blobs, scores every unpreserved parcel, optionally
//! flips the top-ranked parcels to preserved, and merges both partitions back
//! into the layer the next round reads. Only that merged layer crosses round
//! boundaries; blobs, neighbor tables and raw fields live in [`RoundState`]
//! and are dropped when the round ends.

use std::path::Path;

use crate::{
    blobs::{BlobLayer, BlobWeighter},
    config::{
        Method, RunConfig, Scoring, SimulationParams, ValidatedRun, GREEDY_SCORE_FIELD,
        PATIENT_SCORE_FIELD,
    },
    dataset::write_feature_collection,
    error::{RankingError, RoundStage, SimulationError},
    features::{read_status, AttributePredicate, FeatureSet},
    greedy::{self, GreedyFields},
    metrics::{collect_metrics, RoundMetrics, SimulationMetrics},
    neighbors::build_neighbors,
    normalize::integer_scores,
    patient::{local_values, PatientFields, PatientScorer},
    selection::{self, Selection},
    service::{GeometryService, NearTarget, PlanarGeometryService},
};

/// Attribute names older runs left behind for intermediate values. They are
/// stripped from the input and never written to the output.
pub const TRANSIENT_FIELDS: &[&str] = &[
    "GreedyWght",
    "CombndAcre",
    "SUM_WEIGHT",
    "POLY_AREA",
    "NeighbArea",
    "AvgNeighSz",
    "PatientWgt",
    "LocalValue",
    "COUNT_NEAR",
    "SUM_POLY_A",
];

const SCORE_FIELDS: &[&str] = &[GREEDY_SCORE_FIELD, PATIENT_SCORE_FIELD];

/// Working state of a single round.
#[derive(Debug)]
pub struct RoundState {
    pub round: u32,
    pub preserved: FeatureSet,
    pub unpreserved: FeatureSet,
    /// Areas of `unpreserved`, in the configured unit.
    pub areas: Vec<f64>,
    pub blobs: BlobLayer,
    pub greedy: Vec<GreedyFields>,
    /// Empty unless the patient method is scoring.
    pub patient: Vec<PatientFields>,
    pub scores: Vec<i64>,
    pub metrics: RoundMetrics,
}

#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    /// The merged layer after the last round.
    pub features: FeatureSet,
    pub method: Method,
    pub rounds: Vec<RoundMetrics>,
}

impl SimulationOutcome {
    pub fn score_field(&self) -> &'static str {
        self.method.score_field()
    }

    pub fn metrics(&self) -> SimulationMetrics {
        collect_metrics(&self.rounds)
    }

    /// Writes the final layer. Failures are attributed to the last round.
    pub fn write(&self, path: &Path) -> Result<(), SimulationError> {
        let round = self.rounds.last().map_or(0, |metrics| metrics.round);
        write_feature_collection(path, &self.features)
            .map_err(|err| SimulationError::new(round, RoundStage::Output, err))
    }
}

fn at<E: Into<RankingError>>(round: u32, stage: RoundStage) -> impl FnOnce(E) -> SimulationError {
    move |err| SimulationError::new(round, stage, err)
}

fn strip_fields(layer: &mut FeatureSet, fields: &[&str]) {
    for feature in layer.iter_mut() {
        for field in fields {
            feature.remove_attribute(field);
        }
    }
}

pub struct SimulationLoop<'a, S: GeometryService + ?Sized> {
    service: &'a S,
    run: &'a ValidatedRun,
}

impl<'a, S: GeometryService + ?Sized> SimulationLoop<'a, S> {
    pub fn new(service: &'a S, run: &'a ValidatedRun) -> Self {
        Self { service, run }
    }

    /// Runs every configured round over a copy of `parcels`.
    pub fn run(&self, parcels: &FeatureSet) -> Result<SimulationOutcome, SimulationError> {
        let mut layer = self
            .service
            .copy_features(parcels)
            .map_err(at(0, RoundStage::Init))?;
        strip_fields(&mut layer, TRANSIENT_FIELDS);

        let unpreserved = count_unpreserved(&layer, &self.run.status_field)
            .map_err(at(0, RoundStage::Init))?;
        self.run
            .check_preserve_count(unpreserved)
            .map_err(at(0, RoundStage::Init))?;

        let rounds = self.run.rounds();
        let method = self.run.method();
        tracing::info!(
            target: "block_grower::simulation",
            parcels = layer.len(),
            unpreserved,
            rounds,
            method = %method,
            "simulation.start"
        );

        let mut metrics = Vec::with_capacity(rounds as usize);
        for round in 1..=rounds {
            let (merged, round_metrics) = self.run_round(round, layer)?;
            tracing::info!(
                target: "block_grower::simulation",
                round,
                of = rounds,
                preserved = round_metrics.preserved,
                unpreserved = round_metrics.unpreserved,
                blobs = round_metrics.blobs,
                newly_preserved = round_metrics.newly_preserved.len(),
                "simulation.round_complete"
            );
            layer = merged;
            metrics.push(round_metrics);
        }

        Ok(SimulationOutcome {
            features: layer,
            method,
            rounds: metrics,
        })
    }

    /// Executes one round and returns the merged layer for the next.
    pub fn run_round(
        &self,
        round: u32,
        layer: FeatureSet,
    ) -> Result<(FeatureSet, RoundMetrics), SimulationError> {
        let mut state = self
            .partition(round, layer)
            .map_err(at(round, RoundStage::Partition))?;
        self.build_blobs(&mut state)
            .map_err(at(round, RoundStage::NeighborBlob))?;
        self.score(&mut state).map_err(at(round, RoundStage::Score))?;
        let selection = match self.run.simulation {
            Some(params) => Some(
                self.select(&mut state, params)
                    .map_err(at(round, RoundStage::Select))?,
            ),
            None => None,
        };
        self.merge(state, selection)
            .map_err(at(round, RoundStage::Merge))
    }

    fn partition(&self, round: u32, mut layer: FeatureSet) -> Result<RoundState, RankingError> {
        let field = &self.run.status_field;
        strip_fields(&mut layer, SCORE_FIELDS);
        for feature in layer.iter() {
            read_status(feature, field)?;
        }

        let preserved = self
            .service
            .select_by_attribute(&layer, &AttributePredicate::preserved(field))?;
        let unpreserved = self
            .service
            .select_by_attribute(&layer, &AttributePredicate::unpreserved(field))?;
        if unpreserved.is_empty() {
            return Err(RankingError::EmptyPartition {
                side: "unpreserved",
            });
        }
        self.run.check_preserve_count(unpreserved.len())?;
        if preserved.is_empty() {
            tracing::debug!(
                target: "block_grower::simulation",
                round,
                "simulation.no_preserved_parcels"
            );
        }
        let areas = self.service.compute_area(&unpreserved, self.run.area_unit)?;

        let mut metrics = RoundMetrics::new(round);
        metrics.preserved = preserved.len();
        metrics.unpreserved = unpreserved.len();
        Ok(RoundState {
            round,
            preserved,
            unpreserved,
            areas,
            blobs: BlobLayer::default(),
            greedy: Vec::new(),
            patient: Vec::new(),
            scores: Vec::new(),
            metrics,
        })
    }

    fn build_blobs(&self, state: &mut RoundState) -> Result<(), RankingError> {
        let blobs = BlobLayer::build(
            self.service,
            &state.preserved,
            self.run.jump_distance,
            self.run.area_unit,
            BlobWeighter::new(self.run.deprioritize_large_blobs),
        )?;
        let graph = build_neighbors(
            self.service,
            &state.unpreserved,
            NearTarget::Other(&blobs.features),
            self.run.jump_distance,
        )?;
        state.greedy = greedy::greedy_fields(&state.areas, &graph, &blobs.weighted_areas());
        tracing::debug!(
            target: "block_grower::simulation",
            round = state.round,
            blobs = blobs.len(),
            links = graph.edge_count(),
            "simulation.blobs_built"
        );
        state.metrics.blobs = blobs.len();
        state.metrics.largest_blob_area = blobs.largest_area();
        state.blobs = blobs;
        Ok(())
    }

    fn score(&self, state: &mut RoundState) -> Result<(), RankingError> {
        let (raw, raw_field) = match self.run.scoring {
            Scoring::Greedy => (greedy::weights(&state.greedy), "GreedyWght"),
            Scoring::Patient(params) => {
                let scorer = PatientScorer::new(
                    self.service,
                    self.run.jump_distance,
                    params.weights,
                    params.iterations,
                );
                state.patient = scorer.score(&state.unpreserved, &state.areas, &state.greedy)?;
                (local_values(&state.patient), "LocalValue")
            }
        };
        state.metrics.record_raw_scores(&raw);
        tracing::debug!(
            target: "block_grower::simulation",
            round = state.round,
            field = raw_field,
            min = state.metrics.raw_score_min,
            max = state.metrics.raw_score_max,
            "simulation.raw_scores"
        );

        state.scores = integer_scores(&raw)
            .map_err(|err| RankingError::from_normalize(err, raw_field, &state.unpreserved.ids()))?;
        let score_field = self.run.method().score_field();
        for (parcel, &score) in state.unpreserved.iter_mut().zip(&state.scores) {
            parcel.set_attribute(score_field, score);
        }
        Ok(())
    }

    fn select(
        &self,
        state: &mut RoundState,
        params: SimulationParams,
    ) -> Result<Selection, RankingError> {
        let selection = selection::select(
            &state.unpreserved,
            self.run.method().score_field(),
            params.parcels_to_preserve,
            self.run.tie_policy,
        )?;
        if selection.tie_extras > 0 {
            tracing::warn!(
                target: "block_grower::simulation",
                round = state.round,
                requested = params.parcels_to_preserve,
                selected = selection.ids.len(),
                cutoff = selection.cutoff,
                "simulation.tie_at_cutoff"
            );
        }
        selection::apply(&mut state.unpreserved, &selection, &self.run.status_field);
        Ok(selection)
    }

    fn merge(
        &self,
        state: RoundState,
        selection: Option<Selection>,
    ) -> Result<(FeatureSet, RoundMetrics), RankingError> {
        let RoundState {
            mut unpreserved,
            preserved,
            mut metrics,
            ..
        } = state;
        strip_fields(&mut unpreserved, TRANSIENT_FIELDS);
        if let Some(selection) = selection {
            metrics.tie_extras = selection.tie_extras;
            metrics.newly_preserved = selection.ids;
        }
        let merged = self
            .service
            .merge_feature_sets(vec![unpreserved, preserved])?;
        Ok((merged, metrics))
    }
}

fn count_unpreserved(layer: &FeatureSet, field: &str) -> Result<usize, RankingError> {
    let mut count = 0;
    for feature in layer.iter() {
        if !read_status(feature, field)? {
            count += 1;
        }
    }
    Ok(count)
}

/// Validates `config` and runs it against the planar geometry service.
pub fn run_simulation(
    parcels: &FeatureSet,
    config: &RunConfig,
) -> Result<SimulationOutcome, SimulationError> {
    let run = config.validate().map_err(at(0, RoundStage::Init))?;
    let service = PlanarGeometryService::new();
    SimulationLoop::new(&service, &run).run(parcels)
}
