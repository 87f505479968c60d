//! Multi-pass patient score.
//!
//! Each unpreserved parcel starts from a weighted mix of the area it can reach
//! (sum of neighbor areas), the mean size of those neighbors and its own
//! greedy weight. The mix is then smoothed over the neighbor graph: every pass
//! replaces a parcel's weight with the average of itself and its neighbors'
//! mean, and the post-update weights are accumulated into the parcel's local
//! value. The pass count sets how far value diffuses; there is no convergence
//! test.

use rayon::prelude::*;

use crate::{
    features::FeatureSet,
    greedy::GreedyFields,
    neighbors::{build_neighbors, NeighborGraph},
    service::{GeometryError, GeometryService, NearTarget},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatientWeights {
    pub access: f64,
    pub average_neighbor: f64,
    pub greedy: f64,
}

impl Default for PatientWeights {
    fn default() -> Self {
        Self {
            access: 1.0,
            average_neighbor: 2.0,
            greedy: 4.0,
        }
    }
}

/// Patient fields of one unpreserved parcel for the current round.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PatientFields {
    pub neighbor_area_sum: f64,
    pub neighbor_count: usize,
    pub avg_neighbor_size: f64,
    pub patient_weight: f64,
    pub local_value: f64,
}

pub fn initial_patient_weight(
    weights: &PatientWeights,
    neighbor_area_sum: f64,
    avg_neighbor_size: f64,
    greedy_weight: f64,
) -> f64 {
    weights.access * neighbor_area_sum
        + weights.average_neighbor * avg_neighbor_size
        + weights.greedy * greedy_weight
}

/// One damped averaging pass. Reads every weight before writing any.
/// A parcel without neighbors averages against zero.
pub fn smooth_once(patient_weights: &[f64], graph: &NeighborGraph) -> Vec<f64> {
    (0..patient_weights.len())
        .into_par_iter()
        .map(|idx| {
            let mean = graph.mean_over(idx, patient_weights).unwrap_or(0.0);
            (patient_weights[idx] + mean) / 2.0
        })
        .collect()
}

pub struct PatientScorer<'a, S: GeometryService + ?Sized> {
    service: &'a S,
    jump_distance: f64,
    weights: PatientWeights,
    iterations: u32,
}

impl<'a, S: GeometryService + ?Sized> PatientScorer<'a, S> {
    pub fn new(service: &'a S, jump_distance: f64, weights: PatientWeights, iterations: u32) -> Self {
        Self {
            service,
            jump_distance,
            weights,
            iterations,
        }
    }

    /// Computes patient fields for `parcels`. `areas` and `greedy` must be
    /// aligned with `parcels`.
    pub fn score(
        &self,
        parcels: &FeatureSet,
        areas: &[f64],
        greedy: &[GreedyFields],
    ) -> Result<Vec<PatientFields>, GeometryError> {
        let graph = build_neighbors(self.service, parcels, NearTarget::SameSet, self.jump_distance)?;

        let mut fields: Vec<PatientFields> = greedy
            .iter()
            .enumerate()
            .map(|(idx, greedy)| {
                let neighbor_area_sum = graph.sum_over(idx, areas);
                let neighbor_count = graph.neighbors(idx).len();
                let avg_neighbor_size = if neighbor_count > 0 {
                    neighbor_area_sum / neighbor_count as f64
                } else {
                    0.0
                };
                PatientFields {
                    neighbor_area_sum,
                    neighbor_count,
                    avg_neighbor_size,
                    patient_weight: initial_patient_weight(
                        &self.weights,
                        neighbor_area_sum,
                        avg_neighbor_size,
                        greedy.greedy_weight,
                    ),
                    local_value: 0.0,
                }
            })
            .collect();

        let mut patient_weights: Vec<f64> = fields.iter().map(|f| f.patient_weight).collect();
        let mut local_values = vec![0.0; fields.len()];

        if self.iterations == 0 {
            local_values.clone_from(&patient_weights);
        }
        for pass in 0..self.iterations {
            tracing::debug!(
                target: "block_grower::patient",
                pass = pass + 1,
                of = self.iterations,
                "patient.averaging_pass"
            );
            // Topology is unchanged between passes, but the table is rebuilt
            // so a store-backed service sees the current layer.
            let graph =
                build_neighbors(self.service, parcels, NearTarget::SameSet, self.jump_distance)?;
            patient_weights = smooth_once(&patient_weights, &graph);
            for (local, weight) in local_values.iter_mut().zip(&patient_weights) {
                *local += weight;
            }
        }

        for ((field, weight), local) in fields.iter_mut().zip(patient_weights).zip(local_values) {
            field.patient_weight = weight;
            field.local_value = local;
        }
        Ok(fields)
    }
}

pub fn local_values(fields: &[PatientFields]) -> Vec<f64> {
    fields.iter().map(|f| f.local_value).collect()
}
