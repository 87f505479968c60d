use serde::Serialize;

use crate::features::FeatureId;

/// Summary of one completed round.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoundMetrics {
    pub round: u32,
    pub preserved: usize,
    pub unpreserved: usize,
    pub blobs: usize,
    pub largest_blob_area: f64,
    pub raw_score_min: f64,
    pub raw_score_max: f64,
    /// Parcels flipped to preserved at the end of this round, best first.
    pub newly_preserved: Vec<FeatureId>,
    /// How many of `newly_preserved` were admitted only by a tie at the cutoff.
    pub tie_extras: usize,
}

impl RoundMetrics {
    pub fn new(round: u32) -> Self {
        Self {
            round,
            ..Self::default()
        }
    }

    pub fn record_raw_scores(&mut self, raw: &[f64]) {
        let (lo, hi) = raw
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if lo.is_finite() && hi.is_finite() {
            self.raw_score_min = lo;
            self.raw_score_max = hi;
        }
    }
}

/// Totals across every round of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimulationMetrics {
    pub rounds: usize,
    pub total_newly_preserved: usize,
    pub total_tie_extras: usize,
}

pub fn collect_metrics(rounds: &[RoundMetrics]) -> SimulationMetrics {
    SimulationMetrics {
        rounds: rounds.len(),
        total_newly_preserved: rounds.iter().map(|r| r.newly_preserved.len()).sum(),
        total_tie_extras: rounds.iter().map(|r| r.tie_extras).sum(),
    }
}
