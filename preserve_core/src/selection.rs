//! Picks the top-ranked unpreserved parcels and flips their status.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::{write_status, FeatureId, FeatureSet};

/// How parcels tied with the k-th highest score are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TiePolicy {
    /// Every parcel scoring at least the k-th highest score is selected, so a
    /// tie at the cutoff can select more than k parcels.
    #[default]
    IncludeTies,
    /// Exactly k parcels; ties at the cutoff go to the earlier parcel.
    Exact,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectionError {
    #[error("cannot preserve {requested} of {available} unpreserved parcels")]
    TooMany { requested: usize, available: usize },
    #[error("at least one parcel must be preserved per round")]
    NothingRequested,
    #[error("parcel {id} has no numeric {field} value")]
    MissingScore { id: FeatureId, field: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Selected parcels, best first.
    pub ids: Vec<FeatureId>,
    /// Score of the k-th ranked parcel.
    pub cutoff: f64,
    /// Parcels beyond k admitted because they tie the cutoff.
    pub tie_extras: usize,
}

/// Positions of `scores` ranked by descending score; equal scores keep their
/// input order.
pub fn rank(scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order
}

pub fn select(
    parcels: &FeatureSet,
    score_field: &str,
    k: usize,
    policy: TiePolicy,
) -> Result<Selection, SelectionError> {
    if k == 0 {
        return Err(SelectionError::NothingRequested);
    }
    if k >= parcels.len() {
        return Err(SelectionError::TooMany {
            requested: k,
            available: parcels.len(),
        });
    }

    let scores = parcels
        .iter()
        .map(|parcel| {
            parcel
                .attribute(score_field)
                .and_then(|value| value.as_f64())
                .ok_or_else(|| SelectionError::MissingScore {
                    id: parcel.id,
                    field: score_field.to_string(),
                })
        })
        .collect::<Result<Vec<f64>, _>>()?;

    let order = rank(&scores);
    let cutoff = scores[order[k - 1]];
    let chosen: Vec<usize> = match policy {
        TiePolicy::Exact => order[..k].to_vec(),
        TiePolicy::IncludeTies => order
            .iter()
            .copied()
            .take_while(|&idx| scores[idx] >= cutoff)
            .collect(),
    };

    let features = parcels.features();
    Ok(Selection {
        tie_extras: chosen.len() - k,
        ids: chosen.into_iter().map(|idx| features[idx].id).collect(),
        cutoff,
    })
}

/// Marks every selected parcel preserved.
pub fn apply(parcels: &mut FeatureSet, selection: &Selection, status_field: &str) {
    let selected: HashSet<FeatureId> = selection.ids.iter().copied().collect();
    for parcel in parcels.iter_mut() {
        if selected.contains(&parcel.id) {
            write_status(parcel, status_field, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        features::{read_status, Feature},
        geometry::Polygon,
    };

    fn scored(scores: &[i64]) -> FeatureSet {
        scores
            .iter()
            .enumerate()
            .map(|(idx, &score)| {
                Feature::new(FeatureId(idx as u64 + 1), Polygon::square([idx as f64, 0.0], 1.0))
                    .with_attribute("Status", 0)
                    .with_attribute("GreedyScr", score)
            })
            .collect()
    }

    #[test]
    fn rank_is_stable_for_ties() {
        assert_eq!(rank(&[5.0, 9.0, 5.0, 9.0, 1.0]), vec![1, 3, 0, 2, 4]);
    }

    #[test]
    fn tie_at_cutoff_expands_selection() {
        let parcels = scored(&[90, 80, 80, 70, 60, 50, 40, 30, 20, 10]);
        let selection = select(&parcels, "GreedyScr", 2, TiePolicy::IncludeTies).expect("select");
        assert_eq!(selection.ids, vec![FeatureId(1), FeatureId(2), FeatureId(3)]);
        assert_eq!(selection.cutoff, 80.0);
        assert_eq!(selection.tie_extras, 1);
    }

    #[test]
    fn exact_policy_takes_earlier_tied_parcel() {
        let parcels = scored(&[90, 80, 80, 70, 60, 50, 40, 30, 20, 10]);
        let selection = select(&parcels, "GreedyScr", 2, TiePolicy::Exact).expect("select");
        assert_eq!(selection.ids, vec![FeatureId(1), FeatureId(2)]);
        assert_eq!(selection.tie_extras, 0);
    }

    #[test]
    fn untied_cutoff_selects_exactly_k() {
        let parcels = scored(&[10, 40, 30, 20]);
        let selection = select(&parcels, "GreedyScr", 2, TiePolicy::IncludeTies).expect("select");
        assert_eq!(selection.ids, vec![FeatureId(2), FeatureId(3)]);
    }

    #[test]
    fn k_must_be_below_parcel_count() {
        let parcels = scored(&[10, 20]);
        assert_eq!(
            select(&parcels, "GreedyScr", 2, TiePolicy::Exact),
            Err(SelectionError::TooMany {
                requested: 2,
                available: 2
            })
        );
        assert_eq!(
            select(&parcels, "GreedyScr", 0, TiePolicy::Exact),
            Err(SelectionError::NothingRequested)
        );
    }

    #[test]
    fn missing_score_is_reported() {
        let parcels = scored(&[10, 20, 30]);
        let err = select(&parcels, "PatientScr", 1, TiePolicy::Exact).expect_err("no score");
        assert!(matches!(err, SelectionError::MissingScore { id: FeatureId(1), .. }));
    }

    #[test]
    fn apply_flips_only_selected_status() {
        let mut parcels = scored(&[10, 40, 30]);
        let selection = select(&parcels, "GreedyScr", 1, TiePolicy::Exact).expect("select");
        apply(&mut parcels, &selection, "Status");

        let flags: Vec<bool> = parcels
            .iter()
            .map(|p| read_status(p, "Status").expect("status"))
            .collect();
        assert_eq!(flags, vec![false, true, false]);
    }

    #[test]
    fn apply_handles_half_of_a_large_layer() {
        let scores: Vec<i64> = (0..6_000).collect();
        let mut parcels = scored(&scores);
        let selection = select(&parcels, "GreedyScr", 3_000, TiePolicy::Exact).expect("select");
        apply(&mut parcels, &selection, "Status");

        let preserved: Vec<u64> = parcels
            .iter()
            .filter(|p| read_status(p, "Status").expect("status"))
            .map(|p| p.id.0)
            .collect();
        assert_eq!(preserved.len(), 3_000);
        assert!(preserved.iter().all(|&id| id > 3_000));
    }
}
