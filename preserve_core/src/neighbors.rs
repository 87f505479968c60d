//! Neighbor lists derived from a near table.

use std::collections::HashMap;

use crate::{
    features::{FeatureId, FeatureSet},
    service::{GeometryError, GeometryService, NearTarget},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Position of the neighbor in the target set.
    pub index: usize,
    pub id: FeatureId,
    pub distance: f64,
}

/// Per-source neighbor lists, aligned with the source set's order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeighborGraph {
    lists: Vec<Vec<Neighbor>>,
}

impl NeighborGraph {
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    pub fn neighbors(&self, source: usize) -> &[Neighbor] {
        self.lists.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edge_count(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }

    /// Sum of `values[target]` over the neighbors of `source`.
    pub fn sum_over(&self, source: usize, values: &[f64]) -> f64 {
        self.neighbors(source)
            .iter()
            .map(|neighbor| values[neighbor.index])
            .sum()
    }

    /// Mean of `values[target]` over the neighbors of `source`, `None` when it
    /// has no neighbors.
    pub fn mean_over(&self, source: usize, values: &[f64]) -> Option<f64> {
        let neighbors = self.neighbors(source);
        if neighbors.is_empty() {
            None
        } else {
            Some(self.sum_over(source, values) / neighbors.len() as f64)
        }
    }
}

/// Builds neighbor lists for every feature in `sources` against `targets`.
///
/// Sources with nothing in range get an empty list; an empty target set is
/// not an error.
pub fn build_neighbors<S: GeometryService + ?Sized>(
    service: &S,
    sources: &FeatureSet,
    targets: NearTarget<'_>,
    jump_distance: f64,
) -> Result<NeighborGraph, GeometryError> {
    let table = service.generate_near_table(sources, targets, jump_distance)?;

    let target_set = match targets {
        NearTarget::SameSet => sources,
        NearTarget::Other(set) => set,
    };
    let source_index: HashMap<FeatureId, usize> = sources
        .iter()
        .enumerate()
        .map(|(idx, feature)| (feature.id, idx))
        .collect();
    let target_index: HashMap<FeatureId, usize> = target_set
        .iter()
        .enumerate()
        .map(|(idx, feature)| (feature.id, idx))
        .collect();

    let mut lists = vec![Vec::new(); sources.len()];
    for entry in table {
        let (Some(&source), Some(&target)) =
            (source_index.get(&entry.from), target_index.get(&entry.to))
        else {
            continue;
        };
        lists[source].push(Neighbor {
            index: target,
            id: entry.to,
            distance: entry.distance,
        });
    }

    Ok(NeighborGraph { lists })
}
