//! One-pass proximity score against preserved blobs.

use crate::neighbors::NeighborGraph;

/// Greedy fields of one unpreserved parcel for the current round.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GreedyFields {
    pub area: f64,
    /// Sum of weighted blob area within the jump distance.
    pub nearby_weighted_area: f64,
    pub combined_acres: f64,
    pub greedy_weight: f64,
}

/// A parcel next to no weighted preserved land is worth its own area; one next
/// to preserved land is worth the combined area plus its own area again.
pub fn greedy_weight(area: f64, nearby_weighted_area: f64) -> f64 {
    if nearby_weighted_area == 0.0 {
        area
    } else {
        nearby_weighted_area + area + area
    }
}

/// Computes greedy fields for every parcel in `areas` order. `blob_graph`
/// must have been built with the parcels as sources and the blobs as targets.
pub fn greedy_fields(
    areas: &[f64],
    blob_graph: &NeighborGraph,
    blob_weighted_areas: &[f64],
) -> Vec<GreedyFields> {
    areas
        .iter()
        .enumerate()
        .map(|(idx, &area)| {
            let nearby_weighted_area = blob_graph.sum_over(idx, blob_weighted_areas);
            GreedyFields {
                area,
                nearby_weighted_area,
                combined_acres: nearby_weighted_area + area,
                greedy_weight: greedy_weight(area, nearby_weighted_area),
            }
        })
        .collect()
}

pub fn weights(fields: &[GreedyFields]) -> Vec<f64> {
    fields.iter().map(|f| f.greedy_weight).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        blobs::{BlobLayer, BlobWeighter},
        features::{Feature, FeatureId, FeatureSet},
        geometry::Polygon,
        neighbors::build_neighbors,
        service::{AreaUnit, NearTarget, PlanarGeometryService},
    };

    #[test]
    fn isolated_parcel_keeps_its_own_area() {
        assert_eq!(greedy_weight(3.25, 0.0), 3.25);
    }

    #[test]
    fn adjacent_parcel_counts_itself_twice() {
        assert_eq!(greedy_weight(2.0, 10.0), 14.0);
    }

    #[test]
    fn fields_sum_every_blob_in_range() {
        let service = PlanarGeometryService;
        let preserved: FeatureSet = vec![
            Feature::new(FeatureId(1), Polygon::square([0.0, 0.0], 2.0)),
            Feature::new(FeatureId(2), Polygon::square([4.0, 0.0], 1.0)),
        ]
        .into_iter()
        .collect();
        let parcels: FeatureSet = vec![
            Feature::new(FeatureId(10), Polygon::square([2.0, 0.0], 2.0)),
            Feature::new(FeatureId(11), Polygon::square([20.0, 0.0], 1.0)),
        ]
        .into_iter()
        .collect();

        let blobs = BlobLayer::build(
            &service,
            &preserved,
            0.0,
            AreaUnit::Native,
            BlobWeighter::default(),
        )
        .expect("blobs");
        // The preserved squares are two units apart: separate blobs, both
        // touching parcel 10.
        assert_eq!(blobs.len(), 2);

        let graph = build_neighbors(&service, &parcels, NearTarget::Other(&blobs.features), 0.0)
            .expect("graph");
        let areas = [4.0, 1.0];
        let fields = greedy_fields(&areas, &graph, &blobs.weighted_areas());

        assert_eq!(fields[0].nearby_weighted_area, 5.0);
        assert_eq!(fields[0].combined_acres, 9.0);
        assert_eq!(fields[0].greedy_weight, 13.0);
        assert_eq!(fields[1].greedy_weight, 1.0);
    }
}
