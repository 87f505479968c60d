//! Preserved-land blobs and their size-dependent deprioritisation.

use crate::{
    features::{FeatureId, FeatureSet},
    service::{AreaUnit, GeometryError, GeometryService},
};

/// Blobs at or above this area count for nothing when deprioritising.
pub const LARGE_BLOB_AREA: f64 = 500.0;
/// Blobs at or above this area (and below [`LARGE_BLOB_AREA`]) count half.
pub const MEDIUM_BLOB_AREA: f64 = 250.0;

const LARGE_BLOB_FACTOR: f64 = 0.0;
const MEDIUM_BLOB_FACTOR: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlobWeighter {
    deprioritize_large: bool,
}

impl BlobWeighter {
    pub fn new(deprioritize_large: bool) -> Self {
        Self { deprioritize_large }
    }

    pub fn factor(&self, area: f64) -> f64 {
        if !self.deprioritize_large {
            return 1.0;
        }
        if area >= LARGE_BLOB_AREA {
            LARGE_BLOB_FACTOR
        } else if area >= MEDIUM_BLOB_AREA {
            MEDIUM_BLOB_FACTOR
        } else {
            1.0
        }
    }

    pub fn weight(&self, area: f64) -> f64 {
        area * self.factor(area)
    }
}

/// Weighted area of a blob of `blob_area`.
pub fn weight(blob_area: f64, deprioritize_large: bool) -> f64 {
    BlobWeighter::new(deprioritize_large).weight(blob_area)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blob {
    pub id: FeatureId,
    pub area: f64,
    pub weighted_area: f64,
}

/// Blobs derived for one round. Never carried into the next round.
#[derive(Debug, Clone, Default)]
pub struct BlobLayer {
    pub features: FeatureSet,
    pub blobs: Vec<Blob>,
}

impl BlobLayer {
    /// Aggregates `preserved` under `jump_distance` and weights each blob.
    pub fn build<S: GeometryService + ?Sized>(
        service: &S,
        preserved: &FeatureSet,
        jump_distance: f64,
        unit: AreaUnit,
        weighter: BlobWeighter,
    ) -> Result<Self, GeometryError> {
        let features = service.aggregate_polygons(preserved, jump_distance)?;
        let areas = service.compute_area(&features, unit)?;
        let blobs = features
            .iter()
            .zip(areas)
            .map(|(feature, area)| Blob {
                id: feature.id,
                area,
                weighted_area: weighter.weight(area),
            })
            .collect();
        Ok(Self { features, blobs })
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Weighted areas aligned with `features`.
    pub fn weighted_areas(&self) -> Vec<f64> {
        self.blobs.iter().map(|blob| blob.weighted_area).collect()
    }

    pub fn largest_area(&self) -> f64 {
        self.blobs
            .iter()
            .map(|blob| blob.area)
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{features::Feature, geometry::Polygon, service::PlanarGeometryService};

    #[test]
    fn tiers_when_deprioritising() {
        assert_eq!(weight(499.0, true), 249.5);
        assert_eq!(weight(500.0, true), 0.0);
        assert_eq!(weight(250.0, true), 125.0);
        assert_eq!(weight(249.9, true), 249.9);
        assert_eq!(weight(100.0, true), 100.0);
    }

    #[test]
    fn identity_without_deprioritising() {
        for area in [0.0, 100.0, 249.9, 250.0, 499.0, 500.0, 10_000.0] {
            assert_eq!(weight(area, false), area);
        }
    }

    #[test]
    fn layer_weights_each_aggregated_blob() {
        let preserved: FeatureSet = vec![
            Feature::new(FeatureId(1), Polygon::square([0.0, 0.0], 20.0)),
            Feature::new(FeatureId(2), Polygon::square([20.0, 0.0], 10.0)),
            Feature::new(FeatureId(3), Polygon::square([100.0, 0.0], 10.0)),
        ]
        .into_iter()
        .collect();

        let layer = BlobLayer::build(
            &PlanarGeometryService,
            &preserved,
            0.0,
            AreaUnit::Native,
            BlobWeighter::new(true),
        )
        .expect("blob layer");

        assert_eq!(layer.len(), 2);
        assert_eq!(layer.blobs[0].area, 500.0);
        assert_eq!(layer.blobs[0].weighted_area, 0.0);
        assert_eq!(layer.blobs[1].weighted_area, 100.0);
        assert_eq!(layer.largest_area(), 500.0);
    }
}
