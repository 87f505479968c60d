//! Geometry collaborator interface and the bundled planar implementation.
//!
//! The ranking core only talks to geometry through [`GeometryService`]; the
//! bundled [`PlanarGeometryService`] keeps everything in memory and indexes
//! envelopes with an R-tree so near queries stay sub-quadratic on real parcel
//! layers.

use std::{collections::HashSet, io, path::PathBuf};

use rayon::prelude::*;
use rstar::{
    primitives::{GeomWithData, Rectangle},
    RTree,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    features::{AttributePredicate, Feature, FeatureId, FeatureSet},
    geometry::{InvalidGeometry, MultiPolygon},
};

const SQUARE_FEET_PER_ACRE: f64 = 43_560.0;
const SQUARE_METERS_PER_ACRE: f64 = 4_046.856_422_4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaUnit {
    /// Square coordinate units, unconverted.
    #[default]
    Native,
    AcresFromFeet,
    AcresFromMeters,
}

impl AreaUnit {
    pub fn convert(self, square_units: f64) -> f64 {
        match self {
            AreaUnit::Native => square_units,
            AreaUnit::AcresFromFeet => square_units / SQUARE_FEET_PER_ACRE,
            AreaUnit::AcresFromMeters => square_units / SQUARE_METERS_PER_ACRE,
        }
    }
}

/// One row of a near table: `to` lies within the jump distance of `from`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearEntry {
    pub from: FeatureId,
    pub to: FeatureId,
    pub distance: f64,
}

/// Target side of a near query.
#[derive(Debug, Clone, Copy)]
pub enum NearTarget<'a> {
    /// Query the source set against itself, never pairing a feature with itself.
    SameSet,
    Other(&'a FeatureSet),
}

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("feature {id} has invalid geometry: {source}")]
    InvalidGeometry {
        id: FeatureId,
        #[source]
        source: InvalidGeometry,
    },
    #[error("feature id {0} appears more than once")]
    DuplicateFeature(FeatureId),
    #[error("distance threshold must be finite and non-negative, got {0}")]
    InvalidDistance(f64),
    #[error("failed to read parcels from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write parcels to {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed feature collection: {0}")]
    Format(#[from] serde_json::Error),
}

/// Operations the ranking core needs from a feature store.
pub trait GeometryService {
    fn select_by_attribute(
        &self,
        layer: &FeatureSet,
        predicate: &AttributePredicate,
    ) -> Result<FeatureSet, GeometryError>;

    /// Copies a loaded layer, rejecting duplicate ids and invalid geometry.
    /// Later operations assume their input passed through here.
    fn copy_features(&self, layer: &FeatureSet) -> Result<FeatureSet, GeometryError>;

    /// Merges features lying within `jump_distance` of each other into
    /// multi-part features. Output ids are sequential from zero.
    fn aggregate_polygons(
        &self,
        features: &FeatureSet,
        jump_distance: f64,
    ) -> Result<FeatureSet, GeometryError>;

    /// Areas in `unit`, aligned with the order of `features`.
    fn compute_area(&self, features: &FeatureSet, unit: AreaUnit)
        -> Result<Vec<f64>, GeometryError>;

    /// Every `(from, to)` pair within `jump_distance`, grouped by source in
    /// source order and by ascending distance within a source.
    fn generate_near_table(
        &self,
        from: &FeatureSet,
        to: NearTarget<'_>,
        jump_distance: f64,
    ) -> Result<Vec<NearEntry>, GeometryError>;

    fn merge_feature_sets(&self, sets: Vec<FeatureSet>) -> Result<FeatureSet, GeometryError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarGeometryService;

impl PlanarGeometryService {
    pub fn new() -> Self {
        Self
    }
}

type IndexedEnvelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

fn envelope_index(features: &FeatureSet) -> RTree<IndexedEnvelope> {
    let entries = features
        .iter()
        .enumerate()
        .filter_map(|(idx, feature)| {
            let rect = feature.geometry.bounding_rect()?;
            let corners = ([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
            Some(GeomWithData::new(
                Rectangle::from_corners(corners.0, corners.1),
                idx,
            ))
        })
        .collect();
    RTree::bulk_load(entries)
}

/// Index entries whose envelope might lie within `distance` of `geometry`.
/// A superset; callers still check the exact distance.
fn candidates_within(
    index: &RTree<IndexedEnvelope>,
    geometry: &MultiPolygon,
    distance: f64,
) -> Vec<usize> {
    let Some(rect) = geometry.bounding_rect() else {
        return Vec::new();
    };
    let center = rect.center();
    let radius = rect.width().hypot(rect.height()) / 2.0 + distance;
    index
        .locate_within_distance([center.x, center.y], radius * radius)
        .map(|entry| entry.data)
        .collect()
}

fn validate_set(features: &FeatureSet) -> Result<(), GeometryError> {
    let mut seen = HashSet::with_capacity(features.len());
    for feature in features {
        if !seen.insert(feature.id) {
            return Err(GeometryError::DuplicateFeature(feature.id));
        }
        feature
            .geometry
            .validate()
            .map_err(|source| GeometryError::InvalidGeometry {
                id: feature.id,
                source,
            })?;
    }
    Ok(())
}

fn validate_distance(distance: f64) -> Result<(), GeometryError> {
    if distance.is_finite() && distance >= 0.0 {
        Ok(())
    } else {
        Err(GeometryError::InvalidDistance(distance))
    }
}

fn find_root(parents: &mut [usize], mut idx: usize) -> usize {
    while parents[idx] != idx {
        parents[idx] = parents[parents[idx]];
        idx = parents[idx];
    }
    idx
}

impl GeometryService for PlanarGeometryService {
    fn select_by_attribute(
        &self,
        layer: &FeatureSet,
        predicate: &AttributePredicate,
    ) -> Result<FeatureSet, GeometryError> {
        Ok(layer
            .iter()
            .filter(|feature| predicate.matches(feature))
            .cloned()
            .collect())
    }

    fn copy_features(&self, layer: &FeatureSet) -> Result<FeatureSet, GeometryError> {
        validate_set(layer)?;
        Ok(layer.clone())
    }

    fn aggregate_polygons(
        &self,
        features: &FeatureSet,
        jump_distance: f64,
    ) -> Result<FeatureSet, GeometryError> {
        validate_distance(jump_distance)?;

        let index = envelope_index(features);
        let members = features.features();
        let mut parents: Vec<usize> = (0..members.len()).collect();
        for (idx, feature) in members.iter().enumerate() {
            for other in candidates_within(&index, &feature.geometry, jump_distance) {
                if other <= idx {
                    continue;
                }
                if feature.geometry.distance(&members[other].geometry) <= jump_distance {
                    let a = find_root(&mut parents, idx);
                    let b = find_root(&mut parents, other);
                    if a != b {
                        parents[a.max(b)] = a.min(b);
                    }
                }
            }
        }

        // Roots are always the lowest member index, so blobs come out ordered
        // by their first member.
        let mut blob_of_root: Vec<Option<usize>> = vec![None; members.len()];
        let mut blobs: Vec<(MultiPolygon, Vec<FeatureId>)> = Vec::new();
        for (idx, feature) in members.iter().enumerate() {
            let root = find_root(&mut parents, idx);
            let slot = *blob_of_root[root].get_or_insert_with(|| {
                blobs.push((MultiPolygon::default(), Vec::new()));
                blobs.len() - 1
            });
            let (geometry, ids) = &mut blobs[slot];
            geometry.extend(feature.geometry.clone());
            ids.push(feature.id);
        }

        Ok(blobs
            .into_iter()
            .enumerate()
            .map(|(blob_idx, (geometry, ids))| {
                let ids: Vec<u64> = ids.into_iter().map(|id| id.0).collect();
                Feature::new(FeatureId(blob_idx as u64), geometry).with_attribute("members", ids)
            })
            .collect())
    }

    fn compute_area(
        &self,
        features: &FeatureSet,
        unit: AreaUnit,
    ) -> Result<Vec<f64>, GeometryError> {
        Ok(features
            .iter()
            .map(|feature| unit.convert(feature.geometry.area()))
            .collect())
    }

    fn generate_near_table(
        &self,
        from: &FeatureSet,
        to: NearTarget<'_>,
        jump_distance: f64,
    ) -> Result<Vec<NearEntry>, GeometryError> {
        validate_distance(jump_distance)?;
        let (targets, same_set) = match to {
            NearTarget::SameSet => (from, true),
            NearTarget::Other(targets) => (targets, false),
        };
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let index = envelope_index(targets);
        let target_features = targets.features();
        let per_source: Vec<Vec<NearEntry>> = from
            .features()
            .par_iter()
            .enumerate()
            .map(|(src_idx, source)| {
                let mut hits: Vec<(f64, usize)> =
                    candidates_within(&index, &source.geometry, jump_distance)
                        .into_iter()
                        .filter(|&target_idx| !(same_set && target_idx == src_idx))
                        .filter_map(|target_idx| {
                            let distance = source
                                .geometry
                                .distance(&target_features[target_idx].geometry);
                            (distance <= jump_distance).then_some((distance, target_idx))
                        })
                        .collect();
                hits.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                hits.into_iter()
                    .map(|(distance, target_idx)| NearEntry {
                        from: source.id,
                        to: target_features[target_idx].id,
                        distance,
                    })
                    .collect()
            })
            .collect();

        Ok(per_source.into_iter().flatten().collect())
    }

    fn merge_feature_sets(&self, sets: Vec<FeatureSet>) -> Result<FeatureSet, GeometryError> {
        let mut seen = HashSet::new();
        let mut merged = FeatureSet::default();
        for feature in sets.into_iter().flatten() {
            if !seen.insert(feature.id) {
                return Err(GeometryError::DuplicateFeature(feature.id));
            }
            merged.push(feature);
        }
        Ok(merged)
    }
}
