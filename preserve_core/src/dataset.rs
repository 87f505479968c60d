//! GeoJSON-style feature collections on disk.
//!
//! Only `Polygon` and `MultiPolygon` geometries are accepted. Every feature
//! needs a numeric `id`; `properties` are carried through untouched apart
//! from the status and score fields the simulation owns.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    features::{Attributes, Feature, FeatureId, FeatureSet},
    geometry::{MultiPolygon, Point, Polygon},
    service::GeometryError,
};

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
enum GeometryRecord {
    Polygon(Vec<Vec<Point>>),
    MultiPolygon(Vec<Vec<Vec<Point>>>),
}

impl From<GeometryRecord> for MultiPolygon {
    fn from(record: GeometryRecord) -> Self {
        match record {
            GeometryRecord::Polygon(rings) => Polygon::from_rings(rings).into(),
            GeometryRecord::MultiPolygon(parts) => {
                MultiPolygon::new(parts.into_iter().map(Polygon::from_rings).collect())
            }
        }
    }
}

impl From<&MultiPolygon> for GeometryRecord {
    fn from(geometry: &MultiPolygon) -> Self {
        let mut parts = geometry.rings();
        if parts.len() == 1 {
            GeometryRecord::Polygon(parts.remove(0))
        } else {
            GeometryRecord::MultiPolygon(parts)
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
struct FeatureRecord {
    id: FeatureId,
    geometry: GeometryRecord,
    #[serde(default)]
    properties: Attributes,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
struct CollectionRecord {
    features: Vec<FeatureRecord>,
}

pub fn parse_feature_collection(json: &str) -> Result<FeatureSet, GeometryError> {
    let collection: CollectionRecord = serde_json::from_str(json)?;
    Ok(collection
        .features
        .into_iter()
        .map(|record| Feature {
            id: record.id,
            geometry: record.geometry.into(),
            attributes: record.properties,
        })
        .collect())
}

pub fn feature_collection_to_string(features: &FeatureSet) -> Result<String, GeometryError> {
    let collection = CollectionRecord {
        features: features
            .iter()
            .map(|feature| FeatureRecord {
                id: feature.id,
                geometry: (&feature.geometry).into(),
                properties: feature.attributes.clone(),
            })
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&collection)?)
}

pub fn read_feature_collection(path: &Path) -> Result<FeatureSet, GeometryError> {
    let contents = fs::read_to_string(path).map_err(|source| GeometryError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_feature_collection(&contents)
}

pub fn write_feature_collection(path: &Path, features: &FeatureSet) -> Result<(), GeometryError> {
    let contents = feature_collection_to_string(features)?;
    fs::write(path, contents).map_err(|source| GeometryError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "id": 7,
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0, 0], [2, 0], [2, 2], [0, 2], [0, 0]]]
                },
                "properties": { "Status": 1, "Owner": "county" }
            },
            {
                "type": "Feature",
                "id": 8,
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[5, 0], [6, 0], [6, 1], [5, 1]]],
                        [[[8, 0], [9, 0], [9, 1], [8, 1]]]
                    ]
                }
            }
        ]
    }"#;

    #[test]
    fn parses_polygons_and_multipolygons() {
        let set = parse_feature_collection(SAMPLE).expect("parse");
        assert_eq!(set.ids(), vec![FeatureId(7), FeatureId(8)]);

        let first = set.get(FeatureId(7)).expect("feature 7");
        assert_eq!(first.geometry.area(), 4.0);
        assert_eq!(first.attribute("Owner"), Some(&serde_json::json!("county")));

        let second = set.get(FeatureId(8)).expect("feature 8");
        assert_eq!(second.geometry.len(), 2);
        assert!(second.attributes.is_empty());
    }

    #[test]
    fn written_collection_parses_back() {
        let set = parse_feature_collection(SAMPLE).expect("parse");
        let text = feature_collection_to_string(&set).expect("serialise");
        let value: serde_json::Value = serde_json::from_str(&text).expect("json");
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"][0]["geometry"]["type"], "Polygon");
        assert_eq!(value["features"][1]["geometry"]["type"], "MultiPolygon");

        assert_eq!(parse_feature_collection(&text).expect("reparse"), set);
    }

    #[test]
    fn unsupported_geometry_is_a_format_error() {
        let json = r#"{ "type": "FeatureCollection", "features": [
            { "type": "Feature", "id": 1, "geometry": { "type": "Point", "coordinates": [0, 0] } }
        ] }"#;
        assert!(matches!(
            parse_feature_collection(json),
            Err(GeometryError::Format(_))
        ));
    }
}
