#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Once;

use preserve_core::{
    features::read_status, geometry::Polygon, Feature, FeatureId, FeatureSet, RunConfig,
};

static INIT: Once = Once::new();

pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = fixture_path("test_run_config.json");

        debug_assert!(
            config_path.exists(),
            "missing test run config at {}",
            config_path.display()
        );

        std::env::set_var(preserve_core::config::RUN_CONFIG_PATH_ENV, &config_path);
    });
}

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// The fixture config, loaded directly rather than through the environment.
pub fn test_config() -> RunConfig {
    RunConfig::from_file(&fixture_path("test_run_config.json")).expect("fixture config")
}

/// Unit-square parcels laid out `columns` wide and `rows` high. Parcel ids
/// run row by row from 1; every parcel in a listed column starts preserved.
pub fn grid(columns: u32, rows: u32, preserved_columns: &[u32]) -> FeatureSet {
    (0..rows)
        .flat_map(|row| (0..columns).map(move |col| (col, row)))
        .map(|(col, row)| {
            let id = u64::from(row * columns + col + 1);
            let status = i64::from(preserved_columns.contains(&col));
            Feature::new(
                FeatureId(id),
                Polygon::square([f64::from(col), f64::from(row)], 1.0),
            )
            .with_attribute("Status", status)
        })
        .collect()
}

pub fn preserved_count(layer: &FeatureSet) -> usize {
    layer
        .iter()
        .filter(|parcel| read_status(parcel, "Status").expect("status"))
        .count()
}

pub fn score(layer: &FeatureSet, id: u64, field: &str) -> Option<i64> {
    layer
        .get(FeatureId(id))
        .and_then(|parcel| parcel.attribute(field))
        .and_then(|value| value.as_i64())
}

pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("block_grower_{}_{}", std::process::id(), name))
}
