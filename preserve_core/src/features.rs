use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::geometry::MultiPolygon;

/// Stable parcel identity, carried unchanged through every round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(pub u64);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type Attributes = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: FeatureId,
    pub geometry: MultiPolygon,
    pub attributes: Attributes,
}

impl Feature {
    pub fn new(id: FeatureId, geometry: impl Into<MultiPolygon>) -> Self {
        Self {
            id,
            geometry: geometry.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set_attribute(key, value);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn set_attribute(&mut self, key: &str, value: impl Into<Value>) {
        self.attributes.insert(key.to_string(), value.into());
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }
}

/// Ordered collection of features. Enumeration order is significant: the
/// preservation selector breaks score ties by it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    features: Vec<Feature>,
}

impl FeatureSet {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Feature> {
        self.features.iter_mut()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn get(&self, id: FeatureId) -> Option<&Feature> {
        self.features.iter().find(|feature| feature.id == id)
    }

    pub fn ids(&self) -> Vec<FeatureId> {
        self.features.iter().map(|feature| feature.id).collect()
    }

    pub fn into_features(self) -> Vec<Feature> {
        self.features
    }
}

impl FromIterator<Feature> for FeatureSet {
    fn from_iter<T: IntoIterator<Item = Feature>>(iter: T) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FeatureSet {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

impl<'a> IntoIterator for &'a FeatureSet {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

/// Attribute filter understood by [`crate::service::GeometryService::select_by_attribute`].
#[derive(Debug, Clone, PartialEq)]
pub enum AttributePredicate {
    /// Preservation flag read from the named status field.
    Status { field: String, preserved: bool },
    /// Plain equality against a JSON value.
    Equals { field: String, value: Value },
}

impl AttributePredicate {
    pub fn preserved(field: &str) -> Self {
        Self::Status {
            field: field.to_string(),
            preserved: true,
        }
    }

    pub fn unpreserved(field: &str) -> Self {
        Self::Status {
            field: field.to_string(),
            preserved: false,
        }
    }

    pub fn matches(&self, feature: &Feature) -> bool {
        match self {
            Self::Status { field, preserved } => {
                matches!(read_status(feature, field), Ok(flag) if flag == *preserved)
            }
            Self::Equals { field, value } => feature.attribute(field) == Some(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("feature {id} has unrecognised {field} value {value}")]
pub struct StatusError {
    pub id: FeatureId,
    pub field: String,
    pub value: Value,
}

/// Reads the preservation flag. `1`/`true` is preserved; `0`/`false`, null or
/// a missing field is unpreserved.
pub fn read_status(feature: &Feature, field: &str) -> Result<bool, StatusError> {
    let invalid = |value: &Value| StatusError {
        id: feature.id,
        field: field.to_string(),
        value: value.clone(),
    };
    match feature.attribute(field) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(value @ Value::Number(number)) => match number.as_f64() {
            Some(n) if n == 1.0 => Ok(true),
            Some(n) if n == 0.0 => Ok(false),
            _ => Err(invalid(value)),
        },
        Some(value) => Err(invalid(value)),
    }
}

/// Writes the preservation flag, keeping a boolean field boolean.
pub fn write_status(feature: &mut Feature, field: &str, preserved: bool) {
    let value = match feature.attribute(field) {
        Some(Value::Bool(_)) => Value::Bool(preserved),
        _ => Value::from(u8::from(preserved)),
    };
    feature.set_attribute(field, value);
}
