//! Planar polygon primitives backed by `geo`.
//!
//! Coordinates are assumed to be in a projected (planar) reference system, so
//! areas and distances are Euclidean. Constructors take GeoJSON-style rings:
//! the first ring is the exterior, any further rings are holes. Rings may be
//! given open or closed; they are stored closed.

use std::collections::HashSet;

use geo::{Area, BoundingRect, EuclideanDistance, LineString, Rect};

pub type Point = [f64; 2];

fn ring_points(ring: &LineString<f64>) -> Vec<Point> {
    ring.coords().map(|c| [c.x, c.y]).collect()
}

fn validate_ring(ring: &LineString<f64>) -> Result<(), InvalidGeometry> {
    if ring.coords().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(InvalidGeometry::NonFiniteCoordinate);
    }
    let distinct: HashSet<(u64, u64)> = ring
        .coords()
        .map(|c| (c.x.to_bits(), c.y.to_bits()))
        .collect();
    if distinct.len() < 3 {
        return Err(InvalidGeometry::DegenerateRing {
            vertices: distinct.len(),
        });
    }
    Ok(())
}

fn polygon_rings(polygon: &geo::Polygon<f64>) -> Vec<Vec<Point>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(ring_points)
        .collect()
}

fn validate_polygon(polygon: &geo::Polygon<f64>) -> Result<(), InvalidGeometry> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .try_for_each(validate_ring)
}

/// A single polygon: exterior ring followed by zero or more holes.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon(geo::Polygon<f64>);

impl Polygon {
    pub fn new(exterior: Vec<Point>) -> Self {
        Self::with_holes(exterior, Vec::new())
    }

    pub fn with_holes(exterior: Vec<Point>, holes: Vec<Vec<Point>>) -> Self {
        Self(geo::Polygon::new(
            LineString::from(exterior),
            holes.into_iter().map(LineString::from).collect(),
        ))
    }

    /// Builds a polygon from GeoJSON ring order. No rings gives an empty
    /// exterior, which fails validation.
    pub fn from_rings(rings: Vec<Vec<Point>>) -> Self {
        let mut rings = rings.into_iter();
        let exterior = rings.next().unwrap_or_default();
        Self::with_holes(exterior, rings.collect())
    }

    /// Axis-aligned square with its lower-left corner at `origin`.
    pub fn square(origin: Point, side: f64) -> Self {
        let [x, y] = origin;
        Self::new(vec![
            [x, y],
            [x + side, y],
            [x + side, y + side],
            [x, y + side],
        ])
    }

    pub fn as_geo(&self) -> &geo::Polygon<f64> {
        &self.0
    }

    /// Closed rings, exterior first.
    pub fn rings(&self) -> Vec<Vec<Point>> {
        polygon_rings(&self.0)
    }

    pub fn area(&self) -> f64 {
        self.0.unsigned_area()
    }

    /// Minimum planar distance to `other`; zero when the boundaries touch or
    /// cross, or when one polygon lies inside the other.
    pub fn distance(&self, other: &Polygon) -> f64 {
        self.0.euclidean_distance(&other.0)
    }
}

impl From<geo::Polygon<f64>> for Polygon {
    fn from(polygon: geo::Polygon<f64>) -> Self {
        Self(polygon)
    }
}

/// One or more polygons treated as a single shape (a parcel or a blob).
#[derive(Debug, Clone, PartialEq)]
pub struct MultiPolygon(geo::MultiPolygon<f64>);

impl Default for MultiPolygon {
    fn default() -> Self {
        Self(geo::MultiPolygon::new(Vec::new()))
    }
}

impl MultiPolygon {
    pub fn new(parts: Vec<Polygon>) -> Self {
        Self(geo::MultiPolygon::new(
            parts.into_iter().map(|part| part.0).collect(),
        ))
    }

    pub fn as_geo(&self) -> &geo::MultiPolygon<f64> {
        &self.0
    }

    /// Number of polygon parts.
    pub fn len(&self) -> usize {
        self.0 .0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0 .0.is_empty()
    }

    /// Closed rings of every part, in GeoJSON `MultiPolygon` layout.
    pub fn rings(&self) -> Vec<Vec<Vec<Point>>> {
        self.0.iter().map(polygon_rings).collect()
    }

    pub fn extend(&mut self, other: MultiPolygon) {
        self.0 .0.extend(other.0 .0);
    }

    pub fn area(&self) -> f64 {
        self.0.unsigned_area()
    }

    /// `None` for a geometry without coordinates.
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.0.bounding_rect()
    }

    /// Minimum distance between any part of `self` and any part of `other`.
    pub fn distance(&self, other: &MultiPolygon) -> f64 {
        let mut best = f64::INFINITY;
        for a in self.0.iter() {
            for b in other.0.iter() {
                best = best.min(a.euclidean_distance(b));
                if best == 0.0 {
                    return 0.0;
                }
            }
        }
        best
    }

    pub fn validate(&self) -> Result<(), InvalidGeometry> {
        if self.is_empty() {
            return Err(InvalidGeometry::Empty);
        }
        self.0.iter().try_for_each(validate_polygon)
    }
}

impl From<Polygon> for MultiPolygon {
    fn from(polygon: Polygon) -> Self {
        Self(geo::MultiPolygon::new(vec![polygon.0]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidGeometry {
    #[error("geometry has no parts")]
    Empty,
    #[error("ring has {vertices} distinct vertices, at least 3 required")]
    DegenerateRing { vertices: usize },
    #[error("coordinate is not finite")]
    NonFiniteCoordinate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_area_and_hole() {
        let square = Polygon::square([0.0, 0.0], 4.0);
        assert_eq!(square.area(), 16.0);

        let hole = Polygon::square([1.0, 1.0], 2.0).rings().remove(0);
        let donut = Polygon::with_holes(square.rings().remove(0), vec![hole]);
        assert_eq!(donut.area(), 12.0);
    }

    #[test]
    fn open_rings_are_stored_closed() {
        let open = Polygon::new(vec![[0.0, 0.0], [2.0, 0.0], [2.0, 3.0], [0.0, 3.0]]);
        let closed = Polygon::new(vec![
            [0.0, 0.0],
            [2.0, 0.0],
            [2.0, 3.0],
            [0.0, 3.0],
            [0.0, 0.0],
        ]);
        assert_eq!(open, closed);
        assert_eq!(open.area(), 6.0);
        assert_eq!(open.rings()[0].len(), 5);
    }

    #[test]
    fn touching_squares_have_zero_distance() {
        let a = Polygon::square([0.0, 0.0], 1.0);
        let edge = Polygon::square([1.0, 0.0], 1.0);
        let corner = Polygon::square([1.0, 1.0], 1.0);
        let partial_edge = Polygon::square([1.0, 0.5], 1.0);
        assert_eq!(a.distance(&edge), 0.0);
        assert_eq!(a.distance(&corner), 0.0);
        assert_eq!(a.distance(&partial_edge), 0.0);
    }

    #[test]
    fn separated_squares_measure_gap() {
        let a = Polygon::square([0.0, 0.0], 1.0);
        let b = Polygon::square([3.0, 0.0], 1.0);
        assert!((a.distance(&b) - 2.0).abs() < 1e-12);

        let diagonal = Polygon::square([2.0, 2.0], 1.0);
        assert!((a.distance(&diagonal) - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn contained_polygon_is_zero_distance_unless_in_hole() {
        let outer = Polygon::square([0.0, 0.0], 10.0);
        let inner = Polygon::square([4.0, 4.0], 1.0);
        assert_eq!(outer.distance(&inner), 0.0);
        assert_eq!(inner.distance(&outer), 0.0);

        let hole = Polygon::square([2.0, 2.0], 6.0).rings().remove(0);
        let ring = Polygon::with_holes(outer.rings().remove(0), vec![hole]);
        assert!((ring.distance(&inner) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn multipolygon_distance_uses_nearest_part() {
        let blob = MultiPolygon::new(vec![
            Polygon::square([0.0, 0.0], 1.0),
            Polygon::square([10.0, 0.0], 1.0),
        ]);
        let other = MultiPolygon::from(Polygon::square([12.5, 0.0], 1.0));
        assert!((blob.distance(&other) - 1.5).abs() < 1e-12);
        assert_eq!(blob.area(), 2.0);

        let rect = blob.bounding_rect().expect("bounds");
        assert_eq!((rect.min().x, rect.max().x), (0.0, 11.0));
    }

    #[test]
    fn validation_rejects_degenerate_rings() {
        let sliver = MultiPolygon::from(Polygon::new(vec![[0.0, 0.0], [1.0, 0.0], [0.0, 0.0]]));
        assert_eq!(
            sliver.validate(),
            Err(InvalidGeometry::DegenerateRing { vertices: 2 })
        );

        let nan = MultiPolygon::from(Polygon::new(vec![[0.0, 0.0], [f64::NAN, 0.0], [0.0, 1.0]]));
        assert_eq!(nan.validate(), Err(InvalidGeometry::NonFiniteCoordinate));

        let no_rings = MultiPolygon::from(Polygon::from_rings(Vec::new()));
        assert_eq!(
            no_rings.validate(),
            Err(InvalidGeometry::DegenerateRing { vertices: 0 })
        );

        assert_eq!(MultiPolygon::default().validate(), Err(InvalidGeometry::Empty));
    }
}
