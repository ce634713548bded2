//! Minimal geodetic geometry for sources and sites.
//!
//! Only what source splitting, rupture counting and distance filtering need:
//! points on a spherical earth, polylines, polygons that can be discretized
//! into a regular mesh, and collections of sites.

use std::{f64::consts::PI, fmt};

use serde::{Deserialize, Serialize};

/// Mean earth radius, in kilometres.
pub const EARTH_RADIUS: f64 = 6371.0;

/// Length of one degree of latitude, in kilometres.
const KM_PER_DEGREE: f64 = EARTH_RADIUS * PI / 180.0;

/// Errors raised when building geometry from invalid input.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GeometryError {
    /// A mesh spacing is not a finite, strictly positive distance.
    #[error("Mesh spacing must be a positive number of kilometres, got {0}")]
    InvalidSpacing(f64),

    /// A polygon has fewer than three vertices.
    #[error("A polygon needs at least 3 vertices, got {0}")]
    DegeneratePolygon(usize),
}

/// Distance between the nodes of a mesh, in kilometres.
///
/// Always finite and strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Spacing(f64);

impl Spacing {
    /// Creates a spacing of `km` kilometres.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::InvalidSpacing`] unless `km` is finite and
    /// greater than zero.
    pub const fn new(km: f64) -> Result<Self, GeometryError> {
        if km.is_finite() && km > 0.0 {
            Ok(Self(km))
        } else {
            Err(GeometryError::InvalidSpacing(km))
        }
    }

    /// The spacing in kilometres.
    #[must_use]
    pub const fn km(self) -> f64 {
        self.0
    }
}

impl Default for Spacing {
    /// A 10 km mesh.
    fn default() -> Self {
        Self(10.0)
    }
}

impl TryFrom<f64> for Spacing {
    type Error = GeometryError;

    fn try_from(km: f64) -> Result<Self, Self::Error> {
        Self::new(km)
    }
}

impl From<Spacing> for f64 {
    fn from(spacing: Spacing) -> Self {
        spacing.0
    }
}

impl fmt::Display for Spacing {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} km", self.0)
    }
}

/// A location given by longitude, latitude (decimal degrees) and depth (km).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Longitude in decimal degrees.
    pub lon: f64,
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Depth in kilometres, positive downwards.
    #[serde(default)]
    pub depth: f64,
}

impl Point {
    /// Creates a point at the surface.
    #[must_use]
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self {
            lon,
            lat,
            depth: 0.0,
        }
    }

    /// Creates a point at the given depth.
    #[must_use]
    pub const fn with_depth(lon: f64, lat: f64, depth: f64) -> Self {
        Self { lon, lat, depth }
    }

    /// Great-circle distance to `other`, ignoring depth.
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        geodetic_distance(self.lon, self.lat, other.lon, other.lat)
    }

    /// Straight-line distance to `other`, taking depth into account.
    #[must_use]
    pub fn distance_3d(&self, other: &Self) -> f64 {
        self.distance(other).hypot(self.depth - other.depth)
    }
}

/// Haversine distance between two surface locations, in kilometres.
#[must_use]
pub fn geodetic_distance(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS * a.sqrt().clamp(-1.0, 1.0).asin()
}

/// Smallest distance from `site` to any of `points`.
///
/// Returns `None` when `points` is empty.
pub fn min_distance<'a>(site: &Point, points: impl IntoIterator<Item = &'a Point>) -> Option<f64> {
    points
        .into_iter()
        .map(|point| site.distance(point))
        .reduce(f64::min)
}

/// An ordered sequence of points, such as a fault trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Line {
    points: Vec<Point>,
}

impl Line {
    /// Creates a line through the given points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// The vertices of the line.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Total surface length of the line, in kilometres.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| pair[0].distance(&pair[1]))
            .sum()
    }
}

/// A closed polygon on the earth's surface.
///
/// The ring is implicitly closed: the last vertex connects back to the first.
/// A polygon always has at least three vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct Polygon {
    vertices: Vec<Point>,
}

impl Polygon {
    /// Creates a polygon from its vertices.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::DegeneratePolygon`] if there are fewer than
    /// three vertices.
    pub fn new(vertices: Vec<Point>) -> Result<Self, GeometryError> {
        if vertices.len() < 3 {
            return Err(GeometryError::DegeneratePolygon(vertices.len()));
        }
        Ok(Self { vertices })
    }

    /// The vertices of the polygon.
    #[must_use]
    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    /// Whether `point` lies inside the polygon (even-odd rule in lon/lat).
    #[must_use]
    pub fn contains(&self, point: &Point) -> bool {
        let n = self.vertices.len();
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (a, b) = (&self.vertices[i], &self.vertices[j]);
            if (a.lat > point.lat) != (b.lat > point.lat) {
                let crossing = (b.lon - a.lon) * (point.lat - a.lat) / (b.lat - a.lat) + a.lon;
                if point.lon < crossing {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// Distance from `site` to the polygon: zero inside, otherwise the
    /// distance to the closest vertex.
    #[must_use]
    pub fn distance_to(&self, site: &Point) -> f64 {
        if self.contains(site) {
            0.0
        } else {
            min_distance(site, &self.vertices).unwrap_or(f64::INFINITY)
        }
    }

    /// Discretizes the polygon into a regular mesh of points `step` apart.
    ///
    /// The grid is aligned on the south-west corner of the bounding box and
    /// only nodes inside the polygon are kept. A polygon too small to contain
    /// any node is represented by its centroid, so the mesh is never empty.
    #[must_use]
    pub fn discretize(&self, step: Spacing) -> Vec<Point> {
        let Some(bbox) = BoundingBox::of(&self.vertices) else {
            return vec![self.centroid()];
        };

        let lat_step = step.km() / KM_PER_DEGREE;
        let mid_lat = ((bbox.south + bbox.north) / 2.0).to_radians();
        let lon_step = lat_step / mid_lat.cos().max(f64::EPSILON);

        let mut mesh = Vec::new();
        let mut lat = bbox.south + lat_step / 2.0;
        while lat <= bbox.north {
            let mut lon = bbox.west + lon_step / 2.0;
            while lon <= bbox.east {
                let node = Point::new(lon, lat);
                if self.contains(&node) {
                    mesh.push(node);
                }
                lon += lon_step;
            }
            lat += lat_step;
        }

        if mesh.is_empty() {
            mesh.push(self.centroid());
        }
        mesh
    }

    fn centroid(&self) -> Point {
        #[allow(clippy::cast_precision_loss)]
        let n = self.vertices.len() as f64;
        let lon = self.vertices.iter().map(|p| p.lon).sum::<f64>() / n;
        let lat = self.vertices.iter().map(|p| p.lat).sum::<f64>() / n;
        Point::new(lon, lat)
    }
}

struct BoundingBox {
    west: f64,
    east: f64,
    south: f64,
    north: f64,
}

impl BoundingBox {
    fn of(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let init = Self {
            west: first.lon,
            east: first.lon,
            south: first.lat,
            north: first.lat,
        };
        Some(points.iter().fold(init, |bbox, p| Self {
            west: bbox.west.min(p.lon),
            east: bbox.east.max(p.lon),
            south: bbox.south.min(p.lat),
            north: bbox.north.max(p.lat),
        }))
    }
}

/// A site at which hazard is computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// Location of the site.
    #[serde(flatten)]
    pub location: Point,
}

impl TryFrom<Vec<Point>> for Polygon {
    type Error = GeometryError;

    fn try_from(vertices: Vec<Point>) -> Result<Self, Self::Error> {
        Self::new(vertices)
    }
}

impl From<Polygon> for Vec<Point> {
    fn from(polygon: Polygon) -> Self {
        polygon.vertices
    }
}

impl Site {
    /// Creates a site at the given surface location.
    #[must_use]
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self {
            location: Point::new(lon, lat),
        }
    }
}

/// An ordered collection of sites.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteCollection {
    sites: Vec<Site>,
}

impl SiteCollection {
    /// Creates a collection from the given sites.
    #[must_use]
    pub const fn new(sites: Vec<Site>) -> Self {
        Self { sites }
    }

    /// Number of sites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Whether the collection holds no sites.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Iterates over the sites in order.
    pub fn iter(&self) -> impl Iterator<Item = &Site> + '_ {
        self.sites.iter()
    }
}

impl FromIterator<Site> for SiteCollection {
    fn from_iter<I: IntoIterator<Item = Site>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a SiteCollection {
    type Item = &'a Site;
    type IntoIter = std::slice::Iter<'a, Site>;

    fn into_iter(self) -> Self::IntoIter {
        self.sites.iter()
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn km(value: f64) -> Spacing {
        Spacing::new(value).unwrap()
    }

    fn unit_square() -> Polygon {
        Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ])
        .unwrap()
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = geodetic_distance(0.0, 0.0, 0.0, 1.0);
        assert!((d - KM_PER_DEGREE).abs() < 1e-9);
    }

    #[test]
    fn distance_3d_includes_depth() {
        let a = Point::with_depth(10.0, 45.0, 0.0);
        let b = Point::with_depth(10.0, 45.0, 12.0);
        assert!((a.distance_3d(&b) - 12.0).abs() < 1e-9);
    }

    #[test]
    fn contains_inside_and_outside() {
        let square = unit_square();
        assert!(square.contains(&Point::new(0.5, 0.5)));
        assert!(!square.contains(&Point::new(1.5, 0.5)));
        assert!(!square.contains(&Point::new(-0.1, 0.5)));
    }

    #[test]
    fn distance_to_polygon_is_zero_inside() {
        let square = unit_square();
        assert!(square.distance_to(&Point::new(0.3, 0.3)).abs() < f64::EPSILON);
        let outside = square.distance_to(&Point::new(0.0, 2.0));
        assert!((outside - KM_PER_DEGREE).abs() < 1e-6);
    }

    #[test]
    fn discretize_spacing_controls_mesh_size() {
        let square = unit_square();
        let coarse = square.discretize(km(50.0));
        let fine = square.discretize(km(10.0));
        assert!(!coarse.is_empty());
        assert!(fine.len() > coarse.len());
        assert!(fine.iter().all(|p| square.contains(p)));
    }

    #[test]
    fn tiny_polygon_falls_back_to_centroid() {
        let speck = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(0.001, 0.0),
            Point::new(0.001, 0.001),
        ])
        .unwrap();
        let mesh = speck.discretize(km(10.0));
        assert_eq!(mesh.len(), 1);
    }

    #[test_case(0.0; "zero")]
    #[test_case(-5.0; "negative")]
    #[test_case(f64::NAN; "nan")]
    #[test_case(f64::INFINITY; "infinite")]
    fn spacing_must_be_positive_and_finite(value: f64) {
        assert!(matches!(
            Spacing::new(value),
            Err(GeometryError::InvalidSpacing(_))
        ));
    }

    #[test]
    fn spacing_is_rejected_when_deserialized() {
        assert!(serde_yaml::from_str::<Spacing>("0").is_err());
        assert!(serde_yaml::from_str::<Spacing>("-1.5").is_err());
        assert_eq!(serde_yaml::from_str::<Spacing>("2.5").unwrap(), km(2.5));
    }

    #[test_case(0; "no vertices")]
    #[test_case(2; "segment")]
    fn polygon_needs_three_vertices(n: u32) {
        let vertices: Vec<_> = (0..n).map(|i| Point::new(f64::from(i), 0.0)).collect();
        assert_eq!(
            Polygon::new(vertices.clone()),
            Err(GeometryError::DegeneratePolygon(vertices.len()))
        );
        let yaml = serde_yaml::to_string(&vertices).unwrap();
        assert!(serde_yaml::from_str::<Polygon>(&yaml).is_err());
    }

    #[test]
    fn line_length_sums_segments() {
        let line = Line::new(vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(0.0, 2.0),
        ]);
        assert!((line.length() - 2.0 * KM_PER_DEGREE).abs() < 1e-6);
    }
}
