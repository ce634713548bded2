//! Seismic sources.
//!
//! A [`Source`] carries the attributes every source shares (identifier,
//! tectonic region, derived weight) and a closed [`SourceKind`] holding the
//! type-specific geometry and magnitude-frequency distribution.

use serde::{Deserialize, Serialize};

use crate::{
    calc::FilterError,
    domain::{
        Mfd, Trt,
        geo::{Line, Point, Polygon, SiteCollection, Spacing, min_distance},
    },
};

/// Default spacing of the rupture mesh along a fault, in kilometres.
const fn default_rupture_mesh_spacing() -> f64 {
    5.0
}

const fn default_aspect_ratio() -> f64 {
    1.5
}

/// An atomic seismic source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Identifier, unique within one parsed source model.
    pub id: String,

    /// Human-readable name.
    #[serde(default)]
    pub name: String,

    /// Tectonic region type of the source.
    pub trt: Trt,

    /// Type-specific parameters.
    #[serde(flatten)]
    pub kind: SourceKind,

    /// Computational weight, derived from the rupture count when the owning
    /// [`TrtModel`](crate::TrtModel) splits its sources.
    #[serde(skip)]
    pub weight: f64,

    /// Id of the [`TrtModel`](crate::TrtModel) that owns this source, once
    /// annotated by the composite model.
    #[serde(skip)]
    pub trt_model_id: Option<usize>,
}

/// The type-specific part of a [`Source`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    /// Distributed seismicity over a polygon.
    Area {
        /// Outline of the source.
        polygon: Polygon,
        /// Magnitude-frequency distribution of the whole area.
        mfd: Mfd,
        /// Spacing of the mesh used to count ruptures.
        #[serde(default)]
        area_discretization: Spacing,
        /// Rupture parameters shared by every location of the area.
        rupture: PointRuptureParams,
    },
    /// Seismicity concentrated at a single epicentre.
    Point {
        /// Epicentre.
        location: Point,
        /// Magnitude-frequency distribution.
        mfd: Mfd,
        /// Rupture parameters.
        rupture: PointRuptureParams,
    },
    /// A fault described by its surface trace and a constant dip.
    SimpleFault {
        /// Surface trace.
        fault_trace: Line,
        /// Magnitude-frequency distribution.
        mfd: Mfd,
        /// Top of the seismogenic layer, in kilometres.
        upper_seismogenic_depth: f64,
        /// Bottom of the seismogenic layer, in kilometres.
        lower_seismogenic_depth: f64,
        /// Dip angle, in degrees.
        dip: f64,
        /// Rake angle, in degrees.
        rake: f64,
        /// Spacing of the rupture mesh, in kilometres.
        #[serde(default = "default_rupture_mesh_spacing")]
        rupture_mesh_spacing: f64,
        /// Rupture length over width.
        #[serde(default = "default_aspect_ratio")]
        rupture_aspect_ratio: f64,
    },
    /// A fault described by a sequence of edges, top to bottom.
    ComplexFault {
        /// Fault edges; the first is the top edge, the last the bottom edge.
        edges: Vec<Line>,
        /// Magnitude-frequency distribution.
        mfd: Mfd,
        /// Rake angle, in degrees.
        rake: f64,
        /// Spacing of the rupture mesh, in kilometres.
        #[serde(default = "default_rupture_mesh_spacing")]
        rupture_mesh_spacing: f64,
        /// Rupture length over width.
        #[serde(default = "default_aspect_ratio")]
        rupture_aspect_ratio: f64,
    },
    /// A fault that always ruptures its whole surface.
    Characteristic {
        /// Mesh of the rupture surface.
        surface: Vec<Point>,
        /// Magnitude-frequency distribution.
        mfd: Mfd,
        /// Rake angle, in degrees.
        rake: f64,
    },
    /// An explicit list of ruptures with their occurrence probabilities.
    NonParametric {
        /// The ruptures of the source.
        ruptures: Vec<NonParametricRupture>,
    },
}

/// Rupture parameters of point-like sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRuptureParams {
    /// Top of the seismogenic layer, in kilometres.
    pub upper_seismogenic_depth: f64,
    /// Bottom of the seismogenic layer, in kilometres.
    pub lower_seismogenic_depth: f64,
    /// Rupture length over width.
    #[serde(default = "default_aspect_ratio")]
    pub rupture_aspect_ratio: f64,
    /// Weighted nodal planes.
    pub nodal_planes: Vec<NodalPlane>,
    /// Weighted hypocentral depths.
    pub hypo_depths: Vec<HypoDepth>,
}

/// A weighted nodal plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodalPlane {
    /// Probability of this plane.
    pub probability: f64,
    /// Strike, in degrees.
    pub strike: f64,
    /// Dip, in degrees.
    pub dip: f64,
    /// Rake, in degrees.
    pub rake: f64,
}

/// A weighted hypocentral depth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HypoDepth {
    /// Probability of this depth.
    pub probability: f64,
    /// Depth, in kilometres.
    pub depth: f64,
}

/// A single rupture of a non-parametric source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonParametricRupture {
    /// Magnitude.
    pub mag: f64,
    /// Rake angle, in degrees.
    pub rake: f64,
    /// Hypocentre.
    pub hypocenter: Point,
    /// Mesh of the rupture surface.
    pub surface: Vec<Point>,
    /// Probabilities of 0, 1, 2, ... occurrences.
    pub probs_occur: Vec<f64>,
}

impl Source {
    /// Creates a source with a zero weight and no owning model.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, trt: Trt, kind: SourceKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            trt,
            kind,
            weight: 0.0,
            trt_model_id: None,
        }
    }

    /// The magnitude-frequency distribution, if the source has one.
    ///
    /// Non-parametric sources list their ruptures explicitly and have none.
    #[must_use]
    pub const fn mfd(&self) -> Option<&Mfd> {
        match &self.kind {
            SourceKind::Area { mfd, .. }
            | SourceKind::Point { mfd, .. }
            | SourceKind::SimpleFault { mfd, .. }
            | SourceKind::ComplexFault { mfd, .. }
            | SourceKind::Characteristic { mfd, .. } => Some(mfd),
            SourceKind::NonParametric { .. } => None,
        }
    }

    /// Whether this is a point source.
    #[must_use]
    pub const fn is_point(&self) -> bool {
        matches!(self.kind, SourceKind::Point { .. })
    }

    /// The smallest and largest magnitude the source can generate.
    #[must_use]
    pub fn min_max_mag(&self) -> (f64, f64) {
        match &self.kind {
            SourceKind::NonParametric { ruptures } => ruptures
                .iter()
                .map(|rupture| (rupture.mag, rupture.mag))
                .reduce(|(lo, hi), (m, _)| (lo.min(m), hi.max(m)))
                .unwrap_or((f64::NAN, f64::NAN)),
            _ => self.mfd().map_or((f64::NAN, f64::NAN), Mfd::min_max_mag),
        }
    }

    /// The number of ruptures the source generates.
    #[must_use]
    pub fn count_ruptures(&self) -> usize {
        match &self.kind {
            SourceKind::Point { mfd, rupture, .. } => point_ruptures(mfd, rupture),
            SourceKind::Area {
                polygon,
                mfd,
                area_discretization,
                rupture,
            } => polygon.discretize(*area_discretization).len() * point_ruptures(mfd, rupture),
            SourceKind::SimpleFault {
                fault_trace,
                mfd,
                upper_seismogenic_depth,
                lower_seismogenic_depth,
                dip,
                rupture_mesh_spacing,
                rupture_aspect_ratio,
                ..
            } => {
                let width = (lower_seismogenic_depth - upper_seismogenic_depth)
                    / dip.to_radians().sin().max(f64::EPSILON);
                fault_ruptures(
                    mfd,
                    fault_trace.length(),
                    width,
                    *rupture_mesh_spacing,
                    *rupture_aspect_ratio,
                )
            }
            SourceKind::ComplexFault {
                edges,
                mfd,
                rupture_mesh_spacing,
                rupture_aspect_ratio,
                ..
            } => {
                let length = edges.first().map_or(0.0, Line::length);
                let width = match (
                    edges.first().and_then(|e| e.points().first()),
                    edges.last().and_then(|e| e.points().first()),
                ) {
                    (Some(top), Some(bottom)) => top.distance_3d(bottom),
                    _ => 0.0,
                };
                fault_ruptures(
                    mfd,
                    length,
                    width,
                    *rupture_mesh_spacing,
                    *rupture_aspect_ratio,
                )
            }
            SourceKind::Characteristic { mfd, .. } => mfd
                .annual_occurrence_rates()
                .into_iter()
                .filter(|(_, rate)| *rate > 0.0)
                .count(),
            SourceKind::NonParametric { ruptures } => ruptures.len(),
        }
    }

    /// Smallest distance between the source and `site`, in kilometres.
    #[must_use]
    pub fn distance_to(&self, site: &Point) -> f64 {
        let closest = match &self.kind {
            SourceKind::Point { location, .. } => Some(site.distance(location)),
            SourceKind::Area { polygon, .. } => Some(polygon.distance_to(site)),
            SourceKind::SimpleFault { fault_trace, .. } => {
                min_distance(site, fault_trace.points())
            }
            SourceKind::ComplexFault { edges, .. } => {
                min_distance(site, edges.iter().flat_map(Line::points))
            }
            SourceKind::Characteristic { surface, .. } => min_distance(site, surface),
            SourceKind::NonParametric { ruptures } => {
                min_distance(site, ruptures.iter().flat_map(|r| r.surface.iter()))
            }
        };
        closest.unwrap_or(f64::INFINITY)
    }

    /// Whether `site` lies within `max_distance` kilometres of the source.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidDistance`] if the distance is `NaN`, e.g.
    /// because the site or the source has invalid coordinates.
    pub fn is_within(&self, site: &Point, max_distance: f64) -> Result<bool, FilterError> {
        let distance = self.distance_to(site);
        if distance.is_nan() {
            return Err(FilterError::InvalidDistance(self.id.clone()));
        }
        Ok(distance <= max_distance)
    }

    /// The sites within `max_distance` kilometres of the source.
    ///
    /// Returns `None` when no site qualifies.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidDistance`] if a distance is `NaN`.
    pub fn filter_sites_by_distance(
        &self,
        max_distance: f64,
        sites: &SiteCollection,
    ) -> Result<Option<SiteCollection>, FilterError> {
        let mut close = Vec::new();
        for site in sites {
            if self.is_within(&site.location, max_distance)? {
                close.push(*site);
            }
        }
        Ok((!close.is_empty()).then(|| SiteCollection::new(close)))
    }
}

fn point_ruptures(mfd: &Mfd, rupture: &PointRuptureParams) -> usize {
    mfd.num_bins() * rupture.nodal_planes.len() * rupture.hypo_depths.len()
}

/// Wells & Coppersmith (1994) rupture length for all slip types, in km.
fn rupture_length(mag: f64) -> f64 {
    10f64.powf(0.59f64.mul_add(mag, -2.44))
}

/// Number of positions a rupture of `size` km can occupy along `extent` km
/// when floated in steps of `spacing` km.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn floating_positions(extent: f64, size: f64, spacing: f64) -> usize {
    if size >= extent || spacing <= 0.0 {
        1
    } else {
        ((extent - size) / spacing).floor() as usize + 1
    }
}

fn fault_ruptures(mfd: &Mfd, length: f64, width: f64, spacing: f64, aspect_ratio: f64) -> usize {
    mfd.annual_occurrence_rates()
        .into_iter()
        .filter(|(_, rate)| *rate > 0.0)
        .map(|(mag, _)| {
            let rup_length = rupture_length(mag);
            let rup_width = (rup_length / aspect_ratio).min(width);
            floating_positions(length, rup_length, spacing)
                * floating_positions(width, rup_width, spacing)
        })
        .sum()
}
