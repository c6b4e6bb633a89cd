//! Route geometry and linear referencing.
//!
//! A [`RoutePath`] is the planar polyline of one transit line. Every fix and
//! stop is expressed as a scalar distance along it (its "path position"),
//! obtained by nearest-point projection. Projection is stateless and
//! deterministic; cost is linear in the number of route segments.

use geo::{Coord, EuclideanDistance, EuclideanLength, LineLocatePoint, LineString, Point};
use log::debug;

use crate::error::{Result, StopMatchError};
use crate::projection::PlanarCrs;
use crate::{StopLocation, StopPosition};

/// A single transit line in a planar CRS, immutable for the whole run.
///
/// Path positions are measured in meters from the route's first vertex.
#[derive(Debug, Clone)]
pub struct RoutePath {
    line: LineString<f64>,
    length: f64,
}

impl RoutePath {
    /// Build a route from WGS84 (lon, lat) vertices, reprojecting into `crs`.
    ///
    /// Fails on routes that cannot anchor a linear reference: fewer than two
    /// vertices, or zero planar length (all vertices coincident).
    pub fn from_wgs84(coords: &[(f64, f64)], crs: &PlanarCrs) -> Result<Self> {
        if coords.len() < 2 {
            return Err(StopMatchError::DegenerateRoute {
                message: format!("route has {} vertices, at least 2 required", coords.len()),
            });
        }

        let projected: Vec<Coord<f64>> = coords
            .iter()
            .map(|&(lon, lat)| crs.project(lon, lat))
            .collect();
        let line = LineString::new(projected);

        let length = line.euclidean_length();
        if length <= 0.0 {
            return Err(StopMatchError::DegenerateRoute {
                message: "route has zero planar length".to_string(),
            });
        }

        debug!(
            "[Route] {} vertices, {:.0} m planar length",
            coords.len(),
            length
        );

        Ok(Self { line, length })
    }

    /// Total planar length of the route in meters.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Path position of the route point nearest to `point`, in meters from
    /// the route start. Nearest-point projection, not nearest-vertex.
    pub fn locate(&self, point: Point<f64>) -> f64 {
        // line_locate_point only returns None for degenerate lines, which the
        // constructor rejects.
        self.line
            .line_locate_point(&point)
            .map(|fraction| fraction * self.length)
            .unwrap_or(0.0)
    }

    /// Planar distance from `point` to the route, in meters.
    pub fn distance_to(&self, point: Point<f64>) -> f64 {
        point.euclidean_distance(&self.line)
    }
}

/// Project every stop onto the route, yielding its scalar path position.
///
/// Stops keep their input order; placements sharing a name are all located
/// (the dwell detector picks the first placement per name).
pub fn locate_stops(route: &RoutePath, stops: &[StopLocation], crs: &PlanarCrs) -> Vec<StopPosition> {
    stops
        .iter()
        .map(|stop| {
            let planar = crs.project(stop.lon, stop.lat);
            StopPosition {
                name: stop.name.clone(),
                position: route.locate(planar.into()),
            }
        })
        .collect()
}
