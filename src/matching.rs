//! Trajectory matching: from cleaned fixes to path positions.
//!
//! Two interchangeable policies convert a vehicle's fix stream into a stream
//! of positions along the route:
//! - [`MatchPolicy::NearestProjection`] projects every fix independently.
//!   Fast, but the path position can jump between passes of a
//!   self-overlapping route.
//! - [`MatchPolicy::DistanceLimited`] folds over each vehicle's fixes in
//!   time order, bounding each path-position step by the planar distance the
//!   vehicle actually moved. Sequential per vehicle, independent across
//!   vehicles.
//!
//! Elapsed seconds are measured from the run epoch: the minimum timestamp
//! across the whole dataset, computed once and passed in explicitly.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use geo::{Coord, Point};
use log::info;
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::StopMatchError;
use crate::projection::PlanarCrs;
use crate::route::RoutePath;
use crate::{ProjectedFix, RawFix};

/// Policy for converting fixes to path positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPolicy {
    /// Independent nearest-point projection per fix
    #[default]
    NearestProjection,
    /// Sequential matching with the step bounded by planar displacement
    DistanceLimited,
}

impl MatchPolicy {
    /// Stable textual name, the same strings `FromStr` accepts.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchPolicy::NearestProjection => "nearest-projection",
            MatchPolicy::DistanceLimited => "distance-limited",
        }
    }
}

impl FromStr for MatchPolicy {
    type Err = StopMatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nearest-projection" => Ok(MatchPolicy::NearestProjection),
            "distance-limited" => Ok(MatchPolicy::DistanceLimited),
            other => Err(StopMatchError::config(format!(
                "unknown match policy '{}', expected 'nearest-projection' or 'distance-limited'",
                other
            ))),
        }
    }
}

/// The run epoch: earliest timestamp across all vehicles, or `None` for an
/// empty fix table.
pub fn run_epoch(fixes: &[RawFix]) -> Option<DateTime<Utc>> {
    fixes.iter().map(|f| f.time).min()
}

/// Seconds between `time` and the run epoch.
fn elapsed_seconds(time: DateTime<Utc>, epoch: DateTime<Utc>) -> f64 {
    (time - epoch).num_milliseconds() as f64 / 1000.0
}

/// Group fixes per vehicle in time order, projected into the planar CRS.
fn partition_by_vehicle(
    fixes: &[RawFix],
    crs: &PlanarCrs,
) -> BTreeMap<String, Vec<(DateTime<Utc>, Coord<f64>)>> {
    let mut by_vehicle: BTreeMap<String, Vec<(DateTime<Utc>, Coord<f64>)>> = BTreeMap::new();
    for fix in fixes {
        by_vehicle
            .entry(fix.vehicle_id.clone())
            .or_default()
            .push((fix.time, crs.project(fix.lon, fix.lat)));
    }
    for track in by_vehicle.values_mut() {
        track.sort_by_key(|(time, _)| *time);
    }
    by_vehicle
}

/// Match one vehicle's time-ordered planar track onto the route.
fn match_vehicle(
    vehicle_id: &str,
    track: &[(DateTime<Utc>, Coord<f64>)],
    route: &RoutePath,
    policy: MatchPolicy,
    epoch: DateTime<Utc>,
) -> Vec<ProjectedFix> {
    let mut out = Vec::with_capacity(track.len());
    let mut prev: Option<(Coord<f64>, f64)> = None;

    for &(time, coord) in track {
        let position = match policy {
            MatchPolicy::NearestProjection => route.locate(coord.into()),
            MatchPolicy::DistanceLimited => match prev {
                None => route.locate(coord.into()),
                Some((prev_coord, prev_position)) => {
                    let step = planar_distance(prev_coord, coord);
                    if step == 0.0 {
                        // Stationary fix: the path position cannot change
                        prev_position
                    } else {
                        let raw = route.locate(coord.into());
                        let delta = raw - prev_position;
                        if delta.abs() > step {
                            // The vehicle cannot have moved farther along the
                            // path than it moved in the plane
                            prev_position + delta.signum() * step
                        } else {
                            raw
                        }
                    }
                }
            },
        };
        prev = Some((coord, position));
        out.push(ProjectedFix {
            vehicle_id: vehicle_id.to_string(),
            elapsed_seconds: elapsed_seconds(time, epoch),
            position,
        });
    }
    out
}

fn planar_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let p1: Point<f64> = a.into();
    let p2: Point<f64> = b.into();
    let (dx, dy) = (p2.x() - p1.x(), p2.y() - p1.y());
    (dx * dx + dy * dy).sqrt()
}

/// Project all fixes onto the route with the given policy.
///
/// Output is ordered by (vehicle, elapsed) with vehicles in sorted id order,
/// so reruns on identical input produce identical tables.
pub fn project_fixes(
    route: &RoutePath,
    crs: &PlanarCrs,
    fixes: &[RawFix],
    policy: MatchPolicy,
    epoch: DateTime<Utc>,
) -> Vec<ProjectedFix> {
    let by_vehicle = partition_by_vehicle(fixes, crs);
    info!(
        "[Match] Projecting {} fixes from {} vehicles ({})",
        fixes.len(),
        by_vehicle.len(),
        policy.as_str()
    );

    by_vehicle
        .iter()
        .flat_map(|(vehicle_id, track)| match_vehicle(vehicle_id, track, route, policy, epoch))
        .collect()
}

/// Parallel version of [`project_fixes`], mapping over vehicle partitions.
/// Matching state is per-vehicle only, so vehicles are safe to process
/// concurrently; output ordering is identical to the sequential version.
#[cfg(feature = "parallel")]
pub fn project_fixes_parallel(
    route: &RoutePath,
    crs: &PlanarCrs,
    fixes: &[RawFix],
    policy: MatchPolicy,
    epoch: DateTime<Utc>,
) -> Vec<ProjectedFix> {
    let by_vehicle: Vec<(String, Vec<(DateTime<Utc>, Coord<f64>)>)> =
        partition_by_vehicle(fixes, crs).into_iter().collect();
    info!(
        "[Match] Projecting {} fixes from {} vehicles ({}, parallel)",
        fixes.len(),
        by_vehicle.len(),
        policy.as_str()
    );

    by_vehicle
        .par_iter()
        .map(|(vehicle_id, track)| match_vehicle(vehicle_id, track, route, policy, epoch))
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect()
}
