//! Dwell detection: arrival and departure events at stops.
//!
//! A vehicle's projected fixes form a piecewise-linear curve in the
//! (elapsed seconds, path position) plane. A stop defines a horizontal band
//! of half-width `stop_buffer` around its path position, spanning the whole
//! observed time range. Each connected piece of the curve inside the band is
//! a raw visit: first time coordinate is the raw arrival, last is the raw
//! departure.
//!
//! GPS jitter near the band edge produces brief false exits, so raw visits
//! whose gap to the next visit is shorter than `min_dwell_gap` are merged
//! into one dwell before events are emitted.

use chrono::{DateTime, Duration, Utc};
use log::info;
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{DwellEvent, ProjectedFix, StopPosition};

/// One connected piece of trajectory inside a stop's corridor band, in
/// elapsed seconds. `enter <= exit` always; a visit touching a single point
/// of the band has `enter == exit`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub enter: f64,
    pub exit: f64,
}

/// Classified result of intersecting a trajectory with a stop corridor.
#[derive(Debug, Clone, PartialEq)]
pub enum CorridorVisits {
    /// The vehicle never enters the corridor
    None,
    /// Exactly one connected visit
    Single(Visit),
    /// Several disjoint visits, in time order (loop routes, repeated passes)
    Multi(Vec<Visit>),
}

impl CorridorVisits {
    fn from_vec(visits: Vec<Visit>) -> Self {
        match visits.len() {
            0 => CorridorVisits::None,
            1 => CorridorVisits::Single(visits[0]),
            _ => CorridorVisits::Multi(visits),
        }
    }

    /// Flatten to a time-ordered list of visits.
    pub fn into_vec(self) -> Vec<Visit> {
        match self {
            CorridorVisits::None => Vec::new(),
            CorridorVisits::Single(v) => vec![v],
            CorridorVisits::Multi(vs) => vs,
        }
    }
}

/// Intersect a (elapsed, position) trajectory with the corridor band
/// `stop_position ± stop_buffer`.
///
/// The band boundary is closed: touching `stop_position ± stop_buffer`
/// exactly counts as inside. Visits that start at the first fix or end at
/// the last fix are valid; tracks with fewer than two points produce
/// [`CorridorVisits::None`].
pub fn corridor_visits(track: &[(f64, f64)], stop_position: f64, stop_buffer: f64) -> CorridorVisits {
    if track.len() < 2 {
        return CorridorVisits::None;
    }

    let lo = stop_position - stop_buffer;
    let hi = stop_position + stop_buffer;

    let mut visits: Vec<Visit> = Vec::new();
    let mut current: Option<Visit> = None;

    for window in track.windows(2) {
        let (t0, p0) = window[0];
        let (t1, p1) = window[1];
        if t1 <= t0 {
            continue;
        }

        // Sub-interval of [t0, t1] where the linearly interpolated position
        // stays inside [lo, hi]. Position is monotonic on a segment.
        let span = if p0 == p1 {
            if p0 >= lo && p0 <= hi {
                Some((t0, t1))
            } else {
                None
            }
        } else {
            let t_at = |p: f64| t0 + (t1 - t0) * (p - p0) / (p1 - p0);
            let (ta, tb) = (t_at(lo), t_at(hi));
            let (enter, exit) = (ta.min(tb).max(t0), ta.max(tb).min(t1));
            if enter <= exit {
                Some((enter, exit))
            } else {
                None
            }
        };

        match span {
            Some((enter, exit)) => match current {
                // Contiguous with the open visit (shares the segment vertex)
                Some(ref mut open) if enter <= open.exit => open.exit = exit,
                _ => {
                    if let Some(done) = current.take() {
                        visits.push(done);
                    }
                    current = Some(Visit { enter, exit });
                }
            },
            None => {
                if let Some(done) = current.take() {
                    visits.push(done);
                }
            }
        }
    }
    if let Some(done) = current {
        visits.push(done);
    }

    CorridorVisits::from_vec(visits)
}

/// Merge raw visits separated by less than `min_dwell_gap` seconds.
///
/// A linear sweep over the time-ordered visit list: each departure is
/// compared to the next arrival, and a short gap drops both, extending the
/// surviving dwell across the excursion. Gaps are measured between the raw
/// adjacent visits, so chains of short gaps collapse into one dwell, but a
/// merged interval is never re-checked against anything beyond its
/// immediate successor.
pub fn merge_visits(visits: Vec<Visit>, min_dwell_gap: f64) -> Vec<Visit> {
    let mut merged: Vec<Visit> = Vec::with_capacity(visits.len());
    for visit in visits {
        match merged.last_mut() {
            Some(last) if visit.enter - last.exit < min_dwell_gap => {
                last.exit = visit.exit;
            }
            _ => merged.push(visit),
        }
    }
    merged
}

/// Detect one (vehicle, stop) pair's dwell events.
fn detect_pair(
    vehicle_id: &str,
    track: &[(f64, f64)],
    stop: &StopPosition,
    stop_buffer: f64,
    min_dwell_gap: f64,
    epoch: DateTime<Utc>,
) -> Vec<DwellEvent> {
    let raw = corridor_visits(track, stop.position, stop_buffer).into_vec();
    merge_visits(raw, min_dwell_gap)
        .into_iter()
        .map(|visit| DwellEvent {
            vehicle_id: vehicle_id.to_string(),
            stop_name: stop.name.clone(),
            arrival: epoch + Duration::milliseconds((visit.enter * 1000.0).round() as i64),
            departure: epoch + Duration::milliseconds((visit.exit * 1000.0).round() as i64),
        })
        .collect()
}

/// Group projected fixes per vehicle as time-ordered (elapsed, position)
/// tracks, keeping only vehicles with enough points to form a trajectory.
fn vehicle_tracks(projected: &[ProjectedFix]) -> Vec<(String, Vec<(f64, f64)>)> {
    let mut tracks: Vec<(String, Vec<(f64, f64)>)> = Vec::new();
    for fix in projected {
        match tracks.last_mut() {
            Some((id, track)) if *id == fix.vehicle_id => {
                track.push((fix.elapsed_seconds, fix.position))
            }
            _ => tracks.push((
                fix.vehicle_id.clone(),
                vec![(fix.elapsed_seconds, fix.position)],
            )),
        }
    }
    for (_, track) in &mut tracks {
        track.sort_by(|a, b| a.0.total_cmp(&b.0));
    }
    tracks.retain(|(_, track)| track.len() >= 2);
    tracks
}

/// Distinct stop names in input order; the first placement of a name wins.
fn distinct_stops(stops: &[StopPosition]) -> Vec<StopPosition> {
    let mut seen: Vec<StopPosition> = Vec::new();
    for stop in stops {
        if !seen.iter().any(|s| s.name == stop.name) {
            seen.push(stop.clone());
        }
    }
    seen
}

/// Detect dwell events for every (vehicle, stop) pair.
///
/// Vehicles with fewer than two projected fixes and stops a vehicle never
/// visits are silently skipped. Output is sorted by (vehicle, stop, arrival).
pub fn detect_dwells(
    projected: &[ProjectedFix],
    stops: &[StopPosition],
    stop_buffer: f64,
    min_dwell_gap: f64,
    epoch: DateTime<Utc>,
) -> Vec<DwellEvent> {
    let tracks = vehicle_tracks(projected);
    let stops = distinct_stops(stops);
    info!(
        "[Dwell] Scanning {} vehicles x {} stops",
        tracks.len(),
        stops.len()
    );

    let mut events: Vec<DwellEvent> = tracks
        .iter()
        .flat_map(|(vehicle_id, track)| {
            stops.iter().flat_map(move |stop| {
                detect_pair(vehicle_id, track, stop, stop_buffer, min_dwell_gap, epoch)
            })
        })
        .collect();

    sort_events(&mut events);
    events
}

/// Parallel version of [`detect_dwells`], mapping over (vehicle, stop)
/// pairs. Each pair reads only its own track and stop position, so the
/// pairs are independent; output ordering matches the sequential version.
#[cfg(feature = "parallel")]
pub fn detect_dwells_parallel(
    projected: &[ProjectedFix],
    stops: &[StopPosition],
    stop_buffer: f64,
    min_dwell_gap: f64,
    epoch: DateTime<Utc>,
) -> Vec<DwellEvent> {
    let tracks = vehicle_tracks(projected);
    let stops = distinct_stops(stops);
    info!(
        "[Dwell] Scanning {} vehicles x {} stops (parallel)",
        tracks.len(),
        stops.len()
    );

    let pairs: Vec<(&str, &[(f64, f64)], &StopPosition)> = tracks
        .iter()
        .flat_map(|(vehicle_id, track)| {
            stops
                .iter()
                .map(move |stop| (vehicle_id.as_str(), track.as_slice(), stop))
        })
        .collect();

    let mut events: Vec<DwellEvent> = pairs
        .par_iter()
        .map(|&(vehicle_id, track, stop)| {
            detect_pair(vehicle_id, track, stop, stop_buffer, min_dwell_gap, epoch)
        })
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect();

    sort_events(&mut events);
    events
}

fn sort_events(events: &mut [DwellEvent]) {
    events.sort_by(|a, b| {
        a.vehicle_id
            .cmp(&b.vehicle_id)
            .then(a.stop_name.cmp(&b.stop_name))
            .then(a.arrival.cmp(&b.arrival))
    });
}
