//! Trajectory cleaning stages applied before matching.
//!
//! Three generic fix-stream utilities, run in order:
//! 1. [`drop_duplicate_fixes`] - collapse exact consecutive repeats
//! 2. [`drop_outside_corridor`] - discard fixes far from the route corridor
//! 3. [`resegment_by_gap`] - split a vehicle's stream at long time gaps
//!
//! Each stage consumes a fix table sorted by (vehicle, time) and preserves
//! that ordering.

use log::info;

use crate::route::RoutePath;
use crate::projection::PlanarCrs;
use crate::RawFix;

/// Sort fixes by (vehicle, time) and drop consecutive exact duplicates in
/// (vehicle, time, lon, lat).
pub fn drop_duplicate_fixes(mut fixes: Vec<RawFix>) -> Vec<RawFix> {
    fixes.sort_by(|a, b| {
        a.vehicle_id
            .cmp(&b.vehicle_id)
            .then(a.time.cmp(&b.time))
    });
    let before = fixes.len();
    fixes.dedup_by(|a, b| {
        a.vehicle_id == b.vehicle_id && a.time == b.time && a.lon == b.lon && a.lat == b.lat
    });
    if fixes.len() < before {
        info!("[Clean] Dropped {} duplicate fixes", before - fixes.len());
    }
    fixes
}

/// Drop fixes whose planar distance to the route exceeds `max_distance`
/// meters (the route corridor radius plus the GPS accuracy tolerance).
pub fn drop_outside_corridor(
    fixes: Vec<RawFix>,
    route: &RoutePath,
    crs: &PlanarCrs,
    max_distance: f64,
) -> Vec<RawFix> {
    let before = fixes.len();
    let kept: Vec<RawFix> = fixes
        .into_iter()
        .filter(|fix| route.distance_to(crs.project(fix.lon, fix.lat).into()) <= max_distance)
        .collect();
    if kept.len() < before {
        info!(
            "[Clean] Dropped {} fixes outside the route corridor",
            before - kept.len()
        );
    }
    kept
}

/// Split each vehicle's time-ordered fix stream wherever the gap between
/// consecutive timestamps exceeds `time_gap` seconds.
///
/// The first segment keeps the original vehicle id; later segments are
/// relabelled `"<id>-2"`, `"<id>-3"`, ... so a bus that disappears for hours
/// is treated as a fresh logical vehicle when it comes back.
pub fn resegment_by_gap(fixes: Vec<RawFix>, time_gap: f64) -> Vec<RawFix> {
    let mut out = Vec::with_capacity(fixes.len());
    let mut prev: Option<(String, chrono::DateTime<chrono::Utc>)> = None;
    let mut segment = 1u32;
    let mut splits = 0usize;

    for mut fix in fixes {
        match &prev {
            Some((prev_id, prev_time)) if *prev_id == fix.vehicle_id => {
                let gap = (fix.time - *prev_time).num_milliseconds() as f64 / 1000.0;
                if gap > time_gap {
                    segment += 1;
                    splits += 1;
                }
            }
            _ => segment = 1,
        }
        prev = Some((fix.vehicle_id.clone(), fix.time));
        if segment > 1 {
            fix.vehicle_id = format!("{}-{}", fix.vehicle_id, segment);
        }
        out.push(fix);
    }

    if splits > 0 {
        info!("[Clean] Re-segmented {} time gaps over {} s", splits, time_gap);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn fix(id: &str, secs: i64, lon: f64, lat: f64) -> RawFix {
        RawFix::new(
            id,
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap() + chrono::Duration::seconds(secs),
            lon,
            lat,
        )
    }

    #[test]
    fn test_drop_duplicate_fixes() {
        let fixes = vec![
            fix("bus-1", 0, 0.001, 0.0),
            fix("bus-1", 0, 0.001, 0.0),
            fix("bus-1", 30, 0.002, 0.0),
            fix("bus-2", 0, 0.001, 0.0),
        ];
        let cleaned = drop_duplicate_fixes(fixes);
        assert_eq!(cleaned.len(), 3);
    }

    #[test]
    fn test_same_time_different_position_kept() {
        let fixes = vec![fix("bus-1", 0, 0.001, 0.0), fix("bus-1", 0, 0.002, 0.0)];
        assert_eq!(drop_duplicate_fixes(fixes).len(), 2);
    }

    #[test]
    fn test_drop_outside_corridor() {
        let crs = PlanarCrs::WebMercator;
        let route = RoutePath::from_wgs84(&[(0.0, 0.0), (0.02, 0.0)], &crs).unwrap();

        let fixes = vec![
            fix("bus-1", 0, 0.01, 0.0),  // on the route
            fix("bus-1", 30, 0.01, 1.0), // ~111 km away
        ];
        let kept = drop_outside_corridor(fixes, &route, &crs, 700.0);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].lat, 0.0);
    }

    #[test]
    fn test_resegment_by_gap() {
        let fixes = vec![
            fix("bus-1", 0, 0.001, 0.0),
            fix("bus-1", 30, 0.002, 0.0),
            fix("bus-1", 4000, 0.003, 0.0),
            fix("bus-1", 4030, 0.004, 0.0),
            fix("bus-2", 0, 0.001, 0.0),
        ];
        let relabelled = resegment_by_gap(fixes, 1800.0);

        let ids: Vec<&str> = relabelled.iter().map(|f| f.vehicle_id.as_str()).collect();
        assert_eq!(ids, vec!["bus-1", "bus-1", "bus-1-2", "bus-1-2", "bus-2"]);
    }

    #[test]
    fn test_resegment_no_gap_keeps_ids() {
        let fixes = vec![fix("bus-1", 0, 0.001, 0.0), fix("bus-1", 60, 0.002, 0.0)];
        let relabelled = resegment_by_gap(fixes, 1800.0);
        assert!(relabelled.iter().all(|f| f.vehicle_id == "bus-1"));
    }
}
