//! End-to-end arrival detection pipeline.
//!
//! Orchestrates the whole batch computation: validate configuration and
//! geometry, clean the fix table, project trajectories, then detect and
//! merge dwell events per (vehicle, stop). Validation failures abort the
//! run with no partial results; everything after validation absorbs sparse
//! data silently.

use log::info;
use serde::{Deserialize, Serialize};

use crate::cleaning::{drop_duplicate_fixes, drop_outside_corridor, resegment_by_gap};
use crate::error::{Result, StopMatchError};
use crate::matching::{run_epoch, MatchPolicy};
use crate::projection::PlanarCrs;
use crate::route::{locate_stops, RoutePath};
use crate::{DwellEvent, ProjectedFix, RawFix, StopLocation};

#[cfg(not(feature = "parallel"))]
use crate::dwell::detect_dwells;
#[cfg(feature = "parallel")]
use crate::dwell::detect_dwells_parallel;
#[cfg(not(feature = "parallel"))]
use crate::matching::project_fixes;
#[cfg(feature = "parallel")]
use crate::matching::project_fixes_parallel;

/// Configuration for arrival detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectConfig {
    /// Stop corridor half-width in meters. A vehicle within this distance of
    /// a stop (along the path) is considered at the stop. Default: 200.0
    pub stop_buffer: f64,

    /// Merge threshold in seconds: an exit followed by a re-entry closer
    /// than this is GPS jitter, not a new visit. Default: 300.0
    pub min_dwell_gap: f64,

    /// EPSG code of the planar CRS used for all distance computation.
    /// Default: 3857 (Web Mercator)
    pub project_epsg: u32,

    /// Re-segmentation threshold in seconds: a vehicle silent for longer
    /// starts a new logical vehicle. Default: 1800.0
    pub time_gap: f64,

    /// Trajectory matching policy. Default: nearest-projection
    pub match_policy: MatchPolicy,

    /// Also return the intermediate projected-fix table. Default: false
    pub emit_projected: bool,

    /// Route corridor radius in meters for the cleaning filter. Kept
    /// independent of `stop_buffer`: the two play different roles even
    /// though the original tooling reused one value. Default: 200.0
    pub corridor_radius: f64,

    /// GPS accuracy tolerance in meters added on top of the corridor
    /// radius when filtering off-route fixes. Default: 500.0
    pub corridor_accuracy: f64,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            stop_buffer: 200.0,
            min_dwell_gap: 300.0,
            project_epsg: 3857,
            time_gap: 1800.0,
            match_policy: MatchPolicy::default(),
            emit_projected: false,
            corridor_radius: 200.0,
            corridor_accuracy: 500.0,
        }
    }
}

impl DetectConfig {
    /// Validate thresholds before any processing starts.
    pub fn validate(&self) -> Result<()> {
        if self.stop_buffer <= 0.0 {
            return Err(StopMatchError::config("stop_buffer must be positive"));
        }
        if self.min_dwell_gap < 0.0 {
            return Err(StopMatchError::config("min_dwell_gap must not be negative"));
        }
        if self.time_gap <= 0.0 {
            return Err(StopMatchError::config("time_gap must be positive"));
        }
        if self.corridor_radius <= 0.0 || self.corridor_accuracy < 0.0 {
            return Err(StopMatchError::config(
                "corridor_radius must be positive and corridor_accuracy non-negative",
            ));
        }
        Ok(())
    }
}

/// Output of [`detect_arrivals`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrivalOutput {
    /// Arrival/departure table, sorted by (vehicle, stop, arrival)
    pub dwell_events: Vec<DwellEvent>,
    /// Intermediate path-position table, when `emit_projected` is set
    pub projected_fixes: Option<Vec<ProjectedFix>>,
}

/// Detect stop arrival and departure events from raw vehicle fixes.
///
/// `route_wgs84` is the line geometry as (lon, lat) vertices; `stops` are
/// named WGS84 points; `fixes` is the raw fix table for one pre-filtered
/// route. Deterministic: identical inputs yield identical tables.
///
/// # Example
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use stop_matcher::{detect_arrivals, DetectConfig, RawFix, StopLocation};
///
/// // Straight route along the equator with a stop at its midpoint
/// let route = vec![(0.0, 0.0), (0.02, 0.0)];
/// let stops = vec![StopLocation::new("Central", 0.01, 0.0)];
///
/// let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
/// let fixes: Vec<RawFix> = (0..5)
///     .map(|i| {
///         RawFix::new(
///             "bus-1",
///             t0 + Duration::seconds(i * 60),
///             i as f64 * 0.005,
///             0.0,
///         )
///     })
///     .collect();
///
/// let output = detect_arrivals(&route, &stops, &fixes, &DetectConfig::default()).unwrap();
/// assert_eq!(output.dwell_events.len(), 1);
/// assert!(output.dwell_events[0].arrival <= output.dwell_events[0].departure);
/// ```
pub fn detect_arrivals(
    route_wgs84: &[(f64, f64)],
    stops: &[StopLocation],
    fixes: &[RawFix],
    config: &DetectConfig,
) -> Result<ArrivalOutput> {
    config.validate()?;
    let crs = PlanarCrs::from_epsg(config.project_epsg)?;
    let route = RoutePath::from_wgs84(route_wgs84, &crs)?;
    if stops.is_empty() {
        return Err(StopMatchError::config("stop set is empty"));
    }

    // Cleaning: validity, duplicates, corridor, time-gap re-segmentation
    let valid: Vec<RawFix> = fixes.iter().filter(|f| f.is_valid()).cloned().collect();
    let deduped = drop_duplicate_fixes(valid);
    let in_corridor = drop_outside_corridor(
        deduped,
        &route,
        &crs,
        config.corridor_radius + config.corridor_accuracy,
    );
    let cleaned = resegment_by_gap(in_corridor, config.time_gap);
    info!("[Pipeline] {} fixes after cleaning", cleaned.len());

    let epoch = run_epoch(&cleaned).ok_or(StopMatchError::NoFixes)?;

    #[cfg(feature = "parallel")]
    let projected = project_fixes_parallel(&route, &crs, &cleaned, config.match_policy, epoch);
    #[cfg(not(feature = "parallel"))]
    let projected = project_fixes(&route, &crs, &cleaned, config.match_policy, epoch);

    let stop_positions = locate_stops(&route, stops, &crs);

    #[cfg(feature = "parallel")]
    let dwell_events = detect_dwells_parallel(
        &projected,
        &stop_positions,
        config.stop_buffer,
        config.min_dwell_gap,
        epoch,
    );
    #[cfg(not(feature = "parallel"))]
    let dwell_events = detect_dwells(
        &projected,
        &stop_positions,
        config.stop_buffer,
        config.min_dwell_gap,
        epoch,
    );

    info!("[Pipeline] {} dwell events", dwell_events.len());
    Ok(ArrivalOutput {
        dwell_events,
        projected_fixes: config.emit_projected.then_some(projected),
    })
}
