//! # Stop Matcher
//!
//! Bus arrival/departure detection and one-way travel time analysis from
//! noisy fleet GPS traces.
//!
//! Given a transit route's line geometry, its named stops and a raw fix
//! table, this library:
//! - cleans the fix stream (duplicates, off-corridor fixes, time-gap
//!   re-segmentation)
//! - projects every fix onto the route's one-dimensional path coordinate
//! - detects the time intervals each vehicle dwells at each stop, merging
//!   jitter-induced fragments
//! - pairs dwell events at two stops into directional one-way trips
//!
//! ## Features
//!
//! - **`parallel`** - Process vehicles and (vehicle, stop) pairs with rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{Duration, TimeZone, Utc};
//! use stop_matcher::{detect_arrivals, one_way_trips, DetectConfig, RawFix, StopLocation};
//!
//! // One route, two stops, one vehicle driving end to end
//! let route = vec![(0.0, 0.0), (0.02, 0.0)];
//! let stops = vec![
//!     StopLocation::new("Terminal", 0.0, 0.0),
//!     StopLocation::new("Depot", 0.02, 0.0),
//! ];
//!
//! let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
//! let fixes: Vec<RawFix> = (0..9)
//!     .map(|i| RawFix::new("bus-1", t0 + Duration::seconds(i * 60), i as f64 * 0.0025, 0.0))
//!     .collect();
//!
//! let output = detect_arrivals(&route, &stops, &fixes, &DetectConfig::default()).unwrap();
//! let trips = one_way_trips(&output.dwell_events, "Terminal", "Depot");
//! assert_eq!(trips.len(), 1);
//! assert!(trips[0].duration_seconds > 0.0);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{Result, StopMatchError};

// Planar CRS projection (EPSG resolution, WGS84 -> meters)
pub mod projection;
pub use projection::PlanarCrs;

// Route geometry and linear referencing
pub mod route;
pub use route::{locate_stops, RoutePath};

// Fix-stream cleaning (dedup, corridor filter, gap re-segmentation)
pub mod cleaning;
pub use cleaning::{drop_duplicate_fixes, drop_outside_corridor, resegment_by_gap};

// Trajectory matching (fixes -> path positions)
pub mod matching;
#[cfg(feature = "parallel")]
pub use matching::project_fixes_parallel;
pub use matching::{project_fixes, run_epoch, MatchPolicy};

// Dwell detection (corridor intersection + fragment merging)
pub mod dwell;
#[cfg(feature = "parallel")]
pub use dwell::detect_dwells_parallel;
pub use dwell::{corridor_visits, detect_dwells, merge_visits, CorridorVisits, Visit};

// One-way trip aggregation
pub mod trips;
pub use trips::one_way_trips;

// End-to-end pipeline
pub mod pipeline;
pub use pipeline::{detect_arrivals, ArrivalOutput, DetectConfig};

// ============================================================================
// Core Types
// ============================================================================

/// A raw GPS observation of one vehicle, in WGS84.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFix {
    pub vehicle_id: String,
    pub time: DateTime<Utc>,
    pub lon: f64,
    pub lat: f64,
}

impl RawFix {
    /// Create a new fix.
    pub fn new(vehicle_id: &str, time: DateTime<Utc>, lon: f64, lat: f64) -> Self {
        Self {
            vehicle_id: vehicle_id.to_string(),
            time,
            lon,
            lat,
        }
    }

    /// Check that the coordinates are finite and in WGS84 range.
    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && self.lon >= -180.0
            && self.lon <= 180.0
            && self.lat >= -90.0
            && self.lat <= 90.0
    }
}

/// A named stop placement, in WGS84. Placements sharing a name (direction
/// pairs on opposite curbs) are matched identically by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopLocation {
    pub name: String,
    pub lon: f64,
    pub lat: f64,
}

impl StopLocation {
    pub fn new(name: &str, lon: f64, lat: f64) -> Self {
        Self {
            name: name.to_string(),
            lon,
            lat,
        }
    }
}

/// A stop expressed as a scalar path position along the route, in meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopPosition {
    pub name: String,
    pub position: f64,
}

/// A fix expressed in the (elapsed seconds, path position) plane.
///
/// `elapsed_seconds` counts from the run epoch (the earliest timestamp
/// across all vehicles, a shared reference, not per-vehicle). The path
/// position is not guaranteed monotonic: vehicles reverse, loop, and jitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedFix {
    pub vehicle_id: String,
    pub elapsed_seconds: f64,
    pub position: f64,
}

/// A maximal interval a vehicle spent within a stop's corridor, after
/// fragment merging. `arrival <= departure` always; the same (vehicle, stop)
/// pair can own several non-overlapping events on loop routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DwellEvent {
    pub vehicle_id: String,
    pub stop_name: String,
    pub arrival: DateTime<Utc>,
    pub departure: DateTime<Utc>,
}

/// One directional trip between two named stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneWayTrip {
    pub vehicle_id: String,
    /// `"<origin>-<destination>"`
    pub direction: String,
    /// Departure from the origin stop
    pub start_time: DateTime<Utc>,
    /// Arrival at the destination stop
    pub end_time: DateTime<Utc>,
    pub duration_seconds: f64,
    /// Hour component of `start_time`, for time-of-day bucketing
    pub hour_of_day: u32,
}

// ============================================================================
// Tests
// ============================================================================
