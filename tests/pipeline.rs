//! End-to-end pipeline tests: raw fixes in, dwell events and one-way trips
//! out, on a synthetic two-stop line along the equator.

use chrono::{DateTime, Duration, TimeZone, Utc};
use stop_matcher::{
    detect_arrivals, one_way_trips, DetectConfig, MatchPolicy, RawFix, StopLocation,
};

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
}

fn route() -> Vec<(f64, f64)> {
    vec![(0.0, 0.0), (0.02, 0.0)]
}

fn stops() -> Vec<StopLocation> {
    vec![
        StopLocation::new("Terminal", 0.0005, 0.0),
        StopLocation::new("Depot", 0.0195, 0.0),
    ]
}

/// One vehicle: dwell at Terminal, drive to Depot, dwell, drive back, dwell
/// at Terminal again.
fn round_trip_fixes(vehicle: &str) -> Vec<RawFix> {
    let legs: &[(i64, f64)] = &[
        (0, 0.0005),
        (60, 0.0005),
        (120, 0.0005),
        (180, 0.004),
        (240, 0.008),
        (300, 0.012),
        (360, 0.016),
        (420, 0.0195),
        (480, 0.0195),
        (540, 0.0195),
        (600, 0.016),
        (660, 0.012),
        (720, 0.008),
        (780, 0.004),
        (840, 0.0005),
        (900, 0.0005),
    ];
    legs.iter()
        .map(|&(secs, lon)| RawFix::new(vehicle, epoch() + Duration::seconds(secs), lon, 0.0))
        .collect()
}

#[test]
fn round_trip_produces_expected_events_and_trips() {
    let output = detect_arrivals(
        &route(),
        &stops(),
        &round_trip_fixes("bus-1"),
        &DetectConfig::default(),
    )
    .unwrap();

    let terminal: Vec<_> = output
        .dwell_events
        .iter()
        .filter(|e| e.stop_name == "Terminal")
        .collect();
    let depot: Vec<_> = output
        .dwell_events
        .iter()
        .filter(|e| e.stop_name == "Depot")
        .collect();

    // Two separate Terminal dwells (out and back), one Depot dwell
    assert_eq!(terminal.len(), 2);
    assert_eq!(depot.len(), 1);

    // Ordering invariant: arrival <= departure, events non-overlapping
    for event in &output.dwell_events {
        assert!(event.arrival <= event.departure);
    }
    assert!(terminal[0].departure < terminal[1].arrival);

    let trips = one_way_trips(&output.dwell_events, "Terminal", "Depot");
    assert_eq!(trips.len(), 2);

    let forward = trips
        .iter()
        .find(|t| t.direction == "Terminal-Depot")
        .unwrap();
    let reverse = trips
        .iter()
        .find(|t| t.direction == "Depot-Terminal")
        .unwrap();
    assert!(forward.duration_seconds > 0.0);
    assert!(reverse.duration_seconds > 0.0);
    assert_eq!(forward.hour_of_day, 8);
    assert_eq!(reverse.hour_of_day, 8);
    assert!(forward.end_time <= reverse.start_time);
}

#[test]
fn adjacency_no_duplicate_trip_starts() {
    let mut fixes = round_trip_fixes("bus-1");
    fixes.extend(round_trip_fixes("bus-2"));

    let output = detect_arrivals(&route(), &stops(), &fixes, &DetectConfig::default()).unwrap();
    let trips = one_way_trips(&output.dwell_events, "Terminal", "Depot");

    let mut starts: Vec<_> = trips
        .iter()
        .map(|t| (t.vehicle_id.clone(), t.start_time))
        .collect();
    let total = starts.len();
    starts.sort();
    starts.dedup();
    assert_eq!(starts.len(), total);
}

#[test]
fn pipeline_is_deterministic() {
    let fixes = round_trip_fixes("bus-1");
    let config = DetectConfig {
        emit_projected: true,
        ..DetectConfig::default()
    };

    let a = detect_arrivals(&route(), &stops(), &fixes, &config).unwrap();
    let b = detect_arrivals(&route(), &stops(), &fixes, &config).unwrap();

    assert_eq!(
        serde_json::to_string(&a.dwell_events).unwrap(),
        serde_json::to_string(&b.dwell_events).unwrap()
    );
    assert_eq!(
        serde_json::to_string(&a.projected_fixes).unwrap(),
        serde_json::to_string(&b.projected_fixes).unwrap()
    );
}

#[test]
fn larger_merge_threshold_never_creates_more_events() {
    let fixes = round_trip_fixes("bus-1");

    let narrow = detect_arrivals(&route(), &stops(), &fixes, &DetectConfig::default())
        .unwrap()
        .dwell_events
        .len();

    // The ~11 min between Terminal visits is under this threshold, so the
    // two dwells collapse into one
    let config = DetectConfig {
        min_dwell_gap: 1000.0,
        ..DetectConfig::default()
    };
    let wide = detect_arrivals(&route(), &stops(), &fixes, &config)
        .unwrap()
        .dwell_events
        .len();

    assert!(wide <= narrow);
    assert_eq!(wide, narrow - 1);
}

#[test]
fn both_match_policies_agree_on_a_simple_route() {
    let fixes = round_trip_fixes("bus-1");

    let nearest = detect_arrivals(&route(), &stops(), &fixes, &DetectConfig::default()).unwrap();
    let config = DetectConfig {
        match_policy: MatchPolicy::DistanceLimited,
        ..DetectConfig::default()
    };
    let limited = detect_arrivals(&route(), &stops(), &fixes, &config).unwrap();

    // On a straight, non-overlapping route the clamp never triggers
    assert_eq!(nearest.dwell_events.len(), limited.dwell_events.len());
}

#[test]
fn departure_without_destination_arrival_yields_no_trip() {
    // Vehicle leaves Terminal but the trace ends mid-route
    let fixes: Vec<RawFix> = [(0i64, 0.0005), (60, 0.0005), (120, 0.004), (180, 0.008)]
        .iter()
        .map(|&(secs, lon)| RawFix::new("bus-1", epoch() + Duration::seconds(secs), lon, 0.0))
        .collect();

    let output = detect_arrivals(&route(), &stops(), &fixes, &DetectConfig::default()).unwrap();
    assert!(output
        .dwell_events
        .iter()
        .all(|e| e.stop_name == "Terminal"));
    assert!(one_way_trips(&output.dwell_events, "Terminal", "Depot").is_empty());
}

#[test]
fn off_corridor_vehicle_is_filtered_out() {
    // All of bus-2's fixes are ~1 degree of latitude off the route
    let mut fixes = round_trip_fixes("bus-1");
    fixes.extend(
        [(0i64, 0.01), (60, 0.012)].iter().map(|&(secs, lon)| {
            RawFix::new("bus-2", epoch() + Duration::seconds(secs), lon, 1.0)
        }),
    );

    let output = detect_arrivals(&route(), &stops(), &fixes, &DetectConfig::default()).unwrap();
    assert!(output.dwell_events.iter().all(|e| e.vehicle_id == "bus-1"));
}

#[test]
fn time_gap_splits_create_new_logical_vehicles() {
    // Same physical bus does the round trip twice, 2 h apart
    let mut fixes = round_trip_fixes("bus-1");
    fixes.extend(round_trip_fixes("bus-1").into_iter().map(|mut f| {
        f.time += Duration::hours(2);
        f
    }));

    let config = DetectConfig {
        emit_projected: true,
        ..DetectConfig::default()
    };
    let output = detect_arrivals(&route(), &stops(), &fixes, &config).unwrap();

    let projected = output.projected_fixes.unwrap();
    assert!(projected.iter().any(|p| p.vehicle_id == "bus-1"));
    assert!(projected.iter().any(|p| p.vehicle_id == "bus-1-2"));

    // Each logical vehicle contributes its own dwell events
    let first: Vec<_> = output
        .dwell_events
        .iter()
        .filter(|e| e.vehicle_id == "bus-1")
        .collect();
    let second: Vec<_> = output
        .dwell_events
        .iter()
        .filter(|e| e.vehicle_id == "bus-1-2")
        .collect();
    assert_eq!(first.len(), second.len());
}
