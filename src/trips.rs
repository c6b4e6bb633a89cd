//! One-way trip aggregation between two named stops.
//!
//! For each direction, the relevant events per vehicle are departures from
//! the origin stop and arrivals at the destination stop. Merged and sorted
//! by time, a trip is emitted only when a departure's immediate successor in
//! this restricted stream is a destination arrival - strict adjacency, so
//! data gaps and repeated passes never pair events from different runs.

use std::collections::BTreeMap;

use chrono::{DateTime, Timelike, Utc};
use log::info;

use crate::{DwellEvent, OneWayTrip};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    DepartOrigin,
    ArriveDestination,
}

/// Trips in one direction: departures from `origin` paired with the next
/// adjacent arrival at `destination`.
fn directional_trips(events: &[DwellEvent], origin: &str, destination: &str) -> Vec<OneWayTrip> {
    let direction = format!("{}-{}", origin, destination);

    // Restricted two-tag stream per vehicle
    let mut streams: BTreeMap<&str, Vec<(DateTime<Utc>, Tag)>> = BTreeMap::new();
    for event in events {
        if event.stop_name == origin {
            streams
                .entry(event.vehicle_id.as_str())
                .or_default()
                .push((event.departure, Tag::DepartOrigin));
        }
        if event.stop_name == destination {
            streams
                .entry(event.vehicle_id.as_str())
                .or_default()
                .push((event.arrival, Tag::ArriveDestination));
        }
    }

    let mut trips = Vec::new();
    for (vehicle_id, mut stream) in streams {
        stream.sort_by_key(|(time, _)| *time);
        for pair in stream.windows(2) {
            let (start_time, start_tag) = pair[0];
            let (end_time, end_tag) = pair[1];
            if start_tag == Tag::DepartOrigin && end_tag == Tag::ArriveDestination {
                trips.push(OneWayTrip {
                    vehicle_id: vehicle_id.to_string(),
                    direction: direction.clone(),
                    start_time,
                    end_time,
                    duration_seconds: (end_time - start_time).num_milliseconds() as f64 / 1000.0,
                    hour_of_day: start_time.hour(),
                });
            }
        }
    }
    trips
}

/// Pair dwell events at two named stops into directional one-way trips.
///
/// Both directions are computed: `start`→`end` (departure from `start`
/// followed by arrival at `end`) and the symmetric reverse. Vehicles that
/// never complete a pairing contribute nothing.
pub fn one_way_trips(events: &[DwellEvent], start: &str, end: &str) -> Vec<OneWayTrip> {
    let mut trips = directional_trips(events, start, end);
    trips.extend(directional_trips(events, end, start));
    info!(
        "[Trips] {} one-way trips between '{}' and '{}'",
        trips.len(),
        start,
        end
    );
    trips
}
