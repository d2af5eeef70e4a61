use tracing::{info, warn};

use crate::errors::ProviderResult;
use crate::flight::{AircraftRecord, ClosestFlight, NO_AIRBORNE_MESSAGE, NO_FLIGHTS_MESSAGE};
use crate::geo::{GeoPoint, calculate_bounds, haversine_km};
use crate::provider::FlightProvider;

/// A validated closest-flight query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchRequest {
    pub target: GeoPoint,
    pub radius_km: f64,
}

#[derive(Debug, PartialEq)]
pub enum Selection<'a> {
    NoCandidates,
    NoneAirborne,
    Closest { record: &'a AircraftRecord, distance_km: f64 },
}

/// Pick the airborne, positioned record closest to `target`.
///
/// Grounded records and records without a position are skipped. On equal
/// distances the record that comes first in `records` wins, a later one only
/// replaces the current best if it is strictly closer.
pub fn select_closest(records: &[AircraftRecord], target: GeoPoint) -> Selection<'_> {
    if records.is_empty() {
        return Selection::NoCandidates;
    }

    let mut best: Option<(&AircraftRecord, f64)> = None;
    for record in records {
        if record.on_ground {
            continue;
        }
        let Some(pos) = record.position() else {
            continue;
        };

        let distance_km = haversine_km(target, pos);
        match best {
            Some((_, min)) if distance_km >= min => {}
            _ => best = Some((record, distance_km)),
        }
    }

    match best {
        Some((record, distance_km)) => Selection::Closest { record, distance_km },
        None => Selection::NoneAirborne,
    }
}

/// Look up the flights around the request point and return the closest one,
/// enriched with route details when the provider has them. A failing detail
/// lookup only loses the enrichment, a failing position lookup is an error.
pub async fn find_closest_flight(
    provider: &dyn FlightProvider,
    request: &SearchRequest,
) -> ProviderResult<ClosestFlight> {
    let bounds = calculate_bounds(request.target, request.radius_km);
    let flights = provider.get_flights(&bounds).await?;

    let (mut flight, distance_km) = match select_closest(&flights, request.target) {
        Selection::NoCandidates => return Ok(ClosestFlight::NotFound(NO_FLIGHTS_MESSAGE)),
        Selection::NoneAirborne => return Ok(ClosestFlight::NotFound(NO_AIRBORNE_MESSAGE)),
        Selection::Closest { record, distance_km } => (record.clone(), distance_km),
    };
    info!("closest of {} flights: {} at {:.2} km", flights.len(), flight.id, distance_km);

    match provider.get_flight_details(&flight).await {
        Ok(details) => flight.set_flight_details(details),
        Err(e) => warn!("proceeding without details for {}: {}", flight.id, e),
    }

    Ok(ClosestFlight::Found { flight, distance_km })
}
