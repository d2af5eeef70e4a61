//! [`FlightProvider`] backed by the OpenSky Network state vectors (positions)
//! and adsbdb (routes and airframes).

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::errors::{ProviderError, ProviderResult, malformed};
use crate::flight::{AircraftRecord, FlightDetails};
use crate::geo::Bounds;
use crate::provider::FlightProvider;

pub const OPENSKY_URL: &str = "https://opensky-network.org/api";
pub const ADSBDB_URL: &str = "https://api.adsbdb.com/v0";
const USER_AGENT: &str = concat!("FlightFinder/", env!("CARGO_PKG_VERSION"));

const FEET_PER_METER: f64 = 3.28084;
const KNOTS_PER_MPS: f64 = 1.94384;
const FPM_PER_MPS: f64 = 196.850;

#[derive(Debug, Deserialize)]
pub struct OpenSkyResponse {
    pub states: Option<Vec<Vec<serde_json::Value>>>,
}

#[derive(Debug, Deserialize)]
struct AdsbdbResponse<T> {
    response: T,
}

#[derive(Debug, Deserialize)]
struct AdsbdbRouteData {
    flightroute: Option<AdsbdbFlightRoute>,
}

#[derive(Debug, Deserialize)]
struct AdsbdbFlightRoute {
    callsign_iata: Option<String>,
    airline: Option<AdsbdbAirline>,
    origin: AdsbdbAirport,
    destination: AdsbdbAirport,
}

#[derive(Debug, Deserialize)]
struct AdsbdbAirline {
    icao: Option<String>,
    iata: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdsbdbAirport {
    iata_code: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdsbdbAircraftData {
    aircraft: AdsbdbAircraft,
}

#[derive(Debug, Deserialize)]
struct AdsbdbAircraft {
    #[serde(rename = "type")]
    type_name: Option<String>,
    manufacturer: Option<String>,
    registration: Option<String>,
}

pub struct OpenSkyProvider {
    client: reqwest::Client,
    opensky_url: String,
    adsbdb_url: String,
}

impl OpenSkyProvider {
    pub fn new(opensky_url: &str, adsbdb_url: &str, timeout: Duration) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(OpenSkyProvider {
            client,
            opensky_url: opensky_url.trim_end_matches('/').to_string(),
            adsbdb_url: adsbdb_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> ProviderResult<T> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }
        Ok(resp.json().await?)
    }

    async fn fetch_route(&self, callsign: &str) -> ProviderResult<AdsbdbFlightRoute> {
        let url = format!("{}/callsign/{}", self.adsbdb_url, callsign);
        info!("Fetching route for callsign {}: {}", callsign, url);
        let resp: AdsbdbResponse<AdsbdbRouteData> = self.get_json(&url).await?;
        resp.response
            .flightroute
            .ok_or_else(|| ProviderError::NoDetails(callsign.to_string()))
    }

    async fn fetch_aircraft(&self, icao24: &str) -> ProviderResult<AdsbdbAircraft> {
        let url = format!("{}/aircraft/{}", self.adsbdb_url, icao24);
        info!("Fetching airframe for hex {}: {}", icao24, url);
        let resp: AdsbdbResponse<AdsbdbAircraftData> = self.get_json(&url).await?;
        Ok(resp.response.aircraft)
    }
}

#[async_trait]
impl FlightProvider for OpenSkyProvider {
    async fn get_flights(&self, bounds: &Bounds) -> ProviderResult<Vec<AircraftRecord>> {
        let url = format!(
            "{}/states/all?lamin={}&lomin={}&lamax={}&lomax={}",
            self.opensky_url, bounds.south, bounds.west, bounds.north, bounds.east
        );
        info!("Fetching flights from OpenSky: {}", url);
        let resp: OpenSkyResponse = self.get_json(&url).await?;
        parse_states(resp)
    }

    async fn get_flight_details(&self, flight: &AircraftRecord) -> ProviderResult<FlightDetails> {
        let route = match flight.callsign.as_deref().filter(|c| !c.is_empty()) {
            Some(callsign) => self.fetch_route(callsign).await,
            None => Err(ProviderError::NoDetails(flight.id.clone())),
        };
        let icao24 = flight.icao_24bit.as_deref().unwrap_or(&flight.id);
        let aircraft = self.fetch_aircraft(icao24).await;

        let mut details = FlightDetails::default();
        match (route, aircraft) {
            (Err(route_err), Err(aircraft_err)) => {
                warn!("no details for {}: {}, {}", flight.id, route_err, aircraft_err);
                return Err(route_err);
            }
            (route, aircraft) => {
                match route {
                    Ok(route) => {
                        details.number = route.callsign_iata;
                        details.origin_iata = route.origin.iata_code;
                        details.origin_name = route.origin.name;
                        details.destination_iata = route.destination.iata_code;
                        details.destination_name = route.destination.name;
                        if let Some(airline) = route.airline {
                            details.airline_icao = airline.icao;
                            details.airline_iata = airline.iata;
                        }
                    }
                    Err(e) => warn!("no route for {}: {}", flight.id, e),
                }
                match aircraft {
                    Ok(aircraft) => {
                        details.aircraft_model = aircraft_model(aircraft.manufacturer, aircraft.type_name);
                        details.registration = aircraft.registration;
                    }
                    Err(e) => warn!("no airframe for {}: {}", icao24, e),
                }
            }
        }
        Ok(details)
    }
}

fn aircraft_model(manufacturer: Option<String>, type_name: Option<String>) -> Option<String> {
    match (manufacturer, type_name) {
        (Some(m), Some(t)) if t.starts_with(&m) => Some(t),
        (Some(m), Some(t)) => Some(format!("{m} {t}")),
        (None, t) => t,
        (m, None) => m,
    }
}

/// Turn OpenSky state vectors into aircraft records. Entries without an icao24
/// address are dropped, missing positions are kept (the selector filters those).
pub fn parse_states(resp: OpenSkyResponse) -> ProviderResult<Vec<AircraftRecord>> {
    let Some(states) = resp.states else {
        return Ok(Vec::new());
    };

    let mut records = Vec::with_capacity(states.len());
    for state in states {
        if state.len() < 12 {
            return Err(malformed(format!("state vector with {} fields", state.len())));
        }
        if let Some(record) = parse_state(&state) {
            records.push(record);
        }
    }
    Ok(records)
}

fn parse_state(state: &[serde_json::Value]) -> Option<AircraftRecord> {
    let icao24 = state[0].as_str()?.trim().to_lowercase();
    if icao24.is_empty() {
        return None;
    }
    let callsign = state[1]
        .as_str()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Some(AircraftRecord {
        id: icao24.clone(),
        callsign,
        icao_24bit: Some(icao24),
        longitude: state[5].as_f64(),
        latitude: state[6].as_f64(),
        altitude: state[7].as_f64().map(|m| (m * FEET_PER_METER).round()),
        on_ground: state[8].as_bool().unwrap_or(false),
        ground_speed: state[9].as_f64().map(|v| (v * KNOTS_PER_MPS).round()),
        heading: state[10].as_f64(),
        vertical_speed: state[11].as_f64().map(|v| (v * FPM_PER_MPS).round()),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_states() {
        let resp: OpenSkyResponse = serde_json::from_value(json!({
            "time": 1700000000,
            "states": [
                ["4b1815", "SWR18K  ", "Switzerland", 1700000000, 1700000000, 8.43, 47.42, 3048.0,
                 false, 100.0, 270.5, 5.08, null, 3100.0, "1000", false, 0],
                ["4b1816", "", "Switzerland", null, 1700000000, null, null, null,
                 true, 0.0, null, null, null, null, null, false, 0],
                ["", "NOHEX", "Nowhere", null, 1700000000, 1.0, 1.0, 1000.0,
                 false, 1.0, 1.0, 1.0, null, null, null, false, 0]
            ]
        }))
        .unwrap();

        let records = parse_states(resp).unwrap();
        assert_eq!(records.len(), 2);

        let r = &records[0];
        assert_eq!(r.id, "4b1815");
        assert_eq!(r.callsign.as_deref(), Some("SWR18K"));
        assert_eq!(r.latitude, Some(47.42));
        assert_eq!(r.longitude, Some(8.43));
        assert_eq!(r.altitude, Some(10000.0));
        assert_eq!(r.ground_speed, Some(194.0));
        assert_eq!(r.vertical_speed, Some(1000.0));
        assert!(!r.on_ground);

        let r = &records[1];
        assert_eq!(r.callsign, None);
        assert_eq!(r.position(), None);
        assert!(r.on_ground);
    }

    #[test]
    fn test_parse_empty_states() {
        let resp: OpenSkyResponse = serde_json::from_value(json!({"time": 1, "states": null})).unwrap();
        assert!(parse_states(resp).unwrap().is_empty());
    }

    #[test]
    fn test_parse_short_state_is_malformed() {
        let resp: OpenSkyResponse = serde_json::from_value(json!({"states": [["abc", "X"]]})).unwrap();
        assert!(matches!(parse_states(resp), Err(ProviderError::Malformed(_))));
    }

    #[test]
    fn test_aircraft_model() {
        assert_eq!(
            aircraft_model(Some("Airbus".into()), Some("A320 214".into())).as_deref(),
            Some("Airbus A320 214")
        );
        assert_eq!(
            aircraft_model(Some("Boeing".into()), Some("Boeing 737-8K5".into())).as_deref(),
            Some("Boeing 737-8K5")
        );
        assert_eq!(aircraft_model(None, Some("ATR 72".into())).as_deref(), Some("ATR 72"));
        assert_eq!(aircraft_model(None, None), None);
    }
}
