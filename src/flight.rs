use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

pub const NO_FLIGHTS_MESSAGE: &str = "No flights found in search area";
pub const NO_AIRBORNE_MESSAGE: &str = "No airborne flights found in search area";

/// One aircraft as reported by the flight data source. Units follow the usual
/// flight-tracker conventions: feet, knots, feet per minute, degrees.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AircraftRecord {
    pub id: String,
    pub number: Option<String>,
    pub callsign: Option<String>,
    pub icao_24bit: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub heading: Option<f64>,
    pub ground_speed: Option<f64>,
    pub vertical_speed: Option<f64>,
    pub aircraft_code: Option<String>,
    pub registration: Option<String>,
    pub airline_icao: Option<String>,
    pub airline_iata: Option<String>,
    pub origin_iata: Option<String>,
    pub destination_iata: Option<String>,
    pub on_ground: bool,

    // only set by a successful detail lookup
    pub origin_name: Option<String>,
    pub destination_name: Option<String>,
    pub aircraft_model: Option<String>,
}

impl AircraftRecord {
    pub fn position(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        }
    }

    /// Merge route details into this record. Names and model come only from the
    /// details, base fields reported by the position source are kept if present.
    pub fn set_flight_details(&mut self, details: FlightDetails) {
        self.origin_name = details.origin_name;
        self.destination_name = details.destination_name;
        self.aircraft_model = details.aircraft_model;

        fill(&mut self.number, details.number);
        fill(&mut self.origin_iata, details.origin_iata);
        fill(&mut self.destination_iata, details.destination_iata);
        fill(&mut self.registration, details.registration);
        fill(&mut self.airline_icao, details.airline_icao);
        fill(&mut self.airline_iata, details.airline_iata);
    }
}

fn fill(field: &mut Option<String>, value: Option<String>) {
    if field.is_none() {
        *field = value;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlightDetails {
    pub origin_name: Option<String>,
    pub destination_name: Option<String>,
    pub aircraft_model: Option<String>,
    pub number: Option<String>,
    pub origin_iata: Option<String>,
    pub destination_iata: Option<String>,
    pub registration: Option<String>,
    pub airline_icao: Option<String>,
    pub airline_iata: Option<String>,
}

/// Outcome of a closest-flight lookup, before it is turned into a reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ClosestFlight {
    NotFound(&'static str),
    Found { flight: AircraftRecord, distance_km: f64 },
}

/* #region reply JSON *****************************************************************/

// the same types are used by the service to write and by the display client to read

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosestFlightReply {
    pub found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flight: Option<FlightInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightInfo {
    pub id: String,
    pub number: Option<String>,
    pub callsign: Option<String>,
    pub icao_24bit: Option<String>,
    pub position: PositionInfo,
    pub aircraft: AircraftInfo,
    pub airline: AirlineInfo,
    pub route: RouteInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionInfo {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub heading: Option<f64>,
    pub ground_speed: Option<f64>,
    pub vertical_speed: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AircraftInfo {
    pub code: Option<String>,
    pub registration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AirlineInfo {
    pub icao: Option<String>,
    pub iata: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteInfo {
    pub origin_iata: Option<String>,
    pub destination_iata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_name: Option<String>,
}

impl From<AircraftRecord> for FlightInfo {
    fn from(r: AircraftRecord) -> Self {
        FlightInfo {
            id: r.id,
            number: r.number,
            callsign: r.callsign,
            icao_24bit: r.icao_24bit,
            position: PositionInfo {
                latitude: r.latitude,
                longitude: r.longitude,
                altitude: r.altitude,
                heading: r.heading,
                ground_speed: r.ground_speed,
                vertical_speed: r.vertical_speed,
            },
            aircraft: AircraftInfo {
                code: r.aircraft_code,
                registration: r.registration,
                model: r.aircraft_model,
            },
            airline: AirlineInfo { icao: r.airline_icao, iata: r.airline_iata },
            route: RouteInfo {
                origin_iata: r.origin_iata,
                destination_iata: r.destination_iata,
                origin_name: r.origin_name,
                destination_name: r.destination_name,
            },
        }
    }
}

impl From<ClosestFlight> for ClosestFlightReply {
    fn from(closest: ClosestFlight) -> Self {
        match closest {
            ClosestFlight::NotFound(msg) => ClosestFlightReply {
                found: false,
                distance_km: None,
                flight: None,
                message: Some(msg.to_string()),
            },
            ClosestFlight::Found { flight, distance_km } => ClosestFlightReply {
                found: true,
                distance_km: Some((distance_km * 100.0).round() / 100.0),
                flight: Some(flight.into()),
                message: None,
            },
        }
    }
}

/* #endregion reply JSON */

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_record() -> AircraftRecord {
        AircraftRecord {
            id: "3c6444".into(),
            number: Some("LH2473".into()),
            callsign: Some("DLH2473".into()),
            icao_24bit: Some("3c6444".into()),
            latitude: Some(51.52),
            longitude: Some(-0.25),
            altitude: Some(10000.0),
            heading: Some(250.0),
            ground_speed: Some(420.0),
            vertical_speed: Some(0.0),
            aircraft_code: Some("A320".into()),
            registration: None,
            origin_iata: Some("LHR".into()),
            destination_iata: Some("MUC".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_set_flight_details_keeps_base_fields() {
        let mut record = sample_record();
        record.set_flight_details(FlightDetails {
            origin_name: Some("London Heathrow".into()),
            destination_name: Some("Munich".into()),
            aircraft_model: Some("Airbus A320-214".into()),
            number: Some("XX1".into()),
            origin_iata: Some("LGW".into()),
            registration: Some("D-AIZA".into()),
            ..Default::default()
        });

        assert_eq!(record.origin_name.as_deref(), Some("London Heathrow"));
        assert_eq!(record.aircraft_model.as_deref(), Some("Airbus A320-214"));
        assert_eq!(record.number.as_deref(), Some("LH2473"));
        assert_eq!(record.origin_iata.as_deref(), Some("LHR"));
        assert_eq!(record.registration.as_deref(), Some("D-AIZA"));
    }

    #[test]
    fn test_found_reply_json() {
        let reply: ClosestFlightReply = ClosestFlight::Found {
            flight: sample_record(),
            distance_km: 3.14159,
        }
        .into();
        let v = serde_json::to_value(&reply).unwrap();

        assert_eq!(v["found"], json!(true));
        assert_eq!(v["distance_km"], json!(3.14));
        assert_eq!(v["flight"]["number"], json!("LH2473"));
        assert_eq!(v["flight"]["position"]["altitude"], json!(10000.0));
        assert_eq!(v["flight"]["aircraft"]["registration"], json!(null));
        assert_eq!(v["flight"]["route"]["origin_iata"], json!("LHR"));
        assert!(v["flight"]["route"].get("origin_name").is_none());
        assert!(v["flight"]["aircraft"].get("model").is_none());
        assert!(v.get("message").is_none());
    }

    #[test]
    fn test_not_found_reply_json() {
        let reply: ClosestFlightReply = ClosestFlight::NotFound(NO_AIRBORNE_MESSAGE).into();
        let v = serde_json::to_value(&reply).unwrap();
        assert_eq!(v, json!({"found": false, "message": NO_AIRBORNE_MESSAGE}));
    }

    #[test]
    fn test_reply_tolerates_sparse_json() {
        let reply: ClosestFlightReply = serde_json::from_value(json!({
            "found": true,
            "distance_km": 0.42,
            "flight": {"number": "BA117", "aircraft": {"model": "Boeing 777-336(ER)"}}
        }))
        .unwrap();
        let flight = reply.flight.unwrap();
        assert_eq!(flight.number.as_deref(), Some("BA117"));
        assert_eq!(flight.aircraft.model.as_deref(), Some("Boeing 777-336(ER)"));
        assert_eq!(flight.route.origin_iata, None);
    }
}
