use async_trait::async_trait;

use crate::errors::ProviderResult;
use crate::flight::{AircraftRecord, FlightDetails};
use crate::geo::Bounds;

/// Source of live aircraft positions plus per-flight route details.
#[async_trait]
pub trait FlightProvider: Send + Sync {
    async fn get_flights(&self, bounds: &Bounds) -> ProviderResult<Vec<AircraftRecord>>;

    async fn get_flight_details(&self, flight: &AircraftRecord) -> ProviderResult<FlightDetails>;
}
