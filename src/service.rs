use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::errors::ServiceError;
use crate::flight::ClosestFlightReply;
use crate::geo::GeoPoint;
use crate::provider::FlightProvider;
use crate::selector::{SearchRequest, find_closest_flight};

pub const API_KEY_HEADER: &str = "X-API-Key";
pub const DEFAULT_RADIUS_KM: f64 = 10.0;
pub const MIN_RADIUS_KM: f64 = 1.0;
pub const MAX_RADIUS_KM: f64 = 500.0;

const INVALID_PARAMS: &str = "Invalid parameters. Required: lat, lon. Optional: radius";

#[derive(Clone)]
pub struct AppState {
    provider: Arc<dyn FlightProvider>,
    api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(provider: Arc<dyn FlightProvider>, api_key: Option<String>) -> Self {
        AppState { provider, api_key: api_key.map(Arc::from) }
    }

    // no configured key means the endpoint is open
    fn is_authorized(&self, headers: &HeaderMap) -> bool {
        match &self.api_key {
            None => true,
            Some(key) => headers
                .get(API_KEY_HEADER)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|provided| provided == key.as_ref()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/closest-flight", get(closest_flight))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServiceError::Upstream(e) => {
                error!("Error fetching flights: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

async fn index() -> Json<Value> {
    Json(json!({
        "service": "Flight Finder API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "/health": {
                "method": "GET",
                "description": "Health check"
            },
            "/closest-flight": {
                "method": "GET",
                "description": "Find closest flight to coordinates",
                "parameters": {
                    "lat": "Latitude (required, -90 to 90)",
                    "lon": "Longitude (required, -180 to 180)",
                    "radius": "Search radius in km (optional, default 10, max 500)"
                },
                "headers": {
                    "X-API-Key": "API key (required if the service is configured with one)"
                },
                "example": "/closest-flight?lat=37.7749&lon=-122.4194&radius=10"
            }
        }
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn closest_flight(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ClosestFlightReply>, ServiceError> {
    if !state.is_authorized(&headers) {
        return Err(ServiceError::Unauthorized);
    }
    let request = parse_search_request(&params)?;

    let start = std::time::Instant::now();
    let closest = find_closest_flight(state.provider.as_ref(), &request).await?;
    info!("closest-flight processed in {:?}", start.elapsed());

    Ok(Json(closest.into()))
}

pub fn parse_search_request(params: &HashMap<String, String>) -> Result<SearchRequest, ServiceError> {
    let lat = parse_param(params, "lat")?;
    let lon = parse_param(params, "lon")?;
    let radius_km = match params.get("radius") {
        Some(_) => parse_param(params, "radius")?,
        None => DEFAULT_RADIUS_KM,
    };

    // NaN fails every range check
    if !(-90.0..=90.0).contains(&lat) {
        return Err(invalid("Latitude must be between -90 and 90"));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(invalid("Longitude must be between -180 and 180"));
    }
    if !(MIN_RADIUS_KM..=MAX_RADIUS_KM).contains(&radius_km) {
        return Err(invalid("Radius must be between 1 and 500 km"));
    }

    Ok(SearchRequest { target: GeoPoint::new(lat, lon), radius_km })
}

fn parse_param(params: &HashMap<String, String>, name: &str) -> Result<f64, ServiceError> {
    params
        .get(name)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .ok_or_else(|| invalid(INVALID_PARAMS))
}

fn invalid(msg: &str) -> ServiceError {
    ServiceError::Validation(msg.to_string())
}
