use chrono::NaiveTime;
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::display::DistanceUnit;
use crate::errors::{ClientError, ClientResult};
use crate::opensky::{ADSBDB_URL, OPENSKY_URL};

/// Closest-flight lookup service
#[derive(Debug, Clone, Parser)]
#[command(version)]
pub struct ServiceConfig {
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// required X-API-Key header value, the service is open if not set
    #[arg(long, env = "SERVICE_API_KEY")]
    pub api_key: Option<String>,

    #[arg(long, env = "OPENSKY_URL", default_value = OPENSKY_URL)]
    pub opensky_url: String,

    #[arg(long, env = "ADSBDB_URL", default_value = ADSBDB_URL)]
    pub adsbdb_url: String,

    /// upstream request timeout
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,
}

/// LED matrix client showing the flight closest to a fixed location
#[derive(Debug, Clone, Parser)]
#[command(version)]
pub struct ClientConfig {
    /// base URL of the lookup service
    #[arg(long, env = "FLIGHT_FINDER_URL")]
    pub api_url: String,

    #[arg(long, allow_hyphen_values = true)]
    pub latitude: f64,

    #[arg(long, allow_hyphen_values = true)]
    pub longitude: f64,

    /// search radius in km
    #[arg(long, default_value_t = 10.0)]
    pub radius: f64,

    /// seconds between lookups, best kept at 30 or more
    #[arg(long, default_value_t = 60)]
    pub refresh_interval: u64,

    /// unit the distance is shown in
    #[arg(long, value_enum, default_value_t = DistanceUnit::Km)]
    pub distance_unit: DistanceUnit,

    /// drive the LEDs at full intensity
    #[arg(long)]
    pub bright: bool,

    /// appended to the User-Agent so requests can be told apart per device
    #[arg(long, default_value = "Flight Tracker 1")]
    pub user_agent_id: String,

    /// local time offset from UTC in hours
    #[arg(long, default_value_t = 0, allow_hyphen_values = true, value_parser = clap::value_parser!(i32).range(-12..=14))]
    pub utc_offset: i32,

    /// local time (HH:MM) the display goes dark
    #[arg(long, value_parser = parse_time_of_day, default_value = "22:00")]
    pub quiet_start: NaiveTime,

    /// local time (HH:MM) the display comes back, same as start disables quiet hours
    #[arg(long, value_parser = parse_time_of_day, default_value = "07:00")]
    pub quiet_end: NaiveTime,

    #[arg(long, default_value = "secrets.json")]
    pub secrets: PathBuf,

    /// PNG file the panel frames are written to
    #[arg(long, default_value = "panel.png")]
    pub panel_out: PathBuf,

    /// size of one panel pixel in the PNG
    #[arg(long, default_value_t = 8)]
    pub panel_scale: u32,
}

pub fn parse_time_of_day(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|e| format!("expected HH:MM: {e}"))
}

#[derive(Clone, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub wifi_ssid: String,
    #[serde(default)]
    pub wifi_password: String,
    #[serde(default)]
    pub flight_finder_api_key: String,
}

// keep credentials out of logs
impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets").field("wifi_ssid", &self.wifi_ssid).finish_non_exhaustive()
    }
}

impl Secrets {
    pub fn load(path: &Path) -> ClientResult<Self> {
        let data = std::fs::read_to_string(path)?;
        let secrets: Secrets = serde_json::from_str(&data)?;
        secrets.validate()?;
        Ok(secrets)
    }

    pub fn validate(&self) -> ClientResult<()> {
        let file = "secrets file";
        if self.wifi_ssid.is_empty() {
            return Err(ClientError::Secrets(format!("WIFI_SSID in {file} is empty!")));
        }
        if self.wifi_password.is_empty() {
            return Err(ClientError::Secrets(format!("WIFI_PASSWORD in {file} is empty!")));
        }
        if self.flight_finder_api_key.is_empty() {
            return Err(ClientError::Secrets(format!("FLIGHT_FINDER_API_KEY in {file} is empty!")));
        }
        Ok(())
    }
}
