//! The display client loop: join the network, then poll the lookup service and
//! paint the answer until the device loses power.
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Polling (fetch, render, countdown) -> Polling
//!                     |                         |  \
//!                  5s backoff              quiet hours   fetch/render error
//!                     v                         v          v 10s backoff
//!                Disconnected                 Quiet      Failed -> Polling | Disconnected
//! ```
//! Nothing on the way is fatal, the loop retries forever.

use chrono::{FixedOffset, NaiveTime, Utc};
use reqwest::header::USER_AGENT;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{error, info, warn};

use crate::config::{ClientConfig, Secrets};
use crate::display::{Display, Palette, clear_display, draw_countdown, render_flight, show_status};
use crate::errors::{ClientError, ClientResult};
use crate::flight::ClosestFlightReply;
use crate::network::{LinkStatus, NetworkLink};
use crate::service::API_KEY_HEADER;

const LINK_ATTEMPTS: u32 = 10;
const LINK_POLL: Duration = Duration::from_secs(1);
const LINK_RETRY: Duration = Duration::from_secs(5);
const ERROR_RETRY: Duration = Duration::from_secs(10);
const QUIET_SLEEP: Duration = Duration::from_secs(300);
const STARTUP_PAUSE: Duration = Duration::from_secs(3);
const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Connecting,
    Connected,
    Polling,
    Quiet,
    Failed,
}

/// What is currently on the panel.
#[derive(Debug, Clone, Default)]
pub struct DisplayState {
    pub last_reply: Option<ClosestFlightReply>,
    /// elapsed fraction of the refresh interval, 0..1
    pub countdown: f64,
}

/// Is `now` inside the quiet window? A window with `start` after `end` runs over
/// midnight, `start == end` is an empty window.
pub fn is_quiet_period(now: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    if start > end {
        now >= start || now < end
    } else {
        now >= start && now < end
    }
}

pub struct DisplayClient<D: Display, N: NetworkLink> {
    config: ClientConfig,
    secrets: Secrets,
    display: D,
    link: N,
    palette: Palette,
    http: reqwest::Client,
    utc_offset: FixedOffset,
    phase: Phase,
    state: DisplayState,
}

impl<D: Display, N: NetworkLink> DisplayClient<D, N> {
    pub fn new(config: ClientConfig, secrets: Secrets, display: D, link: N) -> ClientResult<Self> {
        let utc_offset = config
            .utc_offset
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| ClientError::Config(format!("invalid UTC offset {}", config.utc_offset)))?;
        let palette = Palette::new(config.bright);
        let http = reqwest::Client::builder().build()?;

        Ok(DisplayClient {
            config,
            secrets,
            display,
            link,
            palette,
            http,
            utc_offset,
            phase: Phase::Disconnected,
            state: DisplayState::default(),
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    pub async fn run(&mut self) {
        loop {
            self.phase = self.step().await;
        }
    }

    /// Run the current phase and return the next one.
    pub async fn step(&mut self) -> Phase {
        match self.phase {
            Phase::Disconnected => Phase::Connecting,

            Phase::Connecting => match self.connect_network().await {
                Ok(true) => Phase::Connected,
                Ok(false) => {
                    sleep(LINK_RETRY).await;
                    Phase::Disconnected
                }
                Err(e) => {
                    error!("display error while connecting: {}", e);
                    sleep(LINK_RETRY).await;
                    Phase::Disconnected
                }
            },

            Phase::Connected => {
                if let Err(e) = self.show_startup() {
                    warn!("display error: {}", e);
                }
                sleep(STARTUP_PAUSE).await;
                Phase::Polling
            }

            Phase::Polling => {
                if self.in_quiet_period() {
                    return Phase::Quiet;
                }
                match self.poll_once().await {
                    Ok(()) => Phase::Polling,
                    Err(e) => {
                        error!("Error in main loop: {}", e);
                        let text = match e {
                            ClientError::Status(_) => "API Err",
                            _ => "Error",
                        };
                        if let Err(e) = show_status(&mut self.display, &self.palette, self.palette.red, &[text]) {
                            error!("display error: {}", e);
                        }
                        Phase::Failed
                    }
                }
            }

            Phase::Quiet => {
                info!("Quiet time");
                self.state.last_reply = None;
                if let Err(e) = clear_display(&mut self.display, &self.palette) {
                    warn!("display error: {}", e);
                }
                sleep(QUIET_SLEEP).await;
                Phase::Polling
            }

            Phase::Failed => {
                sleep(ERROR_RETRY).await;
                if self.link.status() == LinkStatus::Connected {
                    Phase::Polling
                } else {
                    Phase::Disconnected
                }
            }
        }
    }

    /// Join the network, polling the link status once a second until it settles
    /// and showing how many polls are left.
    pub async fn connect_network(&mut self) -> ClientResult<bool> {
        info!("Connecting to WiFi...");
        show_status(&mut self.display, &self.palette, self.palette.white, &["Connecting to WiFi..."])?;

        self.link.connect(&self.secrets.wifi_ssid, &self.secrets.wifi_password);

        for remaining in (0..LINK_ATTEMPTS).rev() {
            if self.link.status().is_settled() {
                break;
            }
            info!("Waiting for WiFi connection...");
            let countdown = format!("WiFi {remaining}");
            show_status(&mut self.display, &self.palette, self.palette.white, &[countdown.as_str()])?;
            sleep(LINK_POLL).await;
        }

        let status = self.link.status();
        if status != LinkStatus::Connected {
            warn!("Failed to connect to WiFi: {:?}", status);
            show_status(&mut self.display, &self.palette, self.palette.red, &["WiFi Err"])?;
            return Ok(false);
        }

        match self.link.ifconfig() {
            Some(ip) => info!("Connected to WiFi, IP: {}", ip),
            None => info!("Connected to WiFi"),
        }
        show_status(&mut self.display, &self.palette, self.palette.white, &["Connected"])?;
        Ok(true)
    }

    fn show_startup(&mut self) -> ClientResult<()> {
        let display = &mut self.display;
        display.set_pen(self.palette.black);
        display.clear();
        display.set_pen(self.palette.green);
        display.text("Fetching...", 2, 2, 100, 1);
        display.text(&self.config.latitude.to_string(), 2, 13, 100, 1);
        display.text(&self.config.longitude.to_string(), 2, 23, 100, 1);
        display.update()
    }

    fn in_quiet_period(&self) -> bool {
        let now = Utc::now().with_timezone(&self.utc_offset).time();
        is_quiet_period(now, self.config.quiet_start, self.config.quiet_end)
    }

    async fn poll_once(&mut self) -> ClientResult<()> {
        let reply = self.fetch_flight_data().await?;
        info!("Displaying flight data for {} seconds...", self.config.refresh_interval);
        render_flight(
            &mut self.display,
            &self.palette,
            &reply,
            self.config.distance_unit,
            self.config.radius,
        )?;
        self.state.last_reply = Some(reply);
        self.countdown().await
    }

    async fn countdown(&mut self) -> ClientResult<()> {
        let interval = Duration::from_secs(self.config.refresh_interval.max(1));
        let start = Instant::now();

        while start.elapsed() < interval {
            self.state.countdown = start.elapsed().as_secs_f64() / interval.as_secs_f64();
            draw_countdown(&mut self.display, &self.palette, self.state.countdown);
            self.display.update()?;
            sleep(COUNTDOWN_TICK).await;
        }
        self.state.countdown = 1.0;
        Ok(())
    }

    pub async fn fetch_flight_data(&self) -> ClientResult<ClosestFlightReply> {
        let url = closest_flight_url(&self.config);
        info!("Fetching data from: {}", url);

        let resp = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.secrets.flight_finder_api_key)
            .header(USER_AGENT, format!("LED Matrix Display {}", self.config.user_agent_id))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            error!("API Error: {}", status);
            return Err(ClientError::Status(status.as_u16()));
        }

        let reply = resp.json::<ClosestFlightReply>().await?;
        info!("Data received successfully");
        Ok(reply)
    }
}

pub fn closest_flight_url(config: &ClientConfig) -> String {
    format!(
        "{}/closest-flight?lat={}&lon={}&radius={}",
        config.api_url.trim_end_matches('/'),
        config.latitude,
        config.longitude,
        config.radius
    )
}

/// Paint why the secrets could not be used. A missing file gets its own
/// message, anything else shows the start of the error text.
pub fn show_secrets_error(display: &mut impl Display, palette: &Palette, err: &ClientError) -> ClientResult<()> {
    match err {
        ClientError::Io(_) => show_status(display, palette, palette.red, &["Missing", "secrets"]),
        other => {
            let msg: String = other.to_string().chars().take(10).collect();
            show_status(display, palette, palette.red, &[msg.as_str()])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::tests::{Op, RecordingDisplay, found_reply};
    use axum::{
        Router,
        http::{HeaderMap, StatusCode},
        routing::get,
    };
    use chrono::TimeDelta;
    use clap::Parser;
    use std::cell::Cell;
    use std::net::{IpAddr, Ipv4Addr};

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_quiet_period_overnight() {
        let (start, end) = (time(22, 0), time(7, 0));
        assert!(is_quiet_period(time(23, 0), start, end));
        assert!(is_quiet_period(time(6, 0), start, end));
        assert!(is_quiet_period(time(22, 0), start, end));
        assert!(is_quiet_period(time(0, 0), start, end));
        assert!(!is_quiet_period(time(12, 0), start, end));
        assert!(!is_quiet_period(time(7, 0), start, end));
    }

    #[test]
    fn test_quiet_period_same_day() {
        let (start, end) = (time(13, 0), time(14, 30));
        assert!(is_quiet_period(time(13, 0), start, end));
        assert!(is_quiet_period(time(14, 29), start, end));
        assert!(!is_quiet_period(time(14, 30), start, end));
        assert!(!is_quiet_period(time(23, 0), start, end));

        assert!(!is_quiet_period(time(9, 0), time(9, 0), time(9, 0)));
    }

    struct FakeLink {
        statuses: Vec<LinkStatus>,
        polls: Cell<usize>,
        joined: Option<String>,
    }

    impl FakeLink {
        fn new(statuses: Vec<LinkStatus>) -> Self {
            FakeLink { statuses, polls: Cell::new(0), joined: None }
        }
    }

    impl NetworkLink for FakeLink {
        fn connect(&mut self, ssid: &str, _password: &str) {
            self.joined = Some(ssid.to_string());
        }

        fn status(&self) -> LinkStatus {
            let i = self.polls.get();
            self.polls.set(i + 1);
            self.statuses[i.min(self.statuses.len() - 1)]
        }

        fn ifconfig(&self) -> Option<IpAddr> {
            Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 42)))
        }
    }

    fn config() -> ClientConfig {
        config_for("http://flights.local/", 60)
    }

    // quiet hours off so the wall clock cannot interfere
    fn config_for(api_url: &str, refresh_interval: u64) -> ClientConfig {
        let mut config = ClientConfig::try_parse_from([
            "flight-display".to_string(),
            format!("--api-url={api_url}"),
            "--latitude=51.5274575".to_string(),
            "--longitude=-0.2595316".to_string(),
            "--radius=25".to_string(),
            format!("--refresh-interval={refresh_interval}"),
        ])
        .unwrap();
        config.quiet_end = config.quiet_start;
        config
    }

    /// Serve `body` with `status` on /closest-flight, for requests carrying the right key.
    async fn serve_stub(status: StatusCode, body: String) -> String {
        let app = Router::new().route(
            "/closest-flight",
            get(move |headers: HeaderMap| async move {
                match headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
                    Some("key") => (status, body),
                    _ => (StatusCode::UNAUTHORIZED, String::new()),
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        format!("http://{addr}")
    }

    fn polling_client(api_url: &str, refresh_interval: u64) -> DisplayClient<RecordingDisplay, FakeLink> {
        let link = FakeLink::new(vec![LinkStatus::Connected]);
        let mut client =
            DisplayClient::new(config_for(api_url, refresh_interval), secrets(), RecordingDisplay::default(), link)
                .unwrap();
        client.phase = Phase::Polling;
        client
    }

    fn updates(display: &RecordingDisplay) -> usize {
        display.ops.iter().filter(|op| **op == Op::Update).count()
    }

    fn secrets() -> Secrets {
        Secrets {
            wifi_ssid: "home".into(),
            wifi_password: "pw".into(),
            flight_finder_api_key: "key".into(),
        }
    }

    #[test]
    fn test_closest_flight_url() {
        assert_eq!(
            closest_flight_url(&config()),
            "http://flights.local/closest-flight?lat=51.5274575&lon=-0.2595316&radius=25"
        );
    }

    #[tokio::test]
    async fn test_connect_network() {
        let link = FakeLink::new(vec![LinkStatus::Connected]);
        let mut client = DisplayClient::new(config(), secrets(), RecordingDisplay::default(), link).unwrap();

        assert!(client.connect_network().await.unwrap());
        assert_eq!(client.link.joined.as_deref(), Some("home"));
        assert_eq!(client.display.texts(), vec!["Connecting to WiFi...", "Connected"]);
    }

    #[tokio::test]
    async fn test_connect_network_failure() {
        let link = FakeLink::new(vec![LinkStatus::BadAuth]);
        let mut client = DisplayClient::new(config(), secrets(), RecordingDisplay::default(), link).unwrap();

        assert!(!client.connect_network().await.unwrap());
        assert_eq!(client.display.texts(), vec!["Connecting to WiFi...", "WiFi Err"]);
        assert!(client.display.ops.contains(&Op::Pen(Palette::new(false).red)));
    }

    #[tokio::test]
    async fn test_step_transitions() {
        let link = FakeLink::new(vec![LinkStatus::Connected]);
        let mut client = DisplayClient::new(config(), secrets(), RecordingDisplay::default(), link).unwrap();
        assert_eq!(client.phase(), Phase::Disconnected);

        client.phase = client.step().await;
        assert_eq!(client.phase(), Phase::Connecting);
        client.phase = client.step().await;
        assert_eq!(client.phase(), Phase::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_network_countdown() {
        let link = FakeLink::new(vec![LinkStatus::Connecting, LinkStatus::NoIp, LinkStatus::Connected]);
        let mut client = DisplayClient::new(config(), secrets(), RecordingDisplay::default(), link).unwrap();

        assert!(client.connect_network().await.unwrap());
        assert_eq!(client.display.texts(), vec!["Connecting to WiFi...", "WiFi 9", "WiFi 8", "Connected"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_network_timeout() {
        let link = FakeLink::new(vec![LinkStatus::Connecting]);
        let mut client = DisplayClient::new(config(), secrets(), RecordingDisplay::default(), link).unwrap();
        let start = Instant::now();

        assert!(!client.connect_network().await.unwrap());
        assert_eq!(start.elapsed(), LINK_POLL * LINK_ATTEMPTS);

        let texts = client.display.texts();
        assert_eq!(texts.len(), 12);
        assert_eq!(texts[1], "WiFi 9");
        assert_eq!(texts[10], "WiFi 0");
        assert_eq!(texts[11], "WiFi Err");
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_found_flight() {
        let body = serde_json::to_string(&found_reply()).unwrap();
        let url = serve_stub(StatusCode::OK, body).await;
        let mut client = polling_client(&url, 3);

        client.phase = client.step().await;
        assert_eq!(client.phase(), Phase::Polling);

        assert_eq!(client.display.texts(), vec!["LHR > JFK", "BA117", "3km", "Boeing 777"]);
        // full bar on the first tick, then one frame per second of the interval
        assert!(client.display.ops.contains(&Op::Rect(49, 2, 15, 3)));
        assert_eq!(updates(&client.display), 1 + 3);
        assert_eq!(client.state().countdown, 1.0);
        assert_eq!(client.state().last_reply, Some(found_reply()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_no_flights() {
        let body = r#"{"found": false, "message": "No flights found in search area"}"#.to_string();
        let url = serve_stub(StatusCode::OK, body).await;
        let mut client = polling_client(&url, 1);

        client.phase = client.step().await;
        assert_eq!(client.phase(), Phase::Polling);
        assert_eq!(client.display.texts(), vec!["No flights in radius 25km"]);
        assert_eq!(client.state().last_reply.as_ref().map(|r| r.found), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_api_error() {
        let url = serve_stub(StatusCode::SERVICE_UNAVAILABLE, String::new()).await;
        let mut client = polling_client(&url, 60);

        client.phase = client.step().await;
        assert_eq!(client.phase(), Phase::Failed);
        assert_eq!(client.display.texts(), vec!["API Err"]);
        assert!(client.display.ops.contains(&Op::Pen(client.palette.red)));
        assert!(client.state().last_reply.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_unreadable_reply() {
        let url = serve_stub(StatusCode::OK, "<html>oops</html>".to_string()).await;
        let mut client = polling_client(&url, 60);

        client.phase = client.step().await;
        assert_eq!(client.phase(), Phase::Failed);
        assert_eq!(client.display.texts(), vec!["Error"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_retries_after_backoff() {
        let mut client = polling_client("http://flights.local", 60);
        client.phase = Phase::Failed;
        let start = Instant::now();

        client.phase = client.step().await;
        assert_eq!(client.phase(), Phase::Polling);
        assert_eq!(start.elapsed(), ERROR_RETRY);

        let link = FakeLink::new(vec![LinkStatus::NoNetwork]);
        let mut client = DisplayClient::new(config(), secrets(), RecordingDisplay::default(), link).unwrap();
        client.phase = Phase::Failed;
        client.phase = client.step().await;
        assert_eq!(client.phase(), Phase::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_hours() {
        let mut config = config();
        let now = Utc::now().time();
        config.quiet_start = now - TimeDelta::minutes(30);
        config.quiet_end = now + TimeDelta::minutes(30);
        let link = FakeLink::new(vec![LinkStatus::Connected]);
        let mut client = DisplayClient::new(config, secrets(), RecordingDisplay::default(), link).unwrap();
        client.phase = Phase::Polling;
        client.state.last_reply = Some(found_reply());

        // no request is made, the stub URL does not resolve
        client.phase = client.step().await;
        assert_eq!(client.phase(), Phase::Quiet);
        assert!(client.display.ops.is_empty());

        let start = Instant::now();
        client.phase = client.step().await;
        assert_eq!(client.phase(), Phase::Polling);
        assert_eq!(start.elapsed(), QUIET_SLEEP);
        assert_eq!(client.display.ops, vec![Op::Pen(client.palette.black), Op::Clear, Op::Update]);
        assert!(client.state().last_reply.is_none());
    }

    #[test]
    fn test_invalid_utc_offset() {
        let mut config = config();
        config.utc_offset = i32::MAX;
        let link = FakeLink::new(vec![LinkStatus::Connected]);
        assert!(matches!(
            DisplayClient::new(config, secrets(), RecordingDisplay::default(), link),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn test_show_secrets_error() {
        let palette = Palette::new(false);

        let mut display = RecordingDisplay::default();
        let missing = ClientError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        show_secrets_error(&mut display, &palette, &missing).unwrap();
        assert_eq!(display.texts(), vec!["Missing", "secrets"]);

        let mut display = RecordingDisplay::default();
        let empty = ClientError::Secrets("WIFI_SSID in secrets file is empty!".into());
        show_secrets_error(&mut display, &palette, &empty).unwrap();
        assert_eq!(display.texts(), vec!["WIFI_SSID "]);
    }
}
