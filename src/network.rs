use std::net::{IpAddr, UdpSocket};
use tracing::{debug, info};

/// Link state as reported by the network interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Idle,
    Connecting,
    /// associated, waiting for an address
    NoIp,
    Connected,
    Failed,
    NoNetwork,
    BadAuth,
}

impl LinkStatus {
    pub fn is_failure(self) -> bool {
        matches!(self, LinkStatus::Failed | LinkStatus::NoNetwork | LinkStatus::BadAuth)
    }

    /// no point in waiting any longer
    pub fn is_settled(self) -> bool {
        self == LinkStatus::Connected || self.is_failure()
    }
}

/// The network interface the display client talks through (on the device that
/// is the Wi-Fi station).
pub trait NetworkLink {
    fn connect(&mut self, ssid: &str, password: &str);

    fn status(&self) -> LinkStatus;

    fn ifconfig(&self) -> Option<IpAddr>;
}

/// [`NetworkLink`] for a host that is already online. Joining is a no-op, the
/// link counts as connected as soon as the host has a routable local address.
#[derive(Debug, Default)]
pub struct HostLink {
    probe: Option<String>,
}

impl HostLink {
    /// `probe` is any `host:port` the route lookup is made against, no packet is sent
    pub fn new(probe: impl Into<String>) -> Self {
        HostLink { probe: Some(probe.into()) }
    }

    fn local_addr(&self) -> Option<IpAddr> {
        let probe = self.probe.as_deref().unwrap_or("1.1.1.1:80");
        let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
        socket.connect(probe).ok()?;
        let addr = socket.local_addr().ok()?.ip();
        (!addr.is_unspecified()).then_some(addr)
    }
}

impl NetworkLink for HostLink {
    fn connect(&mut self, ssid: &str, _password: &str) {
        info!("using host network (ssid {} not joined)", ssid);
    }

    fn status(&self) -> LinkStatus {
        match self.local_addr() {
            Some(addr) => {
                debug!("host address {}", addr);
                LinkStatus::Connected
            }
            None => LinkStatus::NoNetwork,
        }
    }

    fn ifconfig(&self) -> Option<IpAddr> {
        self.local_addr()
    }
}
