//! Vote resource URIs embedded in QR codes
//!
//! A QR code encodes `http://{lan-ip}:{port}/polls/{poll_id}/{option_token}`.
//! Scanning it from another device on the same network lands on the vote
//! endpoint for exactly that (poll, option) pair.

use crate::domain::poll::PollId;
use parking_lot::RwLock;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use thiserror::Error;
use tracing::{error, info};

/// Destination used to pick the outbound interface. No packet is sent.
pub const DEFAULT_PROBE_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 80);

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("unable to determine own LAN address: {0}")]
    NetworkResolution(#[source] io::Error),
}

/// Looks up the address other devices on the LAN can reach this host at
pub trait LanAddressResolver: Send + Sync {
    fn lan_address(&self) -> io::Result<IpAddr>;
}

/// Fixed address, e.g. from the `advertise_address` config key
#[derive(Debug, Clone, Copy)]
pub struct StaticAddress(pub IpAddr);

impl LanAddressResolver for StaticAddress {
    fn lan_address(&self) -> io::Result<IpAddr> {
        Ok(self.0)
    }
}

/// Asks the OS which local address it would route `probe` from.
///
/// Connecting a UDP socket only selects a route; nothing goes on the wire.
#[derive(Debug, Clone, Copy)]
pub struct UdpProbeResolver {
    probe: SocketAddr,
}

impl UdpProbeResolver {
    pub fn new(probe: SocketAddr) -> Self {
        Self { probe }
    }
}

impl Default for UdpProbeResolver {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_ADDR)
    }
}

impl LanAddressResolver for UdpProbeResolver {
    fn lan_address(&self) -> io::Result<IpAddr> {
        let bind_addr = match self.probe {
            SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = UdpSocket::bind(bind_addr)?;
        socket.connect(self.probe)?;

        let ip = socket.local_addr()?.ip();
        if ip.is_unspecified() || ip.is_loopback() {
            return Err(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no active LAN interface (got {ip})"),
            ));
        }
        Ok(ip)
    }
}

/// Builds vote URIs for the local server.
///
/// The LAN address is looked up on first use and cached for the life of the
/// encoder. A failed lookup is not cached, so the next poll retries.
pub struct LocalResourceEncoder {
    resolver: Box<dyn LanAddressResolver>,
    port: u16,
    lan_ip: RwLock<Option<IpAddr>>,
}

impl LocalResourceEncoder {
    pub fn new(resolver: impl LanAddressResolver + 'static, port: u16) -> Self {
        Self { resolver: Box::new(resolver), port, lan_ip: RwLock::new(None) }
    }

    /// Resolve (once) and return the advertised LAN address
    pub fn lan_address(&self) -> Result<IpAddr, ResourceError> {
        if let Some(ip) = *self.lan_ip.read() {
            return Ok(ip);
        }

        let ip = self.resolver.lan_address().map_err(|e| {
            error!(error = %e, "lan_address_resolution_failed");
            ResourceError::NetworkResolution(e)
        })?;
        info!(lan_ip = %ip, port = %self.port, "lan_address_resolved");
        *self.lan_ip.write() = Some(ip);
        Ok(ip)
    }

    /// URI for voting `option_token` in `poll_id`.
    ///
    /// `option_token` must already be a normalized token; it is embedded as is.
    pub fn build_resource_string(
        &self,
        poll_id: &PollId,
        option_token: &str,
    ) -> Result<String, ResourceError> {
        let authority = SocketAddr::new(self.lan_address()?, self.port);
        Ok(format!("http://{authority}/polls/{poll_id}/{option_token}"))
    }
}
