//! DHCP option discovery.
//!
//! This performs a single request/reply exchange with a known DHCP server
//! to retrieve configuration options (e.g. NTP servers), for hosts where
//! lease information is not otherwise available. No lease is negotiated.

use anyhow::{anyhow, Context, Result};
use pnet_base::MacAddr;
use slog_scope::{debug, trace};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use crate::config::DhcpConfig;

pub mod packet;
pub use self::packet::{DhcpOptions, OPTION_NTP_SERVERS};


/// Receive buffer size for replies.
const MAX_REPLY_SIZE: usize = 1024;

/// Client performing one-shot DHCP option requests.
#[derive(Clone, Debug, Default)]
pub struct DhcpClient {
    config: DhcpConfig,
}

impl DhcpClient {
    pub fn new(config: DhcpConfig) -> Self {
        DhcpClient { config }
    }

    /// Ask `dhcp_host` for `requested_options`.
    ///
    /// Returns `Ok(None)` if no matching reply arrives within `timeout`.
    /// Replies for other transactions are discarded without extending the
    /// wait. Socket setup failures are errors.
    pub fn get_dhcp_options(
        &self,
        dhcp_host: IpAddr,
        requested_options: &[u8],
        timeout: Duration,
        vendor_id: Option<&str>,
    ) -> Result<Option<DhcpOptions>> {
        let xid: u32 = rand::random();

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, self.config.client_port))
            .with_context(|| {
                format!(
                    "failed to bind DHCP client socket on port {}",
                    self.config.client_port
                )
            })?;
        let server = SocketAddr::new(dhcp_host, self.config.server_port);
        socket
            .connect(server)
            .with_context(|| format!("failed to connect DHCP socket to {server}"))?;

        let mac = match self.config.mac_address {
            Some(mac) => mac,
            None => {
                let local_ip = socket
                    .local_addr()
                    .context("failed to get DHCP socket local address")?
                    .ip();
                mac_address_by_local_ip(local_ip)
                    .ok_or_else(|| anyhow!("no interface with address {}", local_ip))?
            }
        };
        debug!(
            "requesting DHCP options {:?} from {} (xid {:#010x}, mac {})",
            requested_options, server, xid, mac
        );

        let request = packet::build_request(xid, mac, requested_options, vendor_id);
        socket
            .send(&request)
            .with_context(|| format!("failed to send DHCP request to {server}"))?;

        let options = wait_for_reply(&socket, xid, timeout)?;
        if options.is_none() {
            debug!("no DHCP reply from {} within {:?}", server, timeout);
        }
        Ok(options)
    }
}

/// Receive datagrams until one matches `xid` or `timeout` elapses.
fn wait_for_reply(socket: &UdpSocket, xid: u32, timeout: Duration) -> Result<Option<DhcpOptions>> {
    let start = Instant::now();
    let mut buf = [0u8; MAX_REPLY_SIZE];

    loop {
        let remaining = match timeout.checked_sub(start.elapsed()) {
            Some(d) if !d.is_zero() => d,
            _ => return Ok(None),
        };
        socket
            .set_read_timeout(Some(remaining))
            .context("failed to set DHCP socket timeout")?;

        let len = match socket.recv(&mut buf) {
            Ok(len) => len,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return Ok(None)
            }
            // ICMP errors from earlier sends surface here; keep waiting.
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                trace!("DHCP socket error: {}", e);
                continue;
            }
            Err(e) => return Err(e).context("failed to receive DHCP reply"),
        };

        trace!("received {} bytes", len);
        if let Some(options) = packet::parse_reply(&buf[..len], xid) {
            return Ok(Some(options));
        }
    }
}

/// Hardware address of the interface carrying the IPv4 address `local_ip`.
fn mac_address_by_local_ip(local_ip: IpAddr) -> Option<MacAddr> {
    let interfaces = pnet_datalink::interfaces();
    trace!("interfaces - {:?}", interfaces);

    for iface in interfaces {
        if iface
            .ips
            .iter()
            .any(|net| net.is_ipv4() && net.ip() == local_ip)
        {
            debug!("local address {} is on interface {}", local_ip, iface.name);
            return iface.mac;
        }
    }
    None
}
