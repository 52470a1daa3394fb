//! `dhcp-options` CLI sub-command.

use anyhow::{bail, Context, Result};
use clap::Parser;
use pnet_base::MacAddr;
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use bootseed::config::{DhcpConfig, DEFAULT_VENDOR_ID, DHCP_CLIENT_PORT, DHCP_SERVER_PORT};
use bootseed::dhcp::packet::parse_ntp_servers;
use bootseed::dhcp::{DhcpClient, DhcpOptions, OPTION_NTP_SERVERS};

/// Query a DHCP server for options and print them as JSON
#[derive(Debug, Parser)]
pub struct CliDhcpOptions {
    /// The address of the DHCP server
    #[arg(long, value_name = "address")]
    host: IpAddr,
    /// Option code to request (repeatable, defaults to NTP servers)
    #[arg(long = "option", value_name = "code")]
    options: Vec<u8>,
    /// Seconds to wait for a reply
    #[arg(long, value_name = "secs", default_value = "5", value_parser = parse_timeout)]
    timeout: Duration,
    /// Vendor class identifier to send
    #[arg(long, value_name = "id", default_value = DEFAULT_VENDOR_ID, conflicts_with = "no_vendor_id")]
    vendor_id: String,
    /// Do not send a vendor class identifier
    #[arg(long)]
    no_vendor_id: bool,
    /// Hardware address to advertise, instead of the outgoing interface one
    #[arg(long, value_name = "mac", value_parser = parse_mac)]
    mac: Option<MacAddr>,
    /// Local port to bind
    #[arg(long, value_name = "port", default_value_t = DHCP_CLIENT_PORT)]
    client_port: u16,
    /// Server port to send the request to
    #[arg(long, value_name = "port", default_value_t = DHCP_SERVER_PORT)]
    server_port: u16,
}

fn parse_timeout(s: &str) -> std::result::Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|e| format!("invalid timeout '{s}': {e}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid timeout '{s}': {e}"))
}

fn parse_mac(s: &str) -> std::result::Result<MacAddr, String> {
    s.parse()
        .map_err(|e| format!("invalid MAC address '{s}': {e:?}"))
}

/// JSON output: option values hex-encoded, plus decoded well-known options.
#[derive(Debug, Serialize)]
struct OptionsReport {
    options: BTreeMap<u8, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ntp_servers: Option<Vec<Ipv4Addr>>,
}

impl OptionsReport {
    fn new(options: &DhcpOptions) -> Self {
        let hex: BTreeMap<u8, String> = options
            .iter()
            .map(|(code, value)| {
                let encoded: String = value.iter().map(|b| format!("{b:02x}")).collect();
                (*code, encoded)
            })
            .collect();
        let ntp_servers = options
            .get(&OPTION_NTP_SERVERS)
            .and_then(|v| parse_ntp_servers(v));
        OptionsReport {
            options: hex,
            ntp_servers,
        }
    }
}

impl CliDhcpOptions {
    pub(super) fn requested_options(&self) -> Vec<u8> {
        if self.options.is_empty() {
            vec![OPTION_NTP_SERVERS]
        } else {
            self.options.clone()
        }
    }

    pub(super) fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(super) fn vendor_id(&self) -> Option<&str> {
        if self.no_vendor_id {
            None
        } else {
            Some(&self.vendor_id)
        }
    }

    pub(super) fn config(&self) -> DhcpConfig {
        DhcpConfig {
            client_port: self.client_port,
            server_port: self.server_port,
            mac_address: self.mac,
        }
    }

    /// Run the `dhcp-options` sub-command.
    pub(crate) fn run(self) -> Result<()> {
        let client = DhcpClient::new(self.config());
        let options = client
            .get_dhcp_options(
                self.host,
                &self.requested_options(),
                self.timeout(),
                self.vendor_id(),
            )
            .context("querying DHCP options")?;
        let options = match options {
            Some(options) => options,
            None => bail!("no DHCP reply from {} within {:?}", self.host, self.timeout),
        };

        let report = serde_json::to_string_pretty(&OptionsReport::new(&options))
            .context("serializing DHCP options")?;
        println!("{report}");
        Ok(())
    }
}
