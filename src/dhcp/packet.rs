//! DHCP message encoding and decoding (RFC 2131 / RFC 2132).
//!
//! Only the subset needed for an option-discovery round trip is handled:
//! building a BOOTREQUEST and decoding the options of a matching BOOTREPLY.

use pnet_base::MacAddr;
use slog_scope::trace;
use std::collections::HashMap;
use std::net::Ipv4Addr;

/// Raw option values of a DHCP reply, keyed by option code.
pub type DhcpOptions = HashMap<u8, Vec<u8>>;

pub const BOOTREQUEST: u8 = 1;
pub const BOOTREPLY: u8 = 2;

/// Hardware type for 10Mb Ethernet.
const HTYPE_ETHERNET: u8 = 1;
const HLEN_ETHERNET: u8 = 6;

pub const MAGIC_COOKIE: [u8; 4] = [0x63, 0x82, 0x53, 0x63];

/// Offset of the transaction id in the fixed header.
const XID_OFFSET: usize = 4;
/// Offset of the magic cookie, right after the fixed-size BOOTP fields.
const COOKIE_OFFSET: usize = 236;
/// First option byte.
const OPTIONS_OFFSET: usize = 240;

const CHADDR_LEN: usize = 16;
const SNAME_LEN: usize = 64;
const FILE_LEN: usize = 128;

pub const OPTION_PAD: u8 = 0;
pub const OPTION_NTP_SERVERS: u8 = 42;
pub const OPTION_MESSAGE_TYPE: u8 = 53;
pub const OPTION_PARAMETER_REQUEST_LIST: u8 = 55;
pub const OPTION_VENDOR_CLASS_IDENTIFIER: u8 = 60;
pub const OPTION_CLIENT_IDENTIFIER: u8 = 61;
pub const OPTION_END: u8 = 255;

/// Message type sent in requests (DHCPDISCOVER).
const DHCPDISCOVER: u8 = 1;

/// Build a BOOTREQUEST asking the server for `requested_options`.
///
/// An empty `vendor_id` is left out. Values longer than an option can carry
/// (255 bytes) are truncated.
pub fn build_request(
    xid: u32,
    mac: MacAddr,
    requested_options: &[u8],
    vendor_id: Option<&str>,
) -> Vec<u8> {
    let hwaddr = [mac.0, mac.1, mac.2, mac.3, mac.4, mac.5];
    let mut data = Vec::with_capacity(OPTIONS_OFFSET + 64);

    data.extend_from_slice(&[BOOTREQUEST, HTYPE_ETHERNET, HLEN_ETHERNET, 0]);
    data.extend_from_slice(&xid.to_be_bytes());
    // secs, flags
    data.extend_from_slice(&[0; 4]);
    // ciaddr, yiaddr, siaddr, giaddr
    data.extend_from_slice(&[0; 16]);
    data.extend_from_slice(&hwaddr);
    data.resize(data.len() + CHADDR_LEN - hwaddr.len(), 0);
    data.resize(data.len() + SNAME_LEN + FILE_LEN, 0);
    data.extend_from_slice(&MAGIC_COOKIE);

    push_option(&mut data, OPTION_MESSAGE_TYPE, &[DHCPDISCOVER]);
    if let Some(vendor_id) = vendor_id.filter(|v| !v.is_empty()) {
        push_option(&mut data, OPTION_VENDOR_CLASS_IDENTIFIER, vendor_id.as_bytes());
    }
    let mut client_id = vec![HTYPE_ETHERNET];
    client_id.extend_from_slice(&hwaddr);
    push_option(&mut data, OPTION_CLIENT_IDENTIFIER, &client_id);
    push_option(&mut data, OPTION_PARAMETER_REQUEST_LIST, requested_options);
    data.push(OPTION_END);

    data
}

fn push_option(data: &mut Vec<u8>, code: u8, value: &[u8]) {
    let value = &value[..value.len().min(u8::MAX as usize)];
    data.push(code);
    data.push(value.len() as u8);
    data.extend_from_slice(value);
}

/// Decode a reply to the request with transaction id `xid`.
///
/// Returns `None` for anything that is not a well-formed BOOTREPLY for this
/// transaction, including truncated option lists. When an option code is
/// repeated, the last occurrence wins.
pub fn parse_reply(data: &[u8], xid: u32) -> Option<DhcpOptions> {
    if *data.first()? != BOOTREPLY {
        trace!("not a BOOTREPLY, op {}", data[0]);
        return None;
    }

    let reply_xid = data.get(XID_OFFSET..XID_OFFSET + 4)?;
    if reply_xid != xid.to_be_bytes() {
        trace!("transaction id mismatch: {:02x?}", reply_xid);
        return None;
    }

    if data.get(COOKIE_OFFSET..OPTIONS_OFFSET)? != MAGIC_COOKIE {
        trace!("missing DHCP magic cookie");
        return None;
    }

    parse_options(&data[OPTIONS_OFFSET..])
}

/// Parse a TLV option stream up to the end marker.
fn parse_options(data: &[u8]) -> Option<DhcpOptions> {
    let mut options = DhcpOptions::new();
    let mut pos = 0;

    loop {
        let code = *data.get(pos)?;
        match code {
            OPTION_END => break,
            OPTION_PAD => {
                pos += 1;
                continue;
            }
            _ => {}
        }

        let len = usize::from(*data.get(pos + 1)?);
        let start = pos + 2;
        let value = data.get(start..start + len)?;
        options.insert(code, value.to_vec());
        pos = start + len;
    }

    Some(options)
}

/// Decode the NTP servers option (42), a list of IPv4 addresses.
pub fn parse_ntp_servers(value: &[u8]) -> Option<Vec<Ipv4Addr>> {
    if value.is_empty() || value.len() % 4 != 0 {
        return None;
    }
    Some(
        value
            .chunks_exact(4)
            .map(|c| Ipv4Addr::new(c[0], c[1], c[2], c[3]))
            .collect(),
    )
}
