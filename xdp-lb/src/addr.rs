//! Conversions between the text forms operators use and the binary fields
//! stored in a [`DestInfo`](xdp_lb_common::DestInfo) slot.

use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MacParseError {
    #[error("invalid length for mac address '{0}'")]
    Length(String),
    #[error("non hex digit in mac address '{0}'")]
    Digit(String),
}

/// Encodes an IPv4 address into the slot representation.
///
/// Unparsable input maps to `0.0.0.0` instead of failing, so a malformed
/// address ends up as the wildcard address in the table.
pub fn inet_aton(addr: &str) -> u32 {
    let ip = match addr.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => ip,
        Ok(IpAddr::V6(ip)) => match ip.to_ipv4_mapped() {
            Some(ip) => ip,
            None => return 0,
        },
        Err(_) => return 0,
    };
    u32::from_le_bytes(ip.octets())
}

/// Decodes a slot address, least significant byte first.
pub fn inet_ntoa(ip: u32) -> String {
    Ipv4Addr::from(ip.to_le_bytes()).to_string()
}

pub fn mac_to_str(mac: &[u8; 6]) -> String {
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}

/// Parses a 48-bit hardware address written as `xx:xx:xx:xx:xx:xx`,
/// `xx-xx-xx-xx-xx-xx` or `xxxx.xxxx.xxxx`.
pub fn parse_mac<T: AsRef<str>>(input: T) -> Result<[u8; 6], MacParseError> {
    let input = input.as_ref();

    for sep in [':', '-'] {
        let groups: Vec<&str> = input.split(sep).collect();
        if groups.len() == 6 {
            return hex_groups(input, &groups, 2);
        }
    }

    let groups: Vec<&str> = input.split('.').collect();
    if groups.len() == 3 {
        return hex_groups(input, &groups, 4);
    }

    Err(MacParseError::Length(input.to_string()))
}

fn hex_groups(input: &str, groups: &[&str], width: usize) -> Result<[u8; 6], MacParseError> {
    let mut mac = [0_u8; 6];
    let mut i = 0;
    for group in groups {
        if group.len() != width {
            return Err(MacParseError::Length(input.to_string()));
        }
        for pair in group.as_bytes().chunks(2) {
            let hex = std::str::from_utf8(pair)
                .map_err(|_| MacParseError::Digit(input.to_string()))?;
            if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(MacParseError::Digit(input.to_string()));
            }
            mac[i] = u8::from_str_radix(hex, 16)
                .map_err(|_| MacParseError::Digit(input.to_string()))?;
            i += 1;
        }
    }
    Ok(mac)
}
