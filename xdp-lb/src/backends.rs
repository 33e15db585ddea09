use crate::addr::{inet_aton, parse_mac, MacParseError};
use serde::{Deserialize, Serialize};
use std::fmt;
use xdp_lb_common::DestInfo;

/// Backend as written by operators, in request bodies and config files.
/// The source address is given once for the whole list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendEntry {
    pub server: String,
    pub mac: String,
    #[serde(default)]
    pub ifindex: u16,
}

impl BackendEntry {
    pub fn with_source(&self, source_addr: &str) -> BackendServer {
        BackendServer::new(source_addr, self.server.as_str(), self.mac.as_str(), self.ifindex)
    }
}

pub fn with_source(source_addr: &str, entries: &[BackendEntry]) -> Vec<BackendServer> {
    entries.iter().map(|e| e.with_source(source_addr)).collect()
}

/// A backend server as requested by the operator, before it is encoded
/// into one or more table slots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendServer {
    /// Source address shared by the whole assignment batch
    pub source_addr: String,
    pub dest_addr: String,
    pub mac: String,
    pub ifindex: u16,
}

impl fmt::Display for BackendServer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} -> {} via {}@if#{}",
            &self.source_addr, &self.dest_addr, &self.mac, self.ifindex
        )
    }
}

impl BackendServer {
    pub fn new<S: AsRef<str>>(source_addr: S, dest_addr: S, mac: S, ifindex: u16) -> Self {
        Self {
            source_addr: source_addr.as_ref().to_string(),
            dest_addr: dest_addr.as_ref().to_string(),
            mac: mac.as_ref().to_string(),
            ifindex,
        }
    }

    /// Encodes the backend into a slot with zeroed counters. Bad addresses
    /// silently become `0.0.0.0`, a bad mac is an error.
    pub fn to_slot(&self) -> Result<DestInfo, MacParseError> {
        let dmac = parse_mac(&self.mac)?;
        Ok(DestInfo::new(
            inet_aton(&self.source_addr),
            inet_aton(&self.dest_addr),
            dmac,
            self.ifindex,
        ))
    }
}
