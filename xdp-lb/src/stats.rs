use crate::{
    addr::{inet_ntoa, mac_to_str},
    helpers::IfCache,
    info::InfoTable,
};
use std::collections::HashMap;
use xdp_lb_common::DestInfo;

/// Traffic forwarded to one backend, summed over all slots that point to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendStats {
    pub server: String,
    pub mac: String,
    pub ifindex: u16,
    pub bytes: u64,
    pub packets: u64,
}

impl BackendStats {
    fn from_slot(server: String, slot: &DestInfo) -> Self {
        Self {
            server,
            mac: mac_to_str(&slot.dmac),
            ifindex: slot.ifindex,
            bytes: slot.bytes,
            packets: slot.pkts,
        }
    }
}

/// Merges slots by decoded destination address, in first seen order.
///
/// The mac and interface come from the first slot of each destination and
/// are not checked against later slots.
pub fn aggregate(slots: &[DestInfo]) -> Vec<BackendStats> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut backends: Vec<BackendStats> = Vec::new();

    for slot in slots {
        let server = inet_ntoa(slot.daddr);
        match index.get(&server) {
            Some(&i) => {
                let be = &mut backends[i];
                be.bytes = be.bytes.wrapping_add(slot.bytes);
                be.packets = be.packets.wrapping_add(slot.pkts);
            }
            None => {
                index.insert(server.clone(), backends.len());
                backends.push(BackendStats::from_slot(server, slot));
            }
        }
    }

    backends
}

pub fn print_all(backends: &[BackendStats]) {
    let mut ifc = IfCache::new("(na)");
    let mut tab = InfoTable::new(vec!["server", "mac", "if", "bytes", "packets"]);

    for be in backends {
        tab.push_row(vec![
            be.server.clone(),
            be.mac.clone(),
            ifc.name(be.ifindex as u32),
            be.bytes.to_string(),
            be.packets.to_string(),
        ]);
    }

    tab.print(&format!("Backends ({})", backends.len()));
}
