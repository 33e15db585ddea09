#![cfg_attr(not(test), no_std)]

/// Number of entries in the pinned `servers` map. Must match `MAX_SERVERS`
/// in the xdp program that hashes flows onto this table.
pub const MAX_SERVERS: u32 = 512;

/// One slot of the redirect table, the value type of the pinned `servers`
/// hash map keyed by the `u32` slot index.
///
/// The layout mirrors the kernel side `struct dest_info`. Addresses keep
/// the IPv4 octets in network order in memory, which on the little endian
/// targets we run on reads back as `u32::from_le_bytes(octets)`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DestInfo {
    /// Source address written into redirected packets
    pub saddr: u32,
    /// Backend address
    pub daddr: u32,
    /// Bytes forwarded through this slot, owned by the xdp program
    pub bytes: u64,
    /// Packets forwarded through this slot, owned by the xdp program
    pub pkts: u64,
    /// Next hop hardware address of the backend
    pub dmac: [u8; 6],
    /// Egress interface index
    pub ifindex: u16,
}

#[cfg(feature = "user")]
unsafe impl aya::Pod for DestInfo {}

impl DestInfo {
    /// A fresh slot for a backend, counters start from zero.
    pub fn new(saddr: u32, daddr: u32, dmac: [u8; 6], ifindex: u16) -> Self {
        Self {
            saddr,
            daddr,
            bytes: 0,
            pkts: 0,
            dmac,
            ifindex,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::{align_of, offset_of, size_of};

    #[test]
    fn dest_info_matches_kernel_layout() {
        assert_eq!(size_of::<DestInfo>(), 32);
        assert_eq!(align_of::<DestInfo>(), 8);
        assert_eq!(offset_of!(DestInfo, daddr), 4);
        assert_eq!(offset_of!(DestInfo, bytes), 8);
        assert_eq!(offset_of!(DestInfo, pkts), 16);
        assert_eq!(offset_of!(DestInfo, dmac), 24);
        assert_eq!(offset_of!(DestInfo, ifindex), 30);
    }

    #[test]
    fn new_slot_has_zero_counters() {
        let slot = DestInfo::new(1, 2, [1, 2, 3, 4, 5, 6], 7);
        assert_eq!(slot.bytes, 0);
        assert_eq!(slot.pkts, 0);
        assert_eq!(slot.ifindex, 7);
    }
}
