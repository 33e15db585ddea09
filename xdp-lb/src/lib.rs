//! Userspace control plane for the xdp redirect load balancer.
//!
//! The xdp program hashes every flow onto one of the
//! [`MAX_SERVERS`](xdp_lb_common::MAX_SERVERS) slots of a pinned `servers`
//! map and forwards the packet to the backend stored there. This crate
//! binds to that map, spreads a backend list over its slots and reads the
//! per-slot counters back as per-backend statistics.

pub mod addr;
pub mod api;
pub mod assign;
pub mod backends;
pub mod config;
pub mod error;
pub mod helpers;
pub mod info;
pub mod stats;
pub mod table;

pub use api::{build_router, AppState};
pub use backends::{BackendEntry, BackendServer};
pub use error::{ApiError, TableError};
pub use table::{PinnedSlots, RedirectTable, SlotMap};

#[cfg(any(test, feature = "test-util"))]
pub use table::MemorySlots;

/// Where the xdp program loader pins the `servers` map.
pub const DEFAULT_MAP_PIN: &str = "/sys/fs/bpf/xdp/globals/servers";

pub const DEFAULT_ADDRESS: &str = ":9091";
