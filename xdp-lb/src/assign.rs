//! Spreads a backend list over the fixed number of table slots.
//!
//! Slot `i` always gets `servers[i % servers.len()]`, so the layout only
//! depends on the input order and every backend holds either
//! `MAX_SERVERS / n` or `MAX_SERVERS / n + 1` slots. With more backends
//! than slots the tail of the list is never placed.

use xdp_lb_common::MAX_SERVERS;

/// Index into the backend list for `slot`. `count` must not be zero.
pub fn server_index(slot: u32, count: usize) -> usize {
    slot as usize % count
}

/// Yields `(slot, backend)` for every table slot in index order, or
/// nothing at all for an empty list.
pub fn assignments<T>(servers: &[T]) -> impl Iterator<Item = (u32, &T)> {
    let slots = if servers.is_empty() { 0 } else { MAX_SERVERS };
    (0..slots).map(move |slot| (slot, &servers[server_index(slot, servers.len())]))
}
