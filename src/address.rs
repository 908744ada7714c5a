//! Address-band table shared by source validation and destination routing.
//!
//! This table is the one bit-exact behaviour of the router: the reject bands exclude their
//! endpoints, the interface bands are inclusive and together cover the whole 32-bit space.

use std::ops::RangeInclusive;

/// Number of output interfaces.
pub const NB_OUTPUT_PORTS: usize = 3;

const INT1: RangeInclusive<u32> = 0x0000_0000..=0x3FFF_FFFF;
const INT2: RangeInclusive<u32> = 0x4000_0000..=0x7FFF_FFFF;
const INT3: RangeInclusive<u32> = 0x8000_0000..=0xBFFF_FFFF;
const INT_BC: RangeInclusive<u32> = 0xC000_0000..=0xFFFF_FFFF;

/// Invalid source bands as `(low, high)`; a source is rejected when `low < src < high`.
pub const REJECT_BANDS: [(u32, u32); 4] = [
    (0x1000_0000, 0x17FF_FFFF),
    (0x5000_0000, 0x57FF_FFFF),
    (0x6000_0000, 0x67FF_FFFF),
    (0xD000_0000, 0xD7FF_FFFF),
];

/// Routing decision for a destination address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Single output port (0-based).
    Port(usize),
    /// Every output port receives a copy.
    Broadcast,
}

impl Route {
    /// Ports this route targets, in port order.
    pub fn ports(self) -> impl Iterator<Item = usize> {
        match self {
            Route::Port(port) => port..port + 1,
            Route::Broadcast => 0..NB_OUTPUT_PORTS,
        }
    }
}

/// Whether a source address falls into one of the invalid bands.
pub fn is_rejected_source(source: u32) -> bool {
    REJECT_BANDS
        .iter()
        .any(|&(low, high)| source > low && source < high)
}

/// Map a destination address to its output route.
pub fn route_for(destination: u32) -> Route {
    if INT1.contains(&destination) {
        Route::Port(0)
    } else if INT2.contains(&destination) {
        Route::Port(1)
    } else if INT3.contains(&destination) {
        Route::Port(2)
    } else {
        debug_assert!(INT_BC.contains(&destination));
        Route::Broadcast
    }
}
