//! Destination routing into the output port inboxes.
//!
//! Interface destinations produce a single push. Broadcast destinations produce one push per port:
//! the original packet goes to port 0 and two clones go to ports 1 and 2. Each push succeeds or
//! fails on its own; copies already enqueued are never withdrawn when a later one fails.

use crate::address::{route_for, Route};
use crate::error::{DropReason, QueueError};
use crate::packet::Packet;
use crate::pipeline::RouterContext;
use std::sync::Arc;

/// Result of dispatching one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub route: Route,
    /// Copies placed into a port inbox.
    pub delivered: u64,
    /// Copies dropped because their port inbox was full.
    pub dropped: u64,
}

pub struct Dispatcher {
    ctx: Arc<RouterContext>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<RouterContext>) -> Self {
        Self { ctx }
    }

    /// Route `packet` by destination and hand it (or its copies) to the port inboxes.
    ///
    /// # Arguments
    /// * `packet` - Packet popped from a lane; consumed whether or not any push succeeds
    ///
    /// # Returns
    /// The route taken and how many copies were delivered or dropped. For a single-port route the
    /// two counts sum to 1, for a broadcast to [`NB_OUTPUT_PORTS`](crate::address::NB_OUTPUT_PORTS).
    pub fn dispatch(&self, packet: Packet) -> DispatchOutcome {
        let route = route_for(packet.destination);
        let mut outcome = DispatchOutcome {
            route,
            delivered: 0,
            dropped: 0,
        };
        let mut targets = route.ports();
        let Some(first) = targets.next() else {
            return outcome;
        };
        let copies: Vec<(usize, Packet)> = targets.map(|port| (port, packet.clone())).collect();
        if !copies.is_empty() {
            self.ctx.counters.record_duplicated(copies.len() as u64);
        }
        self.push(first, packet, &mut outcome);
        for (port, copy) in copies {
            self.push(port, copy, &mut outcome);
        }
        outcome
    }

    fn push(&self, port: usize, packet: Packet, outcome: &mut DispatchOutcome) {
        match self.ctx.ports[port].push(packet) {
            Ok(()) => outcome.delivered += 1,
            Err(QueueError::Full(packet)) => {
                self.ctx.counters.record_drop(DropReason::OutputFull, packet);
                outcome.dropped += 1;
            }
        }
    }
}
