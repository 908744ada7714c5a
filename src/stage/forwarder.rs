//! Strict-priority forwarding.
//!
//! The forwarder never blocks. Each iteration serves the high lane if it holds anything, otherwise
//! the medium lane, otherwise the low lane, and hands the packet to the [`Dispatcher`]. A saturated
//! high lane starves the others; that is the intended behaviour.

use super::dispatcher::{DispatchOutcome, Dispatcher};
use crate::metrics::WorkerRole;
use crate::pipeline::RouterContext;
use crate::priority::Priority;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

pub struct Forwarder {
    ctx: Arc<RouterContext>,
    dispatcher: Dispatcher,
}

impl Forwarder {
    pub fn new(ctx: Arc<RouterContext>) -> Self {
        Self {
            dispatcher: Dispatcher::new(ctx.clone()),
            ctx,
        }
    }

    /// One polling iteration: forward at most one packet from the highest non-empty lane.
    pub fn poll_once(&self) -> Option<(Priority, DispatchOutcome)> {
        let (priority, packet) = Priority::ALL
            .iter()
            .find_map(|&priority| self.ctx.lanes[priority].try_pop().map(|p| (priority, p)))?;
        self.ctx.counters.record_forwarded();
        let outcome = self.dispatcher.dispatch(packet);
        self.ctx.counters.record_delivered(outcome.delivered);
        Some((priority, outcome))
    }

    /// Worker loop; returns on shutdown.
    pub fn run(self) {
        let meter = self.ctx.usage.meter(WorkerRole::Forwarder);
        while self.ctx.control.checkpoint() {
            let started = Instant::now();
            if self.poll_once().is_some() {
                if let Some(meter) = meter {
                    meter.record_busy(started.elapsed());
                }
            } else {
                thread::yield_now();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Route;
    use crate::config::RouterConfig;
    use crate::packet::{Packet, PacketKind};
    use crate::sink::NullSink;

    fn packet(kind: PacketKind, destination: u32) -> Packet {
        Packet::new(0x0100_0000, destination, kind, [0; 13], 0)
    }

    fn context() -> Arc<RouterContext> {
        RouterContext::new(RouterConfig::default(), Arc::new(NullSink)).unwrap()
    }

    #[test]
    fn lanes_are_served_in_strict_order() {
        let ctx = context();
        let forwarder = Forwarder::new(ctx.clone());
        for (lane, kind) in [
            (Priority::Low, PacketKind::Other),
            (Priority::Medium, PacketKind::Audio),
            (Priority::High, PacketKind::Video),
        ] {
            ctx.counters.record_created();
            ctx.lanes[lane].push(packet(kind, 0x2000_0000)).unwrap();
        }

        let order: Vec<Priority> = std::iter::from_fn(|| forwarder.poll_once().map(|(p, _)| p)).collect();
        assert_eq!(order, Priority::ALL.to_vec());
        assert!(forwarder.poll_once().is_none());

        let snapshot = ctx.counters.snapshot();
        assert_eq!(snapshot.forwarded, 3);
        assert_eq!(snapshot.delivered, 3);
        assert_eq!(ctx.ports[0].len(), 3);
    }

    #[test]
    fn broadcast_counts_every_delivered_copy() {
        let ctx = context();
        let forwarder = Forwarder::new(ctx.clone());
        ctx.counters.record_created();
        ctx.lanes[Priority::Medium]
            .push(packet(PacketKind::Audio, 0xC000_0000))
            .unwrap();
        let (priority, outcome) = forwarder.poll_once().unwrap();
        assert_eq!(priority, Priority::Medium);
        assert_eq!(outcome.route, Route::Broadcast);
        let snapshot = ctx.counters.snapshot();
        assert_eq!(snapshot.forwarded, 1);
        assert_eq!(snapshot.delivered, 3);
    }
}
