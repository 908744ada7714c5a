//! Output port workers: the end of the line for every delivered packet.

use crate::metrics::WorkerRole;
use crate::packet::Packet;
use crate::pipeline::RouterContext;
use std::sync::Arc;

/// Prefix of the first line of every delivery record.
pub const DELIVERY_HEADER: &str = "Packet received on port";

/// Delivery record for `packet` arriving on `port`.
pub fn delivery_record(port: usize, packet: &Packet) -> Vec<String> {
    vec![
        format!("{DELIVERY_HEADER} {port}"),
        format!("    >> seq  : {}", packet.sequence()),
        format!("    >> src  : {:#010x}", packet.source),
        format!("    >> dst  : {:#010x}", packet.destination),
        format!("    >> type : {} ({})", packet.kind.code(), packet.kind),
    ]
}

pub struct OutputWorker {
    ctx: Arc<RouterContext>,
    port: usize,
}

impl OutputWorker {
    pub fn new(ctx: Arc<RouterContext>, port: usize) -> Self {
        Self { ctx, port }
    }

    pub fn port(&self) -> usize {
        self.port
    }

    /// Log `packet` as one block and release it.
    pub fn deliver(&self, packet: Packet) {
        self.ctx.sink.write_block(&delivery_record(self.port, &packet));
        self.ctx.counters.release(packet);
    }

    /// Deliver everything currently in the inbox without waiting. Returns the number delivered.
    pub fn deliver_pending(&self) -> usize {
        let mut delivered = 0;
        while let Some(packet) = self.ctx.ports[self.port].try_pop() {
            self.deliver(packet);
            delivered += 1;
        }
        delivered
    }

    /// Worker loop; returns on shutdown.
    pub fn run(self) {
        let role = WorkerRole::OutputPort(self.port);
        let inbox = &self.ctx.ports[self.port];
        let poll = self.ctx.config.poll_interval;
        while self.ctx.control.checkpoint() {
            if let Some(packet) = inbox.pop_timeout(poll) {
                self.ctx.usage.track(role, || self.deliver(packet));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterConfig;
    use crate::packet::PacketKind;
    use crate::sink::MemorySink;

    #[test]
    fn delivery_writes_one_block_and_releases() {
        let sink = Arc::new(MemorySink::new());
        let ctx = RouterContext::new(RouterConfig::default(), sink.clone()).unwrap();
        let worker = OutputWorker::new(ctx.clone(), 1);
        for sequence in 0..2 {
            ctx.counters.record_created();
            ctx.ports[1]
                .push(Packet::new(0xAB, 0x4000_0001, PacketKind::Video, [0; 13], sequence))
                .unwrap();
        }
        assert_eq!(worker.deliver_pending(), 2);
        assert_eq!(sink.blocks(), 2);
        assert_eq!(sink.count_prefixed("Packet received on port 1"), 2);
        let lines = sink.lines();
        assert_eq!(lines[2], "    >> src  : 0x000000ab");
        assert_eq!(lines[3], "    >> dst  : 0x40000001");
        assert_eq!(lines[4], "    >> type : 0 (video)");
        assert_eq!(ctx.counters.in_flight(), 0);
    }
}
