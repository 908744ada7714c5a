//! Admission check and priority classification.
//!
//! For every packet taken from the inbox the classifier burns the configured processing time
//! (measured from the pop), rejects sources in an invalid band and pushes valid packets into the
//! lane matching their kind.

use crate::address::is_rejected_source;
use crate::error::{DropReason, QueueError};
use crate::metrics::WorkerRole;
use crate::packet::Packet;
use crate::pipeline::RouterContext;
use crate::priority::Priority;
use std::sync::Arc;
use std::time::Instant;

/// Lane a packet belongs in, or why it must be dropped.
pub fn lane_for(packet: &Packet) -> Result<Priority, DropReason> {
    if is_rejected_source(packet.source) {
        Err(DropReason::InvalidSource)
    } else {
        Ok(Priority::for_kind(packet.kind))
    }
}

pub struct Classifier {
    ctx: Arc<RouterContext>,
}

impl Classifier {
    pub fn new(ctx: Arc<RouterContext>) -> Self {
        Self { ctx }
    }

    /// Classify one packet popped at `popped_at` and push it into its lane.
    pub fn process(&self, packet: Packet, popped_at: Instant) -> Result<Priority, DropReason> {
        let config = &self.ctx.config.classifier;
        config
            .latency_model
            .simulate(popped_at, config.processing_time);

        let priority = match lane_for(&packet) {
            Ok(priority) => priority,
            Err(reason) => {
                self.ctx.counters.record_drop(reason, packet);
                return Err(reason);
            }
        };
        match self.ctx.lanes[priority].push(packet) {
            Ok(()) => Ok(priority),
            Err(QueueError::Full(packet)) => {
                self.ctx
                    .counters
                    .record_drop(DropReason::ClassifierFull, packet);
                Err(DropReason::ClassifierFull)
            }
        }
    }

    /// Classify everything currently in the inbox without waiting. Returns the number handled.
    pub fn process_pending(&self) -> usize {
        let mut handled = 0;
        while let Some(packet) = self.ctx.input.try_pop() {
            let _ = self.process(packet, Instant::now());
            handled += 1;
        }
        handled
    }

    /// Worker loop; returns on shutdown.
    pub fn run(self) {
        let poll = self.ctx.config.poll_interval;
        while self.ctx.control.checkpoint() {
            if let Some(packet) = self.ctx.input.pop_timeout(poll) {
                let popped_at = Instant::now();
                let _ = self
                    .ctx
                    .usage
                    .track(WorkerRole::Classifier, || self.process(packet, popped_at));
            }
        }
    }
}
