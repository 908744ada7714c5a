//! Periodic statistics reporting.
//!
//! On startup the reporter pauses every worker, zeroes the rolling counters, watermarks and
//! utilization figures, then resumes them. Afterwards it loops:
//!
//! 1. render the statistics block and write it to the sink in one piece;
//! 2. pause every worker for the quiescent interval, then resume them;
//! 3. wait the reporting period.

use crate::config::StatsFormat;
use crate::metrics::StatsSnapshot;
use crate::pipeline::RouterContext;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct StatsReporter {
    ctx: Arc<RouterContext>,
}

impl StatsReporter {
    pub fn new(ctx: Arc<RouterContext>) -> Self {
        Self { ctx }
    }

    /// Reset every statistic while the workers are held at a checkpoint.
    pub fn startup(&self) {
        let control = &self.ctx.control;
        control.pause_all();
        self.ctx.reset_statistics();
        control.resume_all();
        debug!("statistics reset, workers released");
    }

    /// Take a snapshot and write it to the sink in the configured format.
    pub fn report(&self) -> StatsSnapshot {
        let snapshot = self.ctx.stats_snapshot();
        match self.ctx.config.stats.format {
            StatsFormat::Text => self.ctx.sink.write_block(&snapshot.render_lines()),
            StatsFormat::Json => match snapshot.to_json() {
                Ok(line) => self.ctx.sink.write_line(line),
                Err(err) => warn!(%err, "failed to encode statistics"),
            },
        }
        snapshot
    }

    /// Hold every worker paused for `interval`. Returns `false` if shutdown arrived meanwhile.
    pub fn quiesce(&self, interval: Duration) -> bool {
        let control = &self.ctx.control;
        control.pause_all();
        let running = control.sleep(interval);
        control.resume_all();
        running
    }

    /// Worker loop; returns on shutdown.
    pub fn run(self) {
        let config = self.ctx.config.stats.clone();
        self.startup();
        while self.ctx.control.is_running() {
            self.report();
            if !self.quiesce(config.quiesce_interval) {
                break;
            }
            if !self.ctx.control.sleep(config.report_period) {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterConfig;
    use crate::packet::{Packet, PacketKind};
    use crate::sink::MemorySink;

    fn reporter(format: StatsFormat) -> (StatsReporter, Arc<MemorySink>) {
        let mut config = RouterConfig::default();
        config.stats.format = format;
        let sink = Arc::new(MemorySink::new());
        let ctx = RouterContext::new(config, sink.clone()).unwrap();
        (StatsReporter::new(ctx), sink)
    }

    #[test]
    fn startup_clears_rolling_counters_and_leaves_workers_running() {
        let (reporter, _sink) = reporter(StatsFormat::Text);
        let ctx = reporter.ctx.clone();
        ctx.counters.record_created();
        ctx.input
            .push(Packet::new(1, 2, PacketKind::Video, [0; 13], 0))
            .unwrap();
        reporter.startup();
        let snapshot = ctx.counters.snapshot();
        assert_eq!(snapshot.created, 0);
        assert_eq!(snapshot.in_flight, 1);
        assert_eq!(ctx.input.watermark(), 1);
        assert!(!ctx.control.is_paused());
    }

    #[test]
    fn text_report_is_one_block() {
        let (reporter, sink) = reporter(StatsFormat::Text);
        reporter.ctx.counters.record_created();
        let snapshot = reporter.report();
        assert_eq!(snapshot.counters.created, 1);
        assert_eq!(sink.blocks(), 1);
        let lines = sink.lines();
        assert!(lines.iter().any(|line| line.contains("Router statistics")));
        assert!(lines.iter().any(|line| line.starts_with(" 1- packets created") && line.ends_with(": 1")));
    }

    #[test]
    fn json_report_is_one_line() {
        let (reporter, sink) = reporter(StatsFormat::Json);
        reporter.report();
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(value["counters"]["created"], 0);
    }

    #[test]
    fn quiesce_resumes_afterwards() {
        let (reporter, _sink) = reporter(StatsFormat::Text);
        assert!(reporter.quiesce(Duration::from_millis(5)));
        assert!(!reporter.ctx.control.is_paused());
        assert_eq!(reporter.ctx.control.cycles(), 1);
    }
}
