//! Router counters, per-worker utilization and the statistics snapshot.
//!
//! Every stage shares one [`RouterCounters`] through the router context. Counters are plain
//! atomics so concurrent increments from the generator, classifier, forwarder and dispatcher never
//! lose updates; the statistics reporter reads them without owning them. Drops go through
//! [`RouterCounters::record_drop`], which consumes the packet so a dropped packet can never be
//! pushed again.

use crate::address::NB_OUTPUT_PORTS;
use crate::error::DropReason;
use crate::packet::Packet;
use crate::priority::{Priority, PriorityTable};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::trace;

/// Process-wide packet counters.
#[derive(Debug, Default)]
pub struct RouterCounters {
    created: AtomicU64,
    forwarded: AtomicU64,
    delivered: AtomicU64,
    rejected_source: AtomicU64,
    rejected_input_full: AtomicU64,
    rejected_classifier_full: AtomicU64,
    rejected_output_full: AtomicU64,
    // Allocation bookkeeping is never reset; allocated - released is the live packet count.
    allocated: AtomicU64,
    released: AtomicU64,
    max_in_flight: AtomicU64,
}

impl RouterCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account a freshly generated packet.
    pub fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
        self.record_allocation(1);
    }

    /// Account extra copies produced by broadcast duplication.
    pub fn record_duplicated(&self, copies: u64) {
        self.record_allocation(copies);
    }

    pub fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self, copies: u64) {
        if copies > 0 {
            self.delivered.fetch_add(copies, Ordering::Relaxed);
        }
    }

    /// Release a packet that reached its output worker.
    pub fn release(&self, _packet: Packet) {
        self.released.fetch_add(1, Ordering::AcqRel);
    }

    /// Drop `packet` for `reason`, incrementing the matching rejection counter.
    pub fn record_drop(&self, reason: DropReason, packet: Packet) {
        let counter = match reason {
            DropReason::InvalidSource => &self.rejected_source,
            DropReason::InputFull => &self.rejected_input_full,
            DropReason::ClassifierFull => &self.rejected_classifier_full,
            DropReason::OutputFull => &self.rejected_output_full,
        };
        let total = counter.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(
            %reason,
            total,
            source = format_args!("{:#010x}", packet.source),
            destination = format_args!("{:#010x}", packet.destination),
            "packet dropped"
        );
        self.release(packet);
    }

    fn record_allocation(&self, count: u64) {
        let allocated = self.allocated.fetch_add(count, Ordering::AcqRel) + count;
        let released = self.released.load(Ordering::Acquire);
        self.max_in_flight
            .fetch_max(allocated.saturating_sub(released), Ordering::AcqRel);
    }

    /// Packets currently alive somewhere in the pipeline.
    pub fn in_flight(&self) -> u64 {
        let released = self.released.load(Ordering::Acquire);
        self.allocated
            .load(Ordering::Acquire)
            .saturating_sub(released)
    }

    /// Zero the rolling counters. Allocation bookkeeping is left intact.
    pub fn reset(&self) {
        for counter in [
            &self.created,
            &self.forwarded,
            &self.delivered,
            &self.rejected_source,
            &self.rejected_input_full,
            &self.rejected_classifier_full,
            &self.rejected_output_full,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            created: self.created.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            rejected_source: self.rejected_source.load(Ordering::Relaxed),
            rejected_input_full: self.rejected_input_full.load(Ordering::Relaxed),
            rejected_classifier_full: self.rejected_classifier_full.load(Ordering::Relaxed),
            rejected_output_full: self.rejected_output_full.load(Ordering::Relaxed),
            allocated: self.allocated.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            in_flight: self.in_flight(),
            max_in_flight: self.max_in_flight.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RouterCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub created: u64,
    pub forwarded: u64,
    pub delivered: u64,
    pub rejected_source: u64,
    pub rejected_input_full: u64,
    pub rejected_classifier_full: u64,
    pub rejected_output_full: u64,
    pub allocated: u64,
    pub released: u64,
    pub in_flight: u64,
    pub max_in_flight: u64,
}

impl CounterSnapshot {
    /// Sum of every rejection counter.
    pub fn rejected(&self) -> u64 {
        self.rejected_source
            + self.rejected_input_full
            + self.rejected_classifier_full
            + self.rejected_output_full
    }
}

/// Number of pipeline workers (generator, classifier, forwarder and one per output port).
pub const PIPELINE_WORKERS: usize = 3 + NB_OUTPUT_PORTS;

/// Identity of one pipeline worker, used for thread names, priorities and utilization slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerRole {
    Generator,
    Classifier,
    Forwarder,
    OutputPort(usize),
    Stats,
}

impl WorkerRole {
    /// Workers paused by the statistics reporter, in reporting order.
    pub const PIPELINE: [WorkerRole; PIPELINE_WORKERS] = [
        WorkerRole::Generator,
        WorkerRole::Classifier,
        WorkerRole::Forwarder,
        WorkerRole::OutputPort(0),
        WorkerRole::OutputPort(1),
        WorkerRole::OutputPort(2),
    ];

    /// Slot in per-worker tables; only defined for pipeline workers.
    pub fn slot(self) -> Option<usize> {
        match self {
            WorkerRole::Generator => Some(0),
            WorkerRole::Classifier => Some(1),
            WorkerRole::Forwarder => Some(2),
            WorkerRole::OutputPort(port) if port < NB_OUTPUT_PORTS => Some(3 + port),
            WorkerRole::OutputPort(_) | WorkerRole::Stats => None,
        }
    }

    pub fn thread_name(self) -> String {
        match self {
            WorkerRole::Generator => "Generator".to_string(),
            WorkerRole::Classifier => "Classifier".to_string(),
            WorkerRole::Forwarder => "Forwarder".to_string(),
            WorkerRole::OutputPort(port) => format!("OutputPort-{port}"),
            WorkerRole::Stats => "Stats".to_string(),
        }
    }
}

/// Busy-time accumulator for one worker.
#[derive(Debug, Default)]
pub struct UsageMeter {
    busy_nanos: AtomicU64,
    /// Highest utilization seen since the last reset, in hundredths of a percent.
    max_basis_points: AtomicU64,
}

impl UsageMeter {
    /// Add time spent doing useful work.
    pub fn record_busy(&self, busy: Duration) {
        let nanos = u64::try_from(busy.as_nanos()).unwrap_or(u64::MAX);
        self.busy_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    /// Close a sampling window of length `window` and return its utilization in percent.
    fn sample(&self, window: Duration) -> f64 {
        let busy = self.busy_nanos.swap(0, Ordering::AcqRel);
        let window_nanos = window.as_nanos().max(1) as f64;
        let percent = (busy as f64 / window_nanos * 100.0).min(100.0);
        self.max_basis_points
            .fetch_max((percent * 100.0) as u64, Ordering::AcqRel);
        percent
    }

    fn max_percent(&self) -> f64 {
        self.max_basis_points.load(Ordering::Acquire) as f64 / 100.0
    }

    fn reset(&self) {
        self.busy_nanos.store(0, Ordering::Relaxed);
        self.max_basis_points.store(0, Ordering::Relaxed);
    }
}

/// Utilization meters for every pipeline worker.
#[derive(Debug)]
pub struct WorkerUsage {
    meters: [UsageMeter; PIPELINE_WORKERS],
    window_start: parking_lot::Mutex<Instant>,
}

impl Default for WorkerUsage {
    fn default() -> Self {
        Self {
            meters: Default::default(),
            window_start: parking_lot::Mutex::new(Instant::now()),
        }
    }
}

impl WorkerUsage {
    /// Meter for `role`; roles outside the pipeline share no meter and get `None`.
    pub fn meter(&self, role: WorkerRole) -> Option<&UsageMeter> {
        role.slot().map(|slot| &self.meters[slot])
    }

    /// Run `work` and charge its duration to `role`.
    pub fn track<R>(&self, role: WorkerRole, work: impl FnOnce() -> R) -> R {
        let started = Instant::now();
        let result = work();
        if let Some(meter) = self.meter(role) {
            meter.record_busy(started.elapsed());
        }
        result
    }

    /// Close the current window for every worker and return `(role, max percent)` pairs.
    pub fn sample(&self) -> Vec<WorkerUtilization> {
        let window = {
            let mut start = self.window_start.lock();
            let now = Instant::now();
            let window = now.duration_since(*start);
            *start = now;
            window
        };
        WorkerRole::PIPELINE
            .iter()
            .zip(self.meters.iter())
            .map(|(role, meter)| {
                let current = meter.sample(window);
                WorkerUtilization {
                    worker: role.thread_name(),
                    current_percent: current,
                    max_percent: meter.max_percent(),
                }
            })
            .collect()
    }

    pub fn reset(&self) {
        for meter in &self.meters {
            meter.reset();
        }
        *self.window_start.lock() = Instant::now();
    }
}

/// Utilization figure for one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerUtilization {
    pub worker: String,
    pub current_percent: f64,
    pub max_percent: f64,
}

/// Everything the statistics reporter prints in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub counters: CounterSnapshot,
    pub input_watermark: usize,
    pub lane_watermarks: PriorityTable<usize>,
    pub port_watermarks: Vec<usize>,
    pub utilization: Vec<WorkerUtilization>,
    #[serde(with = "duration_millis")]
    pub uptime: Duration,
}

impl StatsSnapshot {
    /// Render the statistics block in its fixed reporting order.
    pub fn render_lines(&self) -> Vec<String> {
        let c = &self.counters;
        let mut lines = vec![
            String::new(),
            "------------------ Router statistics ------------------".to_string(),
            String::new(),
            format!(" 1- packets created                     : {}", c.created),
            format!(" 2- packets delivered                   : {}", c.delivered),
            format!(" 3- packets rejected (invalid source)   : {}", c.rejected_source),
            format!(" 4- packets rejected (input queue full) : {}", c.rejected_input_full),
            format!(" 5- packets rejected (lane full)        : {}", c.rejected_classifier_full),
            format!(" 6- packets rejected (output port full) : {}", c.rejected_output_full),
            format!(" 7- max packets in input queue          : {}", self.input_watermark),
        ];
        for (index, (priority, watermark)) in self.lane_watermarks.iter().enumerate() {
            lines.push(format!(
                "{:>2}- max packets in {:<6} queue         : {}",
                8 + index,
                priority,
                watermark
            ));
        }
        let mut item = 8 + Priority::ALL.len();
        for usage in &self.utilization {
            lines.push(format!(
                "{:>2}- max utilization {:<13}        : {:.2}%",
                item, usage.worker, usage.max_percent
            ));
            item += 1;
        }
        lines.push(format!("{item:>2}- packets in flight                   : {}", c.in_flight));
        lines.push(format!("{:>2}- max packets in flight               : {}", item + 1, c.max_in_flight));
        lines.push(format!("{:>2}- packets forwarded                   : {}", item + 2, c.forwarded));
        lines.push(format!(
            "    uptime {:.1}s, port inbox peaks {:?}",
            self.uptime.as_secs_f64(),
            self.port_watermarks
        ));
        lines
    }

    /// Single-line JSON rendering of the snapshot.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{PacketKind, PAYLOAD_WORDS};
    use std::sync::Arc;
    use std::thread;

    fn packet() -> Packet {
        Packet::new(1, 2, PacketKind::Other, [0; PAYLOAD_WORDS], 0)
    }

    #[test]
    fn drops_hit_exactly_one_counter() {
        let counters = RouterCounters::new();
        counters.record_created();
        counters.record_created();
        counters.record_drop(DropReason::InvalidSource, packet());
        counters.record_drop(DropReason::OutputFull, packet());

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.created, 2);
        assert_eq!(snapshot.rejected_source, 1);
        assert_eq!(snapshot.rejected_output_full, 1);
        assert_eq!(snapshot.rejected_input_full, 0);
        assert_eq!(snapshot.rejected_classifier_full, 0);
        assert_eq!(snapshot.rejected(), 2);
        assert_eq!(snapshot.in_flight, 0);
        assert_eq!(snapshot.max_in_flight, 2);
    }

    #[test]
    fn reset_keeps_allocation_bookkeeping() {
        let counters = RouterCounters::new();
        counters.record_created();
        counters.record_duplicated(2);
        counters.record_delivered(3);
        counters.reset();

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.created, 0);
        assert_eq!(snapshot.delivered, 0);
        assert_eq!(snapshot.allocated, 3);
        assert_eq!(snapshot.in_flight, 3);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let counters = Arc::new(RouterCounters::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counters = counters.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        counters.record_created();
                        counters.record_drop(DropReason::InputFull, packet());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let snapshot = counters.snapshot();
        assert_eq!(snapshot.created, 8000);
        assert_eq!(snapshot.rejected_input_full, 8000);
        assert_eq!(snapshot.released, 8000);
        assert_eq!(snapshot.in_flight, 0);
    }

    #[test]
    fn usage_meter_reports_bounded_percentages() {
        let usage = WorkerUsage::default();
        usage
            .meter(WorkerRole::Classifier)
            .unwrap()
            .record_busy(Duration::from_secs(3600));
        thread::sleep(Duration::from_millis(2));
        let sampled = usage.sample();
        assert_eq!(sampled.len(), WorkerRole::PIPELINE.len());
        assert_eq!(sampled[1].worker, "Classifier");
        assert_eq!(sampled[1].max_percent, 100.0);
        assert_eq!(sampled[0].max_percent, 0.0);

        usage.reset();
        assert!(usage.sample().iter().all(|u| u.max_percent == 0.0));
        assert!(usage.meter(WorkerRole::Stats).is_none());
    }

    #[test]
    fn stats_block_follows_reporting_order() {
        let snapshot = StatsSnapshot {
            counters: CounterSnapshot {
                created: 10,
                delivered: 7,
                rejected_source: 1,
                rejected_input_full: 2,
                rejected_classifier_full: 3,
                rejected_output_full: 4,
                ..CounterSnapshot::default()
            },
            input_watermark: 5,
            lane_watermarks: PriorityTable::from_fn(|p| 100 + p.index()),
            port_watermarks: vec![0; NB_OUTPUT_PORTS],
            utilization: Vec::new(),
            uptime: Duration::from_secs(1),
        };
        let lines = snapshot.render_lines();
        let position = |needle: &str| {
            lines
                .iter()
                .position(|l| l.contains(needle))
                .unwrap_or_else(|| panic!("missing line {needle}"))
        };
        let order = [
            position("packets created"),
            position("packets delivered"),
            position("invalid source"),
            position("input queue full"),
            position("lane full"),
            position("output port full"),
            position("high   queue"),
            position("medium queue"),
            position("low    queue"),
        ];
        assert!(order.windows(2).all(|w| w[0] < w[1]));
        assert!(lines[position("high   queue")].ends_with("100"));

        let json = snapshot.to_json().unwrap();
        let back: StatsSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.counters, snapshot.counters);
    }
}
