//! Router wiring.
//!
//! [`RouterContext`] owns every queue, the counters, the utilization meters, the control surface
//! and the output sink; each worker holds an `Arc` to it. [`Router`] builds the context from a
//! [`RouterConfig`] and runs the seven worker threads:
//!
//! ```text
//! Generator -> input -> Classifier -> {high, medium, low} -> Forwarder/Dispatcher
//!           -> {port-0, port-1, port-2} -> OutputPort-0..2
//! ```
//!
//! plus the statistics reporter, which pauses and resumes the others.

use crate::address::NB_OUTPUT_PORTS;
use crate::config::RouterConfig;
use crate::control::WorkerControl;
use crate::error::RouterError;
use crate::metrics::{RouterCounters, StatsSnapshot, WorkerRole, WorkerUsage};
use crate::packet::Packet;
use crate::priority::{Priority, PriorityTable};
use crate::queue::BoundedQueue;
use crate::sink::LogSink;
use crate::stage::{Classifier, Forwarder, Generator, OutputWorker, StatsReporter};
use crate::threading::apply_worker_priority;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};

const PORT_QUEUE_NAMES: [&str; NB_OUTPUT_PORTS] = ["port-0", "port-1", "port-2"];

/// Shared state of one router instance.
pub struct RouterContext {
    pub config: RouterConfig,
    /// Classifier inbox.
    pub input: BoundedQueue<Packet>,
    pub lanes: PriorityTable<BoundedQueue<Packet>>,
    /// One inbox per output port.
    pub ports: [BoundedQueue<Packet>; NB_OUTPUT_PORTS],
    pub counters: RouterCounters,
    pub usage: WorkerUsage,
    pub control: WorkerControl,
    pub sink: Arc<dyn LogSink>,
    started: Instant,
}

impl RouterContext {
    /// Validate `config` and allocate every queue.
    ///
    /// # Arguments
    /// * `config` - Queue capacities, generator, classifier and stats settings
    /// * `sink` - Destination of the per-packet log lines written by the output workers
    ///
    /// # Returns
    /// The shared context, or `RouterError::Config` when `config` fails validation.
    pub fn new(config: RouterConfig, sink: Arc<dyn LogSink>) -> Result<Arc<Self>, RouterError> {
        config.validate()?;
        let queues = &config.queues;
        let lanes = PriorityTable::from_fn(|priority| {
            let name = match priority {
                Priority::High => "high",
                Priority::Medium => "medium",
                Priority::Low => "low",
            };
            BoundedQueue::new(name, queues.lanes[priority])
        });
        let ports =
            std::array::from_fn(|port| BoundedQueue::new(PORT_QUEUE_NAMES[port], queues.port));
        Ok(Arc::new(Self {
            input: BoundedQueue::new("input", queues.input),
            lanes,
            ports,
            counters: RouterCounters::new(),
            usage: WorkerUsage::default(),
            control: WorkerControl::new(),
            sink,
            started: Instant::now(),
            config,
        }))
    }

    /// Zero the rolling counters, the queue watermarks and the utilization maxima.
    pub fn reset_statistics(&self) {
        self.counters.reset();
        self.input.reset_watermark();
        for (_, lane) in self.lanes.iter() {
            lane.reset_watermark();
        }
        for port in &self.ports {
            port.reset_watermark();
        }
        self.usage.reset();
    }

    /// Capture every figure the statistics reporter prints. Closes the utilization window.
    pub fn stats_snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            counters: self.counters.snapshot(),
            input_watermark: self.input.watermark(),
            lane_watermarks: PriorityTable::from_fn(|priority| self.lanes[priority].watermark()),
            port_watermarks: self.ports.iter().map(BoundedQueue::watermark).collect(),
            utilization: self.usage.sample(),
            uptime: self.started.elapsed(),
        }
    }

    /// Packets currently sitting in any queue.
    pub fn queued_packets(&self) -> usize {
        self.input.len()
            + self.lanes.iter().map(|(_, lane)| lane.len()).sum::<usize>()
            + self.ports.iter().map(BoundedQueue::len).sum::<usize>()
    }

    /// Release every queued packet. Only meaningful once the workers have stopped.
    pub fn drain_queues(&self) -> DrainReport {
        let mut report = DrainReport::default();
        let upstream = std::iter::once(&self.input)
            .chain(self.lanes.iter().map(|(_, lane)| lane));
        for queue in upstream {
            for packet in queue.drain() {
                self.counters.release(packet);
                report.upstream += 1;
            }
        }
        for port in &self.ports {
            for packet in port.drain() {
                self.counters.release(packet);
                report.port_inboxes += 1;
            }
        }
        report
    }
}

/// Packets released by [`RouterContext::drain_queues`].
///
/// Packets drained from port inboxes were already counted as delivered; upstream ones were never
/// counted anywhere besides creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Classifier inbox and priority lanes.
    pub upstream: u64,
    pub port_inboxes: u64,
}

impl DrainReport {
    pub fn total(&self) -> u64 {
        self.upstream + self.port_inboxes
    }
}

/// A running (or ready to run) router: the context plus its worker threads.
pub struct Router {
    ctx: Arc<RouterContext>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Router {
    /// Build the router without starting any thread yet.
    pub fn new(config: RouterConfig, sink: Arc<dyn LogSink>) -> Result<Self, RouterError> {
        Ok(Self {
            ctx: RouterContext::new(config, sink)?,
            handles: Mutex::new(Vec::new()),
        })
    }

    pub fn context(&self) -> &Arc<RouterContext> {
        &self.ctx
    }

    /// Spawn the pipeline workers and the statistics reporter.
    ///
    /// Workers start paused; the reporter performs the startup reset and releases them.
    ///
    /// # Returns
    /// `RouterError::AlreadyStarted` if the workers are already running, or `RouterError::Spawn`
    /// when a thread cannot be created. On a spawn failure every worker started so far is shut
    /// down and joined before returning.
    pub fn start(&self) -> Result<(), RouterError> {
        let mut handles = self.handles.lock();
        if !handles.is_empty() {
            return Err(RouterError::AlreadyStarted);
        }
        self.ctx.control.pause_all();

        if let Err(err) = self.spawn_all(&mut handles) {
            warn!(%err, "router start failed, stopping spawned workers");
            self.ctx.control.shutdown();
            for handle in handles.drain(..) {
                let _ = handle.join();
            }
            return Err(err);
        }
        info!(workers = handles.len(), "router started");
        Ok(())
    }

    fn spawn_all(&self, handles: &mut Vec<JoinHandle<()>>) -> Result<(), RouterError> {
        let generator = Generator::new(self.ctx.clone());
        handles.push(self.spawn(WorkerRole::Generator, move || generator.run())?);

        let classifier = Classifier::new(self.ctx.clone());
        handles.push(self.spawn(WorkerRole::Classifier, move || classifier.run())?);

        let forwarder = Forwarder::new(self.ctx.clone());
        handles.push(self.spawn(WorkerRole::Forwarder, move || forwarder.run())?);

        for port in 0..NB_OUTPUT_PORTS {
            let worker = OutputWorker::new(self.ctx.clone(), port);
            handles.push(self.spawn(WorkerRole::OutputPort(port), move || worker.run())?);
        }

        let reporter = StatsReporter::new(self.ctx.clone());
        handles.push(self.spawn(WorkerRole::Stats, move || reporter.run())?);
        Ok(())
    }

    fn spawn(
        &self,
        role: WorkerRole,
        body: impl FnOnce() + Send + 'static,
    ) -> Result<JoinHandle<()>, RouterError> {
        let name = role.thread_name();
        let realtime = self.ctx.config.realtime_priorities;
        thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                apply_worker_priority(role, realtime);
                debug!("worker started");
                body();
                debug!("worker stopped");
            })
            .map_err(|source| RouterError::Spawn { name, source })
    }

    /// Ask every worker to stop at its next safe point.
    pub fn shutdown(&self) {
        self.ctx.control.shutdown();
    }

    /// Wait for every worker thread, then release whatever is still queued.
    pub fn join(&self) -> DrainReport {
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        if handles.is_empty() {
            return DrainReport::default();
        }
        for handle in handles {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                warn!(worker = %name, "worker thread panicked");
            }
        }
        let drained = self.ctx.drain_queues();
        info!(
            upstream = drained.upstream,
            port_inboxes = drained.port_inboxes,
            "router stopped"
        );
        drained
    }

    /// Current statistics, as the reporter would print them.
    pub fn snapshot(&self) -> StatsSnapshot {
        self.ctx.stats_snapshot()
    }
}

impl Drop for Router {
    fn drop(&mut self) {
        self.shutdown();
        let _ = self.join();
    }
}
