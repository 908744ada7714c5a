//! Router configuration.
//!
//! Every knob has a default: 1024-deep queues, a 2 s idle period
//! between bursts of 1 to 255 packets, 3 ms of classifier work per packet and a 10 s quiescent
//! interval plus 10 s reporting period for statistics. Durations are expressed in milliseconds when
//! serialized.

use crate::error::RouterError;
use crate::latency::LatencyModel;
use crate::metrics::duration_millis;
use crate::priority::PriorityTable;
use crate::queue::DEFAULT_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Capacities of every queue in the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Classifier inbox.
    pub input: usize,
    /// High, medium and low lanes.
    pub lanes: PriorityTable<usize>,
    /// Each output port inbox.
    pub port: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            input: DEFAULT_CAPACITY,
            lanes: PriorityTable::from_fn(|_| DEFAULT_CAPACITY),
            port: DEFAULT_CAPACITY,
        }
    }
}

/// Burst generator parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Seed for the packet and burst-size random stream.
    pub seed: u64,
    /// Idle period before each burst.
    #[serde(with = "duration_millis")]
    pub idle_interval: Duration,
    /// Smallest burst size (inclusive, at least 1).
    pub burst_min: u32,
    /// Largest burst size (inclusive).
    pub burst_max: u32,
    /// Pause between two packets of the same burst.
    #[serde(with = "duration_millis")]
    pub packet_interval: Duration,
    /// Debug pacing: 200 ms plus a random 0..600 ms between packets.
    pub slow_mode: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            idle_interval: Duration::from_secs(2),
            burst_min: 1,
            burst_max: 255,
            packet_interval: Duration::from_millis(1),
            slow_mode: false,
        }
    }
}

/// Classifier parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Simulated processing time per packet, measured from the pop.
    #[serde(with = "duration_millis")]
    pub processing_time: Duration,
    pub latency_model: LatencyModel,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            processing_time: Duration::from_millis(3),
            latency_model: LatencyModel::BusyWait,
        }
    }
}

/// Statistics output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsFormat {
    #[default]
    Text,
    Json,
}

/// Statistics reporter parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// How long workers stay paused after each report.
    #[serde(with = "duration_millis")]
    pub quiesce_interval: Duration,
    /// Wait between the end of a quiescent interval and the next report.
    #[serde(with = "duration_millis")]
    pub report_period: Duration,
    pub format: StatsFormat,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            quiesce_interval: Duration::from_secs(10),
            report_period: Duration::from_secs(10),
            format: StatsFormat::Text,
        }
    }
}

/// Top-level router configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub queues: QueueConfig,
    pub generator: GeneratorConfig,
    pub classifier: ClassifierConfig,
    pub stats: StatsConfig,
    /// How long a blocked worker waits on its inbox before re-checking pause/shutdown.
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,
    /// Apply real-time scheduling classes to worker threads (needs privileges on Linux).
    pub realtime_priorities: bool,
}

impl RouterConfig {
    /// Load a JSON configuration file; absent fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RouterError> {
        let text = std::fs::read_to_string(path)?;
        let config: RouterConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), RouterError> {
        if self.queues.input == 0 || self.queues.port == 0 {
            return Err(RouterError::Config("queue capacities must be non-zero".into()));
        }
        if let Some((priority, _)) = self.queues.lanes.iter().find(|(_, cap)| **cap == 0) {
            return Err(RouterError::Config(format!(
                "{priority} lane capacity must be non-zero"
            )));
        }
        let generator = &self.generator;
        if generator.burst_min == 0 || generator.burst_min > generator.burst_max {
            return Err(RouterError::Config(format!(
                "burst bounds must satisfy 1 <= min <= max, got {}..={}",
                generator.burst_min, generator.burst_max
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(RouterError::Config("poll interval must be non-zero".into()));
        }
        Ok(())
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            queues: QueueConfig::default(),
            generator: GeneratorConfig::default(),
            classifier: ClassifierConfig::default(),
            stats: StatsConfig::default(),
            poll_interval: Duration::from_millis(50),
            realtime_priorities: false,
        }
    }
}
