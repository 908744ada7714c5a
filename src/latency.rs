//! Simulated processing latency for the classifier stage.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// How a stage burns its processing time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyModel {
    /// Spin on the monotonic clock until the deadline (occupies the core like real work).
    #[default]
    BusyWait,
    /// Sleep until the deadline.
    Sleep,
    /// Return immediately.
    None,
}

impl LatencyModel {
    /// Wait until `cost` has elapsed since `started`.
    pub fn simulate(self, started: Instant, cost: Duration) {
        let deadline = started + cost;
        match self {
            LatencyModel::BusyWait => {
                while Instant::now() < deadline {
                    std::hint::spin_loop();
                }
            }
            LatencyModel::Sleep => {
                let now = Instant::now();
                if deadline > now {
                    std::thread::sleep(deadline - now);
                }
            }
            LatencyModel::None => {}
        }
    }
}
