//! Concurrent packet router simulation.
//!
//! A generator produces bursts of synthetic packets; a classifier validates them and sorts them
//! into three priority lanes; a strict-priority forwarder routes them to one or all of three output
//! ports; output workers log and release them. Every queue is bounded and every drop is counted.
//! A statistics reporter periodically pauses the pipeline and prints the counters.

pub mod address;
pub mod config;
pub mod control;
pub mod error;
pub mod latency;
pub mod metrics;
pub mod packet;
pub mod pipeline;
pub mod priority;
pub mod queue;
pub mod sink;
pub mod stage;
pub mod threading;

// Re-export for easier testing
pub use config::RouterConfig;
pub use error::{DropReason, QueueError, RouterError};
pub use packet::{Packet, PacketKind};
pub use pipeline::{Router, RouterContext};
pub use priority::Priority;
