//! Bursty packet source feeding the classifier inbox.
//!
//! The generator alternates between two states, starting idle:
//!
//! - **Idle**: wait the idle interval, then draw a burst size and start bursting.
//! - **Bursting**: build one random packet per tick, count it as created and push it into the
//!   classifier inbox. A full inbox drops the packet. After exactly `N` attempts go idle again.
//!
//! All randomness comes from a seeded [`StdRng`], so a given seed always produces the same bursts.

use crate::error::{DropReason, QueueError};
use crate::metrics::WorkerRole;
use crate::packet::Packet;
use crate::pipeline::RouterContext;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    Idle,
    Bursting { remaining: u32 },
}

pub struct Generator {
    ctx: Arc<RouterContext>,
    rng: StdRng,
    sequence: u32,
    state: GeneratorState,
}

impl Generator {
    pub fn new(ctx: Arc<RouterContext>) -> Self {
        let rng = StdRng::seed_from_u64(ctx.config.generator.seed);
        Self {
            ctx,
            rng,
            sequence: 0,
            state: GeneratorState::Idle,
        }
    }

    pub fn state(&self) -> GeneratorState {
        self.state
    }

    /// Sequence number the next packet will carry.
    pub fn next_sequence(&self) -> u32 {
        self.sequence
    }

    /// Draw a burst size in `[burst_min, burst_max]`: draw from `[0, burst_max]` and resample
    /// anything below the minimum.
    pub fn next_burst_size(&mut self) -> u32 {
        let config = &self.ctx.config.generator;
        loop {
            let size = self.rng.gen_range(0..=config.burst_max);
            if size >= config.burst_min {
                return size;
            }
        }
    }

    /// Build the next packet, count it and push it into the classifier inbox.
    pub fn emit_one(&mut self) -> Result<(), DropReason> {
        let packet = Packet::random(&mut self.rng, self.sequence);
        self.sequence = self.sequence.wrapping_add(1);
        self.ctx.counters.record_created();
        match self.ctx.input.push(packet) {
            Ok(()) => Ok(()),
            Err(QueueError::Full(packet)) => {
                self.ctx.counters.record_drop(DropReason::InputFull, packet);
                Err(DropReason::InputFull)
            }
        }
    }

    /// Run one whole burst without pacing and return its size.
    pub fn run_burst(&mut self) -> u32 {
        let size = self.next_burst_size();
        for _ in 0..size {
            let _ = self.emit_one();
        }
        self.state = GeneratorState::Idle;
        size
    }

    /// Worker loop; returns on shutdown.
    pub fn run(mut self) {
        let ctx = self.ctx.clone();
        let config = ctx.config.generator.clone();
        while ctx.control.checkpoint() {
            match self.state {
                GeneratorState::Idle => {
                    if !ctx.control.sleep(config.idle_interval) {
                        break;
                    }
                    let size = self.next_burst_size();
                    debug!(size, first_sequence = self.sequence, "burst starting");
                    self.state = GeneratorState::Bursting { remaining: size };
                }
                GeneratorState::Bursting { remaining } => {
                    let _ = ctx.usage.track(WorkerRole::Generator, || self.emit_one());
                    self.state = if remaining > 1 {
                        GeneratorState::Bursting {
                            remaining: remaining - 1,
                        }
                    } else {
                        GeneratorState::Idle
                    };
                    let pause = self.packet_pause();
                    if !pause.is_zero() && !ctx.control.sleep(pause) {
                        break;
                    }
                }
            }
        }
    }

    fn packet_pause(&mut self) -> Duration {
        let config = &self.ctx.config.generator;
        if config.slow_mode {
            Duration::from_millis(200 + self.rng.gen_range(0..600))
        } else {
            config.packet_interval
        }
    }
}
