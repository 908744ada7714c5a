//! Packet representation shared by all router stages.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of 32-bit words carried in every packet payload.
pub const PAYLOAD_WORDS: usize = 13;

/// Traffic class carried by a packet; decides which priority lane it lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketKind {
    Video,
    Audio,
    Other,
}

impl PacketKind {
    pub const ALL: [PacketKind; 3] = [PacketKind::Video, PacketKind::Audio, PacketKind::Other];

    /// Numeric code used in delivery records (0 = video, 1 = audio, 2 = other).
    pub const fn code(self) -> u8 {
        match self {
            PacketKind::Video => 0,
            PacketKind::Audio => 1,
            PacketKind::Other => 2,
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PacketKind::Video => "video",
            PacketKind::Audio => "audio",
            PacketKind::Other => "other",
        };
        write!(f, "{label}")
    }
}

/// Synthetic packet travelling through the router.
///
/// A packet is owned by exactly one stage at a time. Pushing it into a queue moves it, and a failed
/// push hands it back inside the error, so the former owner can never observe it again once the
/// hand-off succeeded. Fields are never written after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub source: u32,
    pub destination: u32,
    pub kind: PacketKind,
    pub payload: [u32; PAYLOAD_WORDS],
}

impl Packet {
    /// Build a packet from explicit fields; `payload[0]` is replaced by `sequence`.
    pub fn new(
        source: u32,
        destination: u32,
        kind: PacketKind,
        mut payload: [u32; PAYLOAD_WORDS],
        sequence: u32,
    ) -> Packet {
        payload[0] = sequence;
        Packet {
            source,
            destination,
            kind,
            payload,
        }
    }

    /// Build a packet with uniformly random addresses, kind and payload.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, sequence: u32) -> Packet {
        let source = rng.gen::<u32>();
        let destination = rng.gen::<u32>();
        let kind = PacketKind::ALL[rng.gen_range(0..PacketKind::ALL.len())];
        let payload: [u32; PAYLOAD_WORDS] = rng.gen();
        Packet::new(source, destination, kind, payload, sequence)
    }

    /// Creation sequence number stamped by the generator.
    pub fn sequence(&self) -> u32 {
        self.payload[0]
    }
}
