//! The packet registry: a closed, statically declared table mapping each
//! [`PacketTag`] to the fixed-size encode/decode pair for its packet kind.
//!
//! # Why a static table? (for beginners)
//!
//! Every packet kind on the wire has a fixed payload size.  The receiver reads
//! a 4-byte header, looks the tag up here, and immediately knows how many
//! payload bytes must follow and which function turns them into a value.
//!
//! The table is a `static`, built at compile time by [`PacketRegistry::new`],
//! which is a `const fn` and refuses to compile a table with two entries for
//! the same tag or kind.  Nothing can add or remove kinds at runtime, so the
//! registry can be read from any task without locking.

use std::fmt;

use crate::protocol::codec::ProtocolError;
use crate::protocol::packets::{self, PositionUpdate, POSITION_UPDATE_LEN};

// ── Tags and kinds ────────────────────────────────────────────────────────────

/// 16-bit identifier of a packet variant on the wire.
///
/// Adding a tag is a protocol change; both ends must agree on the full set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PacketTag(pub u16);

impl PacketTag {
    /// Aircraft position report, sent from the simulator side to the radar.
    pub const POSITION_UPDATE: PacketTag = PacketTag(0);
}

impl fmt::Display for PacketTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

/// Concrete packet kinds known to this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    PositionUpdate,
}

impl PacketKind {
    /// Human-readable kind name used in logs and errors.
    pub const fn name(self) -> &'static str {
        match self {
            PacketKind::PositionUpdate => "PositionUpdate",
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which side of the link is allowed to originate a packet kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketDirection {
    /// Flight simulator (client) → radar display (server).
    SimToRadar,
    /// Radar display (server) → flight simulator (client).
    RadarToSim,
}

/// A decoded packet of any registered kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Packet {
    PositionUpdate(PositionUpdate),
}

impl Packet {
    /// Returns the kind of this packet.
    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::PositionUpdate(_) => PacketKind::PositionUpdate,
        }
    }
}

impl From<PositionUpdate> for Packet {
    fn from(update: PositionUpdate) -> Self {
        Packet::PositionUpdate(update)
    }
}

// ── Descriptors ───────────────────────────────────────────────────────────────

/// Writes a packet's payload into a buffer of exactly `payload_len` bytes.
pub type EncodeFn = fn(&Packet, &mut [u8]) -> Result<(), ProtocolError>;

/// Reads a packet from a buffer of exactly `payload_len` bytes.
pub type DecodeFn = fn(&[u8]) -> Result<Packet, ProtocolError>;

/// Binds one [`PacketTag`] to its kind, payload size and codec functions.
#[derive(Clone, Copy)]
pub struct PacketDescriptor {
    pub tag: PacketTag,
    pub kind: PacketKind,
    pub direction: PacketDirection,
    /// Exact payload size in bytes; every frame of this tag must declare it.
    pub payload_len: u16,
    pub encode: EncodeFn,
    pub decode: DecodeFn,
}

impl fmt::Debug for PacketDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketDescriptor")
            .field("tag", &self.tag)
            .field("kind", &self.kind)
            .field("direction", &self.direction)
            .field("payload_len", &self.payload_len)
            .finish_non_exhaustive()
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Immutable tag-indexed table of [`PacketDescriptor`]s.
#[derive(Debug, Clone, Copy)]
pub struct PacketRegistry {
    descriptors: &'static [PacketDescriptor],
}

impl PacketRegistry {
    /// Builds a registry from a static descriptor table.
    ///
    /// # Panics
    ///
    /// Panics if two descriptors share a tag or a kind.  Used in a `static`
    /// initialiser, the panic becomes a compile error.
    pub const fn new(descriptors: &'static [PacketDescriptor]) -> Self {
        let mut i = 0;
        while i < descriptors.len() {
            let mut j = i + 1;
            while j < descriptors.len() {
                if descriptors[i].tag.0 == descriptors[j].tag.0 {
                    panic!("duplicate packet tag in registry");
                }
                if descriptors[i].kind as u8 == descriptors[j].kind as u8 {
                    panic!("duplicate packet kind in registry");
                }
                j += 1;
            }
            i += 1;
        }
        Self { descriptors }
    }

    /// The registry every OpenRadar peer speaks.
    pub fn standard() -> &'static PacketRegistry {
        &STANDARD
    }

    /// Looks up the descriptor registered for `tag`.
    pub fn by_tag(&self, tag: PacketTag) -> Option<&'static PacketDescriptor> {
        self.descriptors.iter().find(|d| d.tag == tag)
    }

    /// Looks up the descriptor registered for `kind`.
    pub fn by_kind(&self, kind: PacketKind) -> Option<&'static PacketDescriptor> {
        self.descriptors.iter().find(|d| d.kind == kind)
    }

    /// All registered descriptors in declaration order.
    pub fn descriptors(&self) -> &'static [PacketDescriptor] {
        self.descriptors
    }
}

const STANDARD_DESCRIPTORS: [PacketDescriptor; 1] = [PacketDescriptor {
    tag: PacketTag::POSITION_UPDATE,
    kind: PacketKind::PositionUpdate,
    direction: PacketDirection::SimToRadar,
    payload_len: POSITION_UPDATE_LEN as u16,
    encode: packets::encode_position_update,
    decode: packets::decode_position_update,
}];

static STANDARD: PacketRegistry = PacketRegistry::new(&STANDARD_DESCRIPTORS);
