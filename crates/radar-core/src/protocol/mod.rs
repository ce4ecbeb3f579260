//! Protocol module containing the packet registry, packet layouts and the
//! frame codec.

pub mod codec;
pub mod packets;
pub mod registry;

pub use codec::{
    decode_frame, encode_frame, read_packet, write_packet, ProtocolError, StreamError,
    FRAME_HEADER_LEN,
};
pub use packets::{CallSign, PositionUpdate, Squawk, POSITION_UPDATE_LEN};
pub use registry::{
    Packet, PacketDescriptor, PacketDirection, PacketKind, PacketRegistry, PacketTag,
};
