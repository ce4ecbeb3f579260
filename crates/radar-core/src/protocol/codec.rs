//! Frame codec for OpenRadar packets.
//!
//! Wire format:
//! ```text
//! [tag:2][length:2][payload:length]
//! ```
//! Header size: 4 bytes.  Both header fields are little-endian `u16`.
//! `length` must equal the payload size registered for `tag`; any other value
//! is a framing error and the connection is abandoned.
//!
//! Two flavours are provided: slice-based [`encode_frame`]/[`decode_frame`]
//! for tests and benchmarks, and stream-based [`read_packet`]/[`write_packet`]
//! used by the connection pump.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::registry::{Packet, PacketDescriptor, PacketRegistry, PacketTag};

/// Size of the `tag | length` frame header in bytes.
pub const FRAME_HEADER_LEN: usize = 4;

/// Errors that can occur while encoding or decoding a frame.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the frame it claims to hold.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The frame's tag is not present in the registry.
    #[error("unknown packet tag: 0x{tag:04X}")]
    UnknownTag { tag: u16 },

    /// The header's length disagrees with the registered payload size.
    #[error("length mismatch for tag 0x{tag:04X}: header says {declared}, registry expects {expected}")]
    LengthMismatch { tag: u16, declared: u16, expected: u16 },

    /// The payload could not be decoded into its packet kind.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The packet's kind has no descriptor in the registry used to encode it.
    #[error("packet kind {0} is not registered")]
    UnregisteredKind(&'static str),
}

/// Errors from reading a frame off a byte stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The peer closed the stream cleanly at a frame boundary.
    #[error("stream closed by peer")]
    Closed,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ── Header ────────────────────────────────────────────────────────────────────

fn write_header(buf: &mut [u8], descriptor: &PacketDescriptor) {
    buf[0..2].copy_from_slice(&descriptor.tag.0.to_le_bytes());
    buf[2..4].copy_from_slice(&descriptor.payload_len.to_le_bytes());
}

/// Resolves a header to its descriptor, checking the declared length.
fn check_header(
    registry: &PacketRegistry,
    header: [u8; FRAME_HEADER_LEN],
) -> Result<&'static PacketDescriptor, ProtocolError> {
    let tag = u16::from_le_bytes([header[0], header[1]]);
    let declared = u16::from_le_bytes([header[2], header[3]]);

    let descriptor = registry
        .by_tag(PacketTag(tag))
        .ok_or(ProtocolError::UnknownTag { tag })?;

    if declared != descriptor.payload_len {
        return Err(ProtocolError::LengthMismatch {
            tag,
            declared,
            expected: descriptor.payload_len,
        });
    }
    Ok(descriptor)
}

fn descriptor_for(
    registry: &PacketRegistry,
    packet: &Packet,
) -> Result<&'static PacketDescriptor, ProtocolError> {
    let kind = packet.kind();
    registry
        .by_kind(kind)
        .ok_or(ProtocolError::UnregisteredKind(kind.name()))
}

// ── Slice API ─────────────────────────────────────────────────────────────────

/// Encodes `packet` into a complete frame (header + payload).
///
/// # Errors
///
/// Returns [`ProtocolError::UnregisteredKind`] if `registry` has no descriptor
/// for the packet's kind, or any error raised by the kind's encoder.
///
/// # Examples
///
/// ```rust
/// use radar_core::geo::LatLng;
/// use radar_core::protocol::{decode_frame, encode_frame, CallSign, Packet, PacketRegistry,
///     PositionUpdate, Squawk};
///
/// let registry = PacketRegistry::standard();
/// let packet = Packet::PositionUpdate(PositionUpdate {
///     call_sign: CallSign::new("N172SP").unwrap(),
///     squawk: Squawk::VFR,
///     frequency_khz: 122_800,
///     coords: LatLng::new(47.9, -122.28),
///     altitude_ft: 1500.0,
///     ground_speed_kt: 95.0,
///     ground_track_deg: 340.0,
/// });
/// let bytes = encode_frame(registry, &packet).unwrap();
/// let (decoded, consumed) = decode_frame(registry, &bytes).unwrap();
/// assert_eq!(decoded, packet);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_frame(registry: &PacketRegistry, packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
    let descriptor = descriptor_for(registry, packet)?;
    let payload_len = descriptor.payload_len as usize;

    let mut buf = vec![0u8; FRAME_HEADER_LEN + payload_len];
    write_header(&mut buf[..FRAME_HEADER_LEN], descriptor);
    (descriptor.encode)(packet, &mut buf[FRAME_HEADER_LEN..])?;
    Ok(buf)
}

/// Decodes one frame from the beginning of `bytes`.
///
/// Returns the packet and the number of bytes consumed, so the caller can
/// advance their read cursor.
///
/// # Errors
///
/// - [`ProtocolError::InsufficientData`] if the header or payload is truncated.
/// - [`ProtocolError::UnknownTag`] if the tag is not registered.
/// - [`ProtocolError::LengthMismatch`] if the declared length is not the
///   registered size; the payload is never handed to a decoder in that case.
pub fn decode_frame(registry: &PacketRegistry, bytes: &[u8]) -> Result<(Packet, usize), ProtocolError> {
    if bytes.len() < FRAME_HEADER_LEN {
        return Err(ProtocolError::InsufficientData {
            needed: FRAME_HEADER_LEN,
            available: bytes.len(),
        });
    }

    let header = [bytes[0], bytes[1], bytes[2], bytes[3]];
    let descriptor = check_header(registry, header)?;

    let total = FRAME_HEADER_LEN + descriptor.payload_len as usize;
    if bytes.len() < total {
        return Err(ProtocolError::InsufficientData {
            needed: total,
            available: bytes.len(),
        });
    }

    let packet = (descriptor.decode)(&bytes[FRAME_HEADER_LEN..total])?;
    Ok((packet, total))
}

// ── Stream API ────────────────────────────────────────────────────────────────

/// Reads exactly one frame from `reader`.
///
/// Only the 4 header bytes are consumed before an unknown tag or a length
/// mismatch is reported.
///
/// # Errors
///
/// - [`StreamError::Closed`] if the stream ends before the first header byte.
/// - [`StreamError::Io`] on transport failure, including EOF mid-frame.
/// - [`StreamError::Protocol`] on any framing or payload error.
pub async fn read_packet<R>(registry: &PacketRegistry, reader: &mut R) -> Result<Packet, StreamError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; FRAME_HEADER_LEN];
    if reader.read(&mut header[..1]).await? == 0 {
        return Err(StreamError::Closed);
    }
    reader.read_exact(&mut header[1..]).await?;

    let descriptor = check_header(registry, header)?;

    let mut payload = vec![0u8; descriptor.payload_len as usize];
    reader.read_exact(&mut payload).await?;
    Ok((descriptor.decode)(&payload)?)
}

/// Encodes `packet` and writes the whole frame to `writer`, then flushes.
///
/// # Errors
///
/// Returns [`StreamError::Protocol`] if the packet cannot be encoded (nothing
/// is written in that case) or [`StreamError::Io`] on write failure.
pub async fn write_packet<W>(
    registry: &PacketRegistry,
    writer: &mut W,
    packet: &Packet,
) -> Result<(), StreamError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let frame = encode_frame(registry, packet)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
