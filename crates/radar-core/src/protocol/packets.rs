//! Concrete packet payloads and their fixed-width binary layouts.
//!
//! Every field occupies a statically known byte range.  All multi-byte values
//! are little-endian; floating-point fields are IEEE-754 `binary64`.
//!
//! ```text
//! PositionUpdate (54 bytes)
//!  offset  size  field
//!       0     8  call sign, ASCII, NUL right-padded
//!       8     2  squawk, u16, binary-coded octal
//!      10     4  COM frequency, i32, kHz
//!      14     8  latitude, f64, decimal degrees
//!      22     8  longitude, f64, decimal degrees
//!      30     8  altitude, f64, feet MSL
//!      38     8  ground speed, f64, knots
//!      46     8  ground track, f64, degrees true
//! ```
//!
//! Changing any offset or width is a breaking protocol change.

use std::fmt;

use crate::geo::LatLng;
use crate::protocol::codec::ProtocolError;
use crate::protocol::registry::Packet;

/// Fixed width of the call-sign field.
pub const CALL_SIGN_LEN: usize = 8;

/// Total payload size of a [`PositionUpdate`].
pub const POSITION_UPDATE_LEN: usize = CALL_SIGN_LEN + 2 + 4 + 8 * 5;

// ── Call sign ─────────────────────────────────────────────────────────────────

/// An aircraft call sign of at most [`CALL_SIGN_LEN`] ASCII bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CallSign {
    bytes: [u8; CALL_SIGN_LEN],
    len: u8,
}

impl CallSign {
    /// Validates and stores a call sign.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedPayload`] if `text` is longer than
    /// [`CALL_SIGN_LEN`] bytes, contains non-ASCII characters, or contains NUL.
    pub fn new(text: &str) -> Result<Self, ProtocolError> {
        if text.len() > CALL_SIGN_LEN {
            return Err(ProtocolError::MalformedPayload(format!(
                "call sign {text:?} exceeds {CALL_SIGN_LEN} bytes"
            )));
        }
        if !text.bytes().all(|b| b.is_ascii() && b != 0) {
            return Err(ProtocolError::MalformedPayload(format!(
                "call sign {text:?} must be non-NUL ASCII"
            )));
        }
        let mut bytes = [0u8; CALL_SIGN_LEN];
        bytes[..text.len()].copy_from_slice(text.as_bytes());
        Ok(Self {
            bytes,
            len: text.len() as u8,
        })
    }

    pub fn as_str(&self) -> &str {
        // Construction guarantees the stored prefix is ASCII.
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or_default()
    }

    fn to_field(self) -> [u8; CALL_SIGN_LEN] {
        self.bytes
    }

    /// Reads a NUL-padded field.  Every byte after the first NUL must be NUL
    /// too, so a decoded call sign re-encodes to the same bytes.
    fn from_field(field: &[u8]) -> Result<Self, ProtocolError> {
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        if field[end..].iter().any(|&b| b != 0) {
            return Err(ProtocolError::MalformedPayload(
                "call sign has data after its NUL padding".to_string(),
            ));
        }
        let text = std::str::from_utf8(&field[..end])
            .map_err(|_| ProtocolError::MalformedPayload("call sign is not ASCII".to_string()))?;
        Self::new(text)
    }
}

impl fmt::Debug for CallSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallSign({:?})", self.as_str())
    }
}

impl fmt::Display for CallSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Squawk ────────────────────────────────────────────────────────────────────

/// Transponder code in binary-coded octal: each nibble holds one octal digit,
/// so a transponder set to "1234" is carried as `0x1234`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Squawk(pub u16);

impl Squawk {
    /// Reserved code signalling unlawful interference (hijack).
    pub const UNLAWFUL_INTERFERENCE: Squawk = Squawk(0x7500);
    /// Reserved code signalling radio failure.
    pub const RADIO_FAILURE: Squawk = Squawk(0x7600);
    /// Reserved code signalling a general emergency.
    pub const GENERAL_EMERGENCY: Squawk = Squawk(0x7700);
    /// Conventional VFR code.
    pub const VFR: Squawk = Squawk(0x1200);

    /// Builds a squawk from its raw transponder register value, keeping the
    /// low 16 bits.
    pub fn from_register(raw: i32) -> Self {
        Squawk((raw & 0xFFFF) as u16)
    }

    /// `true` if every nibble is a valid octal digit (0–7).
    pub fn is_valid_octal(self) -> bool {
        (0..4).all(|i| (self.0 >> (i * 4)) & 0xF <= 7)
    }
}

impl fmt::Debug for Squawk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Squawk({:04X})", self.0)
    }
}

impl fmt::Display for Squawk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

// ── PositionUpdate ────────────────────────────────────────────────────────────

/// Periodic report of the simulated aircraft's position, sent sim → radar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionUpdate {
    pub call_sign: CallSign,
    pub squawk: Squawk,
    /// Active COM frequency in kHz; 121.250 MHz is `121_250`.
    pub frequency_khz: i32,
    pub coords: LatLng,
    /// True altitude above mean sea level, feet.
    pub altitude_ft: f64,
    pub ground_speed_kt: f64,
    /// True (not magnetic) ground track, degrees.
    pub ground_track_deg: f64,
}

impl PositionUpdate {
    /// Active COM frequency in MHz, e.g. `121.25`.
    pub fn frequency_mhz(&self) -> f64 {
        f64::from(self.frequency_khz) / 1000.0
    }
}

// ── Layout ────────────────────────────────────────────────────────────────────

struct FieldWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> FieldWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }
}

struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take())
    }

    fn f64(&mut self) -> f64 {
        f64::from_le_bytes(self.take())
    }
}

fn require_len(buf: &[u8], needed: usize, context: &str) -> Result<(), ProtocolError> {
    if buf.len() != needed {
        Err(ProtocolError::MalformedPayload(format!(
            "{context}: need exactly {needed} bytes, got {}",
            buf.len()
        )))
    } else {
        Ok(())
    }
}

/// Encodes a [`Packet::PositionUpdate`] into exactly [`POSITION_UPDATE_LEN`] bytes.
pub(crate) fn encode_position_update(packet: &Packet, buf: &mut [u8]) -> Result<(), ProtocolError> {
    let Packet::PositionUpdate(m) = packet;
    require_len(buf, POSITION_UPDATE_LEN, "PositionUpdate")?;

    let mut w = FieldWriter::new(buf);
    w.put(&m.call_sign.to_field());
    w.put(&m.squawk.0.to_le_bytes());
    w.put(&m.frequency_khz.to_le_bytes());
    w.put(&m.coords.latitude.to_le_bytes());
    w.put(&m.coords.longitude.to_le_bytes());
    w.put(&m.altitude_ft.to_le_bytes());
    w.put(&m.ground_speed_kt.to_le_bytes());
    w.put(&m.ground_track_deg.to_le_bytes());
    Ok(())
}

/// Decodes exactly [`POSITION_UPDATE_LEN`] bytes into a [`Packet::PositionUpdate`].
pub(crate) fn decode_position_update(buf: &[u8]) -> Result<Packet, ProtocolError> {
    require_len(buf, POSITION_UPDATE_LEN, "PositionUpdate")?;

    let mut r = FieldReader::new(buf);
    let call_sign = CallSign::from_field(&r.take::<CALL_SIGN_LEN>())?;
    let squawk = Squawk(r.u16());
    let frequency_khz = r.i32();
    let latitude = r.f64();
    let longitude = r.f64();
    let altitude_ft = r.f64();
    let ground_speed_kt = r.f64();
    let ground_track_deg = r.f64();

    Ok(Packet::PositionUpdate(PositionUpdate {
        call_sign,
        squawk,
        frequency_khz,
        coords: LatLng::new(latitude, longitude),
        altitude_ft,
        ground_speed_kt,
        ground_track_deg,
    }))
}
