//! Wire packet format: a fixed 20-byte header plus up to 1024 data bytes.
//!
//! Field layout and checksum rule are taken verbatim from the original
//! `rdt.h`/`PacketHeader` this protocol was distilled from.

use crate::checksum;
use bytes::{Bytes, BytesMut};
use rdt_binary::{BinaryReader, BinaryWriter};

pub const HEADER_LEN: usize = 20;
pub const MAX_DATA_LEN: usize = 1024;

/// Control bit flags, OR-able (`SYN|ACK` during the handshake).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u16);

impl Flags {
    pub const NONE: Flags = Flags(0);
    pub const SYN: Flags = Flags(0x0001);
    pub const ACK: Flags = Flags(0x0002);
    pub const FIN: Flags = Flags(0x0004);

    pub fn from_bits(bits: u16) -> Flags {
        Flags(bits)
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Flags {
    type Output = Flags;
    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

/// A decoded or about-to-be-encoded RDT packet.
#[derive(Debug, Clone)]
pub struct Packet {
    pub seq: u32,
    pub ack: u32,
    pub flags: Flags,
    pub window: u16,
    pub data: Bytes,
}

/// Errors that drop a single packet without propagating past the receive
/// loop (see SPEC_FULL.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    #[error("malformed packet: missing header bytes or declared length out of range")]
    Malformed,
    #[error("checksum mismatch")]
    ChecksumMismatch,
}

impl Packet {
    pub fn control(seq: u32, ack: u32, flags: Flags) -> Packet {
        Packet {
            seq,
            ack,
            flags,
            window: 0,
            data: Bytes::new(),
        }
    }

    pub fn data(seq: u32, payload: Bytes, window: u16) -> Packet {
        debug_assert!(payload.len() <= MAX_DATA_LEN);
        Packet {
            seq,
            ack: 0,
            flags: Flags::NONE,
            window,
            data: payload,
        }
    }

    pub fn length(&self) -> u16 {
        self.data.len() as u16
    }

    /// Serializes this packet, computing the checksum over the header (with
    /// the checksum field zeroed) plus the active data bytes.
    pub fn encode(&self) -> Bytes {
        let length = self.length();
        let mut buf = BytesMut::with_capacity(HEADER_LEN + length as usize);
        buf.write_u32_le(self.seq);
        buf.write_u32_le(self.ack);
        buf.write_u16_le(self.flags.bits());
        buf.write_u16_le(0); // checksum, filled in below
        buf.write_u16_le(length);
        buf.write_u16_le(self.window);
        buf.write_zeros(4); // padding
        buf.write_bytes(&self.data);

        let sum = checksum::compute(&buf);
        let sum_bytes = sum.to_le_bytes();
        buf[10] = sum_bytes[0];
        buf[11] = sum_bytes[1];

        buf.freeze()
    }

    /// Decodes a raw datagram. Fails with `Malformed` if the buffer is too
    /// short or declares a length longer than the remaining bytes, and with
    /// `ChecksumMismatch` if the checksum does not verify.
    pub fn decode(raw: &[u8]) -> Result<Packet, PacketError> {
        if raw.len() < HEADER_LEN {
            return Err(PacketError::Malformed);
        }

        let mut header = &raw[0..HEADER_LEN];
        let seq = header.read_u32_le().map_err(|_| PacketError::Malformed)?;
        let ack = header.read_u32_le().map_err(|_| PacketError::Malformed)?;
        let flags = header.read_u16_le().map_err(|_| PacketError::Malformed)?;
        let checksum_field = header.read_u16_le().map_err(|_| PacketError::Malformed)?;
        let length = header.read_u16_le().map_err(|_| PacketError::Malformed)?;
        let window = header.read_u16_le().map_err(|_| PacketError::Malformed)?;

        let length = length as usize;
        if length > MAX_DATA_LEN || raw.len() < HEADER_LEN + length {
            return Err(PacketError::Malformed);
        }

        let mut verify_buf = BytesMut::with_capacity(HEADER_LEN + length);
        verify_buf.write_bytes(&raw[0..10]); // seq, ack, flags
        verify_buf.write_u16_le(0); // checksum zeroed
        verify_buf.write_bytes(&raw[12..HEADER_LEN]); // length, window, padding
        verify_buf.write_bytes(&raw[HEADER_LEN..HEADER_LEN + length]);

        if checksum::compute(&verify_buf) != checksum_field {
            return Err(PacketError::ChecksumMismatch);
        }

        Ok(Packet {
            seq,
            ack,
            flags: Flags::from_bits(flags),
            window,
            data: Bytes::copy_from_slice(&raw[HEADER_LEN..HEADER_LEN + length]),
        })
    }
}
