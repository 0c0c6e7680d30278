//! Minimal little-endian binary codec for the RDT wire format.
//!
//! Scoped down from a general-purpose codec to exactly what a 20-byte fixed
//! header plus a raw data slice needs: `u16`/`u32` little-endian integers and
//! byte slices. Extension traits over `bytes::Buf`/`bytes::BufMut` so callers
//! can read/write directly against `Bytes`/`BytesMut`.

use crate::error::{BinaryError, Result};
use bytes::{Buf, BufMut, Bytes};

macro_rules! check_remaining {
    ($buf:expr, $len:expr) => {
        let needed = $len;
        let remaining = $buf.remaining();
        if remaining < needed {
            return Err(BinaryError::UnexpectedEof { needed, remaining });
        }
    };
}

/// Extension trait for reading RDT header fields out of a `Buf`.
pub trait BinaryReader: Buf {
    #[inline]
    fn read_u16_le(&mut self) -> Result<u16> {
        check_remaining!(self, 2);
        Ok(self.get_u16_le())
    }

    #[inline]
    fn read_u32_le(&mut self) -> Result<u32> {
        check_remaining!(self, 4);
        Ok(self.get_u32_le())
    }

    #[inline]
    fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        check_remaining!(self, len);
        Ok(self.copy_to_bytes(len))
    }
}

impl<T: Buf + ?Sized> BinaryReader for T {}

/// Extension trait for writing RDT header fields into a `BufMut`.
pub trait BinaryWriter: BufMut {
    #[inline]
    fn write_u16_le(&mut self, value: u16) {
        self.put_u16_le(value);
    }

    #[inline]
    fn write_u32_le(&mut self, value: u32) {
        self.put_u32_le(value);
    }

    #[inline]
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.put_slice(bytes);
    }

    #[inline]
    fn write_zeros(&mut self, count: usize) {
        for _ in 0..count {
            self.put_u8(0);
        }
    }
}

impl<T: BufMut + ?Sized> BinaryWriter for T {}
