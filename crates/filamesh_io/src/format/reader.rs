//! Bounds-checked cursor over an untrusted byte slice.
//!
//! Every read either returns the requested bytes or a
//! [`DecodeError::TruncatedBuffer`] naming how many bytes the read needed.
//! Nothing here can index out of bounds.

use bytemuck::Pod;

use crate::error::{DecodeError, DecodeResult};

use super::swap_le;

pub(crate) struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Current read position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn truncated(&self, len: u64) -> DecodeError {
        let required = u64::try_from(self.pos)
            .ok()
            .and_then(|pos| pos.checked_add(len))
            .and_then(|end| usize::try_from(end).ok())
            .unwrap_or(usize::MAX);
        DecodeError::TruncatedBuffer {
            required,
            available: self.bytes.len(),
        }
    }

    /// Takes `len` bytes, where `len` may come straight from the header.
    pub fn take_u64(&mut self, len: u64) -> DecodeResult<&'a [u8]> {
        match usize::try_from(len) {
            Ok(n) if n <= self.remaining() => {
                let slice = &self.bytes[self.pos..self.pos + n];
                self.pos += n;
                Ok(slice)
            }
            _ => Err(self.truncated(len)),
        }
    }

    /// Takes `len` bytes.
    pub fn take(&mut self, len: usize) -> DecodeResult<&'a [u8]> {
        self.take_u64(len as u64)
    }

    /// Reads a little-endian u32 without advancing.
    pub fn peek_u32(&self) -> DecodeResult<u32> {
        self.bytes
            .get(self.pos..self.pos + 4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .ok_or_else(|| self.truncated(4))
    }

    /// Reads a little-endian u32.
    pub fn read_u32(&mut self) -> DecodeResult<u32> {
        let value = self.peek_u32()?;
        self.pos += 4;
        Ok(value)
    }

    /// Reads a plain-old-data record stored as little-endian 32-bit words.
    pub fn read_record<T: Pod>(&mut self) -> DecodeResult<T> {
        let bytes = self.take(std::mem::size_of::<T>())?;
        Ok(swap_le(bytemuck::pod_read_unaligned(bytes)))
    }
}
