//! Bounds-checked primitive reads and writes over `bytes` buffers.
//!
//! The codec does not own a cursor type. Payload encoders write into a
//! `BytesMut` and decoders read from a `Bytes`; these extension traits add
//! the primitives message kinds need on top of `Buf`/`BufMut`.
//!
//! Every read checks `remaining()` first. The raw `Buf::get_*` methods
//! panic on underflow, which would let a malformed packet take down the
//! thread handling it. Here a short buffer is an ordinary
//! [`ProtocolError::Truncated`].
//!
//! Multi-byte integers are big-endian. Variable-length integers use the
//! 7-bits-per-byte LEB128 layout, at most five bytes for an `i32`.

use bytes::{Buf, BufMut};

use crate::ProtocolError;

/// Maximum encoded width of an `i32` varint.
pub const MAX_VAR_INT_LEN: usize = 5;

/// Default limit for [`WireRead::read_string`], in bytes.
pub const DEFAULT_MAX_STRING_LEN: usize = 32_767;

/// Checked reads for any [`Buf`].
pub trait WireRead: Buf {
    /// Fails unless at least `needed` bytes remain.
    fn ensure_remaining(&self, needed: usize) -> Result<(), ProtocolError> {
        let remaining = self.remaining();
        if remaining < needed {
            return Err(ProtocolError::Truncated {
                needed: needed - remaining,
                remaining,
            });
        }
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        self.ensure_remaining(1)?;
        Ok(self.get_u8())
    }

    /// Any non-zero byte reads as `true`.
    fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.read_u8()? != 0)
    }

    fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        self.ensure_remaining(2)?;
        Ok(self.get_u16())
    }

    fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        self.ensure_remaining(4)?;
        Ok(self.get_i32())
    }

    fn read_i64(&mut self) -> Result<i64, ProtocolError> {
        self.ensure_remaining(8)?;
        Ok(self.get_i64())
    }

    fn read_var_i32(&mut self) -> Result<i32, ProtocolError> {
        let mut value: u32 = 0;
        for i in 0..MAX_VAR_INT_LEN {
            let byte = self.read_u8()?;
            value |= u32::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value as i32);
            }
        }
        Err(ProtocolError::VarIntTooLong {
            max: MAX_VAR_INT_LEN,
        })
    }

    /// Reads a varint byte length, then that many bytes of UTF-8.
    fn read_string(&mut self, max_len: usize) -> Result<String, ProtocolError> {
        let len = self.read_var_i32()?;
        let len = checked_len(len, max_len)?;
        self.ensure_remaining(len)?;
        let bytes = self.copy_to_bytes(len);
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    /// Reads a varint length followed by that many raw bytes.
    fn read_byte_array(&mut self, max_len: usize) -> Result<bytes::Bytes, ProtocolError> {
        let len = checked_len(self.read_var_i32()?, max_len)?;
        self.ensure_remaining(len)?;
        Ok(self.copy_to_bytes(len))
    }
}

impl<B: Buf + ?Sized> WireRead for B {}

/// Writes matching the reads of [`WireRead`].
pub trait WireWrite: BufMut {
    fn write_u8(&mut self, value: u8) {
        self.put_u8(value);
    }

    fn write_bool(&mut self, value: bool) {
        self.put_u8(u8::from(value));
    }

    fn write_u16(&mut self, value: u16) {
        self.put_u16(value);
    }

    fn write_i32(&mut self, value: i32) {
        self.put_i32(value);
    }

    fn write_i64(&mut self, value: i64) {
        self.put_i64(value);
    }

    fn write_var_i32(&mut self, value: i32) {
        let mut value = value as u32;
        loop {
            if value & !0x7f == 0 {
                self.put_u8(value as u8);
                return;
            }
            self.put_u8((value & 0x7f) as u8 | 0x80);
            value >>= 7;
        }
    }

    /// # Errors
    /// Returns [`ProtocolError::LengthOutOfRange`] if `value` is longer
    /// than `max_len` bytes; nothing is written in that case.
    fn write_string(&mut self, value: &str, max_len: usize) -> Result<(), ProtocolError> {
        self.write_byte_array(value.as_bytes(), max_len)
    }

    /// # Errors
    /// Returns [`ProtocolError::LengthOutOfRange`] if `value` is longer
    /// than `max_len` (or than `i32::MAX`); nothing is written in that case.
    fn write_byte_array(&mut self, value: &[u8], max_len: usize) -> Result<(), ProtocolError> {
        let len = value.len();
        let len_i32 = i32::try_from(len)
            .ok()
            .filter(|_| len <= max_len)
            .ok_or(ProtocolError::LengthOutOfRange {
                len: len as i64,
                max: max_len,
            })?;
        self.write_var_i32(len_i32);
        self.put_slice(value);
        Ok(())
    }
}

impl<B: BufMut + ?Sized> WireWrite for B {}

fn checked_len(len: i32, max_len: usize) -> Result<usize, ProtocolError> {
    usize::try_from(len)
        .ok()
        .filter(|len| *len <= max_len)
        .ok_or(ProtocolError::LengthOutOfRange {
            len: i64::from(len),
            max: max_len,
        })
}
