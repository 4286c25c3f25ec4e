use std::io::Write;

use crate::error::{CodecError, FormatError};
use crate::Result;

/// Ordered bit-level writer over a byte-oriented sink.
///
/// Bits are emitted most-significant-first. Closing the stream pads the final
/// partial byte with zero bits.
pub struct BitWriter<W: Write> {
    inner: W,
    /// Pending bits, packed into the low end of the byte
    buffer: u8,
    /// Number of pending bits in `buffer`
    used: u32,
    /// Total bits written so far, padding excluded
    bits_written: u64,
}

impl<W: Write> BitWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buffer: 0,
            used: 0,
            bits_written: 0,
        }
    }

    /// Write a single bit.
    pub fn write_bit(&mut self, bit: bool) -> Result<()> {
        self.write_bits(u64::from(bit), 1)
    }

    /// Write the low-order `len` bits of `value`, most-significant-first.
    ///
    /// `len == 0` is a no-op; `len > 64` is an unsupported operation.
    pub fn write_bits(&mut self, value: u64, len: u32) -> Result<()> {
        if len > 64 {
            return Err(CodecError::Unsupported("bit length exceeds 64").into());
        }
        let mut remaining = len;
        while remaining > 0 {
            let take = (8 - self.used).min(remaining);
            let shift = remaining - take;
            let mask = if take == 64 { u64::MAX } else { (1 << take) - 1 };
            let bits = ((value >> shift) & mask) as u8;
            // shift in u32: `take` can be a full 8 when the writer is
            // byte-aligned, and `used + take <= 8` keeps the result in range
            self.buffer = ((u32::from(self.buffer) << take) as u8) | bits;
            self.used += take;
            remaining -= take;
            if self.used == 8 {
                self.inner.write_all(&[self.buffer])?;
                self.buffer = 0;
                self.used = 0;
            }
        }
        self.bits_written += u64::from(len);
        Ok(())
    }

    /// Total bits written so far, not counting flush padding.
    pub fn bits_written(&self) -> u64 {
        self.bits_written
    }

    /// Pad to a byte boundary with zero bits and flush the inner sink.
    pub fn flush(&mut self) -> Result<()> {
        if self.used > 0 {
            let byte = self.buffer << (8 - self.used);
            self.inner.write_all(&[byte])?;
            self.buffer = 0;
            self.used = 0;
        }
        self.inner.flush()?;
        Ok(())
    }

    /// Flush and return the inner sink.
    pub fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.inner)
    }
}

/// Ordered bit-level reader over a byte slice.
pub struct BitReader<'a> {
    data: &'a [u8],
    byte_pos: usize,
    /// Bits already consumed from the current byte
    bit_pos: u32,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// Number of unread bits left in the buffer.
    pub fn remaining(&self) -> u64 {
        (self.data.len() - self.byte_pos) as u64 * 8 - u64::from(self.bit_pos)
    }

    /// Read a single bit.
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.byte_pos >= self.data.len() {
            return Err(FormatError::TruncatedBits {
                requested: 1,
                available: 0,
            }
            .into());
        }
        let bit = (self.data[self.byte_pos] >> (7 - self.bit_pos)) & 1;
        self.bit_pos += 1;
        if self.bit_pos == 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }
        Ok(bit == 1)
    }

    /// Read `len` bits, returned right-aligned in the result.
    pub fn read_bits(&mut self, len: u32) -> Result<u64> {
        if len > 64 {
            return Err(CodecError::Unsupported("bit length exceeds 64").into());
        }
        if u64::from(len) > self.remaining() {
            return Err(FormatError::TruncatedBits {
                requested: u64::from(len),
                available: self.remaining(),
            }
            .into());
        }
        let mut value = 0u64;
        for _ in 0..len {
            value = (value << 1) | u64::from(self.read_bit()?);
        }
        Ok(value)
    }
}
