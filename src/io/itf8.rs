//! Self-delimiting variable-length integer encodings.
//!
//! ITF8 covers the 32-bit domain in 1-5 bytes, LTF8 the 64-bit domain in 1-9
//! bytes. The leading byte's high bits declare how many continuation bytes
//! follow. Both layouts are fixed, versioned format details: every length and
//! count prefix in the compression header uses them, so the byte layout must
//! match the reference encoding bit-for-bit.

use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::error::FormatError;
use crate::Result;

/// Write one ITF8-encoded value, returning the number of bytes written.
pub fn write_itf8<W: Write>(writer: &mut W, value: i32) -> Result<usize> {
    let v = value as u32;
    if v >> 7 == 0 {
        writer.write_u8(v as u8)?;
        Ok(1)
    } else if v >> 14 == 0 {
        writer.write_u8(((v >> 8) | 0x80) as u8)?;
        writer.write_u8(v as u8)?;
        Ok(2)
    } else if v >> 21 == 0 {
        writer.write_u8(((v >> 16) | 0xC0) as u8)?;
        writer.write_u8((v >> 8) as u8)?;
        writer.write_u8(v as u8)?;
        Ok(3)
    } else if v >> 28 == 0 {
        writer.write_u8(((v >> 24) | 0xE0) as u8)?;
        writer.write_u8((v >> 16) as u8)?;
        writer.write_u8((v >> 8) as u8)?;
        writer.write_u8(v as u8)?;
        Ok(4)
    } else {
        // 5-byte form: only the low nibble of the final byte is significant
        writer.write_u8(((v >> 28) | 0xF0) as u8)?;
        writer.write_u8((v >> 20) as u8)?;
        writer.write_u8((v >> 12) as u8)?;
        writer.write_u8((v >> 4) as u8)?;
        writer.write_u8((v & 0x0F) as u8)?;
        Ok(5)
    }
}

/// Read one ITF8-encoded value from a stream.
pub fn read_itf8<R: Read>(reader: &mut R) -> Result<i32> {
    let b0 = u32::from(reader.read_u8()?);
    let value = if b0 < 0x80 {
        b0
    } else if b0 < 0xC0 {
        ((b0 & 0x7F) << 8) | u32::from(reader.read_u8()?)
    } else if b0 < 0xE0 {
        ((b0 & 0x3F) << 16) | (u32::from(reader.read_u8()?) << 8) | u32::from(reader.read_u8()?)
    } else if b0 < 0xF0 {
        ((b0 & 0x1F) << 24)
            | (u32::from(reader.read_u8()?) << 16)
            | (u32::from(reader.read_u8()?) << 8)
            | u32::from(reader.read_u8()?)
    } else {
        ((b0 & 0x0F) << 28)
            | (u32::from(reader.read_u8()?) << 20)
            | (u32::from(reader.read_u8()?) << 12)
            | (u32::from(reader.read_u8()?) << 4)
            | (u32::from(reader.read_u8()?) & 0x0F)
    };
    Ok(value as i32)
}

/// Decode one ITF8 value from a byte slice, returning `(value, bytes consumed)`.
pub fn read_itf8_from(buf: &[u8]) -> Result<(i32, usize)> {
    let mut cursor = buf;
    let before = cursor.len();
    let value = read_itf8(&mut cursor).map_err(|_| FormatError::TruncatedVarint(before))?;
    Ok((value, before - cursor.len()))
}

/// Encode one ITF8 value into a fresh byte vector.
pub fn itf8_to_bytes(value: i32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(5);
    write_itf8(&mut buf, value).expect("writing to a Vec cannot fail");
    buf
}

/// Write one LTF8-encoded value, returning the number of bytes written.
pub fn write_ltf8<W: Write>(writer: &mut W, value: i64) -> Result<usize> {
    let v = value as u64;
    if v >> 7 == 0 {
        writer.write_u8(v as u8)?;
        Ok(1)
    } else if v >> 14 == 0 {
        writer.write_u8(((v >> 8) | 0x80) as u8)?;
        writer.write_u8(v as u8)?;
        Ok(2)
    } else if v >> 21 == 0 {
        writer.write_u8(((v >> 16) | 0xC0) as u8)?;
        write_be_tail(writer, v, 2)?;
        Ok(3)
    } else if v >> 28 == 0 {
        writer.write_u8(((v >> 24) | 0xE0) as u8)?;
        write_be_tail(writer, v, 3)?;
        Ok(4)
    } else if v >> 35 == 0 {
        writer.write_u8(((v >> 32) | 0xF0) as u8)?;
        write_be_tail(writer, v, 4)?;
        Ok(5)
    } else if v >> 42 == 0 {
        writer.write_u8(((v >> 40) | 0xF8) as u8)?;
        write_be_tail(writer, v, 5)?;
        Ok(6)
    } else if v >> 49 == 0 {
        writer.write_u8(((v >> 48) | 0xFC) as u8)?;
        write_be_tail(writer, v, 6)?;
        Ok(7)
    } else if v >> 56 == 0 {
        writer.write_u8(0xFE)?;
        write_be_tail(writer, v, 7)?;
        Ok(8)
    } else {
        writer.write_u8(0xFF)?;
        write_be_tail(writer, v, 8)?;
        Ok(9)
    }
}

/// Write the low `n` bytes of `v` big-endian.
fn write_be_tail<W: Write>(writer: &mut W, v: u64, n: u32) -> Result<()> {
    for i in (0..n).rev() {
        writer.write_u8((v >> (8 * i)) as u8)?;
    }
    Ok(())
}

/// Read one LTF8-encoded value from a stream.
pub fn read_ltf8<R: Read>(reader: &mut R) -> Result<i64> {
    let b0 = reader.read_u8()?;
    let extra = (b0.leading_ones()).min(8);
    if extra == 0 {
        return Ok(i64::from(b0));
    }
    let head = if extra >= 7 {
        0u64
    } else {
        u64::from(b0 & (0x7F >> extra))
    };
    let mut value = head;
    for _ in 0..extra {
        value = (value << 8) | u64::from(reader.read_u8()?);
    }
    Ok(value as i64)
}

/// Encode one LTF8 value into a fresh byte vector.
pub fn ltf8_to_bytes(value: i64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(9);
    write_ltf8(&mut buf, value).expect("writing to a Vec cannot fail");
    buf
}
