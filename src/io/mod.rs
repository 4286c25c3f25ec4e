//! Bit- and byte-level primitives shared by every binary sub-format.

mod bits;
mod crc32;
mod itf8;

pub use bits::{BitReader, BitWriter};
pub use crc32::Crc32Writer;
pub use itf8::{
    itf8_to_bytes, ltf8_to_bytes, read_itf8, read_itf8_from, read_ltf8, write_itf8, write_ltf8,
};
