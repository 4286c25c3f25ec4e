use std::io::{self, Write};

/// A write decorator that accumulates a running CRC32 over every byte
/// written through it.
///
/// Used by the file-level framing to checksum container and header bytes as
/// they are produced, without a second pass over the data.
pub struct Crc32Writer<W: Write> {
    inner: W,
    hasher: crc32fast::Hasher,
}

impl<W: Write> Crc32Writer<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: crc32fast::Hasher::new(),
        }
    }

    /// The checksum over everything written so far.
    pub fn crc32(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    /// The running checksum as 4 big-endian bytes.
    pub fn crc32_be(&self) -> [u8; 4] {
        self.crc32().to_be_bytes()
    }

    /// The running checksum as 4 little-endian bytes.
    pub fn crc32_le(&self) -> [u8; 4] {
        self.crc32().to_le_bytes()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for Crc32Writer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
