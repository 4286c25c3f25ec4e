use std::io::Write;

use auto_impl::auto_impl;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::Result;

/// Block content type discriminants used by the container framing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockContentType {
    /// The single bit-packed buffer holding every core-encoded field
    Core,
    /// A per-content-id byte stream, compressed independently
    External,
}

/// Compression method tags written alongside each external block so a
/// decoder can select the matching decompressor. Fixed ordinals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionMethod {
    Raw = 0,
    Gzip = 1,
    Bzip2 = 2,
    Lzma = 3,
    Rans = 4,
    Zstd = 5,
}

impl CompressionMethod {
    #[must_use]
    pub fn ordinal(self) -> u8 {
        self as u8
    }
}

/// One encoded data block inside a slice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub content_type: BlockContentType,
    /// Content id; 0 for the core block
    pub content_id: i32,
    pub method: CompressionMethod,
    /// Pre-compression byte length, kept for diagnostics
    pub raw_size: usize,
    /// Compressed bytes for external blocks, raw bits for the core block
    pub data: Vec<u8>,
}

impl Block {
    /// Build the core block; core data is never further compressed here.
    #[must_use]
    pub fn core(data: Vec<u8>) -> Self {
        Self {
            content_type: BlockContentType::Core,
            content_id: 0,
            method: CompressionMethod::Raw,
            raw_size: data.len(),
            data,
        }
    }

    #[must_use]
    pub fn external(
        content_id: i32,
        method: CompressionMethod,
        raw_size: usize,
        data: Vec<u8>,
    ) -> Self {
        Self {
            content_type: BlockContentType::External,
            content_id,
            method,
            raw_size,
            data,
        }
    }

    #[must_use]
    pub fn compressed_size(&self) -> usize {
        self.data.len()
    }
}

/// An opaque byte-stream compressor bound to one external content id for the
/// lifetime of a container.
#[auto_impl(&, Box)]
pub trait ExternalCompressor {
    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>>;

    /// The stable method tag stored next to every block this compressor
    /// produced.
    fn method(&self) -> CompressionMethod;
}

/// Pass-through compressor.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawCompressor;

impl ExternalCompressor for RawCompressor {
    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        Ok(raw.to_vec())
    }

    fn method(&self) -> CompressionMethod {
        CompressionMethod::Raw
    }
}

/// Gzip compressor.
#[derive(Clone, Copy, Debug)]
pub struct GzipCompressor {
    level: u32,
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl GzipCompressor {
    #[must_use]
    pub fn new(level: u32) -> Self {
        Self { level }
    }
}

impl ExternalCompressor for GzipCompressor {
    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(self.level));
        encoder.write_all(raw)?;
        Ok(encoder.finish()?)
    }

    fn method(&self) -> CompressionMethod {
        CompressionMethod::Gzip
    }
}

/// Zstandard compressor.
#[derive(Clone, Copy, Debug)]
pub struct ZstdCompressor {
    level: i32,
}

impl Default for ZstdCompressor {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl ZstdCompressor {
    #[must_use]
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl ExternalCompressor for ZstdCompressor {
    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        Ok(zstd::bulk::compress(raw, self.level)?)
    }

    fn method(&self) -> CompressionMethod {
        CompressionMethod::Zstd
    }
}
