mod block;
mod header;
mod slice;

pub use block::{
    Block, BlockContentType, CompressionMethod, ExternalCompressor, GzipCompressor, RawCompressor,
    ZstdCompressor,
};
pub use header::{CompressionHeader, FieldKey};
pub use slice::{ReferenceContext, Slice};

pub(crate) use slice::build_slice;
