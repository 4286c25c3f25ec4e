//! Write-path core for a reference-based columnar genomic record
//! compression format.
//!
//! A batch of alignment records becomes a [`Container`]: one shared
//! [`CompressionHeader`] describing the per-field codec assignments, plus an
//! ordered list of [`Slice`]s, each holding a bit-packed core block and a set
//! of independently compressed external byte blocks.
//!
//! # Example
//!
//! ```rust
//! use cramcore::{ContainerFactory, CramRecordBuilder};
//!
//! let records: Vec<_> = (0..100)
//!     .map(|i| {
//!         CramRecordBuilder::default()
//!             .sequence_id(0)
//!             .alignment_start(1_000 + i * 10)
//!             .bases(b"ACGTACGT".to_vec())
//!             .quality_scores(vec![30; 8])
//!             .read_name(format!("read.{i}").into_bytes())
//!             .build()
//!     })
//!     .collect();
//!
//! let mut factory = ContainerFactory::new(10_000).unwrap();
//! let container = factory.build_container(&records).unwrap();
//! assert_eq!(container.num_records, 100);
//! ```

mod build;
mod codec;
mod digest;
mod error;
pub mod io;
mod record;
mod structure;

pub use build::{CompressionHeaderFactory, Container, ContainerFactory};
pub use codec::{Codec, DecodeSource, EncodeSink, EncodingId, EncodingParams};
pub use digest::{ContentDigest, Crc32ContentDigest, NullContentDigest};
pub use error::{BuildError, CodecError, Error, FormatError, Result};
pub use record::{CramRecord, CramRecordBuilder, Tag};
pub use structure::{
    Block, BlockContentType, CompressionHeader, CompressionMethod, ExternalCompressor, FieldKey,
    GzipCompressor, RawCompressor, ReferenceContext, Slice, ZstdCompressor,
};

/// Reference sequence id sentinel for unmapped records.
pub const NO_ALIGNMENT_REFERENCE_INDEX: i32 = -1;

/// Alignment start sentinel for records without a position.
pub const NO_ALIGNMENT_START: i32 = 0;

/// Default number of records packed into one slice.
pub const DEFAULT_RECORDS_PER_SLICE: usize = 10_000;

/// Width of the substitution matrix payload in the preservation map.
pub const SUBSTITUTION_MATRIX_SIZE: usize = 5;
