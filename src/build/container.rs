//! Container assembly: batch in, header plus ordered slices out.

use std::collections::BTreeMap;

use crate::digest::{ContentDigest, Crc32ContentDigest};
use crate::error::BuildError;
use crate::record::CramRecord;
use crate::structure::{build_slice, CompressionHeader, ReferenceContext, Slice};
use crate::{Result, NO_ALIGNMENT_REFERENCE_INDEX, NO_ALIGNMENT_START};

use super::CompressionHeaderFactory;

/// One fully encoded container: a shared compression header and the slices
/// encoded against it, in batch order.
#[derive(Clone, Debug)]
pub struct Container {
    pub header: CompressionHeader,
    pub slices: Vec<Slice>,
    pub num_records: usize,
    /// Sum of read lengths across all slices
    pub bases: u64,
    /// Reference id of the leading slice when single-reference, else the
    /// unmapped sentinel
    pub sequence_id: i32,
    pub alignment_start: i32,
    pub alignment_span: i32,
    /// 0-based index of this container's first record in the logical stream
    pub global_record_counter: u64,
}

type DigestFactory = Box<dyn Fn() -> Box<dyn ContentDigest> + Send + Sync>;

/// Turns record batches into [`Container`]s, threading a global record
/// counter across calls so slice offsets stay monotonic over a whole stream.
///
/// The counter is plain owned state: one factory per output stream, not
/// shareable across threads without external synchronization.
pub struct ContainerFactory {
    records_per_slice: usize,
    preserve_read_names: bool,
    digest_factory: DigestFactory,
    global_record_counter: u64,
}

impl ContainerFactory {
    /// Create a factory that packs at most `records_per_slice` records into
    /// each slice.
    pub fn new(records_per_slice: usize) -> Result<Self> {
        if records_per_slice == 0 {
            return Err(BuildError::InvalidSliceSize.into());
        }
        Ok(Self {
            records_per_slice,
            preserve_read_names: true,
            digest_factory: Box::new(|| Box::new(Crc32ContentDigest::new())),
            global_record_counter: 0,
        })
    }

    /// Whether read names are carried verbatim in their own external stream.
    pub fn set_preserve_read_names(&mut self, preserve: bool) {
        self.preserve_read_names = preserve;
    }

    /// Replace the per-slice content digest. Each slice gets a fresh instance.
    pub fn set_digest_factory<D, F>(&mut self, factory: F)
    where
        D: ContentDigest + 'static,
        F: Fn() -> D + Send + Sync + 'static,
    {
        self.digest_factory = Box::new(move || Box::new(factory()));
    }

    /// Index the next container's first record will get.
    #[must_use]
    pub fn global_record_counter(&self) -> u64 {
        self.global_record_counter
    }

    /// Rewind the counter, e.g. when re-encoding a stream from the top.
    pub fn reset_global_record_counter(&mut self) {
        self.global_record_counter = 0;
    }

    /// Encode one batch. The batch defines the container boundary: codec
    /// choices are derived from it as a whole, then it is chunked into slices
    /// of at most the configured size, in order.
    pub fn build_container(&mut self, records: &[CramRecord]) -> Result<Container> {
        if records.is_empty() {
            return Err(BuildError::EmptyBatch.into());
        }

        let (header, compressors) = CompressionHeaderFactory::new()
            .preserve_read_names(self.preserve_read_names)
            .build(records)?;

        let mut slices = Vec::with_capacity(records.len().div_ceil(self.records_per_slice));
        let mut counter = self.global_record_counter;
        let mut bases = 0u64;
        for chunk in records.chunks(self.records_per_slice) {
            let mut digest = (self.digest_factory)();
            let mut slice = build_slice(chunk, &header, &compressors, digest.as_mut())?;
            slice.global_record_counter = counter;
            counter += slice.num_records as u64;
            bases += slice.bases;
            slices.push(slice);
        }

        // The leading slice decides the container's reference id; a mixed or
        // unmapped leading slice makes the whole container unplaced.
        let sequence_id = match slices[0].reference_context {
            ReferenceContext::Single(id) => id,
            _ => NO_ALIGNMENT_REFERENCE_INDEX,
        };
        let (alignment_start, alignment_span) = alignment_envelope(&slices);

        let container = Container {
            header,
            slices,
            num_records: records.len(),
            bases,
            sequence_id,
            alignment_start,
            alignment_span,
            global_record_counter: self.global_record_counter,
        };
        self.global_record_counter = counter;
        Ok(container)
    }
}

/// Min-start/max-end envelope over the single-reference slices.
fn alignment_envelope(slices: &[Slice]) -> (i32, i32) {
    let mut start = i32::MAX;
    let mut end = i32::MIN;
    for slice in slices {
        if let ReferenceContext::Single(_) = slice.reference_context {
            start = start.min(slice.alignment_start);
            end = end.max(slice.alignment_start + slice.alignment_span);
        }
    }
    if start == i32::MAX {
        (NO_ALIGNMENT_START, 0)
    } else {
        (start, end - start)
    }
}
