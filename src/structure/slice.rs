//! Slice building: one bounded chunk of records encoded into a core
//! bitstream plus its external byte streams.

use std::collections::BTreeMap;

use crate::codec::writer::RecordWriter;
use crate::codec::EncodeSink;
use crate::digest::ContentDigest;
use crate::error::BuildError;
use crate::record::CramRecord;
use crate::{Result, NO_ALIGNMENT_START};

use super::{Block, CompressionHeader, ExternalCompressor};

/// Reference usage of one slice, decided by a single scan over its records.
///
/// The lattice is one-way: once a second distinct reference id is seen the
/// slice is multi-reference and stays so.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReferenceContext {
    /// No record carried both a real reference id and a real alignment start
    #[default]
    Unmapped,
    /// Every placed record mapped to this reference id
    Single(i32),
    /// Placed records spanned two or more reference ids
    Multi,
}

impl ReferenceContext {
    /// Wire sentinel for unmapped-or-no-reference slices.
    pub const UNMAPPED_OR_NO_REFERENCE: i32 = -1;
    /// Wire sentinel for multi-reference slices.
    pub const MULTI_REFERENCE: i32 = -2;

    /// The reference id written into the slice header.
    #[must_use]
    pub fn sequence_id(self) -> i32 {
        match self {
            Self::Unmapped => Self::UNMAPPED_OR_NO_REFERENCE,
            Self::Single(id) => id,
            Self::Multi => Self::MULTI_REFERENCE,
        }
    }

    fn observe(self, sequence_id: i32) -> Self {
        match self {
            Self::Unmapped => Self::Single(sequence_id),
            Self::Single(id) if id != sequence_id => Self::Multi,
            other => other,
        }
    }
}

/// One bounded chunk of records in encoded form. Immutable once built.
#[derive(Clone, Debug)]
pub struct Slice {
    pub reference_context: ReferenceContext,
    /// Minimum alignment start; sentinel unless single-reference
    pub alignment_start: i32,
    /// `max(end) - min(start) + 1`; 0 unless single-reference
    pub alignment_span: i32,
    pub num_records: usize,
    /// Sum of read lengths
    pub bases: u64,
    /// 0-based index of this slice's first record in the logical stream
    /// spanning all containers
    pub global_record_counter: u64,
    pub core_block: Block,
    pub external_blocks: BTreeMap<i32, Block>,
    /// Content digest attributes, for downstream validation
    pub tags: Vec<(String, String)>,
}

impl Slice {
    #[must_use]
    pub fn sequence_id(&self) -> i32 {
        self.reference_context.sequence_id()
    }
}

/// Encode one chunk of records against a finalized compression header.
///
/// Each invocation owns its bit sink and external buffers outright, so slices
/// of one container may be built concurrently and reassembled in chunk order.
pub(crate) fn build_slice(
    records: &[CramRecord],
    header: &CompressionHeader,
    compressors: &BTreeMap<i32, Box<dyn ExternalCompressor>>,
    digest: &mut dyn ContentDigest,
) -> Result<Slice> {
    if records.is_empty() {
        return Err(BuildError::EmptySlice.into());
    }

    // Pass 1: count bases, classify reference usage, detect alignment
    // boundaries, feed the digest.
    let mut bases = 0u64;
    let mut context = ReferenceContext::Unmapped;
    let mut min_start = i32::MAX;
    let mut max_end = NO_ALIGNMENT_START;
    for record in records {
        bases += record.read_length as u64;
        digest.add(record);

        if record.is_placed() {
            context = context.observe(record.sequence_id);
            min_start = min_start.min(record.alignment_start);
            max_end = max_end.max(record.alignment_end());
        }
    }

    // Multi-reference slices never carry a meaningful alignment range, even
    // when a later record could have narrowed it.
    let (alignment_start, alignment_span) = match context {
        ReferenceContext::Single(_) => (min_start, max_end - min_start + 1),
        _ => (NO_ALIGNMENT_START, 0),
    };

    // Pass 2: delta-encode positions and multiplex every field through its
    // codec, in original record order.
    let writer = RecordWriter::new(header)?;
    let mut sink = EncodeSink::with_external_ids(&header.external_ids());
    let mut prev_start = alignment_start;
    for record in records {
        let delta = record.alignment_start - prev_start;
        prev_start = record.alignment_start;
        writer.write_record(&mut sink, record, delta)?;
    }

    let (core, external) = sink.finish()?;
    let mut external_blocks = BTreeMap::new();
    for (content_id, raw) in external {
        let compressor = compressors
            .get(&content_id)
            .ok_or(BuildError::MissingCompressor(content_id))?;
        let compressed = compressor.compress(&raw)?;
        external_blocks.insert(
            content_id,
            Block::external(content_id, compressor.method(), raw.len(), compressed),
        );
    }

    Ok(Slice {
        reference_context: context,
        alignment_start,
        alignment_span,
        num_records: records.len(),
        bases,
        global_record_counter: 0,
        core_block: Block::core(core),
        external_blocks,
        tags: digest.as_tags(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::CompressionHeaderFactory;
    use crate::digest::Crc32ContentDigest;
    use crate::record::CramRecordBuilder;

    fn mapped(sequence_id: i32, start: i32, len: usize) -> CramRecord {
        CramRecordBuilder::default()
            .sequence_id(sequence_id)
            .alignment_start(start)
            .bases(vec![b'A'; len])
            .quality_scores(vec![30; len])
            .build()
    }

    fn unmapped(len: usize) -> CramRecord {
        CramRecordBuilder::default()
            .bases(vec![b'N'; len])
            .quality_scores(vec![0; len])
            .build()
    }

    fn build(records: &[CramRecord]) -> Slice {
        let (header, compressors) = CompressionHeaderFactory::new().build(records).unwrap();
        let mut digest = Crc32ContentDigest::new();
        build_slice(records, &header, &compressors, &mut digest).unwrap()
    }

    #[test]
    fn single_reference_classification_and_span() {
        let records = vec![mapped(3, 100, 50), mapped(3, 110, 40), mapped(3, 120, 31)];
        let slice = build(&records);
        assert_eq!(slice.reference_context, ReferenceContext::Single(3));
        assert_eq!(slice.alignment_start, 100);
        // max end is 120 + 31 - 1 = 150
        assert_eq!(slice.alignment_span, 51);
        assert_eq!(slice.bases, 121);
        assert_eq!(slice.num_records, 3);
    }

    #[test]
    fn mixed_references_collapse_to_multi() {
        let records = vec![mapped(0, 100, 10), mapped(1, 200, 10), mapped(0, 300, 10)];
        let slice = build(&records);
        assert_eq!(slice.reference_context, ReferenceContext::Multi);
        assert_eq!(slice.sequence_id(), ReferenceContext::MULTI_REFERENCE);
        assert_eq!(slice.alignment_start, NO_ALIGNMENT_START);
        assert_eq!(slice.alignment_span, 0);
    }

    #[test]
    fn all_unmapped_chunk() {
        let records = vec![unmapped(10), unmapped(20)];
        let slice = build(&records);
        assert_eq!(slice.reference_context, ReferenceContext::Unmapped);
        assert_eq!(
            slice.sequence_id(),
            ReferenceContext::UNMAPPED_OR_NO_REFERENCE
        );
        assert_eq!(slice.alignment_start, NO_ALIGNMENT_START);
        assert_eq!(slice.alignment_span, 0);
        assert_eq!(slice.bases, 30);
    }

    #[test]
    fn unmapped_records_do_not_affect_classification() {
        let records = vec![unmapped(5), mapped(2, 500, 10), unmapped(5)];
        let slice = build(&records);
        assert_eq!(slice.reference_context, ReferenceContext::Single(2));
        assert_eq!(slice.alignment_start, 500);
        assert_eq!(slice.alignment_span, 10);
    }

    #[test]
    fn multi_transition_is_one_way() {
        let context = ReferenceContext::Unmapped
            .observe(1)
            .observe(2)
            .observe(2)
            .observe(2);
        assert_eq!(context, ReferenceContext::Multi);
    }

    #[test]
    fn empty_chunk_is_a_caller_error() {
        let (header, compressors) = CompressionHeaderFactory::new()
            .build(&[mapped(0, 1, 1)])
            .unwrap();
        let mut digest = Crc32ContentDigest::new();
        let err = build_slice(&[], &header, &compressors, &mut digest).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::BuildError(BuildError::EmptySlice)
        ));
    }

    #[test]
    fn core_block_is_padded_to_bytes_and_external_blocks_exist() {
        let records = vec![mapped(0, 100, 8), mapped(0, 120, 8)];
        let slice = build(&records);
        assert!(!slice.core_block.data.is_empty());
        // bases and quality scores each occupy an external stream
        assert!(slice.external_blocks.len() >= 2);
        for block in slice.external_blocks.values() {
            assert!(block.raw_size > 0);
        }
    }

    #[test]
    fn digest_tags_are_attached() {
        let slice = build(&[mapped(0, 100, 8)]);
        assert_eq!(slice.tags.len(), 2);
        assert_eq!(slice.tags[0].0, "BD");
    }
}
