//! Derives a container's compression header from whole-batch statistics.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::codec::EncodingParams;
use crate::error::BuildError;
use crate::record::CramRecord;
use crate::structure::{
    CompressionHeader, ExternalCompressor, FieldKey, GzipCompressor,
};
use crate::{Result, SUBSTITUTION_MATRIX_SIZE};

/// External content ids for the fixed byte series; tag streams are allocated
/// after these.
const BASES_CONTENT_ID: i32 = 1;
const SCORES_CONTENT_ID: i32 = 2;
const NAMES_CONTENT_ID: i32 = 3;
const FIRST_TAG_CONTENT_ID: i32 = 4;

/// Builds one [`CompressionHeader`] per container from the statistics of the
/// entire record batch, so codec choices reflect global value ranges rather
/// than any single slice.
#[derive(Clone, Debug)]
pub struct CompressionHeaderFactory {
    preserve_read_names: bool,
    substitution_matrix: [u8; SUBSTITUTION_MATRIX_SIZE],
}

impl Default for CompressionHeaderFactory {
    fn default() -> Self {
        Self {
            preserve_read_names: true,
            substitution_matrix: [0; SUBSTITUTION_MATRIX_SIZE],
        }
    }
}

impl CompressionHeaderFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn preserve_read_names(mut self, preserve: bool) -> Self {
        self.preserve_read_names = preserve;
        self
    }

    #[must_use]
    pub fn substitution_matrix(mut self, matrix: [u8; SUBSTITUTION_MATRIX_SIZE]) -> Self {
        self.substitution_matrix = matrix;
        self
    }

    /// Scan the batch and assign a codec to every field it uses, plus one
    /// compressor per external content id.
    #[allow(clippy::type_complexity)]
    pub fn build(
        &self,
        records: &[CramRecord],
    ) -> Result<(CompressionHeader, BTreeMap<i32, Box<dyn ExternalCompressor>>)> {
        if records.is_empty() {
            return Err(BuildError::EmptyBatch.into());
        }

        let stats = BatchStats::collect(records);
        let ap_offset = stats.ap_offset();

        let mut header = CompressionHeader::new();
        header.read_names_included = self.preserve_read_names;
        header.ap_series_delta = true;
        header.substitution_matrix = self.substitution_matrix;
        header.tag_dictionary = stats.tag_dictionary;

        // gamma bias picked so every observed value maps to a positive
        // physical value
        header
            .encoding_map
            .insert(FieldKey::Ap, EncodingParams::gamma(ap_offset));
        header
            .encoding_map
            .insert(FieldKey::Bf, EncodingParams::gamma(1 - stats.min_bit_flags));
        header.encoding_map.insert(
            FieldKey::Mq,
            EncodingParams::gamma(1 - stats.min_mapping_quality),
        );
        header
            .encoding_map
            .insert(FieldKey::Rg, EncodingParams::gamma(1 - stats.min_read_group));
        header.encoding_map.insert(
            FieldKey::Rl,
            EncodingParams::gamma(1 - stats.min_read_length),
        );
        header
            .encoding_map
            .insert(FieldKey::Tl, EncodingParams::gamma(1));

        if stats.multi_reference {
            header.encoding_map.insert(
                FieldKey::Ri,
                EncodingParams::gamma(1 - stats.min_sequence_id),
            );
        }

        header
            .encoding_map
            .insert(FieldKey::Ba, EncodingParams::external(BASES_CONTENT_ID));
        header
            .encoding_map
            .insert(FieldKey::Qs, EncodingParams::external(SCORES_CONTENT_ID));
        if self.preserve_read_names {
            header
                .encoding_map
                .insert(FieldKey::Rn, EncodingParams::external(NAMES_CONTENT_ID));
        }

        // one external stream per distinct observed tag id, in ascending
        // tag-id order for deterministic assignment
        let mut next_content_id = FIRST_TAG_CONTENT_ID;
        for &tag_id in &stats.tag_ids {
            header
                .tag_encoding_map
                .insert(tag_id, EncodingParams::external(next_content_id));
            next_content_id += 1;
        }

        let compressors = header
            .external_ids()
            .into_iter()
            .map(|id| {
                (
                    id,
                    Box::new(GzipCompressor::default()) as Box<dyn ExternalCompressor>,
                )
            })
            .collect();

        Ok((header, compressors))
    }
}

/// Whole-batch value statistics driving codec assignment.
struct BatchStats {
    min_bit_flags: i32,
    min_mapping_quality: i32,
    min_read_group: i32,
    min_read_length: i32,
    min_sequence_id: i32,
    min_alignment_start: i32,
    max_alignment_start: i32,
    multi_reference: bool,
    tag_dictionary: Vec<Vec<[u8; 3]>>,
    tag_ids: Vec<i32>,
}

impl BatchStats {
    fn collect(records: &[CramRecord]) -> Self {
        let mut min_bit_flags = i32::MAX;
        let mut min_mapping_quality = i32::MAX;
        let mut min_read_group = i32::MAX;
        let mut min_read_length = i32::MAX;
        let mut min_sequence_id = i32::MAX;
        let mut min_alignment_start = i32::MAX;
        let mut max_alignment_start = i32::MIN;
        let mut placed_references = HashSet::new();

        let mut tag_dictionary = Vec::new();
        let mut seen_tag_sets: HashMap<Vec<i32>, ()> = HashMap::new();
        let mut tag_ids: Vec<i32> = Vec::new();

        for record in records {
            min_bit_flags = min_bit_flags.min(record.bit_flags);
            min_mapping_quality = min_mapping_quality.min(record.mapping_quality);
            min_read_group = min_read_group.min(record.read_group);
            min_read_length = min_read_length.min(record.read_length);
            min_sequence_id = min_sequence_id.min(record.sequence_id);
            min_alignment_start = min_alignment_start.min(record.alignment_start);
            max_alignment_start = max_alignment_start.max(record.alignment_start);
            if record.is_placed() {
                placed_references.insert(record.sequence_id);
            }

            let ids = record.tag_ids();
            if seen_tag_sets.insert(ids.clone(), ()).is_none() {
                tag_dictionary.push(record.tags.iter().map(crate::record::Tag::descriptor).collect());
            }
            for id in ids {
                if !tag_ids.contains(&id) {
                    tag_ids.push(id);
                }
            }
        }
        tag_ids.sort_unstable();

        Self {
            min_bit_flags,
            min_mapping_quality,
            min_read_group,
            min_read_length,
            min_sequence_id,
            min_alignment_start,
            max_alignment_start,
            multi_reference: placed_references.len() > 1,
            tag_dictionary,
            tag_ids,
        }
    }

    /// Bias for the position delta series. Any delta the slice builder can
    /// produce is bounded below by `min(start) - max(start)`, since both the
    /// previous-record start and the slice alignment start lie within the
    /// observed start range.
    fn ap_offset(&self) -> i32 {
        1 + (self.max_alignment_start - self.min_alignment_start).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::EncodingId;
    use crate::record::{CramRecordBuilder, Tag};

    fn record(sequence_id: i32, start: i32) -> CramRecord {
        CramRecordBuilder::default()
            .sequence_id(sequence_id)
            .alignment_start(start)
            .bases(b"ACGT".to_vec())
            .quality_scores(vec![30; 4])
            .read_name(b"r1".to_vec())
            .build()
    }

    #[test]
    fn assigns_core_and_external_codecs() {
        let (header, compressors) = CompressionHeaderFactory::new()
            .build(&[record(0, 100), record(0, 150)])
            .unwrap();

        assert_eq!(header.encoding_map[&FieldKey::Ap].id, EncodingId::Gamma);
        assert_eq!(header.encoding_map[&FieldKey::Ba].id, EncodingId::External);
        assert_eq!(header.encoding_map[&FieldKey::Qs].id, EncodingId::External);
        assert_eq!(header.encoding_map[&FieldKey::Rn].id, EncodingId::External);
        assert!(header.encoding_map[&FieldKey::Dl].is_null());

        // one compressor per referenced external id
        assert_eq!(
            compressors.keys().copied().collect::<Vec<_>>(),
            header.external_ids()
        );
    }

    #[test]
    fn read_names_policy_controls_rn_assignment() {
        let (header, _) = CompressionHeaderFactory::new()
            .preserve_read_names(false)
            .build(&[record(0, 100)])
            .unwrap();
        assert!(!header.read_names_included);
        assert!(header.encoding_map[&FieldKey::Rn].is_null());
    }

    #[test]
    fn ri_assigned_only_for_multi_reference_batches() {
        let (header, _) = CompressionHeaderFactory::new()
            .build(&[record(0, 100), record(0, 200)])
            .unwrap();
        assert!(header.encoding_map[&FieldKey::Ri].is_null());

        let (header, _) = CompressionHeaderFactory::new()
            .build(&[record(0, 100), record(1, 200)])
            .unwrap();
        assert_eq!(header.encoding_map[&FieldKey::Ri].id, EncodingId::Gamma);
    }

    #[test]
    fn tag_dictionary_in_first_seen_order() {
        let tagged = CramRecordBuilder::default()
            .sequence_id(0)
            .alignment_start(5)
            .bases(b"A".to_vec())
            .tag(Tag::new(*b"NM", b'c', vec![1]))
            .build();
        let (header, _) = CompressionHeaderFactory::new()
            .build(&[record(0, 100), tagged.clone(), record(0, 200), tagged])
            .unwrap();

        // two combinations: the empty set, then {NM:c}
        assert_eq!(header.tag_dictionary.len(), 2);
        assert!(header.tag_dictionary[0].is_empty());
        assert_eq!(header.tag_dictionary[1], vec![[b'N', b'M', b'c']]);
        assert_eq!(header.tag_encoding_map.len(), 1);
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert!(CompressionHeaderFactory::new().build(&[]).is_err());
    }

    #[test]
    fn gamma_offsets_admit_observed_minima() {
        // read group -1 must be representable
        let (header, _) = CompressionHeaderFactory::new()
            .build(&[record(0, 100)])
            .unwrap();
        let params = &header.encoding_map[&FieldKey::Rg];
        let codec = crate::codec::Codec::from_params(params).unwrap();
        assert!(codec.size_in_bits_int(-1).is_ok());
    }
}
