//! Per-record field multiplexing.
//!
//! One codec instance per assigned field key, bound to the shared core bit
//! sink or to an external buffer by content id. Fields are written in the
//! canonical key order, the same total order the header serializes in, so
//! a decoder reads them back identically.

use std::collections::{BTreeMap, HashMap};

use crate::error::{BuildError, CodecError};
use crate::record::CramRecord;
use crate::structure::{CompressionHeader, FieldKey};
use crate::Result;

use super::{Codec, EncodeSink};

pub(crate) struct RecordWriter {
    /// Non-null field codecs in canonical key order
    fields: Vec<(FieldKey, Codec)>,
    tag_codecs: BTreeMap<i32, Codec>,
    /// Tag-set combination to its dictionary index
    tag_set_index: HashMap<Vec<i32>, i32>,
}

impl RecordWriter {
    pub fn new(header: &CompressionHeader) -> Result<Self> {
        let mut fields = Vec::new();
        for (&key, params) in &header.encoding_map {
            if params.is_null() {
                continue;
            }
            fields.push((key, Codec::from_params(params)?));
        }

        let mut tag_codecs = BTreeMap::new();
        for (&tag_id, params) in &header.tag_encoding_map {
            tag_codecs.insert(tag_id, Codec::from_params(params)?);
        }

        let tag_set_index = header
            .tag_dictionary
            .iter()
            .enumerate()
            .map(|(index, tag_set)| {
                let ids = tag_set
                    .iter()
                    .map(|d| (i32::from(d[0]) << 16) | (i32::from(d[1]) << 8) | i32::from(d[2]))
                    .collect();
                (ids, index as i32)
            })
            .collect();

        Ok(Self {
            fields,
            tag_codecs,
            tag_set_index,
        })
    }

    /// Encode one record. `alignment_delta` is the position relative to the
    /// previous record's start, computed by the slice builder.
    pub fn write_record(
        &self,
        sink: &mut EncodeSink,
        record: &CramRecord,
        alignment_delta: i32,
    ) -> Result<()> {
        for (key, codec) in &self.fields {
            match key {
                FieldKey::Ap => {
                    codec.write_int(sink, alignment_delta)?;
                }
                FieldKey::Ba => {
                    codec.write_bytes(sink, &record.bases)?;
                }
                FieldKey::Bf => {
                    codec.write_int(sink, record.bit_flags)?;
                }
                FieldKey::Mq => {
                    codec.write_int(sink, record.mapping_quality)?;
                }
                FieldKey::Qs => {
                    codec.write_bytes(sink, &record.quality_scores)?;
                }
                FieldKey::Rg => {
                    codec.write_int(sink, record.read_group)?;
                }
                FieldKey::Ri => {
                    codec.write_int(sink, record.sequence_id)?;
                }
                FieldKey::Rl => {
                    codec.write_int(sink, record.read_length)?;
                }
                FieldKey::Rn => {
                    // NUL-terminated so names are self-delimiting in the stream
                    codec.write_bytes(sink, &record.read_name)?;
                    codec.write_byte(sink, 0)?;
                }
                FieldKey::Tl => {
                    self.write_tags(sink, codec, record)?;
                }
                _ => {
                    return Err(CodecError::Unsupported(
                        "field key has no value source in the record model",
                    )
                    .into());
                }
            }
        }
        Ok(())
    }

    fn write_tags(&self, sink: &mut EncodeSink, codec: &Codec, record: &CramRecord) -> Result<()> {
        let index = self
            .tag_set_index
            .get(&record.tag_ids())
            .copied()
            .ok_or(BuildError::UnknownTagSet)?;
        codec.write_int(sink, index)?;

        for tag in &record.tags {
            let tag_codec = self
                .tag_codecs
                .get(&tag.id())
                .ok_or(BuildError::MissingTagEncoding(tag.id()))?;
            tag_codec.write_bytes(sink, &tag.value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::EncodingParams;
    use crate::record::{CramRecordBuilder, Tag};

    fn minimal_header() -> CompressionHeader {
        let mut header = CompressionHeader::new();
        header
            .encoding_map
            .insert(FieldKey::Ap, EncodingParams::gamma(1));
        header
            .encoding_map
            .insert(FieldKey::Rl, EncodingParams::gamma(1));
        header
            .encoding_map
            .insert(FieldKey::Ba, EncodingParams::external(1));
        header
    }

    #[test]
    fn fields_are_written_in_canonical_order() {
        let header = minimal_header();
        let writer = RecordWriter::new(&header).unwrap();
        let keys: Vec<FieldKey> = writer.fields.iter().map(|(key, _)| *key).collect();
        assert_eq!(keys, vec![FieldKey::Ap, FieldKey::Ba, FieldKey::Rl]);
    }

    #[test]
    fn record_bytes_land_in_the_right_streams() {
        let header = minimal_header();
        let writer = RecordWriter::new(&header).unwrap();
        let mut sink = EncodeSink::with_external_ids(&header.external_ids());

        let record = CramRecordBuilder::default()
            .sequence_id(0)
            .alignment_start(100)
            .bases(b"ACGT".to_vec())
            .build();
        writer.write_record(&mut sink, &record, 5).unwrap();

        let (core, external) = sink.finish().unwrap();
        assert!(!core.is_empty());
        assert_eq!(external[&1], b"ACGT");
    }

    #[test]
    fn assigned_key_without_value_source_is_fatal() {
        let mut header = minimal_header();
        header
            .encoding_map
            .insert(FieldKey::Dl, EncodingParams::gamma(1));
        let writer = RecordWriter::new(&header).unwrap();
        let mut sink = EncodeSink::with_external_ids(&header.external_ids());
        let record = CramRecordBuilder::default().bases(b"A".to_vec()).build();
        assert!(writer.write_record(&mut sink, &record, 0).is_err());
    }

    #[test]
    fn unknown_tag_set_is_an_error() {
        let mut header = minimal_header();
        header
            .encoding_map
            .insert(FieldKey::Tl, EncodingParams::gamma(1));
        header.tag_dictionary = vec![vec![]];
        let writer = RecordWriter::new(&header).unwrap();
        let mut sink = EncodeSink::with_external_ids(&header.external_ids());

        // record carries a tag combination the dictionary does not list
        let record = CramRecordBuilder::default()
            .bases(b"A".to_vec())
            .tag(Tag::new(*b"NM", b'c', vec![1]))
            .build();
        let err = writer.write_record(&mut sink, &record, 0).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::BuildError(BuildError::UnknownTagSet)
        ));
    }
}
