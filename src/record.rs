use crate::{NO_ALIGNMENT_REFERENCE_INDEX, NO_ALIGNMENT_START};

/// An auxiliary tag attached to a record.
///
/// The 2-byte name and 1-byte value type pack into the 3-byte descriptor used
/// by the compression header's tag dictionary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub name: [u8; 2],
    pub value_type: u8,
    pub value: Vec<u8>,
}

impl Tag {
    #[must_use]
    pub fn new(name: [u8; 2], value_type: u8, value: Vec<u8>) -> Self {
        Self {
            name,
            value_type,
            value,
        }
    }

    /// The packed 3-byte tag identifier: name bytes then value type.
    #[must_use]
    pub fn id(&self) -> i32 {
        (i32::from(self.name[0]) << 16) | (i32::from(self.name[1]) << 8) | i32::from(self.value_type)
    }

    /// The descriptor bytes as stored in the tag dictionary.
    #[must_use]
    pub fn descriptor(&self) -> [u8; 3] {
        [self.name[0], self.name[1], self.value_type]
    }
}

/// One alignment record as consumed by the write path.
///
/// Records are produced upstream and never mutated here: the alignment delta
/// used by the position series is computed on the fly during slice building.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CramRecord {
    /// Reference sequence id, or [`NO_ALIGNMENT_REFERENCE_INDEX`] when unmapped
    pub sequence_id: i32,
    /// 1-based alignment start, or [`NO_ALIGNMENT_START`] when unaligned
    pub alignment_start: i32,
    pub read_length: i32,
    pub bit_flags: i32,
    pub mapping_quality: i32,
    /// Read group index, -1 when the record has none
    pub read_group: i32,
    pub read_name: Vec<u8>,
    pub bases: Vec<u8>,
    pub quality_scores: Vec<u8>,
    pub tags: Vec<Tag>,
}

impl CramRecord {
    /// Whether the record carries both a real reference id and a real
    /// alignment start.
    #[must_use]
    pub fn is_placed(&self) -> bool {
        self.sequence_id != NO_ALIGNMENT_REFERENCE_INDEX
            && self.alignment_start != NO_ALIGNMENT_START
    }

    /// 1-based inclusive alignment end, derived from start and read length.
    #[must_use]
    pub fn alignment_end(&self) -> i32 {
        if self.is_placed() {
            self.alignment_start + self.read_length - 1
        } else {
            NO_ALIGNMENT_START
        }
    }

    /// Packed tag ids in record order.
    #[must_use]
    pub fn tag_ids(&self) -> Vec<i32> {
        self.tags.iter().map(Tag::id).collect()
    }
}

/// Builder for [`CramRecord`].
///
/// # Example
///
/// ```
/// use cramcore::CramRecordBuilder;
///
/// let record = CramRecordBuilder::default()
///     .sequence_id(2)
///     .alignment_start(15_000)
///     .read_name(b"read_001".to_vec())
///     .bases(b"ACGTACGT".to_vec())
///     .quality_scores(vec![40; 8])
///     .build();
/// assert_eq!(record.read_length, 8);
/// ```
#[derive(Clone, Debug)]
pub struct CramRecordBuilder {
    sequence_id: i32,
    alignment_start: i32,
    read_length: Option<i32>,
    bit_flags: i32,
    mapping_quality: i32,
    read_group: i32,
    read_name: Vec<u8>,
    bases: Vec<u8>,
    quality_scores: Vec<u8>,
    tags: Vec<Tag>,
}

impl Default for CramRecordBuilder {
    fn default() -> Self {
        Self {
            sequence_id: NO_ALIGNMENT_REFERENCE_INDEX,
            alignment_start: NO_ALIGNMENT_START,
            read_length: None,
            bit_flags: 0,
            mapping_quality: 0,
            read_group: -1,
            read_name: Vec::new(),
            bases: Vec::new(),
            quality_scores: Vec::new(),
            tags: Vec::new(),
        }
    }
}

impl CramRecordBuilder {
    #[must_use]
    pub fn sequence_id(mut self, sequence_id: i32) -> Self {
        self.sequence_id = sequence_id;
        self
    }

    #[must_use]
    pub fn alignment_start(mut self, alignment_start: i32) -> Self {
        self.alignment_start = alignment_start;
        self
    }

    /// Override the read length; defaults to the base count.
    #[must_use]
    pub fn read_length(mut self, read_length: i32) -> Self {
        self.read_length = Some(read_length);
        self
    }

    #[must_use]
    pub fn bit_flags(mut self, bit_flags: i32) -> Self {
        self.bit_flags = bit_flags;
        self
    }

    #[must_use]
    pub fn mapping_quality(mut self, mapping_quality: i32) -> Self {
        self.mapping_quality = mapping_quality;
        self
    }

    #[must_use]
    pub fn read_group(mut self, read_group: i32) -> Self {
        self.read_group = read_group;
        self
    }

    #[must_use]
    pub fn read_name(mut self, read_name: Vec<u8>) -> Self {
        self.read_name = read_name;
        self
    }

    #[must_use]
    pub fn bases(mut self, bases: Vec<u8>) -> Self {
        self.bases = bases;
        self
    }

    #[must_use]
    pub fn quality_scores(mut self, quality_scores: Vec<u8>) -> Self {
        self.quality_scores = quality_scores;
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    #[must_use]
    pub fn build(self) -> CramRecord {
        let read_length = self.read_length.unwrap_or(self.bases.len() as i32);
        CramRecord {
            sequence_id: self.sequence_id,
            alignment_start: self.alignment_start,
            read_length,
            bit_flags: self.bit_flags,
            mapping_quality: self.mapping_quality,
            read_group: self.read_group,
            read_name: self.read_name,
            bases: self.bases,
            quality_scores: self.quality_scores,
            tags: self.tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_end_derivation() {
        let record = CramRecordBuilder::default()
            .sequence_id(0)
            .alignment_start(100)
            .bases(b"ACGTACGTAC".to_vec())
            .build();
        assert_eq!(record.read_length, 10);
        assert_eq!(record.alignment_end(), 109);
    }

    #[test]
    fn unmapped_record_is_not_placed() {
        let record = CramRecordBuilder::default()
            .bases(b"ACGT".to_vec())
            .build();
        assert!(!record.is_placed());
        assert_eq!(record.alignment_end(), NO_ALIGNMENT_START);

        // a start without a reference does not place the record
        let record = CramRecordBuilder::default()
            .alignment_start(500)
            .bases(b"ACGT".to_vec())
            .build();
        assert!(!record.is_placed());
    }

    #[test]
    fn tag_id_packing() {
        let tag = Tag::new(*b"NM", b'c', vec![0]);
        assert_eq!(tag.id(), (0x4E << 16) | (0x4D << 8) | 0x63);
        assert_eq!(tag.descriptor(), [b'N', b'M', b'c']);
    }
}
