//! The per-container compression header.
//!
//! Binary layout: three independently length-prefixed sub-blocks written back
//! to back: preservation map, field-encoding map, tag-encoding map. Each
//! sub-block is `[ITF8 byte length][ITF8 entry count][entries...]`. The
//! header is the contract every encoder/decoder pair must agree on; all
//! slices of one container share a single read-only header.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use crate::codec::EncodingParams;
use crate::error::FormatError;
use crate::io::{read_itf8, read_itf8_from, write_itf8};
use crate::{Result, SUBSTITUTION_MATRIX_SIZE};

const RN_READ_NAMES_INCLUDED: [u8; 2] = *b"RN";
const AP_ALIGNMENT_POSITION_IS_DELTA: [u8; 2] = *b"AP";
const RR_REFERENCE_REQUIRED: [u8; 2] = *b"RR";
const TD_TAG_IDS_DICTIONARY: [u8; 2] = *b"TD";
const SM_SUBSTITUTION_MATRIX: [u8; 2] = *b"SM";

/// The well-known field keys, declared in lexicographic order so that the
/// derived `Ord` is the canonical serialization and record-write order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldKey {
    /// Alignment position delta series
    Ap,
    /// Read bases
    Ba,
    /// Record bit flags
    Bf,
    /// Base substitution code
    Bs,
    /// Compression bit flags
    Cf,
    /// Deletion length
    Dl,
    /// Read feature code
    Fc,
    /// Number of read features
    Fn,
    /// In-read feature positions
    Fp,
    /// Hard clip length
    Hc,
    /// Inserted bases
    In,
    /// Mate bit flags
    Mf,
    /// Mapping quality score
    Mq,
    /// Records to next fragment
    Nf,
    /// Next fragment alignment start
    Np,
    /// Next fragment reference sequence id
    Ns,
    /// Padding length
    Pd,
    /// Quality scores
    Qs,
    /// Read group
    Rg,
    /// Reference sequence id
    Ri,
    /// Read length
    Rl,
    /// Read name
    Rn,
    /// Reference skip length
    Rs,
    /// Soft clip bases
    Sc,
    /// Tag count (legacy)
    Tc,
    /// Tag-set dictionary index
    Tl,
    /// Tag name and type (legacy)
    Tn,
    /// Template size
    Ts,
}

impl FieldKey {
    /// All known keys in canonical order.
    pub const ALL: [FieldKey; 28] = [
        Self::Ap,
        Self::Ba,
        Self::Bf,
        Self::Bs,
        Self::Cf,
        Self::Dl,
        Self::Fc,
        Self::Fn,
        Self::Fp,
        Self::Hc,
        Self::In,
        Self::Mf,
        Self::Mq,
        Self::Nf,
        Self::Np,
        Self::Ns,
        Self::Pd,
        Self::Qs,
        Self::Rg,
        Self::Ri,
        Self::Rl,
        Self::Rn,
        Self::Rs,
        Self::Sc,
        Self::Tc,
        Self::Tl,
        Self::Tn,
        Self::Ts,
    ];

    /// The two ASCII bytes written into the field-encoding map.
    #[must_use]
    pub fn bytes(self) -> [u8; 2] {
        match self {
            Self::Ap => *b"AP",
            Self::Ba => *b"BA",
            Self::Bf => *b"BF",
            Self::Bs => *b"BS",
            Self::Cf => *b"CF",
            Self::Dl => *b"DL",
            Self::Fc => *b"FC",
            Self::Fn => *b"FN",
            Self::Fp => *b"FP",
            Self::Hc => *b"HC",
            Self::In => *b"IN",
            Self::Mf => *b"MF",
            Self::Mq => *b"MQ",
            Self::Nf => *b"NF",
            Self::Np => *b"NP",
            Self::Ns => *b"NS",
            Self::Pd => *b"PD",
            Self::Qs => *b"QS",
            Self::Rg => *b"RG",
            Self::Ri => *b"RI",
            Self::Rl => *b"RL",
            Self::Rn => *b"RN",
            Self::Rs => *b"RS",
            Self::Sc => *b"SC",
            Self::Tc => *b"TC",
            Self::Tl => *b"TL",
            Self::Tn => *b"TN",
            Self::Ts => *b"TS",
        }
    }

    /// Resolve a key from its wire bytes; `None` for unrecognized keys.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 2]) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.bytes() == bytes)
    }
}

/// The serialized contract for one container: preservation flags, per-field
/// and per-tag codec assignments, and the tag-id dictionary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompressionHeader {
    /// Read names are preserved verbatim in this container
    pub read_names_included: bool,
    /// Alignment positions are stored as a delta series (always true on the
    /// write path of this core)
    pub ap_series_delta: bool,
    /// Decoding requires the reference sequence
    pub reference_required: bool,
    /// Meaning defined by the substitution/digest collaborator
    pub substitution_matrix: [u8; SUBSTITUTION_MATRIX_SIZE],
    /// Ordered list of observed tag-set combinations, each a list of 3-byte
    /// tag descriptors
    pub tag_dictionary: Vec<Vec<[u8; 3]>>,
    /// Codec assignment for every known field key; unused fields map to the
    /// null codec and are never omitted
    pub encoding_map: BTreeMap<FieldKey, EncodingParams>,
    /// Codec assignment for every observed tag id; holds only entries
    /// explicitly present
    pub tag_encoding_map: BTreeMap<i32, EncodingParams>,
}

impl Default for CompressionHeader {
    fn default() -> Self {
        Self {
            read_names_included: false,
            ap_series_delta: true,
            reference_required: true,
            substitution_matrix: [0; SUBSTITUTION_MATRIX_SIZE],
            tag_dictionary: Vec::new(),
            encoding_map: null_encoding_map(),
            tag_encoding_map: BTreeMap::new(),
        }
    }
}

/// Every known field key bound to the null codec.
fn null_encoding_map() -> BTreeMap<FieldKey, EncodingParams> {
    FieldKey::ALL
        .into_iter()
        .map(|key| (key, EncodingParams::null()))
        .collect()
}

impl CompressionHeader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All external content ids referenced by the field and tag codec
    /// assignments, in ascending order.
    #[must_use]
    pub fn external_ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self
            .encoding_map
            .values()
            .chain(self.tag_encoding_map.values())
            .filter_map(EncodingParams::content_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Serialize into a fresh byte vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write(&mut buf)?;
        Ok(buf)
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.write_preservation_map(writer)?;
        self.write_encoding_map(writer)?;
        self.write_tag_encoding_map(writer)?;
        Ok(())
    }

    fn write_preservation_map<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut map = Vec::new();
        write_itf8(&mut map, 5)?;

        map.extend_from_slice(&RN_READ_NAMES_INCLUDED);
        map.push(u8::from(self.read_names_included));

        map.extend_from_slice(&AP_ALIGNMENT_POSITION_IS_DELTA);
        map.push(u8::from(self.ap_series_delta));

        map.extend_from_slice(&RR_REFERENCE_REQUIRED);
        map.push(u8::from(self.reference_required));

        map.extend_from_slice(&SM_SUBSTITUTION_MATRIX);
        map.extend_from_slice(&self.substitution_matrix);

        map.extend_from_slice(&TD_TAG_IDS_DICTIONARY);
        let dictionary = self.dictionary_to_bytes();
        write_itf8(&mut map, dictionary.len() as i32)?;
        map.extend_from_slice(&dictionary);

        write_itf8(writer, map.len() as i32)?;
        writer.write_all(&map)?;
        Ok(())
    }

    fn write_encoding_map<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut map = Vec::new();
        let assigned = self
            .encoding_map
            .values()
            .filter(|params| !params.is_null())
            .count();
        write_itf8(&mut map, assigned as i32)?;

        // canonical key order, null codecs skipped: output is byte-for-byte
        // deterministic for a given set of assignments
        for (key, params) in &self.encoding_map {
            if params.is_null() {
                continue;
            }
            map.extend_from_slice(&key.bytes());
            map.push(params.id.ordinal());
            write_itf8(&mut map, params.params.len() as i32)?;
            map.extend_from_slice(&params.params);
        }

        write_itf8(writer, map.len() as i32)?;
        writer.write_all(&map)?;
        Ok(())
    }

    fn write_tag_encoding_map<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut map = Vec::new();
        write_itf8(&mut map, self.tag_encoding_map.len() as i32)?;
        for (&tag_id, params) in &self.tag_encoding_map {
            write_itf8(&mut map, tag_id)?;
            map.push(params.id.ordinal());
            write_itf8(&mut map, params.params.len() as i32)?;
            map.extend_from_slice(&params.params);
        }

        write_itf8(writer, map.len() as i32)?;
        writer.write_all(&map)?;
        Ok(())
    }

    fn dictionary_to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for tag_set in &self.tag_dictionary {
            for descriptor in tag_set {
                bytes.extend_from_slice(descriptor);
            }
            bytes.push(0);
        }
        bytes
    }

    /// Parse a header from a byte slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::read(&mut &bytes[..])
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut header = Self::new();
        header.read_preservation_map(reader)?;
        header.read_encoding_map(reader)?;
        header.read_tag_encoding_map(reader)?;
        Ok(header)
    }

    fn read_preservation_map<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let block = read_sub_block(reader)?;
        let mut cursor = &block[..];

        let entries = read_itf8(&mut cursor)?;
        for _ in 0..entries {
            let key = take_array::<2>(&mut cursor, block.len())?;
            match key {
                RN_READ_NAMES_INCLUDED => {
                    self.read_names_included = take_array::<1>(&mut cursor, block.len())?[0] == 1;
                }
                AP_ALIGNMENT_POSITION_IS_DELTA => {
                    self.ap_series_delta = take_array::<1>(&mut cursor, block.len())?[0] == 1;
                }
                RR_REFERENCE_REQUIRED => {
                    self.reference_required = take_array::<1>(&mut cursor, block.len())?[0] == 1;
                }
                SM_SUBSTITUTION_MATRIX => {
                    self.substitution_matrix =
                        take_array::<SUBSTITUTION_MATRIX_SIZE>(&mut cursor, block.len())?;
                }
                TD_TAG_IDS_DICTIONARY => {
                    let size = read_itf8(&mut cursor)? as usize;
                    let bytes = take_slice(&mut cursor, size, block.len())?;
                    self.tag_dictionary = parse_dictionary(bytes)?;
                }
                other => {
                    // header corruption invalidates every subsequent read
                    return Err(FormatError::UnknownPreservationKey(
                        String::from_utf8_lossy(&other).into_owned(),
                    )
                    .into());
                }
            }
        }
        Ok(())
    }

    fn read_encoding_map<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let block = read_sub_block(reader)?;
        let mut cursor = &block[..];

        // pre-populated with null codecs so omitted fields decode
        // deterministically to "absent"
        self.encoding_map = null_encoding_map();

        let entries = read_itf8(&mut cursor)?;
        for _ in 0..entries {
            let key_bytes = take_array::<2>(&mut cursor, block.len())?;
            let params = read_encoding_params(&mut cursor, block.len())?;
            match FieldKey::from_bytes(key_bytes) {
                Some(key) => {
                    log::debug!(
                        "found encoding: {:?} {:?} ({} param bytes)",
                        key,
                        params.id,
                        params.params.len()
                    );
                    self.encoding_map.insert(key, params);
                }
                None => {
                    // non-fatal: forward compatible with header extensions
                    log::debug!(
                        "skipping unknown encoding key: {}",
                        String::from_utf8_lossy(&key_bytes)
                    );
                }
            }
        }
        Ok(())
    }

    fn read_tag_encoding_map<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let block = read_sub_block(reader)?;
        let mut cursor = &block[..];

        self.tag_encoding_map = BTreeMap::new();
        let entries = read_itf8(&mut cursor)?;
        for _ in 0..entries {
            let tag_id = read_itf8(&mut cursor)?;
            let params = read_encoding_params(&mut cursor, block.len())?;
            self.tag_encoding_map.insert(tag_id, params);
        }
        Ok(())
    }
}

/// Read one `[ITF8 byte length][bytes...]` sub-block into a vector.
fn read_sub_block<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let size = read_itf8(reader)? as usize;
    let mut block = vec![0u8; size];
    reader
        .read_exact(&mut block)
        .map_err(|_| FormatError::TruncatedBlock(0, size))?;
    Ok(block)
}

fn read_encoding_params(cursor: &mut &[u8], block_len: usize) -> Result<EncodingParams> {
    let ordinal = take_array::<1>(cursor, block_len)?[0];
    let id = crate::codec::EncodingId::from_ordinal(ordinal)?;
    let param_len = read_itf8(cursor)? as usize;
    let params = take_slice(cursor, param_len, block_len)?.to_vec();
    Ok(EncodingParams { id, params })
}

fn take_array<const N: usize>(cursor: &mut &[u8], block_len: usize) -> Result<[u8; N]> {
    let slice = take_slice(cursor, N, block_len)?;
    let mut array = [0u8; N];
    array.copy_from_slice(slice);
    Ok(array)
}

fn take_slice<'a>(cursor: &mut &'a [u8], len: usize, block_len: usize) -> Result<&'a [u8]> {
    if cursor.len() < len {
        return Err(FormatError::TruncatedBlock(cursor.len(), block_len).into());
    }
    let (head, tail) = cursor.split_at(len);
    *cursor = tail;
    Ok(head)
}

/// Parse the dictionary payload: groups of 3-byte descriptors, each group
/// terminated by a NUL byte.
fn parse_dictionary(bytes: &[u8]) -> Result<Vec<Vec<[u8; 3]>>> {
    let mut dictionary = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let mut tag_set = Vec::new();
        while bytes[i] != 0 {
            if i + 3 > bytes.len() {
                return Err(FormatError::MalformedTagDictionary(i).into());
            }
            tag_set.push([bytes[i], bytes[i + 1], bytes[i + 2]]);
            i += 3;
            if i >= bytes.len() {
                return Err(FormatError::MalformedTagDictionary(i).into());
            }
        }
        i += 1;
        dictionary.push(tag_set);
    }
    Ok(dictionary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::EncodingParams;
    use crate::io::itf8_to_bytes;

    fn sample_header() -> CompressionHeader {
        let mut header = CompressionHeader::new();
        header.read_names_included = true;
        header.substitution_matrix = [0x1B, 0x1B, 0x1B, 0x1B, 0x1B];
        header.tag_dictionary = vec![vec![], vec![[b'N', b'M', b'c'], [b'M', b'D', b'Z']]];
        header
            .encoding_map
            .insert(FieldKey::Ap, EncodingParams::gamma(1));
        header
            .encoding_map
            .insert(FieldKey::Ba, EncodingParams::external(1));
        header
            .encoding_map
            .insert(FieldKey::Rl, EncodingParams::gamma(0));
        header
            .tag_encoding_map
            .insert(0x4E4D63, EncodingParams::external(4));
        header
    }

    #[test]
    fn round_trip_preserves_everything() {
        let header = sample_header();
        let bytes = header.to_bytes().unwrap();
        let parsed = CompressionHeader::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn serialization_is_deterministic() {
        let header = sample_header();
        assert_eq!(header.to_bytes().unwrap(), header.to_bytes().unwrap());
    }

    #[test]
    fn absent_fields_resolve_to_null_on_both_sides() {
        let header = sample_header();
        let parsed = CompressionHeader::from_bytes(&header.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.encoding_map.len(), FieldKey::ALL.len());
        assert!(parsed.encoding_map[&FieldKey::Dl].is_null());
        assert!(parsed.encoding_map[&FieldKey::Sc].is_null());
    }

    #[test]
    fn tag_map_holds_only_observed_entries() {
        let header = sample_header();
        let parsed = CompressionHeader::from_bytes(&header.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.tag_encoding_map.len(), 1);
    }

    #[test]
    fn unknown_preservation_key_is_fatal() {
        // preservation map with a single bogus "XX" boolean entry
        let mut map = Vec::new();
        write_itf8(&mut map, 1).unwrap();
        map.extend_from_slice(b"XX");
        map.push(1);

        let mut bytes = Vec::new();
        write_itf8(&mut bytes, map.len() as i32).unwrap();
        bytes.extend_from_slice(&map);

        let err = CompressionHeader::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::FormatError(FormatError::UnknownPreservationKey(_))
        ));
    }

    #[test]
    fn unknown_field_key_is_skipped() {
        let header = sample_header();
        let mut bytes = header.to_bytes().unwrap();

        // append a replacement encoding map with one unknown "ZZ" entry
        let (pmap_size, pmap_prefix) = read_itf8_from(&bytes).unwrap();
        let split = pmap_prefix + pmap_size as usize;
        let tag_map = {
            // original encoding map length
            let (emap_size, emap_prefix) = read_itf8_from(&bytes[split..]).unwrap();
            bytes.split_off(split + emap_prefix + emap_size as usize)
        };
        bytes.truncate(split);

        let mut emap = Vec::new();
        write_itf8(&mut emap, 1).unwrap();
        emap.extend_from_slice(b"ZZ");
        emap.push(9);
        let params = itf8_to_bytes(1);
        write_itf8(&mut emap, params.len() as i32).unwrap();
        emap.extend_from_slice(&params);

        write_itf8(&mut bytes, emap.len() as i32).unwrap();
        bytes.extend_from_slice(&emap);
        bytes.extend_from_slice(&tag_map);

        let parsed = CompressionHeader::from_bytes(&bytes).unwrap();
        // every known field falls back to null; nothing else leaks in
        assert!(parsed.encoding_map.values().all(EncodingParams::is_null));
    }

    #[test]
    fn truncated_sub_block_is_fatal() {
        let header = sample_header();
        let bytes = header.to_bytes().unwrap();
        assert!(CompressionHeader::from_bytes(&bytes[..bytes.len() - 3]).is_err());
    }

    #[test]
    fn dictionary_with_empty_tag_set_round_trips() {
        let mut header = CompressionHeader::new();
        header.tag_dictionary = vec![vec![]];
        let parsed = CompressionHeader::from_bytes(&header.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.tag_dictionary, vec![Vec::<[u8; 3]>::new()]);
    }

    #[test]
    fn malformed_dictionary_is_rejected() {
        // 2 bytes of a descriptor, no terminator
        assert!(parse_dictionary(&[b'N', b'M']).is_err());
    }

    #[test]
    fn canonical_key_order_is_lexicographic() {
        let mut sorted = FieldKey::ALL.to_vec();
        sorted.sort_by_key(|key| key.bytes());
        assert_eq!(sorted, FieldKey::ALL.to_vec());
    }
}
