//! Field codec abstraction.
//!
//! A codec converts one field's typed values to and from the slice's streams.
//! Codecs are identified by a single-byte [`EncodingId`] ordinal plus opaque
//! parameter bytes ([`EncodingParams`]); the runtime [`Codec`] is a tagged
//! union built from those parameters. Core codecs emit bits into the shared
//! core bitstream, external codecs append whole bytes to their content-id
//! buffer; [`EncodeSink`] and [`DecodeSource`] are that multiplexing boundary.

mod external;
mod gamma;
pub(crate) mod writer;

use std::collections::BTreeMap;
use std::io;

pub use external::ExternalByteCodec;
pub use gamma::GammaCodec;

use crate::error::{CodecError, FormatError};
use crate::io::{itf8_to_bytes, read_itf8_from, BitReader, BitWriter};
use crate::Result;

/// Codec kind ordinals shared between the compression header and the codec
/// factory. The values are part of the binary format and must not change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EncodingId {
    Null = 0,
    External = 1,
    Golomb = 2,
    Huffman = 3,
    ByteArrayLen = 4,
    ByteArrayStop = 5,
    Beta = 6,
    Subexp = 7,
    GolombRice = 8,
    Gamma = 9,
}

impl EncodingId {
    #[must_use]
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(ordinal: u8) -> Result<Self> {
        let id = match ordinal {
            0 => Self::Null,
            1 => Self::External,
            2 => Self::Golomb,
            3 => Self::Huffman,
            4 => Self::ByteArrayLen,
            5 => Self::ByteArrayStop,
            6 => Self::Beta,
            7 => Self::Subexp,
            8 => Self::GolombRice,
            9 => Self::Gamma,
            other => return Err(FormatError::InvalidEncodingId(other).into()),
        };
        Ok(id)
    }
}

/// A codec kind plus its private parameter byte layout.
///
/// Round-trips losslessly through the header's encoding maps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodingParams {
    pub id: EncodingId,
    pub params: Vec<u8>,
}

impl EncodingParams {
    /// The null codec: the field is absent from this container.
    #[must_use]
    pub fn null() -> Self {
        Self {
            id: EncodingId::Null,
            params: Vec::new(),
        }
    }

    /// A gamma codec with the given additive bias.
    #[must_use]
    pub fn gamma(offset: i32) -> Self {
        Self {
            id: EncodingId::Gamma,
            params: itf8_to_bytes(offset),
        }
    }

    /// An external byte codec bound to the given content id.
    #[must_use]
    pub fn external(content_id: i32) -> Self {
        Self {
            id: EncodingId::External,
            params: itf8_to_bytes(content_id),
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.id == EncodingId::Null
    }

    /// The external content id named by these parameters, if any.
    #[must_use]
    pub fn content_id(&self) -> Option<i32> {
        if self.id == EncodingId::External {
            read_itf8_from(&self.params).ok().map(|(id, _)| id)
        } else {
            None
        }
    }
}

/// Write-side multiplexer: one core bit sink plus one byte buffer per
/// external content id. Owned exclusively by a single slice build.
pub struct EncodeSink {
    core: BitWriter<Vec<u8>>,
    external: BTreeMap<i32, Vec<u8>>,
}

impl EncodeSink {
    /// Create a sink with pre-bound external buffers for the given ids.
    #[must_use]
    pub fn with_external_ids(ids: &[i32]) -> Self {
        Self {
            core: BitWriter::new(Vec::new()),
            external: ids.iter().map(|&id| (id, Vec::new())).collect(),
        }
    }

    pub fn core(&mut self) -> &mut BitWriter<Vec<u8>> {
        &mut self.core
    }

    pub fn external(&mut self, content_id: i32) -> Result<&mut Vec<u8>> {
        self.external
            .get_mut(&content_id)
            .ok_or_else(|| CodecError::MissingExternalStream(content_id).into())
    }

    /// Pad the core stream to a byte boundary and freeze all buffers.
    pub fn finish(self) -> Result<(Vec<u8>, BTreeMap<i32, Vec<u8>>)> {
        let core = self.core.into_inner()?;
        Ok((core, self.external))
    }
}

/// Read-side mirror of [`EncodeSink`]: a core bit source plus a byte cursor
/// per external content id.
pub struct DecodeSource<'a> {
    core: BitReader<'a>,
    external: BTreeMap<i32, ByteCursor<'a>>,
}

impl<'a> DecodeSource<'a> {
    #[must_use]
    pub fn new(core: &'a [u8], external: BTreeMap<i32, &'a [u8]>) -> Self {
        Self {
            core: BitReader::new(core),
            external: external
                .into_iter()
                .map(|(id, data)| (id, ByteCursor { data, pos: 0 }))
                .collect(),
        }
    }

    pub fn core(&mut self) -> &mut BitReader<'a> {
        &mut self.core
    }

    /// Consume the next byte from an external stream.
    pub fn next_external_byte(&mut self, content_id: i32) -> Result<u8> {
        let cursor = self
            .external
            .get_mut(&content_id)
            .ok_or(CodecError::MissingExternalStream(content_id))?;
        cursor.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("external stream {content_id} exhausted"),
            )
            .into()
        })
    }
}

/// Byte cursor over an external stream. External codecs follow the stream
/// rather than a per-record bit budget.
struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl ByteCursor<'_> {
    fn next(&mut self) -> Option<u8> {
        let byte = self.data.get(self.pos).copied();
        if byte.is_some() {
            self.pos += 1;
        }
        byte
    }
}

/// The runtime codec: a tagged union over the codec kinds this core
/// implements. New kinds add a variant and a factory branch.
#[derive(Clone, Debug)]
pub enum Codec {
    /// The field is absent; invoking any operation is a configuration error
    Null,
    Gamma(GammaCodec),
    ExternalByte(ExternalByteCodec),
}

impl Codec {
    /// Build a codec from its header description.
    pub fn from_params(params: &EncodingParams) -> Result<Self> {
        match params.id {
            EncodingId::Null => Ok(Self::Null),
            EncodingId::Gamma => {
                let (offset, _) = read_itf8_from(&params.params)
                    .map_err(|_| CodecError::InvalidParams(params.id.ordinal()))?;
                Ok(Self::Gamma(GammaCodec::new(offset)))
            }
            EncodingId::External => {
                let (content_id, _) = read_itf8_from(&params.params)
                    .map_err(|_| CodecError::InvalidParams(params.id.ordinal()))?;
                Ok(Self::ExternalByte(ExternalByteCodec::new(content_id)))
            }
            _ => Err(CodecError::Unsupported("codec kind not implemented by this core").into()),
        }
    }

    #[must_use]
    pub fn id(&self) -> EncodingId {
        match self {
            Self::Null => EncodingId::Null,
            Self::Gamma(_) => EncodingId::Gamma,
            Self::ExternalByte(_) => EncodingId::External,
        }
    }

    /// Encode one integer value, returning the number of bits consumed.
    pub fn write_int(&self, sink: &mut EncodeSink, value: i32) -> Result<u64> {
        match self {
            Self::Gamma(codec) => codec.write(sink, value),
            Self::ExternalByte(_) => {
                Err(CodecError::Unsupported("external byte codec cannot encode integers").into())
            }
            Self::Null => Err(CodecError::Unsupported("null codec cannot encode values").into()),
        }
    }

    /// Decode one integer value.
    pub fn read_int(&self, src: &mut DecodeSource<'_>) -> Result<i32> {
        match self {
            Self::Gamma(codec) => codec.read(src),
            Self::ExternalByte(_) => {
                Err(CodecError::Unsupported("external byte codec cannot decode integers").into())
            }
            Self::Null => Err(CodecError::Unsupported("null codec cannot decode values").into()),
        }
    }

    /// Encode one byte, returning the number of bits consumed.
    pub fn write_byte(&self, sink: &mut EncodeSink, value: u8) -> Result<u64> {
        match self {
            Self::ExternalByte(codec) => codec.write(sink, value),
            Self::Gamma(_) => {
                Err(CodecError::Unsupported("gamma codec cannot encode raw bytes").into())
            }
            Self::Null => Err(CodecError::Unsupported("null codec cannot encode values").into()),
        }
    }

    /// Decode one byte.
    pub fn read_byte(&self, src: &mut DecodeSource<'_>) -> Result<u8> {
        match self {
            Self::ExternalByte(codec) => codec.read(src),
            Self::Gamma(_) => {
                Err(CodecError::Unsupported("gamma codec cannot decode raw bytes").into())
            }
            Self::Null => Err(CodecError::Unsupported("null codec cannot decode values").into()),
        }
    }

    /// Encode a run of bytes, returning the total bits consumed.
    pub fn write_bytes(&self, sink: &mut EncodeSink, values: &[u8]) -> Result<u64> {
        let mut bits = 0;
        for &byte in values {
            bits += self.write_byte(sink, byte)?;
        }
        Ok(bits)
    }

    /// Bits `write_int` would consume for `value`, without writing.
    ///
    /// Equal to the bit count returned by `write_int` for every valid value;
    /// the slice builder's cost estimation depends on that equality.
    pub fn size_in_bits_int(&self, value: i32) -> Result<u64> {
        match self {
            Self::Gamma(codec) => codec.size_in_bits(value),
            Self::ExternalByte(_) => {
                Err(CodecError::Unsupported("external byte codec cannot encode integers").into())
            }
            Self::Null => Err(CodecError::Unsupported("null codec cannot encode values").into()),
        }
    }

    /// Bits `write_byte` would consume, without writing.
    pub fn size_in_bits_byte(&self, value: u8) -> Result<u64> {
        match self {
            Self::ExternalByte(codec) => Ok(codec.size_in_bits(value)),
            Self::Gamma(_) => {
                Err(CodecError::Unsupported("gamma codec cannot encode raw bytes").into())
            }
            Self::Null => Err(CodecError::Unsupported("null codec cannot encode values").into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_id_ordinals_are_fixed() {
        assert_eq!(EncodingId::Null.ordinal(), 0);
        assert_eq!(EncodingId::External.ordinal(), 1);
        assert_eq!(EncodingId::Gamma.ordinal(), 9);
        for ordinal in 0..=9 {
            assert_eq!(
                EncodingId::from_ordinal(ordinal).unwrap().ordinal(),
                ordinal
            );
        }
        assert!(EncodingId::from_ordinal(10).is_err());
    }

    #[test]
    fn params_round_trip_through_bytes() {
        let params = EncodingParams::gamma(-42);
        let rebuilt = Codec::from_params(&params).unwrap();
        assert_eq!(rebuilt.id(), EncodingId::Gamma);

        let params = EncodingParams::external(7);
        assert_eq!(params.content_id(), Some(7));
        let rebuilt = Codec::from_params(&params).unwrap();
        assert_eq!(rebuilt.id(), EncodingId::External);
    }

    #[test]
    fn factory_rejects_unimplemented_kinds() {
        let params = EncodingParams {
            id: EncodingId::Huffman,
            params: Vec::new(),
        };
        assert!(Codec::from_params(&params).is_err());
    }

    #[test]
    fn null_codec_rejects_all_operations() {
        let codec = Codec::Null;
        let mut sink = EncodeSink::with_external_ids(&[]);
        assert!(codec.write_int(&mut sink, 1).is_err());
        assert!(codec.write_byte(&mut sink, 1).is_err());
        assert!(codec.size_in_bits_int(1).is_err());
    }

    #[test]
    fn sink_rejects_unbound_content_id() {
        let mut sink = EncodeSink::with_external_ids(&[1]);
        assert!(sink.external(1).is_ok());
        assert!(sink.external(2).is_err());
    }
}
