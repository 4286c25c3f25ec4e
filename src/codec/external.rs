use crate::Result;

use super::{DecodeSource, EncodeSink};

/// Raw byte pass-through codec bound to one external content id.
///
/// Bytes never touch the core bitstream: `write` appends verbatim to the
/// content-id buffer and reports a fixed logical cost of 8 bits for
/// accounting symmetry with the core codecs. Every codec whose parameters
/// name an external content id follows this multiplexing contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExternalByteCodec {
    content_id: i32,
}

impl ExternalByteCodec {
    #[must_use]
    pub fn new(content_id: i32) -> Self {
        Self { content_id }
    }

    #[must_use]
    pub fn content_id(&self) -> i32 {
        self.content_id
    }

    /// Append one byte to the external stream; logical cost is 8 bits.
    pub fn write(&self, sink: &mut EncodeSink, value: u8) -> Result<u64> {
        sink.external(self.content_id)?.push(value);
        Ok(8)
    }

    /// Consume the next byte from the external stream.
    pub fn read(&self, src: &mut DecodeSource<'_>) -> Result<u8> {
        src.next_external_byte(self.content_id)
    }

    #[must_use]
    pub fn size_in_bits(&self, _value: u8) -> u64 {
        8
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn bytes_reproduce_write_order() {
        let codec = ExternalByteCodec::new(4);
        let mut sink = EncodeSink::with_external_ids(&[4]);
        let payload = b"reference-based compression";
        for &byte in payload {
            assert_eq!(codec.write(&mut sink, byte).unwrap(), 8);
        }

        let (core, external) = sink.finish().unwrap();
        assert!(core.is_empty(), "no bits may reach the core stream");
        assert_eq!(external[&4], payload);

        let streams: BTreeMap<i32, &[u8]> = external.iter().map(|(&k, v)| (k, &v[..])).collect();
        let mut src = DecodeSource::new(&core, streams);
        for &byte in payload {
            assert_eq!(codec.read(&mut src).unwrap(), byte);
        }
        assert!(codec.read(&mut src).is_err(), "stream exhausted");
    }

    #[test]
    fn unbound_content_id_is_an_error() {
        let codec = ExternalByteCodec::new(9);
        let mut sink = EncodeSink::with_external_ids(&[1, 2]);
        assert!(codec.write(&mut sink, 0).is_err());
    }
}
