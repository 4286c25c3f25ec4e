use crate::error::{CodecError, FormatError};
use crate::Result;

use super::{DecodeSource, EncodeSink};

/// Elias gamma codec with a configurable additive bias.
///
/// The biased value `v + offset` must be positive. It is emitted as
/// `floor(log2(v + offset))` zero bits followed by the biased value itself in
/// its natural width, so the value's leading one bit terminates the unary
/// prefix. The bias lets zero or negative logical values (alignment deltas,
/// sentinel ids) map onto positive physical values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GammaCodec {
    offset: i32,
}

impl GammaCodec {
    #[must_use]
    pub fn new(offset: i32) -> Self {
        Self { offset }
    }

    #[must_use]
    pub fn offset(&self) -> i32 {
        self.offset
    }

    fn biased(&self, value: i32) -> Result<u64> {
        let biased = i64::from(value) + i64::from(self.offset);
        if biased < 1 {
            return Err(CodecError::Domain(biased).into());
        }
        Ok(biased as u64)
    }

    /// Encode one value into the core bitstream, returning the bits written.
    pub fn write(&self, sink: &mut EncodeSink, value: i32) -> Result<u64> {
        let biased = self.biased(value)?;
        let width = 64 - biased.leading_zeros();
        if width > 1 {
            sink.core().write_bits(0, width - 1)?;
        }
        sink.core().write_bits(biased, width)?;
        Ok(u64::from(width) * 2 - 1)
    }

    /// Decode one value from the core bitstream.
    pub fn read(&self, src: &mut DecodeSource<'_>) -> Result<i32> {
        let mut width = 1u32;
        while !src.core().read_bit()? {
            width += 1;
            // the write side never emits a biased value wider than 32 bits
            if width > 32 {
                return Err(
                    FormatError::CorruptBitStream("gamma unary prefix exceeds 32 bits").into(),
                );
            }
        }
        let low = src.core().read_bits(width - 1)?;
        let biased = low | (1 << (width - 1));
        Ok((biased as i64 - i64::from(self.offset)) as i32)
    }

    /// Bits `write` would consume for `value`; same domain check as `write`.
    pub fn size_in_bits(&self, value: i32) -> Result<u64> {
        let biased = self.biased(value)?;
        let width = u64::from(64 - biased.leading_zeros());
        Ok(width * 2 - 1)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn round_trip(offset: i32, values: &[i32]) {
        let codec = GammaCodec::new(offset);
        let mut sink = EncodeSink::with_external_ids(&[]);
        let mut expected_bits = 0;
        for &v in values {
            let written = codec.write(&mut sink, v).unwrap();
            assert_eq!(
                written,
                codec.size_in_bits(v).unwrap(),
                "size/write mismatch for {v} at offset {offset}"
            );
            expected_bits += written;
        }
        assert_eq!(sink.core().bits_written(), expected_bits);

        let (core, _) = sink.finish().unwrap();
        let mut src = DecodeSource::new(&core, Default::default());
        for &v in values {
            assert_eq!(codec.read(&mut src).unwrap(), v);
        }
    }

    #[test]
    fn small_values_round_trip() {
        round_trip(0, &[1, 2, 3, 4, 5, 6, 7, 8, 100, 255, 256, 1 << 20]);
    }

    #[test]
    fn offset_admits_zero_and_negatives() {
        round_trip(1, &[0, 1, 2, 1000]);
        round_trip(100, &[-99, -50, 0, 42]);
    }

    #[test]
    fn value_one_is_a_single_bit() {
        let codec = GammaCodec::new(0);
        assert_eq!(codec.size_in_bits(1).unwrap(), 1);
        let mut sink = EncodeSink::with_external_ids(&[]);
        assert_eq!(codec.write(&mut sink, 1).unwrap(), 1);
        let (core, _) = sink.finish().unwrap();
        assert_eq!(core, vec![0b1000_0000]);
    }

    #[test]
    fn non_positive_biased_values_are_domain_errors() {
        let codec = GammaCodec::new(0);
        let mut sink = EncodeSink::with_external_ids(&[]);
        assert!(codec.write(&mut sink, 0).is_err());
        assert!(codec.write(&mut sink, -1).is_err());
        assert!(codec.size_in_bits(0).is_err());

        let codec = GammaCodec::new(-10);
        assert!(codec.size_in_bits(10).is_err());
        assert!(codec.size_in_bits(11).is_ok());
    }

    #[test]
    fn randomized_round_trip() {
        let mut rng = SmallRng::seed_from_u64(0x5EED);
        for _ in 0..20 {
            let offset = rng.random_range(-1_000..1_000);
            let values: Vec<i32> = (0..500)
                .map(|_| rng.random_range((1 - offset)..i32::MAX / 2))
                .collect();
            round_trip(offset, &values);
        }
    }

    #[test]
    fn overlong_unary_prefix_is_a_format_error() {
        // 40 zero bits: no valid encoding starts with more than 31
        let codec = GammaCodec::new(0);
        let core = vec![0u8; 5];
        let mut src = DecodeSource::new(&core, Default::default());
        let err = codec.read(&mut src).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::FormatError(FormatError::CorruptBitStream(_))
        ));
    }

    #[test]
    fn max_supported_value() {
        // the widest biased value still fits the 64-bit bit-io contract
        round_trip(0, &[i32::MAX]);
        round_trip(i32::MAX, &[0, -i32::MAX + 1]);
    }
}
