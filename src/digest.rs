use auto_impl::auto_impl;

use crate::record::CramRecord;

/// A content fingerprint accumulated over a slice's original records, exposed
/// as a small attribute map for downstream integrity checks.
///
/// Consumed once per slice, over the records in their pre-encoding order.
#[auto_impl(&mut, Box)]
pub trait ContentDigest {
    fn add(&mut self, record: &CramRecord);

    /// The accumulated digest as `(attribute, value)` pairs.
    fn as_tags(&self) -> Vec<(String, String)>;
}

/// Default digest: independent CRC32s over base bytes and quality scores,
/// reported as the `BD`/`SD` attribute pair.
#[derive(Clone, Default)]
pub struct Crc32ContentDigest {
    bases: crc32fast::Hasher,
    scores: crc32fast::Hasher,
}

impl Crc32ContentDigest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContentDigest for Crc32ContentDigest {
    fn add(&mut self, record: &CramRecord) {
        self.bases.update(&record.bases);
        self.scores.update(&record.quality_scores);
    }

    fn as_tags(&self) -> Vec<(String, String)> {
        vec![
            (
                "BD".to_string(),
                format!("{:08x}", self.bases.clone().finalize()),
            ),
            (
                "SD".to_string(),
                format!("{:08x}", self.scores.clone().finalize()),
            ),
        ]
    }
}

/// Digest that records nothing; for callers that validate elsewhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullContentDigest;

impl ContentDigest for NullContentDigest {
    fn add(&mut self, _record: &CramRecord) {}

    fn as_tags(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}
