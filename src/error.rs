/// Custom Result type for cramcore operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the cramcore library, encompassing all error cases
/// that can occur while building containers.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Errors raised while parsing or serializing binary structures
    #[error("Error processing format: {0}")]
    FormatError(#[from] FormatError),

    /// Errors raised by field codecs
    #[error("Error in codec: {0}")]
    CodecError(#[from] CodecError),

    /// Errors raised while building slices and containers
    #[error("Error building container: {0}")]
    BuildError(#[from] BuildError),

    /// Standard I/O errors
    #[error("Error with IO: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors for malformed binary structures.
///
/// These are always fatal to the current parse: a corrupt compression header
/// invalidates every subsequent read of the container.
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    /// The preservation map contains a key outside the fixed known set
    #[error("Unknown preservation map key: {0}")]
    UnknownPreservationKey(String),

    /// A length-prefixed sub-block ended before its declared size
    ///
    /// # Arguments
    /// * First `usize` - The number of bytes actually available
    /// * Second `usize` - The number of bytes the length prefix declared
    #[error("Truncated sub-block: {0} bytes available, {1} declared")]
    TruncatedBlock(usize, usize),

    /// A varint extended past the end of its buffer
    #[error("Truncated varint at byte position {0}")]
    TruncatedVarint(usize),

    /// A bit read extended past the end of the core buffer
    #[error("Bit stream exhausted: requested {requested} bits with {available} remaining")]
    TruncatedBits { requested: u64, available: u64 },

    /// The core bitstream holds a pattern no codec could have written
    #[error("Corrupt core bit stream: {0}")]
    CorruptBitStream(&'static str),

    /// The codec ordinal in an encoding-map entry is not in the shared enumeration
    #[error("Invalid encoding id ordinal: {0}")]
    InvalidEncodingId(u8),

    /// The tag-id dictionary payload is not a sequence of NUL-terminated 3-byte groups
    #[error("Malformed tag dictionary at byte offset {0}")]
    MalformedTagDictionary(usize),
}

/// Errors raised by field codecs during encoding or decoding.
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    /// A value outside the codec's representable domain
    ///
    /// Callers must treat this as an invariant violation: the codec/data
    /// combination chosen upstream cannot represent the value.
    #[error("Value out of codec domain: {0}")]
    Domain(i64),

    /// A codec was invoked with an operation it does not implement
    #[error("Unsupported codec operation: {0}")]
    Unsupported(&'static str),

    /// Codec parameter bytes could not be decoded for the given encoding id
    #[error("Invalid codec parameters for encoding id {0}")]
    InvalidParams(u8),

    /// An external codec referenced a content id with no backing stream
    #[error("No external stream bound for content id {0}")]
    MissingExternalStream(i32),
}

/// Errors raised while assembling slices and containers.
#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    /// The slice builder was handed an empty chunk
    #[error("Cannot build a slice from an empty record chunk")]
    EmptySlice,

    /// The container factory was handed an empty batch
    #[error("Cannot build a container from an empty record batch")]
    EmptyBatch,

    /// The configured slice size is zero
    #[error("Records per slice must be positive")]
    InvalidSliceSize,

    /// No compressor was registered for an external content id
    #[error("No external compressor bound for content id {0}")]
    MissingCompressor(i32),

    /// A record's tag-set combination is missing from the header dictionary
    #[error("Tag set not present in the tag dictionary")]
    UnknownTagSet,

    /// A record carries a tag with no codec in the tag encoding map
    #[error("No encoding assigned for tag id {0}")]
    MissingTagEncoding(i32),
}

mod testing {
    #[allow(unused)]
    use super::*;

    #[test]
    fn test_error_from_format_error() {
        let format_error = FormatError::UnknownPreservationKey("XX".to_string());
        let error: Error = format_error.into();
        assert!(matches!(error, Error::FormatError(_)));
    }

    #[test]
    fn test_error_from_codec_error() {
        let codec_error = CodecError::Domain(-4);
        let error: Error = codec_error.into();
        assert!(matches!(error, Error::CodecError(_)));
    }

    #[test]
    fn test_error_from_build_error() {
        let build_error = BuildError::EmptySlice;
        let error: Error = build_error.into();
        assert!(matches!(error, Error::BuildError(_)));
    }

    #[test]
    fn test_format_error_display() {
        let error = FormatError::TruncatedBlock(10, 200);
        let error_str = format!("{}", error);
        assert!(error_str.contains("10"));
        assert!(error_str.contains("200"));
    }

    #[test]
    fn test_codec_error_display() {
        let error = CodecError::Domain(-17);
        assert!(format!("{}", error).contains("-17"));
    }
}
