/// Errors raised while encoding or decoding values.
///
/// Every decode-side variant means the payload is corrupt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// The payload ended in the middle of a value.
    #[error("truncated value (needed {needed} bytes, {remaining} left)")]
    Truncated { needed: usize, remaining: usize },

    /// A type tag outside the known set.
    #[error("unknown value type tag 0x{0:02x}")]
    UnknownTag(u8),

    /// A boolean body other than 0 or 1.
    #[error("invalid boolean byte 0x{0:02x}")]
    InvalidBool(u8),

    /// A string or map key that is not valid UTF-8.
    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    /// An element count that cannot fit in the bytes that remain.
    #[error("element count {count} exceeds remaining {remaining} bytes")]
    CountTooLarge { count: usize, remaining: usize },

    /// Lists and maps nested deeper than the limit.
    #[error("values nested deeper than {max} levels")]
    TooDeep { max: usize },

    /// Bytes left over after the declared sequence.
    #[error("{0} trailing bytes after sequence")]
    TrailingBytes(usize),

    /// A string, byte string, list or map too long to encode.
    #[error("value too long to encode ({len} elements or bytes)")]
    TooLong { len: usize },
}

/// Errors raised while rebuilding a map from flattened key/value pairs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PairError {
    /// Flattened maps have an even number of elements.
    #[error("odd number of elements in flattened map ({0})")]
    OddCount(usize),

    /// A key that is neither a string nor a byte string.
    #[error("key at position {index} is a {kind}, expected a string")]
    InvalidKey { index: usize, kind: &'static str },

    /// A byte-string key that is not valid UTF-8.
    #[error("key at position {index} is not valid UTF-8")]
    InvalidUtf8Key { index: usize },
}

pub type Result<T> = std::result::Result<T, ValueError>;
