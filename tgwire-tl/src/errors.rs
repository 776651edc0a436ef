//! Error types surfaced by the runtime codec.

use std::fmt;

/// Errors that can occur while loading schemas or (de)serializing values.
///
/// Each variant is a distinct, surfaceable condition; none of them are
/// retried or demoted internally.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// A numeric wire type received a value it cannot interpret as a number.
    NotNumeric,
    /// A fixed-width blob (`int128`/`int256`/`int512`) had the wrong length
    /// even after the base64 fallback.
    BadLength {
        /// Expected blob width in bits.
        bits: u32,
        /// The length actually supplied, in bytes.
        found: usize,
    },
    /// A decoded string length started with the forbidden `0xFF` marker.
    LengthTooBig,
    /// A string wire type received a value that is neither text nor bytes.
    NotString,
    /// A required parameter was absent and no conventional default applies.
    MissingParam(String),
    /// A vector wire type received a non-vector value.
    ArrayRequired(String),
    /// The predicate named by a value (or type context) is not in the schema.
    BadPredicate(String),
    /// A decoded constructor ID matches neither a constructor nor a method.
    UnknownConstructor(u32),
    /// A boxed vector began with something other than `vector` (or a
    /// `gzip_packed` envelope).
    InvalidVectorConstructor(u32),
    /// The schema file could not be understood.
    SchemaInvalid(String),
    /// Ran out of bytes before the value was fully read.
    UnexpectedEof,
    /// A `random_bytes` field carried fewer than 15 bytes of entropy.
    ///
    /// Security-sensitive; never demoted to a warning.
    InsecureRandom,
    /// JSON (de)coding of a `dataJSON` payload or JSON schema file failed.
    Json(String),
    /// A `gzip_packed` envelope failed to decompress.
    Gzip(String),
    /// A hook or collaborator refused the value.
    Hook(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotNumeric => write!(f, "value is not numeric"),
            Self::BadLength { bits, found } => {
                write!(f, "int{bits} blob must be {} bytes, got {found}", bits / 8)
            }
            Self::LengthTooBig => write!(f, "string length marker 0xff is forbidden"),
            Self::NotString => write!(f, "value is not a string"),
            Self::MissingParam(name) => write!(f, "missing required parameter `{name}`"),
            Self::ArrayRequired(name) => write!(f, "parameter `{name}` requires a vector"),
            Self::BadPredicate(name) => write!(f, "unknown predicate `{name}`"),
            Self::UnknownConstructor(id) => write!(f, "unknown constructor id {id:#010x}"),
            Self::InvalidVectorConstructor(id) => {
                write!(f, "expected vector, got constructor id {id:#010x}")
            }
            Self::SchemaInvalid(why) => write!(f, "invalid schema: {why}"),
            Self::UnexpectedEof => write!(f, "unexpected end of stream"),
            Self::InsecureRandom => write!(f, "random_bytes shorter than 15 bytes"),
            Self::Json(why) => write!(f, "JSON: {why}"),
            Self::Gzip(why) => write!(f, "gzip: {why}"),
            Self::Hook(why) => write!(f, "hook: {why}"),
        }
    }
}

impl std::error::Error for Error {}

/// Specialized `Result` for codec operations.
pub type Result<T> = std::result::Result<T, Error>;
