//! Error types for the streaming JSON-to-protobuf parser.
//!
//! Every failure mode named in the design ( syntactic, structural, semantic,
//! encoding, and resource errors ) is a variant of [`ParserError`] rather than
//! an ad hoc string, so callers can match on error kind without parsing
//! messages.

use thiserror::Error;

/// Top-level error produced by the parser.
///
/// Carries the byte offset into the *current* input chunk at which the
/// failure was detected, mirroring `parse`'s "returns bytes consumed before
/// the error" contract (see [`crate::Parser::parse`]).
#[derive(Debug, Error, PartialEq)]
#[error("{kind} at byte {pos}")]
pub struct ParserError {
    pub kind: ErrorKind,
    pub pos: usize,
}

impl ParserError {
    pub(crate) fn new(kind: ErrorKind, pos: usize) -> Self {
        Self { kind, pos }
    }
}

/// The distinct failure categories described by the design.
#[derive(Debug, Error, PartialEq, Clone)]
pub enum ErrorKind {
    // -- syntactic --------------------------------------------------------
    #[error("parse error at '{0}'")]
    UnexpectedChar(char),
    #[error("parse error: unexpected end of input")]
    UnexpectedEof,

    // -- structural ---------------------------------------------------------
    #[error("nesting too deep")]
    NestingTooDeep,
    #[error("array specified for non-repeated field '{0}'")]
    ArrayForNonRepeated(Box<str>),
    #[error("string specified for non-string/non-enum field '{0}'")]
    StringForNonStringField(Box<str>),
    #[error("object specified for non-message field '{0}'")]
    ObjectForNonMessage(Box<str>),
    #[error("no such field: {0}")]
    NoSuchField(Box<str>),
    #[error("map entry message has no key/value fields")]
    MapEntryMissingKeyOrValue,
    #[error("map bool key must be \"true\" or \"false\", got \"{0}\"")]
    MapBoolKeyInvalid(Box<str>),
    #[error("boolean value specified for non-bool field '{0}'")]
    BoolForNonBoolField(Box<str>),

    // -- semantic -----------------------------------------------------------
    #[error("unknown enum value \"{0}\" for enum '{1}'")]
    UnknownEnumValue(Box<str>, Box<str>),
    #[error("error parsing number for field '{0}'")]
    NumberParseError(Box<str>),
    #[error("value out of range for field '{0}'")]
    NumberOutOfRange(Box<str>),

    // -- encoding -------------------------------------------------------
    #[error("non-base64 characters in field '{0}'")]
    InvalidBase64Chars(Box<str>),
    #[error("incorrect base64 padding in field '{0}'")]
    InvalidBase64Padding(Box<str>),
    #[error("base64 input not a multiple of 4 in field '{0}'")]
    InvalidBase64Length(Box<str>),
    #[error("invalid unicode escape sequence")]
    InvalidUnicodeEscape,

    // -- resource -------------------------------------------------------
    #[error("out of memory")]
    OutOfMemory,
    #[error("integer overflow while growing internal buffer")]
    IntegerOverflow,

    // -- internal --------------------------------------------------------
    #[error("internal error: {0}")]
    Internal(&'static str),
    #[error("sink reported an error: {0}")]
    SinkError(Box<str>),
}
