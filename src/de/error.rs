// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
#![allow(missing_docs)]

use crate::{numeric::NumericError, tag::Tag};

/// Type alias around a result.
pub type Result<T> = std::result::Result<T, Error>;

/// A format error: the input is not something a conforming writer would
/// have produced. Always recoverable by discarding the input.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    #[source]
    pub kind: Kind,
}

/// Everything that can be wrong with marshal input.
#[derive(Debug, thiserror::Error)]
pub enum Kind {
    /// End of input.
    #[error("End of input")]
    Eof,
    /// Input remained after a complete top-level value.
    #[error("{0} trailing byte(s) after value")]
    TrailingBytes(usize),
    /// Version mismatch.
    #[error("Version error, expected [4, 0..=8], got {0:?}")]
    VersionError([u8; 2]),
    /// Unrecognized tag was encountered.
    #[error("Wrong tag 0x{0:X} ({})", unknown_tag_to_char(*_0))]
    WrongTag(u8),
    /// A long used a wider tier than the value needs, or re-encoded zero.
    #[error("Long encoding is not canonical")]
    NonCanonicalLong,
    /// A long was out of range for where it appeared (31-bit for Fixnums,
    /// non-negative 32-bit for lengths and link indices).
    #[error("Long out of range for its position: {0}")]
    LongOutOfRange(i64),
    /// A bignum that should have been a fixnum, or carried a padding word.
    #[error("Bignum encoding is not canonical")]
    NonCanonicalBignum,
    /// A bignum sign byte other than `+` or `-`.
    #[error("Invalid bignum sign byte 0x{0:02X}")]
    BignumSign(u8),
    /// Float text outside the canonical grammar.
    #[error("Malformed float text {0:?}")]
    MalformedFloat(String),
    /// A symbol link pointed past the symbol table.
    #[error("Unresolved symlink {0}")]
    UnresolvedSymlink(usize),
    /// A symbol link pointed at a symbol still being read (its own ivar
    /// block referenced it).
    #[error("Circular symlink {0}")]
    CircularSymlink(usize),
    /// A symbol was serialized in full twice; the second occurrence must be
    /// a symlink.
    #[error("Symbol {0:?} reserialized instead of symlinked")]
    DuplicateSymbol(String),
    /// An object link pointed past the link table.
    #[error("Unresolved object link {0}")]
    UnresolvedObjectLink(usize),
    /// A symbol was expected (usually for a class name) and something else
    /// was found.
    #[error("Expected a symbol got {0:?}")]
    ExpectedSymbol(Tag),
    /// Wrapper tags (`I`, `e`, `C`) nested out of order, or wrapped a tag
    /// they cannot wrap.
    #[error("Tag {1:?} may not follow wrapper {0:?}")]
    WrapperOrder(Tag, Tag),
    /// A synthetic ivar (`E`, `encoding`, `K`) appeared after a user ivar.
    #[error("Synthetic ivar {0:?} after user ivars")]
    MisplacedSyntheticIvar(&'static str),
    /// A synthetic ivar appeared twice (counting `E`/`encoding` as one).
    #[error("Duplicate synthetic ivar {0:?}")]
    DuplicateSyntheticIvar(&'static str),
    /// A synthetic ivar carried the wrong kind of value, or appeared on a
    /// node kind that cannot have it.
    #[error("Malformed synthetic ivar {0:?}")]
    MalformedSyntheticIvar(&'static str),
    /// A user ivar in a symbol's ivar block, which may only carry encoding
    /// synthetics.
    #[error("Unexpected ivar {0:?} on a symbol")]
    UnexpectedSymbolIvar(String),
    /// The same user ivar name appeared twice in one ivar list.
    #[error("Duplicate ivar {0:?}")]
    DuplicateIvar(String),
    /// Symbol bytes that are not well formed under their declared encoding.
    #[error("Symbol bytes invalid for encoding {0:?}")]
    SymbolEncoding(String),
    /// A regexp option byte with an invalid bit combination.
    #[error("Invalid regexp options 0x{0:02X}")]
    InvalidRegexpFlags(u8),
}

fn unknown_tag_to_char(tag: u8) -> char {
    if tag.is_ascii() && !(tag.is_ascii_control() || tag.is_ascii_whitespace()) {
        tag as char
    } else {
        '.'
    }
}

impl From<Kind> for Error {
    fn from(kind: Kind) -> Self {
        Error { kind }
    }
}

impl From<NumericError> for Error {
    fn from(err: NumericError) -> Self {
        let kind = match err {
            NumericError::Eof => Kind::Eof,
            NumericError::NonCanonicalLong => Kind::NonCanonicalLong,
            NumericError::NonCanonicalBignum => Kind::NonCanonicalBignum,
            NumericError::BignumSign(b) => Kind::BignumSign(b),
            NumericError::MalformedFloat(text) => Kind::MalformedFloat(text),
        };
        Error { kind }
    }
}
