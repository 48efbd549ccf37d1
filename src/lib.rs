#![warn(rust_2018_idioms, clippy::all, clippy::pedantic)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    missing_copy_implementations,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::panicking_unwrap,
    clippy::all
)]
#![allow(
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::cast_possible_wrap
)]

//! marshal48
//!
//! A byte-exact codec for Ruby's Marshal 4.8 wire format. Parsing and
//! generation are exact inverses: any document parsed from conforming input
//! re-serializes to the identical bytes, and the parser rejects every
//! encoding a conforming writer would not produce (non-canonical integer
//! tiers, re-serialized symbols, malformed float text, and so on).
//!
//! Values form a graph, not a tree. Marshal backreferences (`@` links) can
//! share nodes and close cycles, so values live in an [`Arena`] and refer to
//! each other by [`NodeId`]. A [`Document`] is one arena plus a root id.
//!
//! ```
//! let bytes = [0x04, 0x08, 0x5b, 0x07, 0x3a, 0x08, 0x66, 0x6f, 0x6f, 0x3b, 0x00];
//! let document = marshal48::load(&bytes).unwrap();
//! assert_eq!(marshal48::dump(&document).unwrap(), bytes);
//! ```
//!
//! Some common terminology:
//! - ivar: Instance variable. These are variables that are attached to an object.
//! - synthetic ivar: An ivar the wire format itself defines (`E` and
//!   `encoding` for encodings, `K` for ruby2_keywords hashes).
//! - userdata: A special type of object that is serialized by the `_dump` method.
//! - userclass: A subclass of a ruby class like `Hash` or `Array`.
//! - link: A backreference to an already-(de)serialized object, by its
//!   position in first-visit order.

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub(crate) mod numeric;
pub(crate) mod tag;

mod encoding;
mod mapper;
mod rb_types;
mod value;

/// Marshal parsing: bytes to value graphs.
pub mod de;
/// Marshal generation: value graphs to bytes.
pub mod ser;

pub use encoding::Encoding;
pub use mapper::Mapper;

#[doc(inline)]
pub use rb_types::{
    RbArray, RbFields, RbHash, RbObject, RbRegexp, RbString, RbStruct, RegexpOptions, Symbol,
    Userdata,
};
pub use value::{Arena, Document, ModuleKind, Node, NodeId};

#[doc(inline)]
pub use de::{
    Deserializer, Documents, Error as DeError, Kind as DeKind, Result as DeResult,
};
#[doc(inline)]
pub use ser::{Error as SerError, Kind as SerKind, Result as SerResult, Serializer};

/// The major version every document starts with.
pub const MAJOR_VERSION: u8 = 4;
/// The highest minor version accepted; documents are always written as 4.8.
pub const MINOR_VERSION: u8 = 8;

/// Parse exactly one document from `input`.
///
/// It's a convenience function over [`Deserializer::new`] and
/// [`Deserializer::read_document`] that also rejects trailing bytes.
pub fn load(input: &[u8]) -> Result<Document, DeError> {
    let mut deserializer = Deserializer::new(input);
    let document = deserializer.read_document()?;
    if !deserializer.is_finished() {
        return Err(de::Kind::TrailingBytes(deserializer.remaining()).into());
    }
    Ok(document)
}

/// Parse a stream of concatenated documents lazily.
///
/// Each document carries its own version header and its own backreference
/// scope. The iterator fuses after the first error.
pub fn load_stream(input: &[u8]) -> Documents<'_> {
    Documents::new(input)
}

/// Serialize one document, version header included.
pub fn dump(document: &Document) -> Result<Vec<u8>, SerError> {
    let mut serializer = Serializer::new();
    serializer.write_document(document)?;
    Ok(serializer.output)
}

/// Serialize documents back to back, each with its own header and
/// backreference scope. The inverse of [`load_stream`].
pub fn dump_all<'a>(
    documents: impl IntoIterator<Item = &'a Document>,
) -> Result<Vec<u8>, SerError> {
    let mut serializer = Serializer::new();
    for document in documents {
        serializer.write_document(document)?;
    }
    Ok(serializer.output)
}



#[cfg(test)]
mod floats {
    use crate::{dump, load, DeKind, Document, Node};

    fn float_bytes(text: &str) -> Vec<u8> {
        let mut bytes = vec![0x04, 0x08, 0x66, text.len() as u8 + 5];
        bytes.extend_from_slice(text.as_bytes());
        bytes
    }

    fn check(value: f64, text: &str) {
        let bytes = float_bytes(text);
        let document = load(&bytes).unwrap();
        let parsed = document
            .arena
            .get(document.root)
            .unwrap()
            .as_float()
            .copied()
            .unwrap();
        assert_eq!(parsed.to_bits(), value.to_bits(), "{text}");
        assert_eq!(dump(&document).unwrap(), bytes, "{text}");
    }

    #[test]
    fn shortest_fixed_point() {
        check(1.0, "1");
        check(-0.5, "-0.5");
        check(123.456, "123.456");
        check(0.0001, "0.0001");
        check(0.0, "0");
    }

    #[test]
    fn scientific_beyond_the_window() {
        check(1e20, "1e20");
        check(1e-5, "1e-5");
        check(1.5e30, "1.5e30");
    }

    #[test]
    fn specials() {
        check(f64::INFINITY, "inf");
        check(f64::NEG_INFINITY, "-inf");
        check(-0.0, "-0");

        let bytes = float_bytes("nan");
        let document = load(&bytes).unwrap();
        let parsed = document
            .arena
            .get(document.root)
            .unwrap()
            .as_float()
            .copied()
            .unwrap();
        assert!(parsed.is_nan());
        assert_eq!(dump(&document).unwrap(), bytes);
    }

    #[test]
    fn nan_payloads_collapse() {
        // Any NaN bit pattern serializes as plain "nan".
        let weird: f64 = bytemuck::cast(0x7ff8_0000_dead_beef_u64);
        let document = Document::leaf(Node::Float(weird));
        assert_eq!(dump(&document).unwrap(), float_bytes("nan"));
    }

    #[test]
    fn legacy_spellings_parse() {
        let document = load(&float_bytes("infinity")).unwrap();
        let parsed = document
            .arena
            .get(document.root)
            .unwrap()
            .as_float()
            .copied()
            .unwrap();
        assert_eq!(parsed, f64::INFINITY);

        let document = load(&float_bytes("-infinity")).unwrap();
        let parsed = document
            .arena
            .get(document.root)
            .unwrap()
            .as_float()
            .copied()
            .unwrap();
        assert_eq!(parsed, f64::NEG_INFINITY);
    }

    #[test]
    fn rejects_non_canonical_text() {
        for text in ["+1", "01", "1.0", "1.", ".5", "1e+5", "1e05", "", "Inf"] {
            let err = load(&float_bytes(text)).unwrap_err();
            assert!(
                matches!(err.kind, DeKind::MalformedFloat(_)),
                "{text:?} should be rejected"
            );
        }
    }
}




#[cfg(test)]
mod hashes {
    use crate::{dump, load, DeKind};

    #[test]
    fn empty() {
        let bytes = [0x04, 0x08, 0x7b, 0x00];
        let document = load(&bytes).unwrap();
        assert_eq!(dump(&document).unwrap(), bytes);
    }

    #[test]
    fn symbol_keys() {
        let bytes = [0x04, 0x08, 0x7b, 0x06, 0x3a, 0x06, 0x61, 0x69, 0x06];
        let document = load(&bytes).unwrap();
        let hash = document
            .arena
            .get(document.root)
            .unwrap()
            .as_hash()
            .unwrap();
        assert_eq!(hash.pairs.len(), 1);
        assert_eq!(dump(&document).unwrap(), bytes);
    }

    #[test]
    fn with_default() {
        let bytes = [0x04, 0x08, 0x7d, 0x00, 0x69, 0x2f];
        let document = load(&bytes).unwrap();
        let hash = document
            .arena
            .get(document.root)
            .unwrap()
            .as_hash()
            .unwrap();
        let default = hash.default.unwrap();
        assert_eq!(
            document.arena.get(default).unwrap().as_integer().unwrap(),
            &num_bigint::BigInt::from(42)
        );
        assert_eq!(dump(&document).unwrap(), bytes);
    }

    #[test]
    fn ruby2_keywords_flag() {
        let bytes = [0x04, 0x08, 0x49, 0x7b, 0x00, 0x06, 0x3a, 0x06, 0x4b, 0x54];
        let document = load(&bytes).unwrap();
        let hash = document
            .arena
            .get(document.root)
            .unwrap()
            .as_hash()
            .unwrap();
        assert!(hash.ruby2_keywords);
        assert_eq!(dump(&document).unwrap(), bytes);
    }

    #[test]
    fn rejects_false_keyword_flag() {
        let bytes = [0x04, 0x08, 0x49, 0x7b, 0x00, 0x06, 0x3a, 0x06, 0x4b, 0x46];
        let err = load(&bytes).unwrap_err();
        assert!(matches!(err.kind, DeKind::MalformedSyntheticIvar("K")));
    }
}

#[cfg(test)]
mod objects {
    use crate::{dump, load, DeKind};

    #[test]
    fn empty_object() {
        let bytes = [0x04, 0x08, 0x6f, 0x3a, 0x0b, 0x4f, 0x62, 0x6a, 0x65, 0x63, 0x74, 0x00];
        let document = load(&bytes).unwrap();
        let object = document
            .arena
            .get(document.root)
            .unwrap()
            .as_object()
            .unwrap();
        assert_eq!(object.class, "Object");
        assert!(object.ivars.is_empty());
        assert_eq!(dump(&document).unwrap(), bytes);
    }

    #[test]
    fn with_ivars() {
        let bytes = [
            0x04, 0x08, 0x6f, 0x3a, 0x0a, 0x50, 0x6f, 0x69, 0x6e, 0x74, 0x07, 0x3a, 0x07, 0x40,
            0x78, 0x69, 0x06, 0x3a, 0x07, 0x40, 0x79, 0x69, 0x07,
        ];
        let document = load(&bytes).unwrap();
        let object = document
            .arena
            .get(document.root)
            .unwrap()
            .as_object()
            .unwrap();
        assert_eq!(object.class, "Point");
        assert_eq!(object.ivars.len(), 2);
        assert_eq!(dump(&document).unwrap(), bytes);
    }

    #[test]
    fn rejects_duplicate_ivars() {
        // @x appears twice, the second time via symlink.
        let bytes = [
            0x04, 0x08, 0x6f, 0x3a, 0x0b, 0x4f, 0x62, 0x6a, 0x65, 0x63, 0x74, 0x07, 0x3a, 0x07,
            0x40, 0x78, 0x69, 0x06, 0x3b, 0x06, 0x69, 0x07,
        ];
        let err = load(&bytes).unwrap_err();
        assert!(matches!(err.kind, DeKind::DuplicateIvar(_)));
    }
}


#[cfg(test)]
mod regexps {
    use crate::{dump, load, DeKind, Encoding};

    #[test]
    fn modern_utf8() {
        // /abc/i in UTF-8: ignorecase plus the fixed-encoding bit.
        let bytes = [
            0x04, 0x08, 0x49, 0x2f, 0x08, 0x61, 0x62, 0x63, 0x11, 0x06, 0x3a, 0x06, 0x45, 0x54,
        ];
        let document = load(&bytes).unwrap();
        let regexp = document
            .arena
            .get(document.root)
            .unwrap()
            .as_regexp()
            .unwrap();
        assert_eq!(regexp.source, b"abc");
        assert!(regexp.options.ignorecase);
        assert!(!regexp.legacy);
        assert_eq!(regexp.encoding, Encoding::Utf8);
        assert_eq!(dump(&document).unwrap(), bytes);
    }

    #[test]
    fn modern_noencoding() {
        // /a/n over an ASCII source: US-ASCII, bit 5 set, no fixed bit.
        let bytes = [
            0x04, 0x08, 0x49, 0x2f, 0x06, 0x61, 0x20, 0x06, 0x3a, 0x06, 0x45, 0x46,
        ];
        let document = load(&bytes).unwrap();
        let regexp = document
            .arena
            .get(document.root)
            .unwrap()
            .as_regexp()
            .unwrap();
        assert!(regexp.options.noencoding);
        assert_eq!(regexp.encoding, Encoding::UsAscii);
        assert_eq!(dump(&document).unwrap(), bytes);
    }

    #[test]
    fn legacy_kanji_code() {
        // Ruby 1.8 data: no encoding ivar, EUC-JP in the option byte.
        let bytes = [0x04, 0x08, 0x2f, 0x06, 0x61, 0x20];
        let document = load(&bytes).unwrap();
        let regexp = document
            .arena
            .get(document.root)
            .unwrap()
            .as_regexp()
            .unwrap();
        assert!(regexp.legacy);
        assert_eq!(regexp.encoding, Encoding::Other("EUC-JP".to_string()));
        assert_eq!(dump(&document).unwrap(), bytes);
    }

    #[test]
    fn rejects_fixed_bit_disagreeing_with_encoding() {
        // Fixed-encoding bit set, but the ivar says US-ASCII.
        let bytes = [
            0x04, 0x08, 0x49, 0x2f, 0x06, 0x61, 0x10, 0x06, 0x3a, 0x06, 0x45, 0x46,
        ];
        let err = load(&bytes).unwrap_err();
        assert!(matches!(err.kind, DeKind::InvalidRegexpFlags(0x10)));
    }

    #[test]
    fn rejects_undefined_high_bits() {
        let err = load(&[0x04, 0x08, 0x2f, 0x06, 0x61, 0x50]).unwrap_err();
        assert!(matches!(err.kind, DeKind::InvalidRegexpFlags(0x50)));
    }
}

#[cfg(test)]
mod modules {
    use crate::{dump, load, ModuleKind};

    #[test]
    fn class_ref() {
        let bytes = [0x04, 0x08, 0x63, 0x0b, 0x53, 0x74, 0x72, 0x69, 0x6e, 0x67];
        let document = load(&bytes).unwrap();
        let Some(crate::Node::Module { kind, name }) = document.arena.get(document.root) else {
            panic!("not a module node");
        };
        assert_eq!(*kind, ModuleKind::Class);
        assert_eq!(name, &"String");
        assert_eq!(dump(&document).unwrap(), bytes);
    }

    #[test]
    fn module_ref() {
        let bytes = [0x04, 0x08, 0x6d, 0x0b, 0x4b, 0x65, 0x72, 0x6e, 0x65, 0x6c];
        let document = load(&bytes).unwrap();
        assert_eq!(dump(&document).unwrap(), bytes);
    }

    #[test]
    fn legacy_ambiguous_ref() {
        let bytes = [0x04, 0x08, 0x4d, 0x0b, 0x4b, 0x65, 0x72, 0x6e, 0x65, 0x6c];
        let document = load(&bytes).unwrap();
        let Some(crate::Node::Module { kind, .. }) = document.arena.get(document.root) else {
            panic!("not a module node");
        };
        assert_eq!(*kind, ModuleKind::Legacy);
        assert_eq!(dump(&document).unwrap(), bytes);
    }

    #[test]
    fn module_refs_are_linkable() {
        let bytes = [
            0x04, 0x08, 0x5b, 0x07, 0x63, 0x0b, 0x53, 0x74, 0x72, 0x69, 0x6e, 0x67, 0x40, 0x06,
        ];
        let document = load(&bytes).unwrap();
        let array = document
            .arena
            .get(document.root)
            .unwrap()
            .as_array()
            .unwrap();
        assert_eq!(array.elements[0], array.elements[1]);
        assert_eq!(dump(&document).unwrap(), bytes);
    }
}




#[cfg(test)]
mod malformed {
    use crate::{load, DeKind};

    #[test]
    fn empty_input() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err.kind, DeKind::Eof));
    }

    #[test]
    fn version_gate() {
        let err = load(&[0x03, 0x08, 0x30]).unwrap_err();
        assert!(matches!(err.kind, DeKind::VersionError([0x03, 0x08])));
        let err = load(&[0x04, 0x09, 0x30]).unwrap_err();
        assert!(matches!(err.kind, DeKind::VersionError([0x04, 0x09])));
        // Older minors parse fine.
        assert!(load(&[0x04, 0x06, 0x30]).is_ok());
    }

    #[test]
    fn unknown_tag() {
        let err = load(&[0x04, 0x08, 0x7a]).unwrap_err();
        assert!(matches!(err.kind, DeKind::WrongTag(0x7a)));
    }

    #[test]
    fn truncated_payload() {
        let err = load(&[0x04, 0x08, 0x22, 0x08, 0x61]).unwrap_err();
        assert!(matches!(err.kind, DeKind::Eof));
    }

    #[test]
    fn wrapper_on_unwrappable_tag() {
        let err = load(&[0x04, 0x08, 0x49, 0x69, 0x06]).unwrap_err();
        assert!(matches!(
            err.kind,
            DeKind::WrapperOrder(crate::tag::Tag::Instance, crate::tag::Tag::Integer)
        ));
    }
}

#[cfg(test)]
mod round_trip {
    use num_bigint::BigInt;

    use crate::{dump, load, Arena, Document, Node, RbArray, RbHash, RbString, Symbol};

    #[test]
    fn constructed_graph_survives() {
        let mut arena = Arena::new();
        let key = arena.alloc(Node::Symbol(Symbol::from("name")));
        let value = arena.alloc(Node::String(RbString::from("marshal")));
        let count_key = arena.alloc(Node::Symbol(Symbol::from("count")));
        let count = arena.alloc(Node::Integer(BigInt::from(1) << 40));
        let hash = arena.alloc(Node::Hash(RbHash::new(vec![(key, value), (count_key, count)])));
        let float = arena.alloc(Node::Float(0.25));
        let root = arena.alloc(Node::Array(RbArray::new(vec![hash, float, hash])));
        let original = Document::new(arena, root);

        let bytes = dump(&original).unwrap();
        let parsed = load(&bytes).unwrap();
        assert!(original.graph_eq(&parsed));
        // Byte idempotence, not just value equality.
        assert_eq!(dump(&parsed).unwrap(), bytes);
    }

    #[test]
    fn reserialization_is_stable() {
        // One pass through the codec is a fixed point.
        let bytes = [
            0x04, 0x08, 0x7b, 0x07, 0x3a, 0x06, 0x61, 0x49, 0x22, 0x06, 0x78, 0x06, 0x3a, 0x06,
            0x45, 0x54, 0x3a, 0x06, 0x62, 0x5b, 0x07, 0x69, 0x06, 0x40, 0x06,
        ];
        let first = load(&bytes).unwrap();
        let out = dump(&first).unwrap();
        assert_eq!(out, bytes, "{}", pretty_hex::pretty_hex(&out));
    }
}
