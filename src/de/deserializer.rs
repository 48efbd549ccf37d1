// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The marshal parser.
//!
//! One byte of tag, one reader per tag. Composite readers share the three
//! wrapper tags (`I` ivars, `e` extension modules, `C` user subclass), which
//! must nest in exactly that order before the core tag.
//!
//! Link-table registration is pre-order: an eligible node reserves its arena
//! slot (and backreference id) before its children are read, which is what
//! lets `@` links point into nodes still under construction and gives
//! shared and cyclic structure for free.

use std::collections::HashSet;

use num_bigint::BigInt;

use super::{Error, Kind, Result};
use crate::{
    numeric,
    rb_types::{RbArray, RbFields, RbHash, RbObject, RbRegexp, RbString, RbStruct, RegexpOptions, Symbol, Userdata},
    tag::Tag,
    value::{Arena, Document, ModuleKind, Node, NodeId},
    Encoding, MAJOR_VERSION, MINOR_VERSION,
};

/// The marshal48 parser.
///
/// A single parser may be reused sequentially for many top-level values;
/// its symbol and link tables are reset per value and never cross a
/// top-level boundary.
#[derive(Debug, Clone)]
pub struct Deserializer<'de> {
    cursor: Cursor<'de>,

    /// Symbols in first-seen order. `None` marks a slot reserved for a
    /// symbol whose own ivar block is still being read; a symlink into such
    /// a slot is a circular reference.
    symbols: Vec<Option<Symbol>>,
    /// Every symbol value resolved so far; a symbol serialized in full a
    /// second time (instead of symlinked) is a format error.
    seen_symbols: HashSet<Symbol>,
    /// The link (backreference) table, in first-visit order.
    objects: Vec<NodeId>,
}

#[derive(Debug, Clone)]
struct Cursor<'de> {
    input: &'de [u8],
    position: usize,
}

impl<'de> Cursor<'de> {
    fn new(input: &'de [u8]) -> Self {
        Self { input, position: 0 }
    }

    fn next_byte(&mut self) -> Result<u8> {
        let byte = self
            .input
            .get(self.position)
            .copied()
            .ok_or(Error { kind: Kind::Eof })?;
        self.position += 1;
        Ok(byte)
    }

    fn next_tag(&mut self) -> Result<Tag> {
        let byte = self.next_byte()?;
        Tag::from_u8(byte).ok_or(Error {
            kind: Kind::WrongTag(byte),
        })
    }

    fn next_bytes_dyn(&mut self, length: usize) -> Result<&'de [u8]> {
        if self
            .position
            .checked_add(length)
            .map_or(true, |end| end > self.input.len())
        {
            return Err(Error { kind: Kind::Eof });
        }

        let ret = &self.input[self.position..self.position + length];
        self.position += length;
        Ok(ret)
    }

    fn read_long(&mut self) -> Result<i64> {
        let (value, used) = numeric::decode_long(&self.input[self.position..])?;
        self.position += used;
        Ok(value)
    }

    fn is_finished(&self) -> bool {
        self.position >= self.input.len()
    }

    fn remaining(&self) -> usize {
        self.input.len() - self.position
    }
}

/// Wrapper state accumulated before a core tag.
#[derive(Default)]
struct Wrapper {
    ivars: bool,
    extends: Vec<Symbol>,
    subclass: Option<Symbol>,
    /// Link-table slot reserved while reading `e`/`C` wrappers, so the
    /// wrapped node's backreference id predates anything its wrapper
    /// symbols may register.
    slot: Option<NodeId>,
}

/// Which synthetic ivars an ivar list may open with.
#[derive(PartialEq, Eq, Clone, Copy)]
enum Synthetics {
    /// `E` / `encoding` (strings, regexps, userdata).
    Encoding,
    /// `K` (hashes).
    Hash,
    /// No synthetics at all; every name is a user ivar (arrays).
    Plain,
    /// `E` / `encoding` only, no user ivars (a symbol's own ivar block).
    SymbolOnly,
}

#[derive(Default)]
struct IvarBlock {
    encoding: Option<Encoding>,
    ruby2_keywords: bool,
    user: RbFields,
}

impl<'de> Deserializer<'de> {
    /// Create a parser over `input`. No bytes are consumed until a document
    /// is read.
    #[must_use]
    pub fn new(input: &'de [u8]) -> Self {
        Self {
            cursor: Cursor::new(input),
            symbols: vec![],
            seen_symbols: HashSet::new(),
            objects: vec![],
        }
    }

    /// Whether all input has been consumed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.cursor.is_finished()
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.cursor.remaining()
    }

    /// Read one version-prefixed top-level value, resetting all
    /// backreference state first.
    ///
    /// # Errors
    /// Any format violation aborts the read; there is no partial result.
    pub fn read_document(&mut self) -> Result<Document> {
        self.symbols.clear();
        self.seen_symbols.clear();
        self.objects.clear();

        let major = self.cursor.next_byte()?;
        let minor = self.cursor.next_byte()?;
        if major != MAJOR_VERSION || minor > MINOR_VERSION {
            return Err(Error {
                kind: Kind::VersionError([major, minor]),
            });
        }

        let mut arena = Arena::new();
        let root = self.read_value(&mut arena)?;
        Ok(Document { arena, root })
    }

    fn read_value(&mut self, arena: &mut Arena) -> Result<NodeId> {
        let tag = self.cursor.next_tag()?;
        self.read_tagged(arena, tag, Wrapper::default())
    }

    fn read_tagged(&mut self, arena: &mut Arena, tag: Tag, mut wrapper: Wrapper) -> Result<NodeId> {
        match tag {
            Tag::Instance => {
                let next = self.cursor.next_tag()?;
                if !next.accepts_ivars() {
                    return Err(Error {
                        kind: Kind::WrapperOrder(Tag::Instance, next),
                    });
                }
                wrapper.ivars = true;
                self.read_tagged(arena, next, wrapper)
            }
            Tag::Extended => {
                // Reserve the link slot before the module name: a dumper
                // registers the object ahead of its wrapper symbols.
                let slot = self.claim_slot(arena, wrapper.slot);
                let module = self.read_symbol(arena)?;
                wrapper.extends.push(module);
                wrapper.slot = Some(slot);
                let next = self.cursor.next_tag()?;
                if !next.accepts_extension() {
                    return Err(Error {
                        kind: Kind::WrapperOrder(Tag::Extended, next),
                    });
                }
                self.read_tagged(arena, next, wrapper)
            }
            Tag::UserClass => {
                let slot = self.claim_slot(arena, wrapper.slot);
                let subclass = self.read_symbol(arena)?;
                wrapper.subclass = Some(subclass);
                wrapper.slot = Some(slot);
                let next = self.cursor.next_tag()?;
                if !next.accepts_subclass() {
                    return Err(Error {
                        kind: Kind::WrapperOrder(Tag::UserClass, next),
                    });
                }
                self.read_tagged(arena, next, wrapper)
            }
            core => self.read_core(arena, core, wrapper),
        }
    }

    #[allow(clippy::too_many_lines)]
    fn read_core(&mut self, arena: &mut Arena, tag: Tag, wrapper: Wrapper) -> Result<NodeId> {
        let Wrapper {
            ivars,
            extends,
            subclass,
            slot,
        } = wrapper;

        match tag {
            Tag::Nil => Ok(arena.alloc(Node::Nil)),
            Tag::True => Ok(arena.alloc(Node::Bool(true))),
            Tag::False => Ok(arena.alloc(Node::Bool(false))),

            Tag::Integer => {
                let value = self.read_fixnum()?;
                Ok(arena.alloc(Node::Integer(BigInt::from(value))))
            }

            Tag::Bignum => {
                let sign = self.cursor.next_byte()?;
                let words = self.read_length()?;
                let byte_len = words.checked_mul(2).ok_or(Error { kind: Kind::Eof })?;
                let bytes = self.cursor.next_bytes_dyn(byte_len)?;
                let value = numeric::decode_bignum(sign, bytes)?;
                let id = arena.alloc(Node::Integer(value));
                self.objects.push(id);
                Ok(id)
            }

            Tag::Float => {
                let bytes = self.read_byte_seq()?;
                let value = numeric::parse_float(bytes)?;
                let id = arena.alloc(Node::Float(value));
                self.objects.push(id);
                Ok(id)
            }

            Tag::Symbol => {
                let symbol = self.read_symbol_body(arena, ivars)?;
                Ok(arena.alloc(Node::Symbol(symbol)))
            }

            Tag::Symlink => {
                let symbol = self.read_symlink()?;
                Ok(arena.alloc(Node::Symbol(symbol)))
            }

            Tag::ObjectLink => {
                let index = self.read_length()?;
                self.objects
                    .get(index)
                    .copied()
                    .ok_or(Error {
                        kind: Kind::UnresolvedObjectLink(index),
                    })
            }

            Tag::String => {
                let id = self.claim_slot(arena, slot);
                let data = self.read_byte_seq()?.to_vec();
                let block = self.read_wrapper_ivars(arena, ivars, Synthetics::Encoding)?;
                arena.set(
                    id,
                    Node::String(RbString {
                        data,
                        encoding: block.encoding.unwrap_or_default(),
                        subclass,
                        ivars: block.user,
                        extends,
                    }),
                );
                Ok(id)
            }

            Tag::RawRegexp => {
                let id = self.claim_slot(arena, slot);
                let source = self.read_byte_seq()?.to_vec();
                let option_byte = self.cursor.next_byte()?;
                let block = self.read_wrapper_ivars(arena, ivars, Synthetics::Encoding)?;
                let regexp = build_regexp(source, option_byte, block, subclass, extends)?;
                arena.set(id, Node::Regexp(regexp));
                Ok(id)
            }

            Tag::Array => {
                let id = self.claim_slot(arena, slot);
                let length = self.read_length()?;
                let mut elements = Vec::with_capacity(length.min(4096));
                for _ in 0..length {
                    elements.push(self.read_value(arena)?);
                }
                let block = self.read_wrapper_ivars(arena, ivars, Synthetics::Plain)?;
                arena.set(
                    id,
                    Node::Array(RbArray {
                        elements,
                        subclass,
                        ivars: block.user,
                        extends,
                    }),
                );
                Ok(id)
            }

            Tag::Hash | Tag::HashDefault => {
                let id = self.claim_slot(arena, slot);
                let length = self.read_length()?;
                let mut pairs = Vec::with_capacity(length.min(4096));
                for _ in 0..length {
                    let key = self.read_value(arena)?;
                    let value = self.read_value(arena)?;
                    pairs.push((key, value));
                }
                let default = if tag == Tag::HashDefault {
                    Some(self.read_value(arena)?)
                } else {
                    None
                };
                let block = self.read_wrapper_ivars(arena, ivars, Synthetics::Hash)?;
                arena.set(
                    id,
                    Node::Hash(RbHash {
                        pairs,
                        default,
                        subclass,
                        ivars: block.user,
                        extends,
                        ruby2_keywords: block.ruby2_keywords,
                    }),
                );
                Ok(id)
            }

            Tag::Object => {
                let id = self.claim_slot(arena, slot);
                let class = self.read_symbol(arena)?;
                let fields = self.read_plain_ivars(arena)?;
                arena.set(
                    id,
                    Node::Object(RbObject {
                        class,
                        ivars: fields,
                        extends,
                    }),
                );
                Ok(id)
            }

            Tag::Struct => {
                let id = self.claim_slot(arena, slot);
                let class = self.read_symbol(arena)?;
                let length = self.read_length()?;
                let mut members = Vec::with_capacity(length.min(4096));
                for _ in 0..length {
                    let name = self.read_symbol(arena)?;
                    let value = self.read_value(arena)?;
                    members.push((name, value));
                }
                arena.set(id, Node::Struct(RbStruct { class, members }));
                Ok(id)
            }

            Tag::UserDef => {
                let id = self.claim_slot(arena, slot);
                let class = self.read_symbol(arena)?;
                let data = self.read_byte_seq()?.to_vec();
                let block = self.read_wrapper_ivars(arena, ivars, Synthetics::Encoding)?;
                arena.set(
                    id,
                    Node::Userdata(Userdata {
                        class,
                        data,
                        encoding: block.encoding.unwrap_or_default(),
                        ivars: block.user,
                    }),
                );
                Ok(id)
            }

            Tag::UserMarshal => {
                let id = self.claim_slot(arena, slot);
                let class = self.read_symbol(arena)?;
                let value = self.read_value(arena)?;
                arena.set(id, Node::UserMarshal { class, value });
                Ok(id)
            }

            Tag::Data => {
                let id = self.claim_slot(arena, slot);
                let class = self.read_symbol(arena)?;
                let value = self.read_value(arena)?;
                arena.set(id, Node::Data { class, value });
                Ok(id)
            }

            Tag::ClassRef => self.read_module(arena, ModuleKind::Class),
            Tag::ModuleRef => self.read_module(arena, ModuleKind::Module),
            Tag::ModuleOld => self.read_module(arena, ModuleKind::Legacy),

            // Wrappers are handled in read_tagged; reaching here means the
            // tag dispatch above let one through, which cannot happen.
            Tag::Instance | Tag::Extended | Tag::UserClass => unreachable!(),
        }
    }

    fn read_module(&mut self, arena: &mut Arena, kind: ModuleKind) -> Result<NodeId> {
        let id = arena.alloc(Node::Nil);
        self.objects.push(id);
        let bytes = self.read_byte_seq()?.to_vec();
        let name = Symbol::new(bytes, Encoding::Binary);
        arena.set(id, Node::Module { kind, name });
        Ok(id)
    }

    /// The link slot for a node: either the one its wrappers reserved, or a
    /// fresh pre-order entry.
    fn claim_slot(&mut self, arena: &mut Arena, slot: Option<NodeId>) -> NodeId {
        match slot {
            Some(id) => id,
            None => {
                let id = arena.alloc(Node::Nil);
                self.objects.push(id);
                id
            }
        }
    }

    fn read_fixnum(&mut self) -> Result<i64> {
        let value = self.cursor.read_long()?;
        if !(numeric::FIXNUM_MIN..=numeric::FIXNUM_MAX).contains(&value) {
            return Err(Error {
                kind: Kind::LongOutOfRange(value),
            });
        }
        Ok(value)
    }

    fn read_length(&mut self) -> Result<usize> {
        let value = self.cursor.read_long()?;
        if !(0..=i64::from(u32::MAX)).contains(&value) {
            return Err(Error {
                kind: Kind::LongOutOfRange(value),
            });
        }
        Ok(value as usize)
    }

    fn read_byte_seq(&mut self) -> Result<&'de [u8]> {
        let length = self.read_length()?;
        self.cursor.next_bytes_dyn(length)
    }

    /// A symbol in key/class-name position: `:`, `;`, or `I:`.
    fn read_symbol(&mut self, arena: &mut Arena) -> Result<Symbol> {
        let tag = self.cursor.next_tag()?;
        match tag {
            Tag::Symbol => self.read_symbol_body(arena, false),
            Tag::Symlink => self.read_symlink(),
            Tag::Instance => {
                let next = self.cursor.next_tag()?;
                if next != Tag::Symbol {
                    return Err(Error {
                        kind: Kind::ExpectedSymbol(next),
                    });
                }
                self.read_symbol_body(arena, true)
            }
            other => Err(Error {
                kind: Kind::ExpectedSymbol(other),
            }),
        }
    }

    fn read_symbol_body(&mut self, arena: &mut Arena, has_ivars: bool) -> Result<Symbol> {
        let index = self.symbols.len();
        self.symbols.push(None);

        let bytes = self.read_byte_seq()?.to_vec();
        let encoding = if has_ivars {
            let block = self.read_ivars(arena, Synthetics::SymbolOnly)?;
            block.encoding.ok_or(Error {
                kind: Kind::MalformedSyntheticIvar("E"),
            })?
        } else if bytes.is_ascii() {
            Encoding::UsAscii
        } else {
            Encoding::Binary
        };

        if !encoding.validate(&bytes) {
            return Err(Error {
                kind: Kind::SymbolEncoding(encoding.name().to_string()),
            });
        }

        let symbol = Symbol::new(bytes, encoding);
        if !self.seen_symbols.insert(symbol.clone()) {
            return Err(Error {
                kind: Kind::DuplicateSymbol(symbol.to_string_lossy().into_owned()),
            });
        }
        self.symbols[index] = Some(symbol.clone());
        Ok(symbol)
    }

    fn read_symlink(&mut self) -> Result<Symbol> {
        let index = self.read_length()?;
        match self.symbols.get(index) {
            Some(Some(symbol)) => Ok(symbol.clone()),
            Some(None) => Err(Error {
                kind: Kind::CircularSymlink(index),
            }),
            None => Err(Error {
                kind: Kind::UnresolvedSymlink(index),
            }),
        }
    }

    fn read_wrapper_ivars(
        &mut self,
        arena: &mut Arena,
        present: bool,
        policy: Synthetics,
    ) -> Result<IvarBlock> {
        if present {
            self.read_ivars(arena, policy)
        } else {
            Ok(IvarBlock::default())
        }
    }

    /// The count-prefixed (symbol, value) list of an `I` wrapper, peeling
    /// off the synthetic ivars the wire treats positionally.
    fn read_ivars(&mut self, arena: &mut Arena, policy: Synthetics) -> Result<IvarBlock> {
        let count = self.read_length()?;
        let mut block = IvarBlock::default();
        let mut user_seen = false;

        for _ in 0..count {
            let key = self.read_symbol(arena)?;
            match key.as_bytes() {
                b"E" if matches!(policy, Synthetics::Encoding | Synthetics::SymbolOnly) => {
                    self.check_synthetic("E", user_seen, block.encoding.is_some())?;
                    let value = self.read_value(arena)?;
                    block.encoding = Some(match arena.get(value) {
                        Some(Node::Bool(true)) => Encoding::Utf8,
                        Some(Node::Bool(false)) => Encoding::UsAscii,
                        _ => {
                            return Err(Error {
                                kind: Kind::MalformedSyntheticIvar("E"),
                            })
                        }
                    });
                }
                b"encoding" if matches!(policy, Synthetics::Encoding | Synthetics::SymbolOnly) => {
                    self.check_synthetic("encoding", user_seen, block.encoding.is_some())?;
                    let value = self.read_value(arena)?;
                    block.encoding = Some(match arena.get(value) {
                        Some(Node::String(s)) => {
                            Encoding::Other(String::from_utf8_lossy(&s.data).into_owned())
                        }
                        _ => {
                            return Err(Error {
                                kind: Kind::MalformedSyntheticIvar("encoding"),
                            })
                        }
                    });
                }
                b"K" if policy == Synthetics::Hash => {
                    self.check_synthetic("K", user_seen, block.ruby2_keywords)?;
                    let value = self.read_value(arena)?;
                    if !matches!(arena.get(value), Some(Node::Bool(true))) {
                        return Err(Error {
                            kind: Kind::MalformedSyntheticIvar("K"),
                        });
                    }
                    block.ruby2_keywords = true;
                }
                _ if policy == Synthetics::SymbolOnly => {
                    return Err(Error {
                        kind: Kind::UnexpectedSymbolIvar(key.to_string_lossy().into_owned()),
                    });
                }
                _ => {
                    user_seen = true;
                    let value = self.read_value(arena)?;
                    if block.user.insert(key.clone(), value).is_some() {
                        return Err(Error {
                            kind: Kind::DuplicateIvar(key.to_string_lossy().into_owned()),
                        });
                    }
                }
            }
        }
        Ok(block)
    }

    fn check_synthetic(&self, name: &'static str, user_seen: bool, duplicate: bool) -> Result<()> {
        if user_seen {
            return Err(Error {
                kind: Kind::MisplacedSyntheticIvar(name),
            });
        }
        if duplicate {
            return Err(Error {
                kind: Kind::DuplicateSyntheticIvar(name),
            });
        }
        Ok(())
    }
}

/// Interpret a regexp option byte against its (optional) encoding ivar.
///
/// An encoding ivar means modern data: bit 4 is the fixed-encoding flag and
/// must agree with the encoding, bit 5 is `n`. No ivar means Ruby 1.8 data:
/// the upper bits are a Kanji code.
fn build_regexp(
    source: Vec<u8>,
    option_byte: u8,
    block: IvarBlock,
    subclass: Option<Symbol>,
    extends: Vec<Symbol>,
) -> Result<RbRegexp> {
    let mut options = RegexpOptions::from_low_bits(option_byte);
    let high = option_byte & !RegexpOptions::LOW_MASK;

    let (encoding, legacy) = match block.encoding {
        Some(encoding) => {
            let allowed = RegexpOptions::NOENCODING | RegexpOptions::FIXEDENCODING;
            if high & !allowed != 0 {
                return Err(Error {
                    kind: Kind::InvalidRegexpFlags(option_byte),
                });
            }
            options.noencoding = high & RegexpOptions::NOENCODING != 0;
            let fixed = matches!(encoding, Encoding::Utf8 | Encoding::Other(_));
            if (high & RegexpOptions::FIXEDENCODING != 0) != fixed {
                return Err(Error {
                    kind: Kind::InvalidRegexpFlags(option_byte),
                });
            }
            (encoding, false)
        }
        None if high == 0 => (Encoding::Binary, false),
        None => match crate::encoding::KanjiCode::from_bits(high) {
            Some(code) => (code.encoding(), true),
            None => {
                return Err(Error {
                    kind: Kind::InvalidRegexpFlags(option_byte),
                })
            }
        },
    };

    Ok(RbRegexp {
        source,
        encoding,
        options,
        legacy,
        subclass,
        ivars: block.user,
        extends,
    })
}

impl<'de> Deserializer<'de> {
    fn read_plain_ivars(&mut self, arena: &mut Arena) -> Result<RbFields> {
        let count = self.read_length()?;
        let mut fields = RbFields::with_capacity(count.min(4096));
        for _ in 0..count {
            let key = self.read_symbol(arena)?;
            let value = self.read_value(arena)?;
            if fields.insert(key.clone(), value).is_some() {
                return Err(Error {
                    kind: Kind::DuplicateIvar(key.to_string_lossy().into_owned()),
                });
            }
        }
        Ok(fields)
    }
}

/// A lazy stream of top-level values over one buffer.
///
/// Backreference state never crosses a value boundary. The stream fuses
/// after the first error; restart from the original buffer to retry.
#[derive(Debug)]
pub struct Documents<'de> {
    de: Deserializer<'de>,
    done: bool,
}

impl<'de> Documents<'de> {
    /// Create a stream over `input`.
    #[must_use]
    pub fn new(input: &'de [u8]) -> Self {
        Self {
            de: Deserializer::new(input),
            done: false,
        }
    }
}

impl Iterator for Documents<'_> {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.de.is_finished() {
            return None;
        }
        let result = self.de.read_document();
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}
