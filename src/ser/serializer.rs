// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The marshal generator.
//!
//! Emission mirrors the parser exactly: nodes register in the link table in
//! pre-order (before their wrappers and children), symbols intern on first
//! full emission, and encoding-name strings occupy ordinary link slots even
//! though they have no node of their own. A value parsed from conforming
//! input re-serializes byte for byte.

use std::collections::HashMap;

use indexmap::IndexSet;
use num_traits::ToPrimitive;

use super::{Error, Kind, Result};
use crate::{
    encoding::KanjiCode,
    numeric,
    rb_types::{RbFields, RegexpOptions, Symbol},
    value::{Arena, Document, ModuleKind, Node, NodeId},
    Encoding, MAJOR_VERSION, MINOR_VERSION,
};

/// The marshal48 serializer.
///
/// Output accumulates across documents; backreference state does not.
#[derive(Debug, Clone, Default)]
pub struct Serializer {
    /// The underlying output of the serializer.
    pub output: Vec<u8>,
    /// Symbols in first-emission order; index is the symlink id.
    symbols: IndexSet<Symbol>,
    /// Link ids handed out to nodes, by node id.
    objects: HashMap<NodeId, u32>,
    /// Link ids handed out to encoding-name strings, by name. These occupy
    /// slots in the same table as `objects` without having node ids.
    encodings: HashMap<String, u32>,
    next_link: u32,
}

impl Serializer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one version-prefixed document to the output, resetting all
    /// backreference state first.
    ///
    /// # Errors
    /// Fails on dangling node ids, oversized lengths, and non-ASCII module
    /// names. The output is not truncated on error; discard it.
    pub fn write_document(&mut self, document: &Document) -> Result<()> {
        self.symbols.clear();
        self.objects.clear();
        self.encodings.clear();
        self.next_link = 0;

        self.output.push(MAJOR_VERSION);
        self.output.push(MINOR_VERSION);
        self.write_node(&document.arena, document.root)
    }

    #[allow(clippy::too_many_lines)]
    fn write_node(&mut self, arena: &Arena, id: NodeId) -> Result<()> {
        let node = arena.get(id).ok_or(Error {
            kind: Kind::DanglingNode(id.index() as u32),
        })?;

        if node.is_link_eligible() {
            if let Some(&index) = self.objects.get(&id) {
                self.output.push(b'@');
                self.write_long(i64::from(index));
                return Ok(());
            }
            self.objects.insert(id, self.next_link);
            self.next_link += 1;
        }

        match node {
            Node::Nil => self.output.push(b'0'),
            Node::Bool(true) => self.output.push(b'T'),
            Node::Bool(false) => self.output.push(b'F'),

            Node::Integer(value) => match value.to_i64() {
                Some(v) if (numeric::FIXNUM_MIN..=numeric::FIXNUM_MAX).contains(&v) => {
                    self.output.push(b'i');
                    self.write_long(v);
                }
                _ => {
                    self.output.push(b'l');
                    numeric::encode_bignum(&mut self.output, value);
                }
            },

            Node::Float(value) => {
                self.output.push(b'f');
                let text = numeric::format_float(*value);
                self.write_byte_seq(text.as_bytes())?;
            }

            Node::Symbol(symbol) => self.write_symbol(symbol)?,

            Node::String(string) => {
                let has_ivars = string.has_ivars();
                self.write_wrappers(has_ivars, &string.extends, string.subclass.as_ref())?;
                self.output.push(b'"');
                self.write_byte_seq(&string.data)?;
                if has_ivars {
                    self.write_encoding_ivars(arena, &string.encoding, &string.ivars)?;
                }
            }

            Node::Regexp(regexp) => {
                let has_ivars = regexp.has_ivars();
                self.write_wrappers(has_ivars, &regexp.extends, regexp.subclass.as_ref())?;
                self.output.push(b'/');
                self.write_byte_seq(&regexp.source)?;

                let mut option_byte = regexp.options.low_bits();
                if regexp.legacy {
                    let code = KanjiCode::for_encoding(&regexp.encoding)
                        .unwrap_or(KanjiCode::None);
                    option_byte |= code.bits();
                    self.output.push(option_byte);
                    if has_ivars {
                        self.write_user_ivars(arena, &regexp.ivars)?;
                    }
                } else {
                    if regexp.options.noencoding {
                        option_byte |= RegexpOptions::NOENCODING;
                    }
                    if regexp.fixed_encoding() {
                        option_byte |= RegexpOptions::FIXEDENCODING;
                    }
                    self.output.push(option_byte);
                    if has_ivars {
                        self.write_encoding_ivars(arena, &regexp.encoding, &regexp.ivars)?;
                    }
                }
            }

            Node::Array(array) => {
                let has_ivars = array.has_ivars();
                self.write_wrappers(has_ivars, &array.extends, array.subclass.as_ref())?;
                self.output.push(b'[');
                self.write_length(array.elements.len())?;
                for element in &array.elements {
                    self.write_node(arena, *element)?;
                }
                if has_ivars {
                    self.write_user_ivars(arena, &array.ivars)?;
                }
            }

            Node::Hash(hash) => {
                let has_ivars = hash.has_ivars();
                self.write_wrappers(has_ivars, &hash.extends, hash.subclass.as_ref())?;
                self.output
                    .push(if hash.default.is_some() { b'}' } else { b'{' });
                self.write_length(hash.pairs.len())?;
                for (key, value) in &hash.pairs {
                    self.write_node(arena, *key)?;
                    self.write_node(arena, *value)?;
                }
                if let Some(default) = hash.default {
                    self.write_node(arena, default)?;
                }
                if has_ivars {
                    let count = usize::from(hash.ruby2_keywords) + hash.ivars.len();
                    self.write_length(count)?;
                    if hash.ruby2_keywords {
                        self.write_symbol(&Symbol::from("K"))?;
                        self.output.push(b'T');
                    }
                    for (key, value) in &hash.ivars {
                        self.write_symbol(key)?;
                        self.write_node(arena, *value)?;
                    }
                }
            }

            Node::Object(object) => {
                for module in &object.extends {
                    self.output.push(b'e');
                    self.write_symbol(module)?;
                }
                self.output.push(b'o');
                self.write_symbol(&object.class)?;
                self.write_user_ivars(arena, &object.ivars)?;
            }

            Node::Struct(rb_struct) => {
                self.output.push(b'S');
                self.write_symbol(&rb_struct.class)?;
                self.write_length(rb_struct.members.len())?;
                for (name, value) in &rb_struct.members {
                    self.write_symbol(name)?;
                    self.write_node(arena, *value)?;
                }
            }

            Node::Userdata(userdata) => {
                let has_ivars = userdata.has_ivars();
                if has_ivars {
                    self.output.push(b'I');
                }
                self.output.push(b'u');
                self.write_symbol(&userdata.class)?;
                self.write_byte_seq(&userdata.data)?;
                if has_ivars {
                    self.write_encoding_ivars(arena, &userdata.encoding, &userdata.ivars)?;
                }
            }

            Node::UserMarshal { class, value } => {
                self.output.push(b'U');
                self.write_symbol(class)?;
                self.write_node(arena, *value)?;
            }

            Node::Data { class, value } => {
                self.output.push(b'd');
                self.write_symbol(class)?;
                self.write_node(arena, *value)?;
            }

            Node::Module { kind, name } => {
                if !name.encoding().is_ascii_compatible() {
                    return Err(Error {
                        kind: Kind::NonAsciiModuleName(name.to_string_lossy().into_owned()),
                    });
                }
                self.output.push(match *kind {
                    ModuleKind::Class => b'c',
                    ModuleKind::Module => b'm',
                    ModuleKind::Legacy => b'M',
                });
                self.write_byte_seq(name.as_bytes())?;
            }
        }
        Ok(())
    }

    /// Emit the wrapper tags in their fixed order: `I`, then `e` per module,
    /// then `C`.
    fn write_wrappers(
        &mut self,
        ivars: bool,
        extends: &[Symbol],
        subclass: Option<&Symbol>,
    ) -> Result<()> {
        if ivars {
            self.output.push(b'I');
        }
        for module in extends {
            self.output.push(b'e');
            self.write_symbol(module)?;
        }
        if let Some(class) = subclass {
            self.output.push(b'C');
            self.write_symbol(class)?;
        }
        Ok(())
    }

    fn write_symbol(&mut self, symbol: &Symbol) -> Result<()> {
        if let Some(index) = self.symbols.get_index_of(symbol) {
            self.output.push(b';');
            self.write_length(index)?;
            return Ok(());
        }
        self.symbols.insert(symbol.clone());

        match symbol.encoding() {
            Encoding::Utf8 => {
                self.output.push(b'I');
                self.output.push(b':');
                self.write_byte_seq(symbol.as_bytes())?;
                self.write_long(1);
                self.write_symbol(&Symbol::from("E"))?;
                self.output.push(b'T');
            }
            Encoding::Other(name) => {
                self.output.push(b'I');
                self.output.push(b':');
                self.write_byte_seq(symbol.as_bytes())?;
                self.write_long(1);
                self.write_symbol(&Symbol::from("encoding"))?;
                self.write_encoding_name(name)?;
            }
            Encoding::Binary | Encoding::UsAscii => {
                self.output.push(b':');
                self.write_byte_seq(symbol.as_bytes())?;
            }
        }
        Ok(())
    }

    /// The count-prefixed ivar list of a string-like node: the encoding
    /// synthetic first, then user ivars.
    fn write_encoding_ivars(
        &mut self,
        arena: &Arena,
        encoding: &Encoding,
        fields: &RbFields,
    ) -> Result<()> {
        let synthetic = usize::from(!encoding.is_wire_default());
        self.write_length(synthetic + fields.len())?;

        match encoding {
            Encoding::Binary => {}
            Encoding::Utf8 => {
                self.write_symbol(&Symbol::from("E"))?;
                self.output.push(b'T');
            }
            Encoding::UsAscii => {
                self.write_symbol(&Symbol::from("E"))?;
                self.output.push(b'F');
            }
            Encoding::Other(name) => {
                self.write_symbol(&Symbol::from("encoding"))?;
                self.write_encoding_name(name)?;
            }
        }

        for (key, value) in fields {
            self.write_symbol(key)?;
            self.write_node(arena, *value)?;
        }
        Ok(())
    }

    fn write_user_ivars(&mut self, arena: &Arena, fields: &RbFields) -> Result<()> {
        self.write_length(fields.len())?;
        for (key, value) in fields {
            self.write_symbol(key)?;
            self.write_node(arena, *value)?;
        }
        Ok(())
    }

    /// An encoding-name string. These are real wire strings and take part in
    /// the link table, so a repeated name becomes an `@` backreference even
    /// though no node backs it.
    fn write_encoding_name(&mut self, name: &str) -> Result<()> {
        if let Some(&index) = self.encodings.get(name) {
            self.output.push(b'@');
            self.write_long(i64::from(index));
            return Ok(());
        }
        self.encodings.insert(name.to_string(), self.next_link);
        self.next_link += 1;

        self.output.push(b'"');
        self.write_byte_seq(name.as_bytes())
    }

    fn write_long(&mut self, value: i64) {
        numeric::encode_long(&mut self.output, value);
    }

    fn write_length(&mut self, length: usize) -> Result<()> {
        if length > u32::MAX as usize {
            return Err(Error {
                kind: Kind::LengthOverflow(length),
            });
        }
        self.write_long(length as i64);
        Ok(())
    }

    fn write_byte_seq(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_length(bytes.len())?;
        self.output.extend_from_slice(bytes);
        Ok(())
    }
}
