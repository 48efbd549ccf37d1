// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The in-memory value graph.
//!
//! Marshal data can share nodes and even contain cycles, and two
//! equal-valued floats or bignums are *distinct* wire objects. Plain owned
//! enums cannot express either, so nodes live in an [`Arena`] and reference
//! each other through stable [`NodeId`] indices assigned at construction.
//! Identity for backreference purposes is node id identity, never value
//! equality.

use num_bigint::BigInt;

use crate::{
    numeric,
    rb_types::{RbArray, RbHash, RbObject, RbRegexp, RbString, RbStruct, Symbol, Userdata},
};

/// A stable index for a node within its [`Arena`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// The arena slot this id points at.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which of the three module-ish wire tags a [`Node::Module`] came from.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ModuleKind {
    /// `c`
    Class,
    /// `m`
    Module,
    /// `M`, emitted by Ruby 1.8 when it could not tell the two apart.
    Legacy,
}

/// An enum representing any ruby value.
///
/// Similar to `serde_json::Value`, although much more nuanced. Child values
/// are [`NodeId`]s into the arena the node lives in.
#[derive(Default, Clone, enum_as_inner::EnumAsInner, Debug, PartialEq)]
pub enum Node {
    /// A value equivalent to nil in ruby (or [`()`] in rust.)
    #[default]
    Nil,
    /// A boolean value.
    Bool(bool),
    /// An integer. Values outside the Fixnum range are bignum-class wire
    /// objects and participate in the link table.
    Integer(BigInt),
    /// A float value. Always a distinct heap object in ruby, so always link
    /// eligible, even when numerically equal to another float.
    Float(f64),
    /// A symbol. Interned by (bytes, encoding), never link eligible.
    Symbol(Symbol),
    /// A generic ruby object.
    Object(RbObject),
    /// An array of values.
    Array(RbArray),
    /// Equivalent to a Hash in Ruby.
    Hash(RbHash),
    /// A ruby string.
    String(RbString),
    /// Equivalent to a `Regexp` in Ruby.
    Regexp(RbRegexp),
    /// An object serialized via `marshal_dump`, with a value payload.
    UserMarshal {
        /// The class of the original object.
        class: Symbol,
        /// Whatever `marshal_dump` returned.
        value: NodeId,
    },
    /// An object serialized via `_dump`, with a byte payload.
    Userdata(Userdata),
    /// A C-extension object serialized via `_dump_data`.
    Data {
        /// The class of the data.
        class: Symbol,
        /// Whatever `_dump_data` returned.
        value: NodeId,
    },
    /// Equivalent to a `Struct` in Ruby.
    Struct(RbStruct),
    /// A class or module reference. The name must be representable in an
    /// ASCII-compatible encoding; that is a format limitation.
    Module {
        /// Which wire tag the reference uses.
        kind: ModuleKind,
        /// The full constant path, e.g. `Foo::Bar`.
        name: Symbol,
    },
}

impl Node {
    /// Whether this node occupies a slot in the link (backreference) table.
    ///
    /// Nil, booleans, short-form integers and symbols are always re-encoded
    /// in full; everything else is registered in first-visit order.
    pub fn is_link_eligible(&self) -> bool {
        match self {
            Node::Nil | Node::Bool(_) | Node::Symbol(_) => false,
            Node::Integer(v) => !numeric::fits_fixnum(v),
            _ => true,
        }
    }
}

/// Owns every node of one or more value graphs.
#[derive(Default, Debug, Clone)]
pub struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, returning its id.
    pub fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Look up a node. Returns `None` for ids from a different arena.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Replace the node at `id`. Used to tie cycles: allocate a placeholder,
    /// reference its id, then set the real node.
    ///
    /// Returns `false` (leaving the arena untouched) for ids from a
    /// different arena.
    pub fn set(&mut self, id: NodeId, node: Node) -> bool {
        match self.nodes.get_mut(id.index()) {
            Some(slot) => {
                *slot = node;
                true
            }
            None => false,
        }
    }

    /// The number of nodes allocated so far.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no nodes have been allocated.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// One top-level value: an arena plus the root node id.
#[derive(Debug, Clone)]
pub struct Document {
    /// The nodes of this value graph.
    pub arena: Arena,
    /// The top-level node.
    pub root: NodeId,
}

impl Document {
    #[must_use]
    pub fn new(arena: Arena, root: NodeId) -> Self {
        Self { arena, root }
    }

    /// Build a document out of a single node. Handy for leaves.
    #[must_use]
    pub fn leaf(node: Node) -> Self {
        let mut arena = Arena::new();
        let root = arena.alloc(node);
        Self { arena, root }
    }

    /// Deep structural equality between two documents.
    ///
    /// Symbols compare by bytes and encoding, floats bit-exactly (so NaN
    /// round-trips), and shared/cyclic structure is handled by memoizing id
    /// pairs. Two documents with distinct-but-equal float nodes still
    /// compare equal here; identity only matters on the wire.
    #[must_use]
    pub fn graph_eq(&self, other: &Document) -> bool {
        let mut seen = std::collections::HashSet::new();
        eq_ids(&self.arena, &other.arena, self.root, other.root, &mut seen)
    }
}

fn eq_ids(
    a: &Arena,
    b: &Arena,
    x: NodeId,
    y: NodeId,
    seen: &mut std::collections::HashSet<(u32, u32)>,
) -> bool {
    if !seen.insert((x.0, y.0)) {
        // Already being compared further up the stack; assume equal to let
        // cycles terminate. A mismatch will surface elsewhere if they differ.
        return true;
    }
    let (Some(na), Some(nb)) = (a.get(x), b.get(y)) else {
        return false;
    };
    let fields_eq = |fa: &crate::rb_types::RbFields, fb: &crate::rb_types::RbFields, seen: &mut _| {
        fa.len() == fb.len()
            && fa
                .iter()
                .zip(fb.iter())
                .all(|((ka, va), (kb, vb))| ka == kb && eq_ids(a, b, *va, *vb, seen))
    };
    match (na, nb) {
        (Node::Nil, Node::Nil) => true,
        (Node::Bool(va), Node::Bool(vb)) => va == vb,
        (Node::Integer(va), Node::Integer(vb)) => va == vb,
        (Node::Float(va), Node::Float(vb)) => va.to_bits() == vb.to_bits(),
        (Node::Symbol(sa), Node::Symbol(sb)) => sa == sb,
        (Node::Object(oa), Node::Object(ob)) => {
            oa.class == ob.class && oa.extends == ob.extends && fields_eq(&oa.ivars, &ob.ivars, seen)
        }
        (Node::Array(aa), Node::Array(ab)) => {
            aa.subclass == ab.subclass
                && aa.extends == ab.extends
                && aa.elements.len() == ab.elements.len()
                && fields_eq(&aa.ivars, &ab.ivars, seen)
                && aa
                    .elements
                    .iter()
                    .zip(&ab.elements)
                    .all(|(ea, eb)| eq_ids(a, b, *ea, *eb, seen))
        }
        (Node::Hash(ha), Node::Hash(hb)) => {
            ha.subclass == hb.subclass
                && ha.extends == hb.extends
                && ha.ruby2_keywords == hb.ruby2_keywords
                && ha.pairs.len() == hb.pairs.len()
                && fields_eq(&ha.ivars, &hb.ivars, seen)
                && match (ha.default, hb.default) {
                    (None, None) => true,
                    (Some(da), Some(db)) => eq_ids(a, b, da, db, seen),
                    _ => false,
                }
                && ha
                    .pairs
                    .iter()
                    .zip(&hb.pairs)
                    .all(|((ka, va), (kb, vb))| {
                        eq_ids(a, b, *ka, *kb, seen) && eq_ids(a, b, *va, *vb, seen)
                    })
        }
        (Node::String(sa), Node::String(sb)) => {
            sa.data == sb.data
                && sa.encoding == sb.encoding
                && sa.subclass == sb.subclass
                && sa.extends == sb.extends
                && fields_eq(&sa.ivars, &sb.ivars, seen)
        }
        (Node::Regexp(ra), Node::Regexp(rb)) => {
            ra.source == rb.source
                && ra.encoding == rb.encoding
                && ra.options == rb.options
                && ra.legacy == rb.legacy
                && ra.subclass == rb.subclass
                && ra.extends == rb.extends
                && fields_eq(&ra.ivars, &rb.ivars, seen)
        }
        (
            Node::UserMarshal { class: ca, value: va },
            Node::UserMarshal { class: cb, value: vb },
        ) => ca == cb && eq_ids(a, b, *va, *vb, seen),
        (Node::Userdata(ua), Node::Userdata(ub)) => {
            ua.class == ub.class
                && ua.data == ub.data
                && ua.encoding == ub.encoding
                && fields_eq(&ua.ivars, &ub.ivars, seen)
        }
        (Node::Data { class: ca, value: va }, Node::Data { class: cb, value: vb }) => {
            ca == cb && eq_ids(a, b, *va, *vb, seen)
        }
        (Node::Struct(sa), Node::Struct(sb)) => {
            sa.class == sb.class
                && sa.members.len() == sb.members.len()
                && sa
                    .members
                    .iter()
                    .zip(&sb.members)
                    .all(|((ka, va), (kb, vb))| ka == kb && eq_ids(a, b, *va, *vb, seen))
        }
        (Node::Module { kind: ka, name: na }, Node::Module { kind: kb, name: nb }) => {
            ka == kb && na == nb
        }
        _ => false,
    }
}
