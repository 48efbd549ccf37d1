// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
use super::{RbFields, Symbol};
use crate::value::NodeId;

/// A ruby array. Elements are node ids into the owning arena.
#[derive(PartialEq, Eq, Default, Debug, Clone)]
pub struct RbArray {
    /// The elements, in order.
    pub elements: Vec<NodeId>,
    /// Set when this is an instance of an `Array` subclass (`C` wrapper).
    pub subclass: Option<Symbol>,
    /// User instance variables, in wire order.
    pub ivars: RbFields,
    /// Modules this array was extended with, outermost first.
    pub extends: Vec<Symbol>,
}

impl RbArray {
    /// A plain array of `elements`.
    pub fn new(elements: Vec<NodeId>) -> Self {
        Self {
            elements,
            ..Default::default()
        }
    }

    pub(crate) fn has_ivars(&self) -> bool {
        !self.ivars.is_empty()
    }
}

/// A ruby hash.
///
/// Pairs are kept as an ordered sequence rather than a map: wire order is
/// significant and keys may be arbitrary (even shared or cyclic) nodes.
#[derive(PartialEq, Eq, Default, Debug, Clone)]
pub struct RbHash {
    /// The (key, value) pairs, in wire order.
    pub pairs: Vec<(NodeId, NodeId)>,
    /// The hash default value, making this a `}` rather than `{` on the wire.
    pub default: Option<NodeId>,
    /// Set when this is an instance of a `Hash` subclass (`C` wrapper).
    pub subclass: Option<Symbol>,
    /// User instance variables, in wire order.
    pub ivars: RbFields,
    /// Modules this hash was extended with, outermost first.
    pub extends: Vec<Symbol>,
    /// The `K` synthetic ivar: this hash was flagged by `ruby2_keywords`.
    pub ruby2_keywords: bool,
}

impl RbHash {
    /// A plain hash of `pairs`.
    pub fn new(pairs: Vec<(NodeId, NodeId)>) -> Self {
        Self {
            pairs,
            ..Default::default()
        }
    }

    pub(crate) fn has_ivars(&self) -> bool {
        !self.ivars.is_empty() || self.ruby2_keywords
    }
}
