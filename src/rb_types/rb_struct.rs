// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
use super::Symbol;
use crate::value::NodeId;

/// A ruby `Struct` (or `Data`) instance: a class name and its members in
/// declaration order.
#[derive(PartialEq, Eq, Default, Debug, Clone)]
pub struct RbStruct {
    /// The class of this struct.
    pub class: Symbol,
    /// The members, as (name, value) pairs in wire order.
    pub members: Vec<(Symbol, NodeId)>,
}

impl RbStruct {
    /// A struct of `class` with the given members.
    pub fn new(class: impl Into<Symbol>, members: Vec<(Symbol, NodeId)>) -> Self {
        Self {
            class: class.into(),
            members,
        }
    }
}
