// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
use super::{RbFields, Symbol};
use crate::Encoding;

/// An object serialized by `_dump`.
///
/// The payload is opaque: whatever bytes the class's `_dump` produced. Real
/// dumps attach ivars to these (`Time` stores its offset and zone this way),
/// so the ivar list and encoding are preserved too.
#[derive(PartialEq, Eq, Default, Debug, Clone)]
pub struct Userdata {
    /// The class of this object.
    pub class: Symbol,
    /// The opaque `_dump` payload.
    pub data: Vec<u8>,
    /// The encoding classification of the payload.
    pub encoding: Encoding,
    /// Instance variables attached to the payload, in wire order.
    pub ivars: RbFields,
}

impl Userdata {
    /// A `_dump` payload for `class`.
    pub fn new(class: impl Into<Symbol>, data: Vec<u8>) -> Self {
        Self {
            class: class.into(),
            data,
            ..Default::default()
        }
    }

    pub(crate) fn has_ivars(&self) -> bool {
        !self.ivars.is_empty() || !self.encoding.is_wire_default()
    }
}
