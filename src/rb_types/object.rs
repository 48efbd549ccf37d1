// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
use super::{RbFields, Symbol};

/// A generic ruby object: a class name plus its instance variables.
///
/// Unlike every other composite, an object's ivars live inside the `o` tag's
/// own payload and never use the `I` wrapper.
#[derive(PartialEq, Eq, Default, Debug, Clone)]
pub struct RbObject {
    /// This object's class.
    pub class: Symbol,
    /// The instance variables on this object, in wire order.
    pub ivars: RbFields,
    /// Modules this object was extended with, outermost first.
    pub extends: Vec<Symbol>,
}

impl RbObject {
    /// An object of `class` with no ivars yet.
    pub fn new(class: impl Into<Symbol>) -> Self {
        Self {
            class: class.into(),
            ivars: RbFields::new(),
            extends: Vec::new(),
        }
    }
}
