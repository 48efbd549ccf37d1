// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
use super::{RbFields, Symbol};
use crate::Encoding;

/// A ruby string.
///
/// Because strings in ruby are not guaranteed to be utf8, this stores raw
/// bytes plus the encoding classification the wire carried (or
/// [`Encoding::Binary`] when it carried none).
#[derive(PartialEq, Eq, Default, Debug, Clone)]
pub struct RbString {
    /// The raw bytes of the string.
    pub data: Vec<u8>,
    /// The encoding classification the wire carried.
    pub encoding: Encoding,
    /// Set when this is an instance of a `String` subclass (`C` wrapper).
    pub subclass: Option<Symbol>,
    /// User instance variables, in wire order. Synthetic encoding ivars are
    /// never stored here; they live in `encoding`.
    pub ivars: RbFields,
    /// Modules this string was extended with, outermost first.
    pub extends: Vec<Symbol>,
}

impl RbString {
    /// Whether this string needs an `I` wrapper on the wire.
    pub(crate) fn has_ivars(&self) -> bool {
        !self.ivars.is_empty() || !self.encoding.is_wire_default()
    }

    /// The string data, lossily decoded.
    pub fn to_string_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

impl From<&str> for RbString {
    fn from(value: &str) -> Self {
        Self {
            data: value.as_bytes().to_vec(),
            encoding: Encoding::Utf8,
            ..Default::default()
        }
    }
}

impl From<Vec<u8>> for RbString {
    fn from(data: Vec<u8>) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }
}

impl PartialEq<str> for RbString {
    fn eq(&self, other: &str) -> bool {
        self.data == other.as_bytes()
    }
}
