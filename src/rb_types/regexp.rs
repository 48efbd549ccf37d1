// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
use super::{RbFields, Symbol};
use crate::Encoding;

/// The low three bits of a regexp's option byte, plus the modern
/// no-encoding flag.
#[derive(PartialEq, Eq, Default, Debug, Clone, Copy)]
pub struct RegexpOptions {
    /// `/i`
    pub ignorecase: bool,
    /// `/m`
    pub multiline: bool,
    /// `/x`
    pub extended: bool,
    /// `ARG_ENCODING_NONE`: the regexp was written with the `n` modifier.
    pub noencoding: bool,
}

impl RegexpOptions {
    pub(crate) const LOW_MASK: u8 = 0x07;
    pub(crate) const NOENCODING: u8 = 0x20;
    pub(crate) const FIXEDENCODING: u8 = 0x10;

    pub(crate) fn from_low_bits(bits: u8) -> Self {
        Self {
            ignorecase: bits & 0x01 != 0,
            multiline: bits & 0x02 != 0,
            extended: bits & 0x04 != 0,
            noencoding: false,
        }
    }

    pub(crate) fn low_bits(self) -> u8 {
        u8::from(self.ignorecase) | u8::from(self.multiline) << 1 | u8::from(self.extended) << 2
    }
}

/// A ruby regexp: raw source bytes, an encoding, and option flags.
///
/// `legacy` marks a regexp read from Ruby 1.8 data, where the encoding was a
/// Kanji code in the option byte instead of an encoding ivar. Such regexps
/// are re-emitted through the Kanji path.
#[derive(PartialEq, Eq, Default, Debug, Clone)]
pub struct RbRegexp {
    /// The regexp source, as raw bytes.
    pub source: Vec<u8>,
    /// The source's encoding classification.
    pub encoding: Encoding,
    /// The regexp's option flags.
    pub options: RegexpOptions,
    /// Ruby 1.8 compatibility: encoding came from a Kanji code.
    pub legacy: bool,
    /// Set when this is an instance of a `Regexp` subclass (`C` wrapper).
    pub subclass: Option<Symbol>,
    /// User instance variables, in wire order.
    pub ivars: RbFields,
    /// Modules this regexp was extended with, outermost first.
    pub extends: Vec<Symbol>,
}

impl RbRegexp {
    /// A regexp over `source` with the given options.
    pub fn new(source: Vec<u8>, options: RegexpOptions) -> Self {
        Self {
            source,
            options,
            ..Default::default()
        }
    }

    /// Whether this regexp needs an `I` wrapper: modern regexps carry their
    /// encoding as an ivar, legacy ones carry it in the option byte.
    pub(crate) fn has_ivars(&self) -> bool {
        !self.ivars.is_empty() || (!self.legacy && !self.encoding.is_wire_default())
    }

    /// Whether the modern option byte carries the fixed-encoding bit, i.e.
    /// the source is in a definite non-ASCII encoding.
    pub(crate) fn fixed_encoding(&self) -> bool {
        matches!(self.encoding, Encoding::Utf8 | Encoding::Other(_))
    }
}
