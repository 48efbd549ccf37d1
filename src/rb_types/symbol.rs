// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
use crate::Encoding;

/// A symbol from ruby.
///
/// Two symbols are the *same wire entity* iff their bytes and encoding
/// classification are equal; both the parser and the generator intern through
/// a table keyed this way, so [`PartialEq`]/[`Hash`] are derived over both
/// fields. Symbols are not guaranteed to be valid utf8.
#[derive(PartialEq, Eq, Hash, Default, Clone)]
pub struct Symbol {
    bytes: Vec<u8>,
    encoding: Encoding,
}

#[allow(clippy::must_use_candidate)]
impl Symbol {
    /// Build a symbol from raw bytes and an encoding classification.
    ///
    /// Binary symbols whose bytes are all ASCII are normalized to US-ASCII,
    /// matching how the wire format classifies a bare symbol.
    pub fn new(bytes: Vec<u8>, encoding: Encoding) -> Self {
        let encoding = match encoding {
            Encoding::Binary | Encoding::UsAscii if bytes.is_ascii() => Encoding::UsAscii,
            other => other,
        };
        Self { bytes, encoding }
    }

    /// The raw byte content.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn encoding(&self) -> &Encoding {
        &self.encoding
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_ivar(&self) -> bool {
        self.bytes.starts_with(b"@")
    }

    /// This symbol's name, lossily decoded for display purposes.
    pub fn to_string_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        let encoding = if value.is_ascii() {
            Encoding::UsAscii
        } else {
            Encoding::Utf8
        };
        Self {
            bytes: value.as_bytes().to_vec(),
            encoding,
        }
    }
}

impl From<String> for Symbol {
    fn from(value: String) -> Self {
        value.as_str().into()
    }
}

impl PartialEq<str> for Symbol {
    fn eq(&self, other: &str) -> bool {
        self.bytes == other.as_bytes()
    }
}

impl PartialEq<&str> for Symbol {
    fn eq(&self, other: &&str) -> bool {
        self.bytes == other.as_bytes()
    }
}

impl AsRef<[u8]> for Symbol {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Symbol")
            .field(&self.to_string_lossy())
            .field(&self.encoding)
            .finish()
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, ":{}", self.to_string_lossy())
    }
}
