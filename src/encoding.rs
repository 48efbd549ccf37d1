// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Encoding classification for strings, symbols and regexps.
//!
//! Marshal only ever records three things about an encoding: the `E` short
//! form (true for UTF-8, false for US-ASCII), an explicit `encoding` ivar
//! naming it, or nothing at all (ASCII-8BIT). Everything beyond that - "are
//! these bytes well formed", "is this encoding ASCII compatible" - is
//! delegated to [`encoding_rs`].

/// The encoding classification of a string, symbol or regexp source.
///
/// [`Encoding::Binary`] (Ruby's ASCII-8BIT) is the wire default and is never
/// named explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    /// ASCII-8BIT, the default. Signalled by the absence of an encoding ivar.
    #[default]
    Binary,
    /// UTF-8, signalled by the `E` ivar paired with `true`.
    Utf8,
    /// US-ASCII, signalled by the `E` ivar paired with `false`.
    UsAscii,
    /// Any other encoding, signalled by the `encoding` ivar naming it.
    Other(String),
}

impl Encoding {
    /// The canonical name Ruby uses for this encoding.
    pub fn name(&self) -> &str {
        match self {
            Encoding::Binary => "ASCII-8BIT",
            Encoding::Utf8 => "UTF-8",
            Encoding::UsAscii => "US-ASCII",
            Encoding::Other(name) => name,
        }
    }

    /// Whether the wire format needs an encoding ivar for this encoding.
    pub fn is_wire_default(&self) -> bool {
        matches!(self, Encoding::Binary)
    }

    /// Whether bytes below 0x80 always mean their ASCII character.
    ///
    /// Unknown named encodings are assumed compatible; the registry is a
    /// collaborator, not an authority, for names it cannot resolve.
    pub fn is_ascii_compatible(&self) -> bool {
        match self {
            Encoding::Binary | Encoding::Utf8 | Encoding::UsAscii => true,
            Encoding::Other(name) => encoding_rs::Encoding::for_label(name.as_bytes())
                .map_or(true, encoding_rs::Encoding::is_ascii_compatible),
        }
    }

    /// Whether `bytes` form a well-formed sequence under this encoding.
    pub fn validate(&self, bytes: &[u8]) -> bool {
        match self {
            Encoding::Binary => true,
            Encoding::Utf8 => std::str::from_utf8(bytes).is_ok(),
            Encoding::UsAscii => bytes.is_ascii(),
            Encoding::Other(name) => {
                match encoding_rs::Encoding::for_label(name.as_bytes()) {
                    Some(enc) => enc
                        .decode_without_bom_handling_and_without_replacement(bytes)
                        .is_some(),
                    // Not an encoding_rs label; accept as-is.
                    None => true,
                }
            }
        }
    }
}

/// The historical Ruby 1.8 Kanji codes, carried in the upper bits of a
/// regexp's option byte when no encoding ivar is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KanjiCode {
    None,
    EucJp,
    ShiftJis,
    Utf8,
}

impl KanjiCode {
    pub(crate) const MASK: u8 = 0x70;

    pub(crate) fn from_bits(bits: u8) -> Option<KanjiCode> {
        match bits {
            0x10 => Some(KanjiCode::None),
            0x20 => Some(KanjiCode::EucJp),
            0x30 => Some(KanjiCode::ShiftJis),
            0x40 => Some(KanjiCode::Utf8),
            _ => None,
        }
    }

    pub(crate) fn bits(self) -> u8 {
        match self {
            KanjiCode::None => 0x10,
            KanjiCode::EucJp => 0x20,
            KanjiCode::ShiftJis => 0x30,
            KanjiCode::Utf8 => 0x40,
        }
    }

    /// The encoding a 1.8 regexp with this code carries.
    pub(crate) fn encoding(self) -> Encoding {
        match self {
            KanjiCode::None => Encoding::Binary,
            KanjiCode::EucJp => Encoding::Other("EUC-JP".to_string()),
            KanjiCode::ShiftJis => Encoding::Other("Shift_JIS".to_string()),
            KanjiCode::Utf8 => Encoding::Utf8,
        }
    }

    pub(crate) fn for_encoding(encoding: &Encoding) -> Option<KanjiCode> {
        match encoding {
            Encoding::Binary | Encoding::UsAscii => Some(KanjiCode::None),
            Encoding::Utf8 => Some(KanjiCode::Utf8),
            Encoding::Other(name) if name == "EUC-JP" => Some(KanjiCode::EucJp),
            Encoding::Other(name) if name == "Shift_JIS" => Some(KanjiCode::ShiftJis),
            Encoding::Other(_) => None,
        }
    }
}
