// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
#![allow(missing_docs)]

/// Type alias around a result.
pub type Result<T> = std::result::Result<T, Error>;

/// A generation error: the value graph itself is malformed. Well-formed
/// graphs always serialize.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    #[source]
    pub kind: Kind,
}

/// Error type for serialization.
#[derive(Debug, thiserror::Error)]
pub enum Kind {
    /// A node id that does not resolve within the document's arena.
    #[error("Node id {0} does not exist in this arena")]
    DanglingNode(u32),
    /// A collection or byte sequence longer than the wire's 32-bit lengths.
    #[error("Length {0} exceeds the format's 32-bit limit")]
    LengthOverflow(usize),
    /// A class or module reference whose name has no ASCII-compatible
    /// representation; the raw-name wire forms cannot carry one.
    #[error("Module name is not ASCII-compatible: {0:?}")]
    NonAsciiModuleName(String),
}

impl From<Kind> for Error {
    fn from(kind: Kind) -> Self {
        Error { kind }
    }
}
