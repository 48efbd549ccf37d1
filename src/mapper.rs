// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The seam between the value graph and a host language's native values.
//!
//! The codec itself never calls this; applications plug a mapper in between
//! [`crate::load`] and their own types. "No mapping" is an ordinary outcome
//! of a dispatch-table lookup, so both operations return [`Option`] rather
//! than an error.

use crate::value::{Arena, NodeId};

/// A pluggable translation table between wire-level nodes and host values.
pub trait Mapper {
    /// The host value type this mapper translates.
    type Host;

    /// Produce a node for `host`, or `None` when this mapper has no rule
    /// for it.
    fn node_from_host(&self, host: &Self::Host, arena: &mut Arena) -> Option<NodeId>;

    /// Produce a host value for the node at `id`, or `None` when this mapper
    /// has no rule for it.
    fn host_from_node(&self, arena: &Arena, id: NodeId) -> Option<Self::Host>;
}
