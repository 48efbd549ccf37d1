// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
use crate::value::NodeId;
use indexmap::IndexMap;

mod collections;
mod object;
mod rb_string;
mod rb_struct;
mod regexp;
mod symbol;
mod userdata;

pub use collections::{RbArray, RbHash};
pub use object::RbObject;
pub use rb_string::RbString;
pub use rb_struct::RbStruct;
pub use regexp::{RbRegexp, RegexpOptions};
pub use symbol::Symbol;
pub use userdata::Userdata;

/// A type alias used to represent the instance variables of a node.
/// Keys are [`Symbol`]s like in ruby; insertion order is wire order.
pub type RbFields = IndexMap<Symbol, NodeId>;
