use crate::types::ItemId;
use serde::{Deserialize, Serialize};
use std::fmt;

///
/// ItemRef
///
/// Opaque handle to an item stored inside a collection value.
/// This is an *identity type*: it is never dereferenced directly, only
/// resolved through the view that owns the item.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ItemRef(ItemId);

impl ItemRef {
    #[must_use]
    pub const fn new(id: ItemId) -> Self {
        Self(id)
    }

    /// Identity of the referenced item.
    #[must_use]
    pub const fn id(self) -> ItemId {
        self.0
    }
}

impl From<ItemId> for ItemRef {
    fn from(id: ItemId) -> Self {
        Self(id)
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref({})", self.0)
    }
}
