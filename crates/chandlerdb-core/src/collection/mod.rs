//! Item collections.
//!
//! A collection is an item exposing one collection attribute. Its members are
//! kept in a [`LinkedMap`] in collection order together with any secondary
//! indexes. Explicit collections (`List`) hold what callers put in them;
//! every other role derives its members from sources and keeps them current
//! as those sources change.

mod derived;
mod selection;
mod smart;

#[cfg(test)]
mod tests;

use crate::{
    error::ErrorClass,
    index::Indexes,
    item::Item,
    notify::Subscriber,
    types::{ItemId, ItemRef},
    util::LinkedMap,
};
use indexmap::IndexSet;
use std::{fmt, sync::Arc};
use thiserror::Error as ThisError;

// re-exports
pub(crate) use derived::MemberLookup;
pub use selection::{ADHOC_INDEX, SECONDARY_SORT_ATTRIBUTE, selection_index_spec};
pub(crate) use selection::single_positions;
pub(crate) use smart::{SmartStep, plan_add, plan_remove};

///
/// CollectionError
///

#[derive(Debug, ThisError)]
pub enum CollectionError {
    #[error("{role} collection {collection} does not support {operation}")]
    NotImplemented {
        collection: ItemId,
        role: &'static str,
        operation: &'static str,
    },

    #[error("no such collection: {collection}")]
    NoSuchCollection { collection: ItemId },

    #[error("no such item: {item}")]
    NoSuchItem { item: ItemId },

    #[error("difference collection {collection} needs exactly 2 sources, got {got}")]
    DifferenceArity { collection: ItemId, got: usize },

    #[error("collection {collection} cannot subscribe to itself")]
    SelfSubscription { collection: ItemId },

    #[error("making {source_id} a source of {collection} would create a cycle")]
    Cycle {
        collection: ItemId,
        source_id: ItemId,
    },
}

impl CollectionError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::NotImplemented { .. } => ErrorClass::Unsupported,
            Self::NoSuchCollection { .. } | Self::NoSuchItem { .. } => ErrorClass::NotFound,
            Self::DifferenceArity { .. } | Self::SelfSubscription { .. } => ErrorClass::Usage,
            Self::Cycle { .. } => ErrorClass::Conflict,
        }
    }
}

/// Membership test used by filtered collections.
pub type ItemPredicate = Arc<dyn Fn(&Item) -> bool>;

///
/// CollectionRole
///

#[derive(Clone)]
pub enum CollectionRole {
    /// Members are exactly what was added.
    List,
    /// Every materialized item of `kind`.
    Kind { kind: String },
    Union { sources: Vec<ItemId> },
    Intersection { sources: Vec<ItemId> },
    /// `sources[0]` minus `sources[1]`.
    Difference { sources: Vec<ItemId> },
    /// Members of `source` for which `predicate` holds. `attributes` names
    /// what the predicate reads; changes to them re-test the item.
    Filtered {
        source: ItemId,
        predicate: ItemPredicate,
        attributes: Vec<String>,
    },
    /// `(base ∪ inclusions) − exclusions − trash`. `inclusions` and
    /// `exclusions` are list collections owned by this one; `trash` may be
    /// shared between several of these.
    InclusionExclusion {
        base: Option<ItemId>,
        inclusions: ItemId,
        exclusions: ItemId,
        trash: Option<ItemId>,
    },
    /// All members of `source`, viewed through `index_name` with a selection.
    Selection { source: ItemId, index_name: String },
}

impl CollectionRole {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Kind { .. } => "kind",
            Self::Union { .. } => "union",
            Self::Intersection { .. } => "intersection",
            Self::Difference { .. } => "difference",
            Self::Filtered { .. } => "filtered",
            Self::InclusionExclusion { .. } => "inclusion_exclusion",
            Self::Selection { .. } => "selection",
        }
    }

    /// Kind name of the item that carries a collection of this role.
    #[must_use]
    pub const fn item_kind(&self) -> &'static str {
        match self {
            Self::List => "ListCollection",
            Self::Kind { .. } => "KindCollection",
            Self::Union { .. } => "UnionCollection",
            Self::Intersection { .. } => "IntersectionCollection",
            Self::Difference { .. } => "DifferenceCollection",
            Self::Filtered { .. } => "FilteredCollection",
            Self::InclusionExclusion { .. } => "SmartCollection",
            Self::Selection { .. } => "IndexedSelectionCollection",
        }
    }

    /// Name of the attribute exposing the members.
    #[must_use]
    pub const fn attribute(&self) -> &'static str {
        match self {
            Self::List => "refCollection",
            _ => "set",
        }
    }

    /// Collections this one must be subscribed to, in source order.
    #[must_use]
    pub fn sources(&self) -> Vec<ItemId> {
        match self {
            Self::List | Self::Kind { .. } => Vec::new(),
            Self::Union { sources }
            | Self::Intersection { sources }
            | Self::Difference { sources } => sources.clone(),
            Self::Filtered { source, .. } | Self::Selection { source, .. } => vec![*source],
            Self::InclusionExclusion {
                base,
                inclusions,
                exclusions,
                trash,
            } => base
                .iter()
                .chain([inclusions, exclusions])
                .chain(trash.iter())
                .copied()
                .collect(),
        }
    }

    #[must_use]
    pub const fn is_derived(&self) -> bool {
        !matches!(self, Self::List | Self::Kind { .. })
    }
}

impl fmt::Debug for CollectionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filtered {
                source, attributes, ..
            } => f
                .debug_struct("Filtered")
                .field("source", source)
                .field("attributes", attributes)
                .finish_non_exhaustive(),
            Self::List => write!(f, "List"),
            Self::Kind { kind } => f.debug_struct("Kind").field("kind", kind).finish(),
            Self::Union { sources } => f.debug_struct("Union").field("sources", sources).finish(),
            Self::Intersection { sources } => f
                .debug_struct("Intersection")
                .field("sources", sources)
                .finish(),
            Self::Difference { sources } => f
                .debug_struct("Difference")
                .field("sources", sources)
                .finish(),
            Self::InclusionExclusion {
                base,
                inclusions,
                exclusions,
                trash,
            } => f
                .debug_struct("InclusionExclusion")
                .field("base", base)
                .field("inclusions", inclusions)
                .field("exclusions", exclusions)
                .field("trash", trash)
                .finish(),
            Self::Selection { source, index_name } => f
                .debug_struct("Selection")
                .field("source", source)
                .field("index_name", index_name)
                .finish(),
        }
    }
}

///
/// LoadState
///
/// While a collection is loading, indexes added to it are built on first
/// use instead of immediately. Monitors are registered either way.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LoadState {
    #[default]
    Ready,
    Loading,
}

///
/// Collection
///

#[derive(Debug)]
pub struct Collection {
    id: ItemId,
    role: CollectionRole,
    pub(crate) members: LinkedMap<ItemId, ItemRef>,
    pub(crate) indexes: Indexes,
    pub(crate) subscribers: IndexSet<Subscriber>,
    pub(crate) dirty: bool,
    pub(crate) load_state: LoadState,
}

impl Collection {
    pub(crate) fn new(id: ItemId, role: CollectionRole) -> Self {
        Self {
            id,
            role,
            members: LinkedMap::new(),
            indexes: Indexes::new(id.to_string()),
            subscribers: IndexSet::new(),
            dirty: true,
            load_state: LoadState::Ready,
        }
    }

    #[must_use]
    pub const fn id(&self) -> ItemId {
        self.id
    }

    #[must_use]
    pub const fn role(&self) -> &CollectionRole {
        &self.role
    }

    pub(crate) fn set_role(&mut self, role: CollectionRole) {
        self.role = role;
    }

    #[must_use]
    pub const fn attribute(&self) -> &'static str {
        self.role.attribute()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[must_use]
    pub fn contains(&self, item: ItemId) -> bool {
        self.members.contains_key(&item)
    }

    /// Members in collection order.
    pub fn iter(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.members.keys()
    }

    #[must_use]
    pub fn member_ids(&self) -> Vec<ItemId> {
        self.members.keys().collect()
    }

    #[must_use]
    pub const fn indexes(&self) -> &Indexes {
        &self.indexes
    }

    pub fn subscribers(&self) -> impl Iterator<Item = Subscriber> + '_ {
        self.subscribers.iter().copied()
    }

    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub const fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub(crate) fn not_implemented(&self, operation: &'static str) -> CollectionError {
        CollectionError::NotImplemented {
            collection: self.id,
            role: self.role.label(),
            operation,
        }
    }
}
