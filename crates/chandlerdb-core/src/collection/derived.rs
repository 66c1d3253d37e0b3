use crate::{collection::CollectionRole, item::Item, types::ItemId};
use indexmap::IndexSet;

///
/// MemberLookup
///
/// Read access a role needs to evaluate membership: other collections'
/// members and the items themselves.
///

pub(crate) trait MemberLookup {
    fn is_member(&self, collection: ItemId, item: ItemId) -> bool;

    /// Members of `collection` in collection order; empty when unknown.
    fn members(&self, collection: ItemId) -> Vec<ItemId>;

    fn item(&self, item: ItemId) -> Option<&Item>;

    /// Materialized items of `kind`, oldest first.
    fn items_of_kind(&self, kind: &str) -> Vec<ItemId>;
}

impl CollectionRole {
    /// Whether `item` belongs in a collection of this role given the current
    /// state of its sources. `List` membership is explicit, so it answers
    /// with `current`.
    pub(crate) fn admits(&self, lookup: &dyn MemberLookup, item: ItemId, current: bool) -> bool {
        match self {
            Self::List => current,
            Self::Kind { kind } => lookup.item(item).is_some_and(|i| i.kind() == kind),
            Self::Union { sources } => sources.iter().any(|s| lookup.is_member(*s, item)),
            Self::Intersection { sources } => {
                !sources.is_empty() && sources.iter().all(|s| lookup.is_member(*s, item))
            }
            Self::Difference { sources } => match sources.as_slice() {
                [a, b] => lookup.is_member(*a, item) && !lookup.is_member(*b, item),
                _ => false,
            },
            Self::Filtered {
                source, predicate, ..
            } => {
                lookup.is_member(*source, item)
                    && lookup.item(item).is_some_and(|i| predicate(i))
            }
            Self::InclusionExclusion {
                base,
                inclusions,
                exclusions,
                trash,
            } => {
                let ruled_in = base.is_some_and(|b| lookup.is_member(b, item))
                    || lookup.is_member(*inclusions, item);
                let ruled_out = lookup.is_member(*exclusions, item)
                    || trash.is_some_and(|t| lookup.is_member(t, item));

                ruled_in && !ruled_out
            }
            Self::Selection { source, .. } => lookup.is_member(*source, item),
        }
    }

    /// Full membership in rebuild order: candidates are walked source by
    /// source, in each source's own order. `current` is the collection's
    /// existing membership, kept as-is for `List`.
    pub(crate) fn compute(&self, lookup: &dyn MemberLookup, current: &[ItemId]) -> Vec<ItemId> {
        let candidates: IndexSet<ItemId> = match self {
            Self::List => return current.to_vec(),
            Self::Kind { kind } => return lookup.items_of_kind(kind),
            Self::Intersection { sources } | Self::Difference { sources } => sources
                .first()
                .map(|s| lookup.members(*s))
                .unwrap_or_default()
                .into_iter()
                .collect(),
            _ => self
                .sources()
                .into_iter()
                .flat_map(|s| lookup.members(s))
                .collect(),
        };

        candidates
            .into_iter()
            .filter(|item| self.admits(lookup, *item, false))
            .collect()
    }
}

///
/// TESTS
///
