use crate::{
    collection::{CollectionRole, MemberLookup},
    types::ItemId,
};
use derive_more::Display;

///
/// SmartStep
///
/// One membership change in an inclusion/exclusion list or a trash list,
/// applied in order by the view.
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub(crate) enum SmartStep {
    #[display("add to {_0}")]
    AddTo(ItemId),
    #[display("remove from {_0}")]
    RemoveFrom(ItemId),
}

/// Steps that make `item` visible in `collection`: include it, un-exclude
/// it and take it out of the trash, which restores it in every collection
/// sharing that trash. An included item still sitting in the trash is
/// taken out of it; the plan is empty only when the item is included and
/// neither excluded nor trashed.
pub(crate) fn plan_add(
    lookup: &dyn MemberLookup,
    role: &CollectionRole,
    item: ItemId,
) -> Vec<SmartStep> {
    let CollectionRole::InclusionExclusion {
        inclusions,
        exclusions,
        trash,
        ..
    } = role
    else {
        return Vec::new();
    };

    let mut steps = Vec::new();
    if !lookup.is_member(*inclusions, item) {
        steps.push(SmartStep::AddTo(*inclusions));
    }
    if lookup.is_member(*exclusions, item) {
        steps.push(SmartStep::RemoveFrom(*exclusions));
    }
    if let Some(trash) = trash
        && lookup.is_member(*trash, item)
    {
        steps.push(SmartStep::RemoveFrom(*trash));
    }

    steps
}

/// Steps that hide `item` from `collection`. The item goes to the trash only
/// when no other collection in `sharing` (the collections using the same
/// trash) still shows it; that check is made before anything changes.
/// Nothing happens for an item the collection does not show.
pub(crate) fn plan_remove(
    lookup: &dyn MemberLookup,
    collection: ItemId,
    role: &CollectionRole,
    item: ItemId,
    sharing: &[ItemId],
) -> Vec<SmartStep> {
    let CollectionRole::InclusionExclusion {
        inclusions,
        exclusions,
        trash,
        ..
    } = role
    else {
        return Vec::new();
    };
    if !lookup.is_member(collection, item) {
        return Vec::new();
    }

    let to_trash = trash.filter(|_| {
        !sharing
            .iter()
            .any(|other| *other != collection && lookup.is_member(*other, item))
    });

    let mut steps = Vec::new();
    if !lookup.is_member(*exclusions, item) {
        steps.push(SmartStep::AddTo(*exclusions));
    }
    if lookup.is_member(*inclusions, item) {
        steps.push(SmartStep::RemoveFrom(*inclusions));
    }
    if let Some(trash) = to_trash
        && !lookup.is_member(trash, item)
    {
        steps.push(SmartStep::AddTo(trash));
    }

    steps
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Item;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Lists(HashMap<ItemId, Vec<ItemId>>);

    impl MemberLookup for Lists {
        fn is_member(&self, collection: ItemId, item: ItemId) -> bool {
            self.0.get(&collection).is_some_and(|m| m.contains(&item))
        }

        fn members(&self, collection: ItemId) -> Vec<ItemId> {
            self.0.get(&collection).cloned().unwrap_or_default()
        }

        fn item(&self, _: ItemId) -> Option<&Item> {
            None
        }

        fn items_of_kind(&self, _: &str) -> Vec<ItemId> {
            Vec::new()
        }
    }

    fn id(n: u128) -> ItemId {
        ItemId::from_parts(4, n)
    }

    const X: u128 = 10;
    const Y: u128 = 20;
    const TRASH: u128 = 30;
    const ITEM: u128 = 1;

    fn role(owner: u128) -> CollectionRole {
        CollectionRole::InclusionExclusion {
            base: None,
            inclusions: id(owner + 1),
            exclusions: id(owner + 2),
            trash: Some(id(TRASH)),
        }
    }

    #[test]
    fn add_of_included_item_is_a_no_op() {
        let mut lists = Lists::default();
        lists.0.insert(id(X + 1), vec![id(ITEM)]);

        assert!(plan_add(&lists, &role(X), id(ITEM)).is_empty());
    }

    #[test]
    fn add_restores_from_exclusions_and_trash() {
        let mut lists = Lists::default();
        lists.0.insert(id(X + 2), vec![id(ITEM)]);
        lists.0.insert(id(TRASH), vec![id(ITEM)]);

        assert_eq!(
            plan_add(&lists, &role(X), id(ITEM)),
            vec![
                SmartStep::AddTo(id(X + 1)),
                SmartStep::RemoveFrom(id(X + 2)),
                SmartStep::RemoveFrom(id(TRASH)),
            ]
        );
    }

    #[test]
    fn remove_trashes_only_when_nobody_else_shows_the_item() {
        let mut lists = Lists::default();
        lists.0.insert(id(X), vec![id(ITEM)]);
        lists.0.insert(id(X + 1), vec![id(ITEM)]);
        let sharing = [id(X), id(Y)];

        let steps = plan_remove(&lists, id(X), &role(X), id(ITEM), &sharing);
        assert_eq!(
            steps,
            vec![
                SmartStep::AddTo(id(X + 2)),
                SmartStep::RemoveFrom(id(X + 1)),
                SmartStep::AddTo(id(TRASH)),
            ]
        );

        lists.0.insert(id(Y), vec![id(ITEM)]);
        let steps = plan_remove(&lists, id(X), &role(X), id(ITEM), &sharing);
        assert!(!steps.contains(&SmartStep::AddTo(id(TRASH))));
    }

    #[test]
    fn remove_of_invisible_item_does_nothing() {
        let lists = Lists::default();

        assert!(plan_remove(&lists, id(Y), &role(Y), id(ITEM), &[id(X), id(Y)]).is_empty());
    }
}
