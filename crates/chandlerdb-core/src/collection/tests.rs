use crate::{
    collection::{Collection, CollectionError, CollectionRole, MemberLookup, SmartStep, plan_add},
    error::{ErrorClass, InternalError},
    item::Item,
    types::ItemId,
};
use std::collections::HashMap;

///
/// Lists
/// Membership table standing in for the view.
///

#[derive(Default)]
struct Lists(HashMap<ItemId, Vec<ItemId>>);

impl MemberLookup for Lists {
    fn is_member(&self, collection: ItemId, item: ItemId) -> bool {
        self.0.get(&collection).is_some_and(|m| m.contains(&item))
    }

    fn members(&self, collection: ItemId) -> Vec<ItemId> {
        self.0.get(&collection).cloned().unwrap_or_default()
    }

    fn item(&self, _item: ItemId) -> Option<&Item> {
        None
    }

    fn items_of_kind(&self, _kind: &str) -> Vec<ItemId> {
        Vec::new()
    }
}

fn id(n: u128) -> ItemId {
    ItemId::from_parts(2, n)
}

#[test]
fn inclusion_exclusion_sources_skip_absent_parts() {
    let role = CollectionRole::InclusionExclusion {
        base: None,
        inclusions: id(1),
        exclusions: id(2),
        trash: Some(id(3)),
    };

    assert_eq!(role.sources(), vec![id(1), id(2), id(3)]);
    assert!(role.is_derived());
    assert_eq!(role.item_kind(), "SmartCollection");
}

#[test]
fn adding_an_included_item_still_takes_it_out_of_trash() {
    let role = CollectionRole::InclusionExclusion {
        base: None,
        inclusions: id(1),
        exclusions: id(2),
        trash: Some(id(3)),
    };
    let item = id(9);
    let mut lists = Lists::default();
    lists.0.insert(id(1), vec![item]);
    lists.0.insert(id(3), vec![item]);

    assert_eq!(plan_add(&lists, &role, item), vec![SmartStep::RemoveFrom(id(3))]);

    lists.0.remove(&id(3));
    assert!(plan_add(&lists, &role, item).is_empty());
}

#[test]
fn explicit_roles_have_no_sources() {
    assert!(CollectionRole::List.sources().is_empty());
    assert!(!CollectionRole::List.is_derived());
    assert_eq!(CollectionRole::List.attribute(), "refCollection");
    assert_eq!(
        CollectionRole::Kind {
            kind: "Note".into()
        }
        .attribute(),
        "set"
    );
}

#[test]
fn unsupported_operations_classify_as_unsupported() {
    let collection = Collection::new(
        id(7),
        CollectionRole::Union {
            sources: vec![id(1), id(2)],
        },
    );
    let err: InternalError = collection.not_implemented("add").into();

    assert_eq!(err.class, ErrorClass::Unsupported);
    assert!(err.message.contains("union collection"));
    assert!(matches!(
        err.collection_detail(),
        Some(CollectionError::NotImplemented { operation: "add", .. })
    ));
}

#[test]
fn structural_errors_have_stable_classes() {
    let arity: InternalError = CollectionError::DifferenceArity {
        collection: id(1),
        got: 3,
    }
    .into();
    let cycle: InternalError = CollectionError::Cycle {
        collection: id(1),
        source_id: id(2),
    }
    .into();

    assert_eq!(arity.class, ErrorClass::Usage);
    assert_eq!(cycle.class, ErrorClass::Conflict);
}
