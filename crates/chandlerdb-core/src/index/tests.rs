use crate::{
    index::{
        FindMode, Index, IndexContext, IndexError, IndexKind, IndexSpec, Indexes, KeyComparator,
        RangeSet,
    },
    types::ItemId,
    value::Value,
};
use proptest::prelude::*;
use std::{cmp::Ordering, collections::HashMap, sync::Arc};

///
/// Attrs
/// Minimal attribute table standing in for the view.
///

#[derive(Default)]
struct Attrs(HashMap<(ItemId, String), Value>);

impl Attrs {
    fn set(&mut self, key: ItemId, attr: &str, value: impl Into<Value>) {
        self.0.insert((key, attr.to_string()), value.into());
    }
}

impl IndexContext for Attrs {
    fn attribute(&self, key: ItemId, attribute: &str) -> Option<&Value> {
        self.0.get(&(key, attribute.to_string()))
    }
}

fn id(n: u128) -> ItemId {
    ItemId::from_parts(1, n)
}

fn keys(index: &Index) -> Vec<ItemId> {
    index.keys().collect()
}

fn numeric(members: &[ItemId]) -> Index {
    let mut index = Index::new("num", IndexSpec::Numeric);
    index.fill(&Attrs::default(), members);
    index
}

// ---- numeric -----------------------------------------------------------

#[test]
fn numeric_index_follows_collection_order() {
    let ctx = Attrs::default();
    let mut index = numeric(&[id(3), id(1), id(2)]);
    assert_eq!(keys(&index), vec![id(3), id(1), id(2)]);

    index.insert_key(&ctx, id(4), Some(id(3)));
    assert_eq!(keys(&index), vec![id(3), id(4), id(1), id(2)]);

    index.move_key(&ctx, id(2), None).expect("move to front");
    assert_eq!(keys(&index), vec![id(2), id(3), id(4), id(1)]);
}

#[test]
fn positions_allow_negative_and_reject_out_of_range() {
    let index = numeric(&[id(1), id(2), id(3)]);

    assert_eq!(index.key_at(0).expect("first"), id(1));
    assert_eq!(index.key_at(-1).expect("last"), id(3));
    assert_eq!(index.key_at(-3).expect("first from end"), id(1));
    assert!(matches!(
        index.key_at(3),
        Err(IndexError::PositionOutOfRange { len: 3, .. })
    ));
    assert!(matches!(
        index.key_at(-4),
        Err(IndexError::PositionOutOfRange { .. })
    ));
}

#[test]
fn navigation_reports_unknown_keys() {
    let index = numeric(&[id(1), id(2)]);

    assert_eq!(index.next_key(id(1)).expect("next"), Some(id(2)));
    assert_eq!(index.next_key(id(2)).expect("next of last"), None);
    assert_eq!(index.previous_key(id(1)).expect("previous of first"), None);
    assert!(matches!(
        index.next_key(id(9)),
        Err(IndexError::UnknownKey { .. })
    ));
    assert_eq!(
        index.keys_between(Some(id(2)), None).expect("tail"),
        vec![id(2)]
    );
}

#[test]
fn entry_values_default_to_zero_and_follow_moves() {
    let ctx = Attrs::default();
    let mut index = numeric(&[id(1), id(2)]);

    assert_eq!(index.entry_value(id(1)).expect("value"), 0);
    index.set_entry_value(id(1), 7).expect("set");
    index.move_key(&ctx, id(1), Some(id(2))).expect("move");

    assert_eq!(index.entry_value(id(1)).expect("value"), 7);
    assert!(index.set_entry_value(id(5), 1).is_err());
}

// ---- sorted ------------------------------------------------------------

#[test]
fn attribute_index_sorts_missing_values_last_then_first_when_descending() {
    let mut ctx = Attrs::default();
    ctx.set(id(1), "when", 30);
    ctx.set(id(2), "when", 10);
    ctx.set(id(4), "when", Value::Null);
    ctx.set(id(5), "when", 20);

    let mut index = Index::new("byWhen", IndexSpec::attribute("when"));
    index.fill(&ctx, &[id(1), id(2), id(3), id(4), id(5)]);

    assert_eq!(keys(&index)[..3], [id(2), id(5), id(1)]);
    assert!(keys(&index)[3..].contains(&id(3)));
    assert!(keys(&index)[3..].contains(&id(4)));

    index.set_descending(true);
    let descending = keys(&index);
    assert!(descending[..2].contains(&id(3)));
    assert_eq!(descending[2..], [id(1), id(5), id(2)]);
}

#[test]
fn secondary_sort_attribute_breaks_ties() {
    let mut ctx = Attrs::default();
    for (n, day, title) in [(1, 2, "b"), (2, 1, "z"), (3, 2, "a")] {
        ctx.set(id(n), "day", day);
        ctx.set(id(n), "title", title);
    }

    let mut index = Index::new(
        "byDay",
        IndexSpec::Attribute {
            attributes: vec!["day".into(), "title".into()],
            monitor: Vec::new(),
        },
    );
    index.fill(&ctx, &[id(1), id(2), id(3)]);

    assert_eq!(keys(&index), vec![id(2), id(3), id(1)]);
}

#[test]
fn string_index_collates_case_insensitively() {
    let mut ctx = Attrs::default();
    ctx.set(id(1), "name", "banana");
    ctx.set(id(2), "name", "Apple");
    ctx.set(id(3), "name", "cherry");

    let mut index = Index::new("byName", IndexSpec::string("name"));
    index.fill(&ctx, &[id(1), id(2), id(3)]);

    assert_eq!(keys(&index), vec![id(2), id(1), id(3)]);
}

struct ByRandom;

impl KeyComparator for ByRandom {
    fn name(&self) -> &str {
        "byRandom"
    }

    fn compare(&self, _: &dyn IndexContext, left: ItemId, right: ItemId) -> Ordering {
        right.cmp(&left)
    }
}

#[test]
fn compare_index_uses_the_supplied_comparator() {
    let mut index = Index::new(
        "reverse",
        IndexSpec::Compare {
            comparator: Arc::new(ByRandom),
        },
    );
    index.fill(&Attrs::default(), &[id(1), id(3), id(2)]);

    assert_eq!(keys(&index), vec![id(3), id(2), id(1)]);
    assert_eq!(
        index.spec().kind(),
        IndexKind::Compare {
            comparator: "byRandom".into()
        }
    );
}

#[test]
fn reindex_moves_only_the_changed_key() {
    let mut ctx = Attrs::default();
    for n in 1..=4 {
        ctx.set(id(n), "rank", i64::try_from(n).expect("small"));
    }
    let mut index = Index::new("byRank", IndexSpec::attribute("rank"));
    index.fill(&ctx, &[id(1), id(2), id(3), id(4)]);

    assert!(!index.reindex_key(&ctx, id(2)));

    ctx.set(id(1), "rank", 10);
    assert!(index.reindex_key(&ctx, id(1)));
    assert_eq!(keys(&index), vec![id(2), id(3), id(4), id(1)]);
}

// ---- find --------------------------------------------------------------

fn by_rank(ctx: &Attrs, sought: i64) -> impl Fn(ItemId) -> Ordering + '_ {
    move |key| {
        ctx.attribute(key, "rank")
            .and_then(Value::as_int)
            .map_or(Ordering::Greater, |v| v.cmp(&sought))
    }
}

#[test]
fn find_on_empty_index_returns_none_for_every_mode() {
    let ctx = Attrs::default();
    let index = Index::new("byRank", IndexSpec::attribute("rank"));

    for mode in [FindMode::Exact, FindMode::First, FindMode::Last] {
        assert_eq!(index.find_key(mode, &by_rank(&ctx, 1)), None);
    }
}

#[test]
fn find_first_and_last_bracket_equal_runs() {
    let mut ctx = Attrs::default();
    for (n, rank) in [(1, 1), (2, 2), (3, 2), (4, 2), (5, 3)] {
        ctx.set(id(n), "rank", rank);
    }
    let mut index = Index::new("byRank", IndexSpec::attribute("rank"));
    index.fill(&ctx, &[id(1), id(2), id(3), id(4), id(5)]);

    assert_eq!(index.find_key(FindMode::First, &by_rank(&ctx, 2)), Some(id(2)));
    assert_eq!(index.find_key(FindMode::Last, &by_rank(&ctx, 2)), Some(id(4)));
    assert!(index.find_key(FindMode::Exact, &by_rank(&ctx, 2)).is_some());
    assert_eq!(index.find_key(FindMode::First, &by_rank(&ctx, 9)), None);

    // a single match is returned by every mode
    for mode in [FindMode::Exact, FindMode::First, FindMode::Last] {
        assert_eq!(index.find_key(mode, &by_rank(&ctx, 3)), Some(id(5)));
    }
}

// ---- ranges ------------------------------------------------------------

#[test]
fn selection_follows_keys_across_inserts_and_direction() {
    let ctx = Attrs::default();
    let mut index = numeric(&[id(1), id(2), id(3)]);
    index.set_ranges(RangeSet::from_ranges([(1, 1)]));

    index.insert_key(&ctx, id(0), None);
    assert_eq!(index.iter_ranges().collect::<Vec<_>>(), vec![id(2)]);

    index.set_descending(true);
    assert_eq!(index.iter_ranges().collect::<Vec<_>>(), vec![id(2)]);
    assert!(index.is_in_ranges((1, 1)));
}

#[test]
fn open_ended_selection_is_bounded_by_length() {
    let ctx = Attrs::default();
    let mut index = numeric(&[id(1), id(2)]);
    index.set_ranges(RangeSet::from_ranges([(0, usize::MAX)]));
    assert_eq!(index.ranges().ranges(), &[(0, 1)]);

    index.insert_key(&ctx, id(3), None);
    assert_eq!(keys(&index), index.iter_ranges().collect::<Vec<_>>());
}

#[test]
fn positions_track_shifting_keys() {
    let ctx = Attrs::default();
    let mut index = numeric(&(1..=6).map(id).collect::<Vec<_>>());
    index.remove_key(id(2));
    index.insert_key(&ctx, id(7), None);
    index.move_key(&ctx, id(6), Some(id(7))).expect("move");
    index.set_descending(true);

    for (position, key) in keys(&index).into_iter().enumerate() {
        assert_eq!(index.position_of(key), Some(position));
    }
    assert_eq!(index.position_of(id(2)), None);
}

// ---- store -------------------------------------------------------------

#[test]
fn store_rejects_duplicate_and_unknown_names() {
    let ctx = Attrs::default();
    let mut indexes = Indexes::new("owner.items");
    indexes
        .add_index(&ctx, "num", IndexSpec::Numeric, "en", &[], false)
        .expect("add");

    assert!(matches!(
        indexes.add_index(&ctx, "num", IndexSpec::Numeric, "en", &[], false),
        Err(IndexError::AlreadyExists { .. })
    ));
    assert!(matches!(
        indexes.index("missing"),
        Err(IndexError::NoSuchIndex { .. })
    ));
    assert!(indexes.remove_index("missing").is_err());
}

#[test]
fn deferred_index_is_built_on_validation() {
    let ctx = Attrs::default();
    let members = [id(1), id(2)];
    let mut indexes = Indexes::new("owner.items");
    indexes
        .add_index(&ctx, "num", IndexSpec::Numeric, "en", &members, true)
        .expect("add deferred");

    assert!(matches!(indexes.index("num"), Err(IndexError::Invalid { .. })));
    assert!(indexes.needs_validation());

    indexes.validate(&ctx, &members);
    assert_eq!(indexes.index_size("num").expect("size"), 2);
    assert!(indexes.check(2));
}

#[test]
fn invalidation_restores_unchanged_structure() {
    let ctx = Attrs::default();
    let members = [id(1), id(2), id(3)];
    let mut indexes = Indexes::new("owner.items");
    indexes
        .add_index(&ctx, "num", IndexSpec::Numeric, "en", &members, false)
        .expect("add");
    indexes
        .index_mut("num")
        .expect("index")
        .move_key(&ctx, id(3), None)
        .expect("move");

    indexes.invalidate();
    indexes.validate(&ctx, &members);

    // restored, so the manual placement survives
    assert_eq!(indexes.resolve_index("num", 0).expect("first"), id(3));

    indexes.invalidate();
    indexes.validate(&ctx, &members[..2]);
    assert_eq!(indexes.resolve_index("num", 0).expect("rebuilt"), id(1));
}

#[test]
fn check_reports_length_mismatch() {
    let ctx = Attrs::default();
    let mut indexes = Indexes::new("owner.items");
    indexes
        .add_index(&ctx, "num", IndexSpec::Numeric, "en", &[id(1)], false)
        .expect("add");

    assert!(indexes.check(1));
    assert!(!indexes.check(2));
}

// ---- properties --------------------------------------------------------

proptest! {
    #[test]
    fn valid_index_length_matches_members(
        ops in proptest::collection::vec((any::<bool>(), 0u128..24, proptest::option::of(0i64..8)), 0..64)
    ) {
        let mut ctx = Attrs::default();
        let mut members: Vec<ItemId> = Vec::new();
        let mut indexes = Indexes::new("prop");
        indexes.add_index(&ctx, "num", IndexSpec::Numeric, "en", &[], false).expect("num");
        indexes.add_index(&ctx, "rank", IndexSpec::attribute("rank"), "en", &[], false).expect("rank");

        for (add, n, rank) in ops {
            let key = id(n);
            if add {
                if members.contains(&key) {
                    continue;
                }
                if let Some(rank) = rank {
                    ctx.set(key, "rank", rank);
                }
                indexes.insert_key(&ctx, key, members.last().copied());
                members.push(key);
            } else if let Some(pos) = members.iter().position(|k| *k == key) {
                members.remove(pos);
                indexes.remove_key(key);
            }

            prop_assert!(indexes.check(members.len()));
            let num: Vec<_> = indexes.index("num").expect("num").keys().collect();
            prop_assert_eq!(num, members.clone());
        }

        let sorted: Vec<_> = indexes.index("rank").expect("rank").keys().collect();
        let ranks: Vec<_> = sorted
            .iter()
            .map(|k| ctx.attribute(*k, "rank").and_then(Value::as_int))
            .collect();
        let present = ranks.iter().take_while(|r| r.is_some()).count();
        prop_assert!(ranks[present..].iter().all(Option::is_none));
        prop_assert!(ranks[..present].windows(2).all(|w| w[0] <= w[1]));
    }
}
