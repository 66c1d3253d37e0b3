mod common;

use chandlerdb_core::prelude::*;
use common::{named, smart_lists, sorted};

#[test]
fn inclusion_exclusion_algebra() {
    let mut view = View::new();
    let [a, b, c] = named(&mut view, &["A", "B", "C"])[..] else {
        unreachable!()
    };
    let rule = view.create_list().unwrap();
    view.add(rule, a).unwrap();
    view.add(rule, b).unwrap();
    let smart = view.create_inclusion_exclusion(Some(rule), None).unwrap();
    let (inclusions, exclusions) = smart_lists(&view, smart);

    view.add(smart, c).unwrap();
    assert_eq!(view.members(inclusions).unwrap(), vec![c]);
    assert_eq!(sorted(view.members(smart).unwrap()), vec![a, b, c]);

    view.remove(smart, a).unwrap();
    assert_eq!(view.members(exclusions).unwrap(), vec![a]);
    assert_eq!(sorted(view.members(smart).unwrap()), vec![b, c]);

    view.add(smart, a).unwrap();
    assert!(view.members(exclusions).unwrap().is_empty());
    assert_eq!(view.members(inclusions).unwrap(), vec![c, a]);
    assert_eq!(sorted(view.members(smart).unwrap()), vec![a, b, c]);
}

#[test]
fn shared_trash_hides_and_restores() {
    let mut view = View::new();
    let [item] = named(&mut view, &["I"])[..] else {
        unreachable!()
    };
    let trash = view.create_list().unwrap();
    let x = view.create_inclusion_exclusion(None, Some(trash)).unwrap();
    let y = view.create_inclusion_exclusion(None, Some(trash)).unwrap();
    let (_, y_exclusions) = smart_lists(&view, y);

    view.add(x, item).unwrap();
    assert!(view.contains(x, item).unwrap());

    // never visible in Y: nothing to do
    assert!(!view.remove(y, item).unwrap());
    assert!(view.members(y_exclusions).unwrap().is_empty());
    assert!(!view.contains(trash, item).unwrap());

    assert!(view.remove(x, item).unwrap());
    assert!(view.contains(trash, item).unwrap());
    assert!(!view.contains(x, item).unwrap());

    assert!(view.add(x, item).unwrap());
    assert!(!view.contains(trash, item).unwrap());
    assert!(view.contains(x, item).unwrap());
    assert!(!view.contains(y, item).unwrap());
}

#[test]
fn item_shown_elsewhere_is_not_trashed() {
    let mut view = View::new();
    let [item] = named(&mut view, &["I"])[..] else {
        unreachable!()
    };
    let trash = view.create_list().unwrap();
    let x = view.create_inclusion_exclusion(None, Some(trash)).unwrap();
    let y = view.create_inclusion_exclusion(None, Some(trash)).unwrap();
    view.add(x, item).unwrap();
    view.add(y, item).unwrap();

    view.remove(x, item).unwrap();

    assert!(!view.contains(trash, item).unwrap());
    assert!(!view.contains(x, item).unwrap());
    assert!(view.contains(y, item).unwrap());

    // the last collection showing it trashes it, hiding it everywhere
    view.remove(y, item).unwrap();
    assert!(view.contains(trash, item).unwrap());
}

#[test]
fn smart_collection_over_a_kind_collection() {
    let mut view = View::new();
    let notes = view.create_kind_collection("Note").unwrap();
    let smart = view.create_inclusion_exclusion(Some(notes), None).unwrap();

    let [first, second] = named(&mut view, &["first", "second"])[..] else {
        unreachable!()
    };
    assert_eq!(view.members(smart).unwrap(), vec![first, second]);

    view.remove(smart, first).unwrap();
    view.delete_item(second).unwrap();
    assert!(view.is_empty(smart).unwrap());
}
