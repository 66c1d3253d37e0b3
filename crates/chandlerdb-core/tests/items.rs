mod common;

use chandlerdb_core::{persistent::CopyPolicy, prelude::*};
use common::named;

#[test]
fn cascade_copy_rewires_references_between_copies() {
    let mut view = View::new();
    let [parent, left, right] = named(&mut view, &["parent", "left", "right"])[..] else {
        unreachable!()
    };
    view.set_attribute(
        parent,
        "children",
        Input::List(vec![Input::Item(left), Input::Item(right)]),
    )
    .unwrap();
    view.set_attribute(left, "sibling", Input::Item(right)).unwrap();

    let copy = view.copy_item(parent, CopyPolicy::Cascade).unwrap();

    let children = view.item(copy).unwrap().iter_refs();
    assert_eq!(children.len(), 2);
    assert!(!children.contains(&left) && !children.contains(&right));
    assert_eq!(
        view.value(children[0], "sibling"),
        Some(&Value::Ref(children[1]))
    );
    assert_eq!(view.item(children[1]).unwrap().name(), Some("right"));

    // the original graph is untouched
    assert_eq!(view.item(parent).unwrap().iter_refs(), vec![left, right]);
}

#[test]
fn copy_and_clone_are_structurally_equal() {
    let mut view = View::new();
    let [source, tag] = named(&mut view, &["source", "tag"])[..] else {
        unreachable!()
    };
    view.set_attribute(
        source,
        "meta",
        Input::Dict(vec![
            ("rank".into(), Input::Value(Value::Int(4))),
            ("tags".into(), Input::List(vec![Input::Item(tag)])),
        ]),
    )
    .unwrap();

    let copy = view.copy_item(source, CopyPolicy::Copy).unwrap();
    let clone = view.clone_item(source).unwrap();

    for duplicate in [copy, clone] {
        let original = view.item(source).unwrap();
        let duplicate = view.item(duplicate).unwrap();
        assert_eq!(duplicate.kind(), original.kind());
        assert_eq!(duplicate.iter_refs(), vec![tag]);
        assert_eq!(
            duplicate.collection("meta").unwrap().len(),
            original.collection("meta").unwrap().len()
        );
    }
}

#[test]
fn sorted_indexes_keep_missing_values_last() {
    let mut view = View::new();
    let items = named(&mut view, &["a", "b", "c", "d"]);
    let list = view.create_list().unwrap();
    for item in &items {
        view.add(list, *item).unwrap();
    }
    view.set_attribute(items[3], "due", Value::Int(1)).unwrap();
    view.set_attribute(items[1], "due", Value::Int(2)).unwrap();
    view.add_index(list, "due", IndexSpec::attribute("due"))
        .unwrap();

    let order = view.iter_index_keys(list, "due", None, None).unwrap();
    assert_eq!(order[..2], [items[3], items[1]]);
    assert_eq!(view.index_size(list, "due").unwrap(), 4);

    view.set_attribute(items[0], "due", Value::Int(0)).unwrap();
    assert_eq!(view.first_in_index(list, "due").unwrap(), Some(items[0]));
    assert!(view.check_indexes(list).unwrap());
}

#[test]
fn index_state_survives_save_and_load() {
    let mut view = View::new();
    let items = named(&mut view, &["a", "b", "c"]);
    let list = view.create_list().unwrap();
    for (item, title) in items.iter().zip(["b", "c", "a"]) {
        view.set_attribute(*item, "title", Value::Text(title.into()))
            .unwrap();
        view.add(list, *item).unwrap();
    }
    view.add_index(list, "title", IndexSpec::attribute("title"))
        .unwrap();
    view.set_descending(list, "title", true).unwrap();
    view.add_index_range(list, "title", (0, 1)).unwrap();
    let saved = view.save_indexes(list).unwrap();

    let mut restored = View::new();
    restored.bulk_load(|restored| {
        for item in &items {
            restored.insert_item(view.item(*item).unwrap().clone())?;
        }
        let list = restored.create_list()?;
        for item in &items {
            restored.add(list, *item)?;
        }
        restored.load_indexes(list, &saved, &[])?;
        assert!(restored.is_descending(list, "title")?);
        assert_eq!(
            restored.iter_index_ranges(list, "title")?,
            vec![items[1], items[0]]
        );
        Ok(())
    })
    .unwrap();
}
