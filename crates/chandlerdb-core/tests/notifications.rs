mod common;

use chandlerdb_core::{ViewConfig, prelude::*};
use common::{Recorder, named};

#[test]
fn events_are_delivered_in_change_order_at_commit() {
    let mut view = View::new();
    let items = named(&mut view, &["a", "b", "c"]);
    let list = view.create_list().unwrap();
    let union = view.create_union(&[list]).unwrap();
    let recorder = Recorder::default();
    let sink = view.register_sink(recorder.boxed());
    view.subscribe(list, sink).unwrap();
    view.subscribe(union, sink).unwrap();

    for item in &items {
        view.add(list, *item).unwrap();
    }
    view.remove(list, items[1]).unwrap();
    assert!(recorder.ops().is_empty());

    let summary = view.commit();

    assert_eq!(summary.dispatched, 8);
    assert_eq!(
        recorder.ops(),
        vec![
            (Op::Add, items[0]),
            (Op::Add, items[0]),
            (Op::Add, items[1]),
            (Op::Add, items[1]),
            (Op::Add, items[2]),
            (Op::Add, items[2]),
            (Op::Remove, items[1]),
            (Op::Remove, items[1]),
        ]
    );
    assert_eq!(recorder.collections()[..2], [list, union]);
}

#[test]
fn commit_without_dispatch_keeps_the_queue() {
    let config = ViewConfig::from_toml_str(
        r#"
        [view]
        dispatch_on_commit = false
        "#,
    )
    .unwrap();
    let mut view = View::with_config(config);
    let items = named(&mut view, &["a"]);
    let list = view.create_list().unwrap();
    let recorder = Recorder::default();
    let sink = view.register_sink(recorder.boxed());
    view.subscribe_global(list, sink).unwrap();

    view.add(list, items[0]).unwrap();
    view.commit();
    assert!(recorder.ops().is_empty());
    assert_eq!(view.pending_notifications(), 1);

    assert_eq!(view.dispatch_notifications(), 1);
    assert_eq!(recorder.ops(), vec![(Op::Add, items[0])]);
}

#[test]
fn monitored_sort_attribute_reports_changed() {
    let mut view = View::new();
    let items = named(&mut view, &["a", "b"]);
    let list = view.create_list().unwrap();
    view.add(list, items[0]).unwrap();
    view.add(list, items[1]).unwrap();
    view.add_index(list, "title", IndexSpec::string("title"))
        .unwrap();
    view.commit();

    let recorder = Recorder::default();
    let sink = view.register_sink(recorder.boxed());
    view.subscribe(list, sink).unwrap();
    view.set_attribute(items[1], "title", Value::Text("aardvark".into()))
        .unwrap();
    view.set_attribute(items[0], "unwatched", Value::Int(1))
        .unwrap();
    view.commit();

    assert_eq!(recorder.ops(), vec![(Op::Changed, items[1])]);
    assert_eq!(view.get_by_index(list, "title", 0).unwrap(), items[1]);
}

#[test]
fn bulk_load_is_silent() {
    let mut view = View::new();
    let list = view.create_list().unwrap();
    let recorder = Recorder::default();
    let sink = view.register_sink(recorder.boxed());
    view.subscribe(list, sink).unwrap();

    view.bulk_load(|view| {
        let item = view.create_item("Note")?;
        view.add(list, item)?;
        Ok(())
    })
    .unwrap();
    view.commit();

    assert!(recorder.ops().is_empty());
    assert_eq!(view.len(list).unwrap(), 1);
}
