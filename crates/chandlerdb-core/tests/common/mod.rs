#![allow(dead_code)]

use chandlerdb_core::prelude::*;
use std::{cell::RefCell, rc::Rc};

///
/// Recorder
///
/// Sink that keeps every delivered event; clones share the log.
///

#[derive(Clone, Default)]
pub struct Recorder(Rc<RefCell<Vec<CollectionEvent>>>);

impl Recorder {
    pub fn boxed(&self) -> Box<dyn NotificationSink> {
        Box::new(self.clone())
    }

    pub fn ops(&self) -> Vec<(Op, ItemId)> {
        self.0.borrow().iter().map(|e| (e.op, e.other)).collect()
    }

    pub fn collections(&self) -> Vec<ItemId> {
        self.0.borrow().iter().map(|e| e.collection).collect()
    }
}

impl NotificationSink for Recorder {
    fn on_collection_event(&mut self, event: &CollectionEvent) {
        self.0.borrow_mut().push(event.clone());
    }
}

pub fn named(view: &mut View, names: &[&str]) -> Vec<ItemId> {
    names
        .iter()
        .map(|name| view.create_named_item("Note", name).expect("create item"))
        .collect()
}

/// Inclusion and exclusion lists of a smart collection.
pub fn smart_lists(view: &View, smart: ItemId) -> (ItemId, ItemId) {
    match view.collection(smart).expect("smart collection").role() {
        CollectionRole::InclusionExclusion {
            inclusions,
            exclusions,
            ..
        } => (*inclusions, *exclusions),
        other => panic!("not a smart collection: {other:?}"),
    }
}

pub fn sorted(mut ids: Vec<ItemId>) -> Vec<ItemId> {
    ids.sort_unstable();
    ids
}
