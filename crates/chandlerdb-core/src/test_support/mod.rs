//! Shared fixtures for unit tests.

use crate::{
    error::InternalError,
    item::{Item, ItemLoader},
    notify::{CollectionEvent, NotificationSink, Op},
    types::ItemId,
    view::View,
};
use std::{cell::RefCell, collections::HashMap, rc::Rc};

///
/// RecordingSink
///
/// Keeps every delivered event; clones share the same log.
///

#[derive(Clone, Default)]
pub(crate) struct RecordingSink {
    events: Rc<RefCell<Vec<CollectionEvent>>>,
}

impl RecordingSink {
    pub(crate) fn boxed(&self) -> Box<dyn NotificationSink> {
        Box::new(self.clone())
    }

    pub(crate) fn events(&self) -> Vec<CollectionEvent> {
        self.events.borrow().clone()
    }

    /// `(op, item)` pairs in delivery order.
    pub(crate) fn ops(&self) -> Vec<(Op, ItemId)> {
        self.events.borrow().iter().map(|e| (e.op, e.other)).collect()
    }

    pub(crate) fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl NotificationSink for RecordingSink {
    fn on_collection_event(&mut self, event: &CollectionEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

///
/// MapLoader
///
/// Loader over a fixed set of items.
///

#[derive(Default)]
pub(crate) struct MapLoader {
    items: HashMap<ItemId, Item>,
}

impl MapLoader {
    pub(crate) fn with(items: impl IntoIterator<Item = Item>) -> Self {
        Self {
            items: items.into_iter().map(|item| (item.id(), item)).collect(),
        }
    }
}

impl ItemLoader for MapLoader {
    fn load(&self, id: ItemId) -> Result<Option<Item>, InternalError> {
        Ok(self.items.get(&id).cloned())
    }
}

/// Create `count` items of `kind`, oldest first.
pub(crate) fn create_items(view: &mut View, kind: &str, count: usize) -> Vec<ItemId> {
    (0..count)
        .map(|_| view.create_item(kind).expect("create item"))
        .collect()
}
