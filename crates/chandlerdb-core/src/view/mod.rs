//! The unit of work over a set of items.
//!
//! A [`View`] owns every item (in its [`ItemArena`]) and every collection.
//! Collections, indexes and persistent values refer to items by id only.
//! Mutations are visible to readers immediately; notifications to sinks are
//! queued and delivered at the next [`View::commit`] unless a change asks
//! for immediate dispatch.

mod collections;
mod indexes;
mod propagate;
mod selection;


use crate::{
    collection::{Collection, LoadState},
    error::InternalError,
    item::{AttributeValue, Item, ItemArena, ItemLoader},
    monitor::ChangeMonitorRegistry,
    notify::{Change, NotificationQueue, NotificationSink, Op, SinkId, Subscriber},
    obs::sink::{MetricsEvent, record},
    persistent::{CopyFn, CopyPolicy, FilterKey, Input, Owner, PersistentError, PersistentValue},
    types::{IdGenerator, ItemId, ItemRef},
    value::Value,
};
use chandlerdb_config::ViewConfig;
use indexmap::IndexSet;
use std::collections::{BTreeMap, HashMap, VecDeque};

///
/// CommitSummary
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CommitSummary {
    /// Notifications delivered while draining the queue.
    pub dispatched: usize,
    /// Items whose dirty bit was cleared.
    pub saved_items: usize,
    /// Collections whose dirty bit was cleared.
    pub saved_collections: usize,
    /// Outcome of the index audit; `None` when it did not run.
    pub indexes_ok: Option<bool>,
}

///
/// View
///

pub struct View {
    config: ViewConfig,
    ids: IdGenerator,
    items: ItemArena,
    collections: HashMap<ItemId, Collection>,
    global_subscribers: HashMap<ItemId, IndexSet<SinkId>>,
    sinks: BTreeMap<SinkId, Box<dyn NotificationSink>>,
    next_sink: u64,
    monitors: ChangeMonitorRegistry,
    queue: NotificationQueue,
    loader: Option<Box<dyn ItemLoader>>,
    load_state: LoadState,
}

impl Default for View {
    fn default() -> Self {
        Self::new()
    }
}

impl View {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ViewConfig::default())
    }

    #[must_use]
    pub fn with_config(config: ViewConfig) -> Self {
        let queue = NotificationQueue::new(config.notification_limit());

        Self {
            config,
            ids: IdGenerator::new(),
            items: ItemArena::default(),
            collections: HashMap::new(),
            global_subscribers: HashMap::new(),
            sinks: BTreeMap::new(),
            next_sink: 0,
            monitors: ChangeMonitorRegistry::new(),
            queue,
            loader: None,
            load_state: LoadState::Ready,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ViewConfig {
        &self.config
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.view.name
    }

    pub fn set_loader(&mut self, loader: Box<dyn ItemLoader>) {
        self.loader = Some(loader);
    }

    #[must_use]
    pub const fn items(&self) -> &ItemArena {
        &self.items
    }

    #[must_use]
    pub const fn monitors(&self) -> &ChangeMonitorRegistry {
        &self.monitors
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self.load_state, LoadState::Loading)
    }

    /// Run `f` as a load of existing state: new items and membership
    /// changes are not marked dirty, no notifications are queued, and
    /// indexes added meanwhile are built on first use.
    pub fn bulk_load<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R, InternalError>,
    ) -> Result<R, InternalError> {
        let previous = std::mem::replace(&mut self.load_state, LoadState::Loading);
        let result = f(self);
        self.load_state = previous;

        if !self.is_loading() {
            for collection in self.collections.values_mut() {
                collection.load_state = LoadState::Ready;
            }
        }

        result
    }

    pub(crate) fn next_id(&mut self) -> Result<ItemId, InternalError> {
        self.ids
            .generate()
            .map_err(|err| InternalError::view_invariant(err.to_string()))
    }

    // ------------------------------------------------------------------
    // Items
    // ------------------------------------------------------------------

    pub fn create_item(&mut self, kind: &str) -> Result<ItemId, InternalError> {
        let id = self.next_id()?;
        self.insert_item(Item::new(id, kind))?;

        Ok(id)
    }

    pub fn create_named_item(&mut self, kind: &str, name: &str) -> Result<ItemId, InternalError> {
        let id = self.next_id()?;
        self.insert_item(Item::new(id, kind).with_name(name))?;

        Ok(id)
    }

    /// Add a fully built item, making it visible to kind collections.
    pub fn insert_item(&mut self, mut item: Item) -> Result<(), InternalError> {
        let id = item.id();
        if self.items.get(id).is_some() {
            return Err(InternalError::view_usage(format!(
                "item {id} already exists in view {}",
                self.name()
            )));
        }
        if self.is_loading() {
            item.mark_clean();
        }
        self.items.insert(item);

        self.item_materialized(id)
    }

    /// Record an item that exists but is not loaded yet. Returns false when
    /// the id is already known.
    pub fn insert_stub(&mut self, id: ItemId) -> bool {
        self.items.insert_stub(id)
    }

    /// Materialize a stub through the configured loader.
    pub fn load_item(&mut self, id: ItemId) -> Result<&Item, InternalError> {
        if self.items.is_stub(id) {
            let loader = self.loader.as_ref().ok_or_else(|| {
                InternalError::view_usage(format!("item {id} is a stub and no loader is set"))
            })?;
            let mut item = loader
                .load(id)?
                .ok_or_else(|| InternalError::view_not_found(format!("loader has no item {id}")))?;
            if item.id() != id {
                return Err(InternalError::view_invariant(format!(
                    "loader returned item {} for {id}",
                    item.id()
                )));
            }
            item.mark_clean();
            self.items.insert(item);
            record(MetricsEvent::ItemLoaded);

            self.item_materialized(id)?;
        }

        self.items
            .get(id)
            .ok_or_else(|| InternalError::view_not_found(format!("no such item: {id}")))
    }

    #[must_use]
    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(id)
    }

    /// Direct access to an item. Changes made here bypass monitors; use
    /// [`View::set_attribute`] for sorted or filtered attributes.
    pub fn item_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.get_mut(id)
    }

    /// Resolve a reference handle.
    #[must_use]
    pub fn resolve(&self, r: ItemRef) -> Option<&Item> {
        self.items.get(r.id())
    }

    #[must_use]
    pub fn attribute(&self, id: ItemId, attribute: &str) -> Option<&AttributeValue> {
        self.items.get(id).and_then(|item| item.get(attribute))
    }

    /// Scalar value of an attribute.
    #[must_use]
    pub fn value(&self, id: ItemId, attribute: &str) -> Option<&Value> {
        self.items.get(id).and_then(|item| item.value(attribute))
    }

    pub fn set_attribute(
        &mut self,
        id: ItemId,
        attribute: &str,
        input: impl Into<Input>,
    ) -> Result<Option<AttributeValue>, InternalError> {
        let previous = self.loaded_item_mut(id)?.set(attribute, input)?;
        self.attribute_changed(id, attribute)?;

        Ok(previous)
    }

    pub fn remove_attribute(
        &mut self,
        id: ItemId,
        attribute: &str,
    ) -> Result<Option<AttributeValue>, InternalError> {
        let removed = self.loaded_item_mut(id)?.remove(attribute);
        if removed.is_some() {
            self.attribute_changed(id, attribute)?;
        }

        Ok(removed)
    }

    /// Mutate a collection-valued attribute in place.
    pub fn with_collection_value_mut<R>(
        &mut self,
        id: ItemId,
        attribute: &str,
        f: impl FnOnce(&mut PersistentValue) -> Result<R, PersistentError>,
    ) -> Result<R, InternalError> {
        let value = self
            .loaded_item_mut(id)?
            .collection_mut(attribute)
            .ok_or_else(|| {
                InternalError::view_usage(format!(
                    "attribute {} is not a collection value",
                    Owner::new(id, attribute)
                ))
            })?;
        let result = f(value)?;
        self.attribute_changed(id, attribute)?;

        Ok(result)
    }

    /// Remove occurrences of `item` from a collection-valued attribute.
    pub fn filter_item(
        &mut self,
        owner: ItemId,
        attribute: &str,
        item: ItemId,
        level: usize,
        key: &FilterKey,
    ) -> Result<bool, InternalError> {
        self.with_collection_value_mut(owner, attribute, |value| {
            value.filter_item(item, level, key)
        })
    }

    /// Copy an item. With [`CopyPolicy::Cascade`] every item reachable
    /// through references is copied too and the copies reference each
    /// other; [`CopyPolicy::Remove`] drops references from the copy.
    pub fn copy_item(&mut self, id: ItemId, policy: CopyPolicy) -> Result<ItemId, InternalError> {
        let mut order = vec![id];
        if policy == CopyPolicy::Cascade {
            let mut seen: IndexSet<ItemId> = IndexSet::from([id]);
            let mut pending = VecDeque::from([id]);
            while let Some(next) = pending.pop_front() {
                for r in self.items.get(next).map(Item::iter_refs).unwrap_or_default() {
                    if self.items.get(r).is_some() && seen.insert(r) {
                        pending.push_back(r);
                    }
                }
            }
            order = seen.into_iter().collect();
        }

        let mut pairs = Vec::with_capacity(order.len());
        for source in order {
            pairs.push((source, self.next_id()?));
        }
        let copies: HashMap<ItemId, ItemId> = pairs.iter().copied().collect();
        let mut copy_fn = |r: ItemRef, policy: CopyPolicy| match policy {
            CopyPolicy::Copy => Some(r),
            CopyPolicy::Cascade => Some(copies.get(&r.id()).map_or(r, |c| ItemRef::new(*c))),
            CopyPolicy::Remove => None,
        };

        for (source, target) in &pairs {
            self.copy_one(*source, *target, policy, &mut copy_fn)?;
        }

        pairs
            .first()
            .map(|(_, target)| *target)
            .ok_or_else(|| InternalError::view_invariant("nothing was copied"))
    }

    /// Copy one item, passing every reference through `copy_fn`.
    pub fn copy_item_with(
        &mut self,
        id: ItemId,
        policy: CopyPolicy,
        copy_fn: &mut CopyFn<'_>,
    ) -> Result<ItemId, InternalError> {
        let target = self.next_id()?;
        self.copy_one(id, target, policy, copy_fn)?;

        Ok(target)
    }

    fn copy_one(
        &mut self,
        source: ItemId,
        target: ItemId,
        policy: CopyPolicy,
        copy_fn: &mut CopyFn<'_>,
    ) -> Result<(), InternalError> {
        let source = self.loaded_item(source)?;
        let mut copy = Item::new(target, source.kind());
        if let Some(name) = source.name() {
            copy = copy.with_name(name);
        }

        for (attribute, value) in source.attributes() {
            let copied = match value {
                AttributeValue::Scalar(Value::Ref(r)) => copy_fn(ItemRef::new(*r), policy)
                    .map(|r| AttributeValue::Scalar(Value::Ref(r.id()))),
                AttributeValue::Scalar(value) => Some(AttributeValue::Scalar(value.clone())),
                AttributeValue::Collection(value) => Some(AttributeValue::Collection(
                    value.copy_for(&Owner::new(target, attribute), policy, copy_fn),
                )),
            };
            if let Some(copied) = copied {
                copy.set_prepared(attribute.to_string(), copied);
            }
        }

        self.insert_item(copy)
    }

    /// Duplicate an item under a new id, keeping every reference as is.
    pub fn clone_item(&mut self, id: ItemId) -> Result<ItemId, InternalError> {
        let target = self.next_id()?;
        let source = self.loaded_item(id)?;
        let mut clone = Item::new(target, source.kind());
        if let Some(name) = source.name() {
            clone = clone.with_name(name);
        }
        for (attribute, value) in source.attributes() {
            let value = match value {
                AttributeValue::Collection(value) => {
                    AttributeValue::Collection(value.clone_for(&Owner::new(target, attribute)))
                }
                scalar @ AttributeValue::Scalar(_) => scalar.clone(),
            };
            clone.set_prepared(attribute.to_string(), value);
        }
        self.insert_item(clone)?;

        Ok(target)
    }

    /// Delete an item, taking it out of every collection. Deleting a
    /// collection requires that no other collection uses it as a source.
    pub fn delete_item(&mut self, id: ItemId) -> Result<(), InternalError> {
        if !self.items.contains(id) {
            return Err(InternalError::view_not_found(format!("no such item: {id}")));
        }
        if self.collections.contains_key(&id) {
            self.drop_collection(id)?;
        }

        self.items.remove(id);
        let holding: Vec<ItemId> = self
            .collections
            .values()
            .filter(|c| c.contains(id) && !c.role().is_derived())
            .map(Collection::id)
            .collect();
        let mut changes = Vec::with_capacity(holding.len());
        for collection in holding {
            if self.remove_member(collection, id)? {
                changes.push((collection, Op::Remove, id));
            }
        }

        self.propagate_all(changes, Change::Collection)
    }

    fn loaded_item(&self, id: ItemId) -> Result<Item, InternalError> {
        self.items
            .get(id)
            .cloned()
            .ok_or_else(|| self.missing_item(id))
    }

    fn loaded_item_mut(&mut self, id: ItemId) -> Result<&mut Item, InternalError> {
        if self.items.get(id).is_none() {
            return Err(self.missing_item(id));
        }

        self.items
            .get_mut(id)
            .ok_or_else(|| InternalError::view_not_found(format!("no such item: {id}")))
    }

    fn missing_item(&self, id: ItemId) -> InternalError {
        if self.items.is_stub(id) {
            InternalError::view_usage(format!("item {id} is not loaded"))
        } else {
            InternalError::view_not_found(format!("no such item: {id}"))
        }
    }

    // ------------------------------------------------------------------
    // Sinks and transaction boundary
    // ------------------------------------------------------------------

    pub fn register_sink(&mut self, sink: Box<dyn NotificationSink>) -> SinkId {
        let id = SinkId(self.next_sink);
        self.next_sink += 1;
        self.sinks.insert(id, sink);

        id
    }

    /// Unregister a sink and every subscription made for it.
    pub fn remove_sink(&mut self, id: SinkId) -> Option<Box<dyn NotificationSink>> {
        for collection in self.collections.values_mut() {
            collection.subscribers.shift_remove(&Subscriber::Sink(id));
        }
        for sinks in self.global_subscribers.values_mut() {
            sinks.shift_remove(&id);
        }
        self.global_subscribers.retain(|_, sinks| !sinks.is_empty());

        self.sinks.remove(&id)
    }

    #[must_use]
    pub fn pending_notifications(&self) -> usize {
        self.queue.len()
    }

    /// Deliver queued notifications in the order they were queued.
    pub fn dispatch_notifications(&mut self) -> usize {
        let mut dispatched = 0;
        while let Some(event) = self.queue.pop() {
            self.deliver(&event);
            dispatched += 1;
        }

        dispatched
    }

    /// Transaction boundary: drain notifications (when configured), audit
    /// indexes (when configured) and clear dirty bits.
    pub fn commit(&mut self) -> CommitSummary {
        let mut summary = CommitSummary::default();

        if self.config.view.dispatch_on_commit {
            summary.dispatched = self.dispatch_notifications();
        }
        if self.config.view.check_indexes_on_commit {
            summary.indexes_ok = Some(self.check_all_indexes());
        }

        for item in self.items.values_mut() {
            if item.is_dirty() {
                item.clear_dirty();
                summary.saved_items += 1;
            }
        }
        for collection in self.collections.values_mut() {
            if collection.dirty {
                collection.dirty = false;
                summary.saved_collections += 1;
            }
        }

        tracing::debug!(
            view = %self.config.view.name,
            dispatched = summary.dispatched,
            saved_items = summary.saved_items,
            saved_collections = summary.saved_collections,
            "committed view"
        );

        summary
    }

    #[must_use]
    pub fn dirty_items(&self) -> Vec<ItemId> {
        let mut ids: Vec<_> = self
            .items
            .values()
            .filter(|item| item.is_dirty())
            .map(Item::id)
            .collect();
        ids.sort_unstable();

        ids
    }
}
