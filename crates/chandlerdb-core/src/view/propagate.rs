//! Membership maintenance and change propagation.
//!
//! Every membership change goes through `insert_member` / `remove_member`,
//! which keep the member map, the indexes and the dirty bit in step. The
//! change is then propagated: sink subscribers get an event (queued or
//! delivered now) and derived subscribers re-evaluate the item, which may
//! change their own membership in turn. The subscription graph is acyclic,
//! so the worklist drains.

use crate::{
    collection::{Collection, CollectionError, CollectionRole, MemberLookup},
    error::InternalError,
    item::{Item, ItemArena},
    monitor::MonitorTarget,
    notify::{Change, CollectionEvent, Op, SinkId, Subscriber},
    obs::sink::{MetricsEvent, record},
    types::{ItemId, ItemRef},
    util::LinkedMap,
    view::View,
};
use indexmap::{IndexMap, IndexSet};
use std::collections::{HashMap, HashSet, VecDeque};

///
/// Lookup
///
/// Membership view over a view's arena and collections.
///

pub(super) struct Lookup<'a> {
    items: &'a ItemArena,
    collections: &'a HashMap<ItemId, Collection>,
}

impl MemberLookup for Lookup<'_> {
    fn is_member(&self, collection: ItemId, item: ItemId) -> bool {
        self.collections
            .get(&collection)
            .is_some_and(|c| c.contains(item))
    }

    fn members(&self, collection: ItemId) -> Vec<ItemId> {
        self.collections
            .get(&collection)
            .map(Collection::member_ids)
            .unwrap_or_default()
    }

    fn item(&self, item: ItemId) -> Option<&Item> {
        self.items.get(item)
    }

    fn items_of_kind(&self, kind: &str) -> Vec<ItemId> {
        let mut ids: Vec<_> = self
            .items
            .values()
            .filter(|item| item.kind() == kind)
            .map(Item::id)
            .collect();
        ids.sort_unstable();

        ids
    }
}

impl View {
    pub(super) const fn lookup(&self) -> Lookup<'_> {
        Lookup {
            items: &self.items,
            collections: &self.collections,
        }
    }

    pub(super) fn collection_ref(&self, id: ItemId) -> Result<&Collection, InternalError> {
        self.collections
            .get(&id)
            .ok_or_else(|| CollectionError::NoSuchCollection { collection: id }.into())
    }

    pub(super) fn collection_mut(&mut self, id: ItemId) -> Result<&mut Collection, InternalError> {
        self.collections
            .get_mut(&id)
            .ok_or_else(|| CollectionError::NoSuchCollection { collection: id }.into())
    }

    // ------------------------------------------------------------------
    // Local state
    // ------------------------------------------------------------------

    /// Append `item` to a collection. Returns false when already a member.
    pub(super) fn insert_member(
        &mut self,
        collection: ItemId,
        item: ItemId,
    ) -> Result<bool, InternalError> {
        let loading = self.is_loading();
        let target = self
            .collections
            .get_mut(&collection)
            .ok_or(CollectionError::NoSuchCollection { collection })?;
        if target.members.contains_key(&item) {
            return Ok(false);
        }

        target.members.insert(item, ItemRef::new(item));
        let previous = target.members.previous_key(&item);
        target.indexes.insert_key(&self.items, item, previous);
        if !loading {
            target.dirty = true;
        }

        Ok(true)
    }

    /// Returns false when `item` was not a member.
    pub(super) fn remove_member(
        &mut self,
        collection: ItemId,
        item: ItemId,
    ) -> Result<bool, InternalError> {
        let loading = self.is_loading();
        let target = self.collection_mut(collection)?;
        if !target.members.contains_key(&item) {
            return Ok(false);
        }

        target.members.remove(&item)?;
        target.indexes.remove_key(item);
        if !loading {
            target.dirty = true;
        }

        Ok(true)
    }

    /// Move a member after `after` (`None` for the front) in collection
    /// order and in every numeric index. Indexes are revalidated first so
    /// the move is not lost to a later restore of stale structure.
    pub(super) fn place_member(
        &mut self,
        collection: ItemId,
        item: ItemId,
        after: Option<ItemId>,
    ) -> Result<(), InternalError> {
        self.validate_indexes(collection)?;
        let loading = self.is_loading();
        let target = self
            .collections
            .get_mut(&collection)
            .ok_or(CollectionError::NoSuchCollection { collection })?;
        target.members.place(item, after)?;
        target.indexes.move_key(&self.items, item, after);
        if !loading {
            target.dirty = true;
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Propagation
    // ------------------------------------------------------------------

    /// Carry a change of `collection` to its subscribers, queueing sink
    /// events for the next commit.
    pub(super) fn propagate(
        &mut self,
        collection: ItemId,
        op: Op,
        item: ItemId,
    ) -> Result<(), InternalError> {
        self.propagate_with(collection, op, item, Change::Collection)
    }

    pub(super) fn propagate_with(
        &mut self,
        collection: ItemId,
        op: Op,
        item: ItemId,
        change: Change,
    ) -> Result<(), InternalError> {
        self.propagate_all([(collection, op, item)], change)
    }

    /// Run every change through the subscriber graph, then queue the sink
    /// events it produced. Membership is settled before the first push, so
    /// a full queue costs notifications but never leaves a derived
    /// collection behind its sources.
    pub(super) fn propagate_all(
        &mut self,
        changes: impl IntoIterator<Item = (ItemId, Op, ItemId)>,
        change: Change,
    ) -> Result<(), InternalError> {
        let mut staged = Vec::new();
        for (collection, op, item) in changes {
            self.run_worklist(collection, op, item, change, &mut staged)?;
        }

        self.queue_events(staged)
    }

    fn run_worklist(
        &mut self,
        collection: ItemId,
        op: Op,
        item: ItemId,
        change: Change,
        staged: &mut Vec<CollectionEvent>,
    ) -> Result<(), InternalError> {
        let mut work = VecDeque::from([(collection, op)]);

        while let Some((collection, op)) = work.pop_front() {
            if let Some(event) = self.notify_sinks(collection, op, item, change)? {
                staged.push(event);
            }

            let derived: Vec<ItemId> = self
                .collection_ref(collection)?
                .subscribers()
                .filter_map(|s| match s {
                    Subscriber::Collection(id) => Some(id),
                    Subscriber::Sink(_) => None,
                })
                .collect();
            for target in derived {
                if let Some(next) = self.reevaluate(target, item, op)? {
                    work.push_back((target, next));
                }
            }
        }

        Ok(())
    }

    /// Queue staged events in order. On overflow the rest are dropped and
    /// the error reports how many were lost.
    fn queue_events(&mut self, staged: Vec<CollectionEvent>) -> Result<(), InternalError> {
        let total = staged.len();
        for (queued, event) in staged.into_iter().enumerate() {
            if let Err(err) = self.queue.push(event) {
                let dropped = total - queued;
                tracing::warn!(dropped, "notification queue full");

                return Err(err);
            }
            record(MetricsEvent::NotificationQueued);
        }

        Ok(())
    }

    /// Re-test `item` against a derived collection after `cause` happened
    /// upstream. Returns the op to pass on, if any.
    pub(super) fn reevaluate(
        &mut self,
        collection: ItemId,
        item: ItemId,
        cause: Op,
    ) -> Result<Option<Op>, InternalError> {
        let target = self.collection_ref(collection)?;
        let current = target.contains(item);
        let admitted = target.role().admits(&self.lookup(), item, current);

        Ok(match (current, admitted) {
            (false, true) => {
                self.insert_member(collection, item)?;
                record_delta(collection, 1, 0);
                Some(Op::Add)
            }
            (true, false) => {
                self.remove_member(collection, item)?;
                record_delta(collection, 0, 1);
                Some(Op::Remove)
            }
            (true, true) if matches!(cause, Op::Changed | Op::Refresh) => Some(cause),
            _ => None,
        })
    }

    /// Recompute a derived collection from its sources. Surviving members
    /// keep their aliases; indexes are invalidated and restore themselves on
    /// next use when the order still matches.
    pub(super) fn rebuild(&mut self, collection: ItemId) -> Result<(), InternalError> {
        let target = self.collection_ref(collection)?;
        let current = target.member_ids();
        let computed = target.role().compute(&self.lookup(), &current);
        if computed == current {
            return Ok(());
        }

        let kept: HashSet<ItemId> = computed.iter().copied().collect();
        let previous: HashSet<ItemId> = current.iter().copied().collect();
        let removes: Vec<ItemId> = current.into_iter().filter(|i| !kept.contains(i)).collect();
        let adds: Vec<ItemId> = computed
            .iter()
            .copied()
            .filter(|i| !previous.contains(i))
            .collect();

        let loading = self.is_loading();
        let target = self.collection_mut(collection)?;
        let aliases: Vec<(String, ItemId)> = target
            .members
            .aliases()
            .filter(|(_, key)| kept.contains(key))
            .map(|(alias, key)| (alias.to_string(), key))
            .collect();

        let mut members = LinkedMap::new();
        for item in &computed {
            members.insert(*item, ItemRef::new(*item));
        }
        for (alias, key) in aliases {
            members.set_alias(key, Some(&alias))?;
        }
        target.members = members;
        target.indexes.invalidate();
        if !loading {
            target.dirty = true;
        }

        tracing::debug!(
            collection = %collection,
            role = target.role().label(),
            adds = adds.len(),
            removes = removes.len(),
            "rebuilt derived collection"
        );
        record(MetricsEvent::DerivedRebuilt { collection });
        record_delta(collection, adds.len(), removes.len());

        let changes = removes
            .into_iter()
            .map(|item| (collection, Op::Remove, item))
            .chain(adds.into_iter().map(|item| (collection, Op::Add, item)))
            .collect::<Vec<_>>();

        self.propagate_all(changes, Change::Collection)
    }

    /// A newly materialized item joins every kind collection of its kind.
    pub(super) fn item_materialized(&mut self, item: ItemId) -> Result<(), InternalError> {
        let Some(kind) = self.items.get(item).map(|i| i.kind().to_string()) else {
            return Ok(());
        };
        let matching: Vec<ItemId> = self
            .collections
            .values()
            .filter(|c| matches!(c.role(), CollectionRole::Kind { kind: k } if *k == kind))
            .map(Collection::id)
            .collect();

        let mut changes = Vec::new();
        for collection in matching {
            if self.insert_member(collection, item)? {
                changes.push((collection, Op::Add, item));
            }
        }

        self.propagate_all(changes, Change::Collection)
    }

    /// Run the monitors registered on `attribute` for a change on `item`:
    /// sorted indexes re-sort the item, filters re-test it, and each
    /// affected collection reports the change once.
    pub(super) fn attribute_changed(
        &mut self,
        item: ItemId,
        attribute: &str,
    ) -> Result<(), InternalError> {
        let targets = self.monitors.targets(attribute).to_vec();
        let mut affected: IndexMap<ItemId, Op> = IndexMap::new();

        for target in targets {
            match target {
                MonitorTarget::Index { collection, index } => {
                    let Some(owner) = self.collections.get_mut(&collection) else {
                        continue;
                    };
                    if !owner.contains(item) {
                        continue;
                    }
                    owner.indexes.reindex_key(&self.items, &index, item)?;
                    affected.entry(collection).or_insert(Op::Changed);
                }
                MonitorTarget::Filter { collection } => {
                    if let Some(op) = self.reevaluate(collection, item, Op::Changed)? {
                        affected.insert(collection, op);
                    }
                }
            }
        }

        self.propagate_all(
            affected
                .into_iter()
                .map(|(collection, op)| (collection, op, item)),
            Change::Collection,
        )
    }

    // ------------------------------------------------------------------
    // Sinks
    // ------------------------------------------------------------------

    fn sinks_for(&self, collection: ItemId) -> Vec<SinkId> {
        let mut sinks: IndexSet<SinkId> = self
            .collections
            .get(&collection)
            .map(|c| {
                c.subscribers()
                    .filter_map(|s| match s {
                        Subscriber::Sink(id) => Some(id),
                        Subscriber::Collection(_) => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        if let Some(global) = self.global_subscribers.get(&collection) {
            sinks.extend(global.iter().copied());
        }

        sinks.into_iter().collect()
    }

    /// Deliver a dispatch change now; a collection change comes back as the
    /// event to queue.
    fn notify_sinks(
        &mut self,
        collection: ItemId,
        op: Op,
        item: ItemId,
        change: Change,
    ) -> Result<Option<CollectionEvent>, InternalError> {
        if self.is_loading() || self.sinks_for(collection).is_empty() {
            return Ok(None);
        }

        let event = CollectionEvent {
            op,
            collection,
            attribute: self.collection_ref(collection)?.attribute().to_string(),
            other: item,
        };
        match change {
            Change::Dispatch => {
                self.deliver(&event);
                Ok(None)
            }
            Change::Collection => Ok(Some(event)),
        }
    }

    /// Hand one event to every sink subscribed to its collection, directly
    /// or globally.
    pub(super) fn deliver(&mut self, event: &CollectionEvent) {
        for id in self.sinks_for(event.collection) {
            if let Some(sink) = self.sinks.get_mut(&id) {
                tracing::trace!(sink = %id, event = %event, "delivering notification");
                sink.on_collection_event(event);
            }
        }
        record(MetricsEvent::NotificationDispatched {
            collection: event.collection,
        });
    }
}

fn record_delta(collection: ItemId, adds: usize, removes: usize) {
    if adds + removes > 0 {
        record(MetricsEvent::DerivedDelta {
            collection,
            adds: adds as u64,
            removes: removes as u64,
        });
    }
}
