use crate::{
    collection::{
        Collection, CollectionError, CollectionRole, ItemPredicate, SmartStep, plan_add,
        plan_remove,
    },
    error::InternalError,
    item::{Item, ItemArena},
    monitor::MonitorTarget,
    notify::{Change, Op, SinkId, Subscriber},
    types::ItemId,
    util::AliasResolver,
    view::View,
};
use std::collections::HashSet;

///
/// MemberNames
///
/// Resolves an alias to the member whose item name matches it.
///

struct MemberNames<'a> {
    items: &'a ItemArena,
    members: &'a [ItemId],
}

impl AliasResolver<ItemId> for MemberNames<'_> {
    fn resolve_alias(&self, alias: &str) -> Option<ItemId> {
        self.members
            .iter()
            .copied()
            .find(|id| self.items.get(*id).and_then(Item::name) == Some(alias))
    }
}

impl View {
    pub fn collection(&self, id: ItemId) -> Result<&Collection, InternalError> {
        self.collection_ref(id)
    }

    #[must_use]
    pub fn is_collection(&self, id: ItemId) -> bool {
        self.collections.contains_key(&id)
    }

    /// Ids of every collection, oldest first.
    #[must_use]
    pub fn collection_ids(&self) -> Vec<ItemId> {
        let mut ids: Vec<_> = self.collections.keys().copied().collect();
        ids.sort_unstable();

        ids
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    pub fn create_list(&mut self) -> Result<ItemId, InternalError> {
        self.register_collection(CollectionRole::List)
    }

    /// Collection of every materialized item of `kind`, kept current as
    /// items are created, loaded and deleted.
    pub fn create_kind_collection(&mut self, kind: &str) -> Result<ItemId, InternalError> {
        self.register_collection(CollectionRole::Kind {
            kind: kind.to_string(),
        })
    }

    pub fn create_union(&mut self, sources: &[ItemId]) -> Result<ItemId, InternalError> {
        self.register_collection(CollectionRole::Union {
            sources: sources.to_vec(),
        })
    }

    pub fn create_intersection(&mut self, sources: &[ItemId]) -> Result<ItemId, InternalError> {
        self.register_collection(CollectionRole::Intersection {
            sources: sources.to_vec(),
        })
    }

    pub fn create_difference(
        &mut self,
        left: ItemId,
        right: ItemId,
    ) -> Result<ItemId, InternalError> {
        self.register_collection(CollectionRole::Difference {
            sources: vec![left, right],
        })
    }

    /// Members of `source` for which `predicate` holds. `attributes` lists
    /// what the predicate reads; setting one of them re-tests the item.
    pub fn create_filtered(
        &mut self,
        source: ItemId,
        predicate: ItemPredicate,
        attributes: &[&str],
    ) -> Result<ItemId, InternalError> {
        self.register_collection(CollectionRole::Filtered {
            source,
            predicate,
            attributes: attributes.iter().map(ToString::to_string).collect(),
        })
    }

    /// `(base ∪ inclusions) − exclusions − trash`, with fresh inclusion and
    /// exclusion lists. `trash` must be a list and may be shared.
    pub fn create_inclusion_exclusion(
        &mut self,
        base: Option<ItemId>,
        trash: Option<ItemId>,
    ) -> Result<ItemId, InternalError> {
        if let Some(trash) = trash
            && !matches!(self.collection_ref(trash)?.role(), CollectionRole::List)
        {
            return Err(InternalError::view_usage(format!(
                "trash {trash} must be a list collection"
            )));
        }

        let inclusions = self.create_list()?;
        let exclusions = self.create_list()?;

        self.register_collection(CollectionRole::InclusionExclusion {
            base,
            inclusions,
            exclusions,
            trash,
        })
    }

    /// All members of `source` with a selection kept in `index_name`
    /// (numeric `__adhoc__` order when `None`).
    pub fn create_selection(
        &mut self,
        source: ItemId,
        index_name: Option<&str>,
    ) -> Result<ItemId, InternalError> {
        let index_name = index_name.unwrap_or(crate::collection::ADHOC_INDEX);
        let id = self.register_collection(CollectionRole::Selection {
            source,
            index_name: index_name.to_string(),
        })?;
        self.ensure_selection_index(id, index_name)?;

        Ok(id)
    }

    fn register_collection(&mut self, role: CollectionRole) -> Result<ItemId, InternalError> {
        let id = self.next_id()?;
        self.validate_role(id, &role)?;

        let label = role.label();
        let mut collection = Collection::new(id, role.clone());
        collection.load_state = self.load_state;
        collection.dirty = !self.is_loading();
        self.collections.insert(id, collection);
        self.insert_item(Item::new(id, role.item_kind()))?;

        self.subscribe_sources(id, &role);
        self.attach_filter_monitors(id, &role);
        self.rebuild(id)?;

        tracing::debug!(collection = %id, role = label, "created collection");

        Ok(id)
    }

    /// Reject roles that would read from missing collections, from the
    /// collection itself or from something that already depends on it.
    fn validate_role(&self, id: ItemId, role: &CollectionRole) -> Result<(), InternalError> {
        if let CollectionRole::Difference { sources } = role
            && sources.len() != 2
        {
            return Err(CollectionError::DifferenceArity {
                collection: id,
                got: sources.len(),
            }
            .into());
        }

        for source in role.sources() {
            if source == id {
                return Err(CollectionError::SelfSubscription { collection: id }.into());
            }
            if !self.collections.contains_key(&source) {
                return Err(CollectionError::NoSuchCollection { collection: source }.into());
            }
            if self.depends_on(source, id) {
                return Err(CollectionError::Cycle {
                    collection: id,
                    source_id: source,
                }
                .into());
            }
        }

        Ok(())
    }

    /// Whether `from` reads, directly or transitively, from `target`.
    fn depends_on(&self, from: ItemId, target: ItemId) -> bool {
        let mut seen = HashSet::new();
        let mut pending = vec![from];

        while let Some(next) = pending.pop() {
            if next == target {
                return true;
            }
            if seen.insert(next)
                && let Some(collection) = self.collections.get(&next)
            {
                pending.extend(collection.role().sources());
            }
        }

        false
    }

    fn subscribe_sources(&mut self, id: ItemId, role: &CollectionRole) {
        for source in role.sources() {
            if let Some(source) = self.collections.get_mut(&source) {
                source.subscribers.insert(Subscriber::Collection(id));
            }
        }
    }

    fn unsubscribe_sources(&mut self, id: ItemId, role: &CollectionRole) {
        for source in role.sources() {
            if let Some(source) = self.collections.get_mut(&source) {
                source.subscribers.shift_remove(&Subscriber::Collection(id));
            }
        }
    }

    fn attach_filter_monitors(&mut self, id: ItemId, role: &CollectionRole) {
        if let CollectionRole::Filtered { attributes, .. } = role {
            for attribute in attributes {
                self.monitors
                    .attach(attribute, MonitorTarget::Filter { collection: id });
            }
        }
    }

    fn detach_filter_monitors(&mut self, id: ItemId, role: &CollectionRole) {
        if let CollectionRole::Filtered { attributes, .. } = role {
            for attribute in attributes {
                self.monitors
                    .detach(attribute, &MonitorTarget::Filter { collection: id });
            }
        }
    }

    /// Swap a derived collection's role, moving its subscriptions and
    /// monitors, then rebuild it.
    fn replace_role(&mut self, id: ItemId, role: CollectionRole) -> Result<(), InternalError> {
        self.validate_role(id, &role)?;

        let previous = self.collection_ref(id)?.role().clone();
        self.unsubscribe_sources(id, &previous);
        self.detach_filter_monitors(id, &previous);

        self.collection_mut(id)?.set_role(role.clone());
        self.subscribe_sources(id, &role);
        self.attach_filter_monitors(id, &role);

        self.rebuild(id)
    }

    /// Tear down a collection before its item is deleted.
    pub(super) fn drop_collection(&mut self, id: ItemId) -> Result<(), InternalError> {
        if let Some(dependent) = self
            .collections
            .values()
            .find(|c| c.id() != id && c.role().sources().contains(&id))
        {
            return Err(InternalError::view_usage(format!(
                "collection {id} is still a source of {}",
                dependent.id()
            )));
        }

        let role = self.collection_ref(id)?.role().clone();
        self.unsubscribe_sources(id, &role);
        self.monitors.detach_collection(id);
        self.global_subscribers.remove(&id);
        self.collections.remove(&id);

        tracing::debug!(collection = %id, role = role.label(), "dropped collection");

        // inclusion and exclusion lists belong to their smart collection
        if let CollectionRole::InclusionExclusion {
            inclusions,
            exclusions,
            ..
        } = role
        {
            for owned in [inclusions, exclusions] {
                if self.collections.contains_key(&owned) && !self.has_dependents(owned) {
                    self.delete_item(owned)?;
                }
            }
        }

        Ok(())
    }

    fn has_dependents(&self, id: ItemId) -> bool {
        self.collections
            .values()
            .any(|c| c.role().sources().contains(&id))
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    /// Add `item` to an explicit collection. Smart collections include it
    /// and restore it from their exclusions and trash; selections add to
    /// their source. Returns true when the collection gained the item.
    pub fn add(&mut self, collection: ItemId, item: ItemId) -> Result<bool, InternalError> {
        if !self.items.contains(item) {
            return Err(CollectionError::NoSuchItem { item }.into());
        }

        let target = self.collection_ref(collection)?;
        let role = target.role().clone();
        match role {
            CollectionRole::List => {
                if self.insert_member(collection, item)? {
                    self.propagate(collection, Op::Add, item)?;
                    return Ok(true);
                }

                Ok(false)
            }
            CollectionRole::InclusionExclusion { .. } => {
                let before = target.contains(item);
                let steps = plan_add(&self.lookup(), &role, item);
                self.apply_steps(collection, item, &steps)?;

                Ok(!before && self.collection_ref(collection)?.contains(item))
            }
            CollectionRole::Selection { source, .. } => self.add(source, item),
            _ => Err(target.not_implemented("add").into()),
        }
    }

    /// Remove `item`. A smart collection excludes it and moves it to its
    /// trash unless another collection sharing that trash still shows it.
    /// Returns true when the collection lost the item.
    pub fn remove(&mut self, collection: ItemId, item: ItemId) -> Result<bool, InternalError> {
        let target = self.collection_ref(collection)?;
        let role = target.role().clone();
        match role {
            CollectionRole::List => {
                if self.remove_member(collection, item)? {
                    self.propagate(collection, Op::Remove, item)?;
                    return Ok(true);
                }

                Ok(false)
            }
            CollectionRole::InclusionExclusion { trash, .. } => {
                let before = target.contains(item);
                let sharing = self.sharing_trash(collection, trash);
                let steps = plan_remove(&self.lookup(), collection, &role, item, &sharing);
                self.apply_steps(collection, item, &steps)?;

                Ok(before && !self.collection_ref(collection)?.contains(item))
            }
            CollectionRole::Selection { source, .. } => self.remove(source, item),
            _ => Err(target.not_implemented("remove").into()),
        }
    }

    /// Smart collections using `trash`, including `collection` itself.
    fn sharing_trash(&self, collection: ItemId, trash: Option<ItemId>) -> Vec<ItemId> {
        let Some(trash) = trash else {
            return vec![collection];
        };
        let mut sharing: Vec<ItemId> = self
            .collections
            .values()
            .filter(|c| {
                matches!(c.role(), CollectionRole::InclusionExclusion { trash: t, .. } if *t == Some(trash))
            })
            .map(Collection::id)
            .collect();
        sharing.sort_unstable();

        sharing
    }

    fn apply_steps(
        &mut self,
        collection: ItemId,
        item: ItemId,
        steps: &[SmartStep],
    ) -> Result<(), InternalError> {
        let mut changes = Vec::with_capacity(steps.len());
        for step in steps {
            tracing::debug!(collection = %collection, item = %item, step = %step, "smart collection step");
            match *step {
                SmartStep::AddTo(list) => {
                    if self.insert_member(list, item)? {
                        changes.push((list, Op::Add, item));
                    }
                }
                SmartStep::RemoveFrom(list) => {
                    if self.remove_member(list, item)? {
                        changes.push((list, Op::Remove, item));
                    }
                }
            }
        }

        self.propagate_all(changes, Change::Collection)
    }

    pub fn contains(&self, collection: ItemId, item: ItemId) -> Result<bool, InternalError> {
        Ok(self.collection_ref(collection)?.contains(item))
    }

    pub fn len(&self, collection: ItemId) -> Result<usize, InternalError> {
        Ok(self.collection_ref(collection)?.len())
    }

    pub fn is_empty(&self, collection: ItemId) -> Result<bool, InternalError> {
        Ok(self.collection_ref(collection)?.is_empty())
    }

    /// Members in collection order.
    pub fn members(&self, collection: ItemId) -> Result<Vec<ItemId>, InternalError> {
        Ok(self.collection_ref(collection)?.member_ids())
    }

    pub fn iter(
        &self,
        collection: ItemId,
    ) -> Result<impl Iterator<Item = ItemId> + '_, InternalError> {
        Ok(self.collection_ref(collection)?.iter())
    }

    /// Move a member of a list after `after` (`None` for the front).
    pub fn place(
        &mut self,
        collection: ItemId,
        item: ItemId,
        after: Option<ItemId>,
    ) -> Result<(), InternalError> {
        let target = self.collection_ref(collection)?;
        if !matches!(target.role(), CollectionRole::List) {
            return Err(target.not_implemented("place").into());
        }

        self.place_member(collection, item, after)
    }

    /// Bind (or with `None` clear) a member's alias; returns the previous one.
    pub fn set_alias(
        &mut self,
        collection: ItemId,
        item: ItemId,
        alias: Option<&str>,
    ) -> Result<Option<String>, InternalError> {
        let loading = self.is_loading();
        let target = self.collection_mut(collection)?;
        let previous = target.members.set_alias(item, alias)?;
        if !loading {
            target.dirty = true;
        }

        Ok(previous)
    }

    pub fn alias_of(&self, collection: ItemId, item: ItemId) -> Result<Option<&str>, InternalError> {
        Ok(self.collection_ref(collection)?.members.alias_of(&item))
    }

    /// Member bound to `alias`. With `load`, stub members are materialized
    /// and a member whose item name equals the alias also matches.
    pub fn get_by_alias(
        &mut self,
        collection: ItemId,
        alias: &str,
        load: bool,
    ) -> Result<Option<ItemId>, InternalError> {
        if !load {
            return Ok(self
                .collection_ref(collection)?
                .members
                .resolve_alias(alias, None));
        }

        self.load_stub_members(collection)?;
        let target = self.collection_ref(collection)?;
        let members = target.member_ids();
        let resolver = MemberNames {
            items: &self.items,
            members: &members,
        };

        Ok(target.members.resolve_alias(alias, Some(&resolver)))
    }

    /// Materialize stub members when a loader is available.
    pub(super) fn load_stub_members(&mut self, collection: ItemId) -> Result<(), InternalError> {
        if self.loader.is_none() {
            return Ok(());
        }
        let stubs: Vec<ItemId> = self
            .collection_ref(collection)?
            .iter()
            .filter(|id| self.items.is_stub(*id))
            .collect();
        for stub in stubs {
            self.load_item(stub)?;
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Sources
    // ------------------------------------------------------------------

    /// Replace the sources of a union, intersection or difference.
    pub fn set_sources(
        &mut self,
        collection: ItemId,
        sources: &[ItemId],
    ) -> Result<(), InternalError> {
        let target = self.collection_ref(collection)?;
        let sources = sources.to_vec();
        let role = match target.role() {
            CollectionRole::Union { .. } => CollectionRole::Union { sources },
            CollectionRole::Intersection { .. } => CollectionRole::Intersection { sources },
            CollectionRole::Difference { .. } => CollectionRole::Difference { sources },
            _ => return Err(target.not_implemented("set_sources").into()),
        };

        self.replace_role(collection, role)
    }

    /// Append a source to a union or intersection; false if already present.
    pub fn add_source(&mut self, collection: ItemId, source: ItemId) -> Result<bool, InternalError> {
        let target = self.collection_ref(collection)?;
        let mut sources = match target.role() {
            CollectionRole::Union { sources } | CollectionRole::Intersection { sources } => {
                sources.clone()
            }
            _ => return Err(target.not_implemented("add_source").into()),
        };
        if sources.contains(&source) {
            return Ok(false);
        }
        sources.push(source);
        self.set_sources(collection, &sources)?;

        Ok(true)
    }

    /// Drop a source from a union or intersection; false if absent.
    pub fn remove_source(
        &mut self,
        collection: ItemId,
        source: ItemId,
    ) -> Result<bool, InternalError> {
        let target = self.collection_ref(collection)?;
        let mut sources = match target.role() {
            CollectionRole::Union { sources } | CollectionRole::Intersection { sources } => {
                sources.clone()
            }
            _ => return Err(target.not_implemented("remove_source").into()),
        };
        let before = sources.len();
        sources.retain(|s| *s != source);
        if sources.len() == before {
            return Ok(false);
        }
        self.set_sources(collection, &sources)?;

        Ok(true)
    }

    /// Replace a filtered collection's predicate and monitored attributes.
    pub fn set_filter(
        &mut self,
        collection: ItemId,
        predicate: ItemPredicate,
        attributes: &[&str],
    ) -> Result<(), InternalError> {
        let target = self.collection_ref(collection)?;
        let CollectionRole::Filtered { source, .. } = target.role() else {
            return Err(target.not_implemented("set_filter").into());
        };
        let role = CollectionRole::Filtered {
            source: *source,
            predicate,
            attributes: attributes.iter().map(ToString::to_string).collect(),
        };

        self.replace_role(collection, role)
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    pub fn subscribe(&mut self, collection: ItemId, sink: SinkId) -> Result<bool, InternalError> {
        self.require_sink(sink)?;

        Ok(self
            .collection_mut(collection)?
            .subscribers
            .insert(Subscriber::Sink(sink)))
    }

    pub fn unsubscribe(&mut self, collection: ItemId, sink: SinkId) -> Result<bool, InternalError> {
        Ok(self
            .collection_mut(collection)?
            .subscribers
            .shift_remove(&Subscriber::Sink(sink)))
    }

    /// Subscribe a sink to a collection through the view-wide table, which
    /// lives apart from the collection's own subscriber list.
    pub fn subscribe_global(
        &mut self,
        collection: ItemId,
        sink: SinkId,
    ) -> Result<bool, InternalError> {
        self.require_sink(sink)?;
        self.collection_ref(collection)?;

        Ok(self
            .global_subscribers
            .entry(collection)
            .or_default()
            .insert(sink))
    }

    pub fn unsubscribe_global(&mut self, collection: ItemId, sink: SinkId) -> bool {
        let Some(sinks) = self.global_subscribers.get_mut(&collection) else {
            return false;
        };
        let removed = sinks.shift_remove(&sink);
        if sinks.is_empty() {
            self.global_subscribers.remove(&collection);
        }

        removed
    }

    fn require_sink(&self, sink: SinkId) -> Result<(), InternalError> {
        if self.sinks.contains_key(&sink) {
            Ok(())
        } else {
            Err(InternalError::notification_usage(format!(
                "{sink} is not registered"
            )))
        }
    }

    /// Report a change on `collection` to its subscribers, e.g. a refresh
    /// after members were edited out of band.
    pub fn notify(
        &mut self,
        collection: ItemId,
        op: Op,
        item: ItemId,
        change: Change,
    ) -> Result<(), InternalError> {
        self.collection_ref(collection)?;

        self.propagate_with(collection, op, item, change)
    }
}
