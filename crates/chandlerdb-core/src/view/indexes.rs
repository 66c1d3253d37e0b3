use crate::{
    MAX_SORT_ATTRIBUTES,
    collection::{CollectionError, CollectionRole, LoadState},
    error::InternalError,
    index::{FindMode, Index, IndexKind, IndexSnapshot, IndexSpec, KeyComparator, RangeSet},
    monitor::MonitorTarget,
    serialize::{deserialize, serialize},
    types::ItemId,
    view::View,
};
use std::{cmp::Ordering, sync::Arc};

impl View {
    /// Add a named index to a collection and register monitors for the
    /// attributes it sorts on. While the collection (or the view) is
    /// loading the index is built on first use instead.
    pub fn add_index(
        &mut self,
        collection: ItemId,
        name: &str,
        spec: IndexSpec,
    ) -> Result<(), InternalError> {
        if let IndexSpec::Attribute { attributes, .. } = &spec
            && !(1..=MAX_SORT_ATTRIBUTES).contains(&attributes.len())
        {
            return Err(InternalError::view_usage(format!(
                "index '{name}' must sort on 1 to {MAX_SORT_ATTRIBUTES} attributes, got {}",
                attributes.len()
            )));
        }

        let monitored = spec.monitored_attributes();
        let loading = self.is_loading();
        let target = self
            .collections
            .get_mut(&collection)
            .ok_or(CollectionError::NoSuchCollection { collection })?;
        let defer = loading || target.load_state == LoadState::Loading;
        let members = target.member_ids();
        target.indexes.add_index(
            &self.items,
            name,
            spec,
            &self.config.index.default_locale,
            &members,
            defer,
        )?;

        for attribute in monitored {
            self.monitors.attach(
                &attribute,
                MonitorTarget::Index {
                    collection,
                    index: name.to_string(),
                },
            );
        }
        tracing::debug!(collection = %collection, index = name, deferred = defer, "added index");

        Ok(())
    }

    pub fn remove_index(&mut self, collection: ItemId, name: &str) -> Result<(), InternalError> {
        self.collection_mut(collection)?.indexes.remove_index(name)?;
        self.monitors.detach_index(collection, name);

        Ok(())
    }

    pub fn has_index(&self, collection: ItemId, name: &str) -> Result<bool, InternalError> {
        Ok(self.collection_ref(collection)?.indexes.has_index(name))
    }

    /// Bring a collection's indexes up to date with its members, loading
    /// stub members first so sorted indexes can read them.
    pub fn validate_indexes(&mut self, collection: ItemId) -> Result<(), InternalError> {
        if !self.collection_ref(collection)?.indexes.needs_validation() {
            return Ok(());
        }
        self.load_stub_members(collection)?;

        let target = self
            .collections
            .get_mut(&collection)
            .ok_or(CollectionError::NoSuchCollection { collection })?;
        let members = target.member_ids();
        target.indexes.validate(&self.items, &members);

        Ok(())
    }

    /// Validated index for reading.
    pub fn index(&mut self, collection: ItemId, name: &str) -> Result<&Index, InternalError> {
        self.validate_indexes(collection)?;

        Ok(self.collection_ref(collection)?.indexes.index(name)?)
    }

    fn index_for_update(
        &mut self,
        collection: ItemId,
        name: &str,
    ) -> Result<&mut Index, InternalError> {
        self.validate_indexes(collection)?;

        Ok(self.collection_mut(collection)?.indexes.index_mut(name)?)
    }

    /// Rebuild one index from the collection's current members.
    pub fn fill_index(&mut self, collection: ItemId, name: &str) -> Result<(), InternalError> {
        self.load_stub_members(collection)?;
        let target = self
            .collections
            .get_mut(&collection)
            .ok_or(CollectionError::NoSuchCollection { collection })?;
        let members = target.member_ids();
        target.indexes.fill_index(&self.items, name, &members)?;

        Ok(())
    }

    pub fn invalidate_indexes(&mut self, collection: ItemId) -> Result<(), InternalError> {
        self.collection_mut(collection)?.indexes.invalidate();

        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Binary search an index; `predicate` compares a key with the value
    /// sought and must be monotonic in index order.
    pub fn find_in_index(
        &mut self,
        collection: ItemId,
        name: &str,
        mode: FindMode,
        predicate: &dyn Fn(ItemId) -> Ordering,
    ) -> Result<Option<ItemId>, InternalError> {
        Ok(self.index(collection, name)?.find_key(mode, predicate))
    }

    /// Key at `position`; negative positions count from the end.
    pub fn get_by_index(
        &mut self,
        collection: ItemId,
        name: &str,
        position: isize,
    ) -> Result<ItemId, InternalError> {
        Ok(self.index(collection, name)?.key_at(position)?)
    }

    pub fn position_in_index(
        &mut self,
        collection: ItemId,
        name: &str,
        item: ItemId,
    ) -> Result<usize, InternalError> {
        self.validate_indexes(collection)?;

        Ok(self
            .collection_ref(collection)?
            .indexes
            .position_in_index(name, item)?)
    }

    pub fn first_in_index(
        &mut self,
        collection: ItemId,
        name: &str,
    ) -> Result<Option<ItemId>, InternalError> {
        Ok(self.index(collection, name)?.first_key())
    }

    pub fn last_in_index(
        &mut self,
        collection: ItemId,
        name: &str,
    ) -> Result<Option<ItemId>, InternalError> {
        Ok(self.index(collection, name)?.last_key())
    }

    pub fn next_in_index(
        &mut self,
        collection: ItemId,
        name: &str,
        item: ItemId,
    ) -> Result<Option<ItemId>, InternalError> {
        Ok(self.index(collection, name)?.next_key(item)?)
    }

    pub fn previous_in_index(
        &mut self,
        collection: ItemId,
        name: &str,
        item: ItemId,
    ) -> Result<Option<ItemId>, InternalError> {
        Ok(self.index(collection, name)?.previous_key(item)?)
    }

    /// Keys from `first` through `last` inclusive in index order; `None`
    /// bounds mean the ends.
    pub fn iter_index_keys(
        &mut self,
        collection: ItemId,
        name: &str,
        first: Option<ItemId>,
        last: Option<ItemId>,
    ) -> Result<Vec<ItemId>, InternalError> {
        Ok(self.index(collection, name)?.keys_between(first, last)?)
    }

    pub fn index_size(&mut self, collection: ItemId, name: &str) -> Result<usize, InternalError> {
        Ok(self.index(collection, name)?.len())
    }

    pub fn index_entry_value(
        &mut self,
        collection: ItemId,
        name: &str,
        item: ItemId,
    ) -> Result<i32, InternalError> {
        Ok(self.index(collection, name)?.entry_value(item)?)
    }

    pub fn set_index_entry_value(
        &mut self,
        collection: ItemId,
        name: &str,
        item: ItemId,
        value: i32,
    ) -> Result<(), InternalError> {
        self.index_for_update(collection, name)?
            .set_entry_value(item, value)?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Ranges and direction
    // ------------------------------------------------------------------

    pub fn index_ranges(
        &mut self,
        collection: ItemId,
        name: &str,
    ) -> Result<RangeSet, InternalError> {
        Ok(self.index(collection, name)?.ranges().clone())
    }

    pub fn set_index_ranges(
        &mut self,
        collection: ItemId,
        name: &str,
        ranges: RangeSet,
    ) -> Result<(), InternalError> {
        self.index_for_update(collection, name)?.set_ranges(ranges);

        Ok(())
    }

    pub fn add_index_range(
        &mut self,
        collection: ItemId,
        name: &str,
        range: (usize, usize),
    ) -> Result<(), InternalError> {
        self.index_for_update(collection, name)?.add_range(range);

        Ok(())
    }

    pub fn remove_index_range(
        &mut self,
        collection: ItemId,
        name: &str,
        range: (usize, usize),
    ) -> Result<(), InternalError> {
        self.index_for_update(collection, name)?.remove_range(range);

        Ok(())
    }

    pub fn is_in_index_ranges(
        &mut self,
        collection: ItemId,
        name: &str,
        range: (usize, usize),
    ) -> Result<bool, InternalError> {
        Ok(self.index(collection, name)?.is_in_ranges(range))
    }

    /// Keys at selected positions, in index order.
    pub fn iter_index_ranges(
        &mut self,
        collection: ItemId,
        name: &str,
    ) -> Result<Vec<ItemId>, InternalError> {
        Ok(self.index(collection, name)?.iter_ranges().collect())
    }

    /// Set an index's direction; returns the previous one.
    pub fn set_descending(
        &mut self,
        collection: ItemId,
        name: &str,
        descending: bool,
    ) -> Result<bool, InternalError> {
        Ok(self
            .index_for_update(collection, name)?
            .set_descending(descending))
    }

    pub fn is_descending(&mut self, collection: ItemId, name: &str) -> Result<bool, InternalError> {
        Ok(self.index(collection, name)?.is_descending())
    }

    // ------------------------------------------------------------------
    // Positional edits
    // ------------------------------------------------------------------

    /// Remove the member at `position` of an index; returns it.
    pub fn remove_by_index(
        &mut self,
        collection: ItemId,
        name: &str,
        position: isize,
    ) -> Result<ItemId, InternalError> {
        let item = self.get_by_index(collection, name, position)?;
        self.remove(collection, item)?;

        Ok(item)
    }

    /// Add `item` to a list so it lands at `position` of a numeric index.
    pub fn insert_by_index(
        &mut self,
        collection: ItemId,
        name: &str,
        position: usize,
        item: ItemId,
    ) -> Result<(), InternalError> {
        self.require_numeric(collection, name, "insert_by_index")?;
        let after = match position {
            0 => None,
            p => Some(self.get_by_index(collection, name, position_as_index(p - 1)?)?),
        };
        self.add(collection, item)?;

        self.place_member(collection, item, after)
    }

    /// Put `item` where the member at `position` is and remove that member,
    /// which is returned.
    pub fn replace_by_index(
        &mut self,
        collection: ItemId,
        name: &str,
        position: isize,
        item: ItemId,
    ) -> Result<ItemId, InternalError> {
        let replaced = self.get_by_index(collection, name, position)?;
        if replaced == item {
            return Ok(replaced);
        }
        self.add(collection, item)?;
        if !self.index(collection, name)?.spec().is_sorted() {
            self.place_member(collection, item, Some(replaced))?;
        }
        self.remove(collection, replaced)?;

        Ok(replaced)
    }

    /// Move `item` after `after` (`None` for the front) in one index only,
    /// leaving collection order alone.
    pub fn place_in_index(
        &mut self,
        collection: ItemId,
        name: &str,
        item: ItemId,
        after: Option<ItemId>,
    ) -> Result<(), InternalError> {
        self.validate_indexes(collection)?;
        let loading = self.is_loading();
        let target = self
            .collections
            .get_mut(&collection)
            .ok_or(CollectionError::NoSuchCollection { collection })?;
        target
            .indexes
            .index_mut(name)?
            .move_key(&self.items, item, after)?;
        if !loading {
            target.dirty = true;
        }

        Ok(())
    }

    fn require_numeric(
        &mut self,
        collection: ItemId,
        name: &str,
        operation: &'static str,
    ) -> Result<(), InternalError> {
        let target = self.collection_ref(collection)?;
        if !matches!(target.role(), CollectionRole::List) {
            return Err(target.not_implemented(operation).into());
        }
        if self.index(collection, name)?.spec().is_sorted() {
            return Err(InternalError::view_usage(format!(
                "{operation} needs a numeric index, '{name}' is sorted"
            )));
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Audit and persistence
    // ------------------------------------------------------------------

    /// Compare every index of a collection with its length; divergences
    /// are logged and reported as false.
    pub fn check_indexes(&self, collection: ItemId) -> Result<bool, InternalError> {
        let target = self.collection_ref(collection)?;

        Ok(target.indexes.check(target.len()))
    }

    /// Audit every collection whose indexes are built; indexes waiting
    /// for their first use are skipped.
    #[must_use]
    pub fn check_all_indexes(&self) -> bool {
        self.collection_ids()
            .iter()
            .filter_map(|id| self.collections.get(id))
            .filter(|c| !c.indexes.is_empty() && !c.indexes.needs_validation())
            .fold(true, |ok, c| c.indexes.check(c.len()) && ok)
    }

    /// Serialize the structure of every index on a collection.
    pub fn save_indexes(&mut self, collection: ItemId) -> Result<Vec<u8>, InternalError> {
        self.validate_indexes(collection)?;
        let snapshots = self.collection_ref(collection)?.indexes.snapshots();

        Ok(serialize(&snapshots)?)
    }

    /// Install saved index structure. Each index restores itself on next
    /// use when it still matches the members, and is rebuilt otherwise.
    /// `compare` indexes need their comparator among `comparators`.
    pub fn load_indexes(
        &mut self,
        collection: ItemId,
        bytes: &[u8],
        comparators: &[Arc<dyn KeyComparator>],
    ) -> Result<usize, InternalError> {
        self.collection_ref(collection)?;
        let snapshots: Vec<IndexSnapshot> = deserialize(bytes)?;
        let mut staged = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            let comparator = comparators
                .iter()
                .find(|c| {
                    matches!(&snapshot.kind, IndexKind::Compare { comparator } if comparator == c.name())
                })
                .cloned();
            let spec = IndexSpec::from_kind(&snapshot.name, &snapshot.kind, comparator)?;
            staged.push((spec, snapshot));
        }

        let count = staged.len();
        for (spec, snapshot) in &staged {
            for attribute in spec.monitored_attributes() {
                self.monitors.attach(
                    &attribute,
                    MonitorTarget::Index {
                        collection,
                        index: snapshot.name.clone(),
                    },
                );
            }
        }
        let locale = self.config.index.default_locale.clone();
        self.collection_mut(collection)?
            .indexes
            .restore(staged, &locale);

        Ok(count)
    }
}

fn position_as_index(position: usize) -> Result<isize, InternalError> {
    isize::try_from(position)
        .map_err(|_| InternalError::view_usage(format!("position {position} is out of range")))
}
