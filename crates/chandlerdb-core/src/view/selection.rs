//! Selection collections: a source's members viewed through one index whose
//! ranges hold the selection.

use crate::{
    collection::{ADHOC_INDEX, CollectionRole, selection_index_spec, single_positions},
    error::InternalError,
    index::RangeSet,
    types::ItemId,
    view::View,
};

impl View {
    /// Name of the index a selection collection is currently viewed through.
    pub fn selection_index_name(&self, collection: ItemId) -> Result<String, InternalError> {
        let target = self.collection_ref(collection)?;
        match target.role() {
            CollectionRole::Selection { index_name, .. } => Ok(index_name.clone()),
            _ => Err(target.not_implemented("selection").into()),
        }
    }

    pub(super) fn ensure_selection_index(
        &mut self,
        collection: ItemId,
        index_name: &str,
    ) -> Result<(), InternalError> {
        if !self.has_index(collection, index_name)? {
            self.add_index(collection, index_name, selection_index_spec(index_name))?;
        }

        Ok(())
    }

    /// Switch the index a selection is viewed through, creating it when
    /// missing and carrying the selected items over. Naming the current
    /// index with `toggle_descending` flips its direction instead.
    pub fn set_selection_index(
        &mut self,
        collection: ItemId,
        index_name: &str,
        toggle_descending: bool,
    ) -> Result<(), InternalError> {
        let current = self.selection_index_name(collection)?;

        if current != index_name {
            self.ensure_selection_index(collection, index_name)?;
            let selected = self.iter_selection(collection)?;
            let mut positions = Vec::with_capacity(selected.len());
            for item in selected {
                positions.push(self.position_in_index(collection, index_name, item)?);
            }
            self.set_index_ranges(collection, index_name, single_positions(positions))?;

            let target = self.collection_mut(collection)?;
            if let CollectionRole::Selection { source, .. } = *target.role() {
                target.set_role(CollectionRole::Selection {
                    source,
                    index_name: index_name.to_string(),
                });
            }
            tracing::debug!(collection = %collection, from = %current, to = index_name, "switched selection index");
        } else if toggle_descending {
            let descending = self.is_descending(collection, index_name)?;
            self.set_descending(collection, index_name, !descending)?;
        }

        Ok(())
    }

    pub fn selection_ranges(&mut self, collection: ItemId) -> Result<RangeSet, InternalError> {
        let name = self.selection_index_name(collection)?;

        self.index_ranges(collection, &name)
    }

    pub fn set_selection_ranges(
        &mut self,
        collection: ItemId,
        ranges: RangeSet,
    ) -> Result<(), InternalError> {
        let name = self.selection_index_name(collection)?;

        self.set_index_ranges(collection, &name, ranges)
    }

    pub fn clear_selection(&mut self, collection: ItemId) -> Result<(), InternalError> {
        self.set_selection_ranges(collection, RangeSet::new())
    }

    pub fn is_selection_empty(&mut self, collection: ItemId) -> Result<bool, InternalError> {
        Ok(self.selection_ranges(collection)?.is_empty())
    }

    pub fn select_item(&mut self, collection: ItemId, item: ItemId) -> Result<(), InternalError> {
        let name = self.selection_index_name(collection)?;
        let position = self.position_in_index(collection, &name, item)?;

        self.add_index_range(collection, &name, (position, position))
    }

    pub fn unselect_item(&mut self, collection: ItemId, item: ItemId) -> Result<(), InternalError> {
        let name = self.selection_index_name(collection)?;
        let position = self.position_in_index(collection, &name, item)?;

        self.remove_index_range(collection, &name, (position, position))
    }

    /// Make `item` the only selected member.
    pub fn set_selection_to_item(
        &mut self,
        collection: ItemId,
        item: ItemId,
    ) -> Result<(), InternalError> {
        let name = self.selection_index_name(collection)?;
        let position = self.position_in_index(collection, &name, item)?;

        self.set_index_ranges(collection, &name, single_positions([position]))
    }

    /// False for items that are not members.
    pub fn is_item_selected(
        &mut self,
        collection: ItemId,
        item: ItemId,
    ) -> Result<bool, InternalError> {
        let name = self.selection_index_name(collection)?;
        let index = self.index(collection, &name)?;

        Ok(index
            .position_of(item)
            .is_some_and(|p| index.is_in_ranges((p, p))))
    }

    pub fn first_selected_item(
        &mut self,
        collection: ItemId,
    ) -> Result<Option<ItemId>, InternalError> {
        Ok(self.iter_selection(collection)?.into_iter().next())
    }

    /// Selected members in index order.
    pub fn iter_selection(&mut self, collection: ItemId) -> Result<Vec<ItemId>, InternalError> {
        let name = self.selection_index_name(collection)?;

        self.iter_index_ranges(collection, &name)
    }

    /// Member at `position` of the selection index; negative positions
    /// count from the end.
    pub fn selection_item(
        &mut self,
        collection: ItemId,
        position: isize,
    ) -> Result<ItemId, InternalError> {
        let name = self.selection_index_name(collection)?;

        self.get_by_index(collection, &name, position)
    }

    /// Move a member to `location` of a manually ordered selection.
    pub fn move_item_to_location(
        &mut self,
        collection: ItemId,
        item: ItemId,
        location: usize,
    ) -> Result<(), InternalError> {
        let name = self.selection_index_name(collection)?;
        if name != ADHOC_INDEX {
            return Err(InternalError::view_usage(format!(
                "selection {collection} is sorted by '{name}' and cannot be reordered"
            )));
        }

        let after = match location.checked_sub(1) {
            None => None,
            Some(previous) => {
                let previous = isize::try_from(previous).map_err(|_| {
                    InternalError::view_usage(format!("location {location} is out of range"))
                })?;
                Some(self.get_by_index(collection, &name, previous)?)
            }
        };

        self.place_in_index(collection, &name, item, after)
    }
}
