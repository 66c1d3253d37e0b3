use crate::{
    index::{FindMode, Index, IndexContext, IndexError, IndexSnapshot, IndexSpec},
    types::ItemId,
};
use std::{cmp::Ordering, collections::BTreeMap};

///
/// Indexes
///
/// The named indexes of one collection plus a collection-wide validity flag.
/// Read paths require a valid index; callers revalidate through `validate`
/// before reading.
///

#[derive(Clone, Debug, Default)]
pub struct Indexes {
    owner: String,
    entries: BTreeMap<String, Index>,
    valid: bool,
}

impl Indexes {
    #[must_use]
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            entries: BTreeMap::new(),
            valid: true,
        }
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    #[must_use]
    pub fn has_index(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Index> {
        self.entries.values()
    }

    /// Add an index and fill it from `members`. With `defer` the index starts
    /// invalid and is built on first use.
    pub fn add_index(
        &mut self,
        ctx: &dyn IndexContext,
        name: &str,
        spec: IndexSpec,
        default_locale: &str,
        members: &[ItemId],
        defer: bool,
    ) -> Result<&Index, IndexError> {
        if self.entries.contains_key(name) {
            return Err(IndexError::AlreadyExists {
                collection: self.owner.clone(),
                index: name.to_string(),
            });
        }

        let mut index = Index::new(name, spec).with_default_locale(default_locale);
        if defer {
            index.invalidate();
        } else {
            index.fill(ctx, members);
        }

        Ok(self.entries.entry(name.to_string()).or_insert(index))
    }

    pub fn remove_index(&mut self, name: &str) -> Result<Index, IndexError> {
        self.entries
            .remove(name)
            .ok_or_else(|| self.no_such_index(name))
    }

    /// Borrow an index for reading; it must be valid.
    pub fn index(&self, name: &str) -> Result<&Index, IndexError> {
        let index = self.entries.get(name).ok_or_else(|| self.no_such_index(name))?;
        if !index.is_valid() {
            return Err(IndexError::Invalid {
                index: name.to_string(),
            });
        }

        Ok(index)
    }

    /// Borrow an index regardless of validity.
    pub fn index_mut(&mut self, name: &str) -> Result<&mut Index, IndexError> {
        let owner = &self.owner;
        self.entries
            .get_mut(name)
            .ok_or_else(|| IndexError::NoSuchIndex {
                collection: owner.clone(),
                index: name.to_string(),
            })
    }

    fn no_such_index(&self, name: &str) -> IndexError {
        IndexError::NoSuchIndex {
            collection: self.owner.clone(),
            index: name.to_string(),
        }
    }

    // ------------------------------------------------------------------
    // Validity
    // ------------------------------------------------------------------

    /// Mark every index invalid without discarding its structure.
    pub fn invalidate(&mut self) {
        if self.valid {
            for index in self.entries.values_mut() {
                index.invalidate();
            }
        }
        self.valid = false;
    }

    #[must_use]
    pub fn needs_validation(&self) -> bool {
        !self.valid || self.entries.values().any(|index| !index.is_valid())
    }

    /// Bring every index back in line with `members`, restoring saved
    /// structure where it still applies and rebuilding otherwise.
    pub fn validate(&mut self, ctx: &dyn IndexContext, members: &[ItemId]) {
        for index in self.entries.values_mut() {
            index.validate(ctx, members);
        }
        self.valid = true;
    }

    /// Install persisted index state; each index restores from it at the
    /// next validation.
    pub fn restore(&mut self, snapshots: Vec<(IndexSpec, IndexSnapshot)>, default_locale: &str) {
        for (spec, snapshot) in snapshots {
            let name = snapshot.name.clone();
            let index = self
                .entries
                .entry(name.clone())
                .or_insert_with(|| Index::new(name, spec).with_default_locale(default_locale));
            index.stage(snapshot);
        }
        self.valid = false;
    }

    #[must_use]
    pub fn snapshots(&self) -> Vec<IndexSnapshot> {
        self.entries.values().map(Index::snapshot).collect()
    }

    // ------------------------------------------------------------------
    // Key maintenance
    // ------------------------------------------------------------------

    /// Insert a new member into every valid index.
    pub fn insert_key(&mut self, ctx: &dyn IndexContext, key: ItemId, after: Option<ItemId>) {
        for index in self.entries.values_mut().filter(|i| i.is_valid()) {
            index.insert_key(ctx, key, after);
        }
    }

    pub fn remove_key(&mut self, key: ItemId) {
        for index in self.entries.values_mut().filter(|i| i.is_valid()) {
            index.remove_key(key);
        }
    }

    /// Re-sort `key` in the named index. Returns true when it moved.
    pub fn reindex_key(
        &mut self,
        ctx: &dyn IndexContext,
        name: &str,
        key: ItemId,
    ) -> Result<bool, IndexError> {
        Ok(self.index_mut(name)?.reindex_key(ctx, key))
    }

    /// Follow a collection-order move in every numeric index.
    pub fn move_key(&mut self, ctx: &dyn IndexContext, key: ItemId, after: Option<ItemId>) {
        for index in self
            .entries
            .values_mut()
            .filter(|i| i.is_valid() && !i.spec().is_sorted())
        {
            // both keys are members; a failure means the index is stale
            if index.move_key(ctx, key, after).is_err() {
                index.invalidate();
            }
        }
    }

    /// Rebuild one index from `members`, discarding any saved structure.
    pub fn fill_index(
        &mut self,
        ctx: &dyn IndexContext,
        name: &str,
        members: &[ItemId],
    ) -> Result<(), IndexError> {
        self.index_mut(name)?.fill(ctx, members);

        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn find_in_index(
        &self,
        name: &str,
        mode: FindMode,
        predicate: &dyn Fn(ItemId) -> Ordering,
    ) -> Result<Option<ItemId>, IndexError> {
        Ok(self.index(name)?.find_key(mode, predicate))
    }

    pub fn resolve_index(&self, name: &str, position: isize) -> Result<ItemId, IndexError> {
        self.index(name)?.key_at(position)
    }

    pub fn position_in_index(&self, name: &str, key: ItemId) -> Result<usize, IndexError> {
        self.index(name)?
            .position_of(key)
            .ok_or_else(|| IndexError::NoSuchItemInCollection {
                collection: self.owner.clone(),
                item: key,
            })
    }

    pub fn index_size(&self, name: &str) -> Result<usize, IndexError> {
        Ok(self.index(name)?.len())
    }

    /// Audit every index against the owning collection's length.
    /// Logs each divergence and returns false if any was found.
    #[must_use]
    pub fn check(&self, members: usize) -> bool {
        let mut ok = true;

        if !self.valid {
            tracing::error!(
                collection = %self.owner,
                "indexes installed on collection are invalid"
            );
            ok = false;
        }

        for (name, index) in &self.entries {
            if index.len() != members {
                tracing::error!(
                    collection = %self.owner,
                    index = %name,
                    index_len = index.len(),
                    members,
                    "index length does not match collection length"
                );
                ok = false;
                continue;
            }

            let walked = index.keys().count();
            if walked != index.len() {
                tracing::error!(
                    collection = %self.owner,
                    index = %name,
                    walked,
                    index_len = index.len(),
                    "index iteration does not match its length"
                );
                ok = false;
            }
        }

        ok
    }
}
