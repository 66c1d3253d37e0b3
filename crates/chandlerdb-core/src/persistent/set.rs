use crate::{
    persistent::{
        CopyFn, CopyPolicy, FilterKey, Input, Owner, Persistent, PersistentError,
        PersistentValue, SetElement, Storage,
    },
    types::{ItemId, ItemRef},
};
use indexmap::IndexSet;

///
/// PersistentSet
///
/// Insertion ordered; members are scalars or references only.
///

pub type PersistentSet = Persistent<IndexSet<SetElement>>;

impl Storage for IndexSet<SetElement> {
    fn len(&self) -> usize {
        Self::len(self)
    }

    fn refs(&self) -> Vec<ItemRef> {
        self.iter()
            .filter_map(|e| match e {
                SetElement::Ref(r) => Some(*r),
                SetElement::Scalar(_) => None,
            })
            .collect()
    }

    fn nested(&self) -> Vec<&PersistentValue> {
        Vec::new()
    }

    fn nested_mut(&mut self) -> Vec<&mut PersistentValue> {
        Vec::new()
    }
}

impl Persistent<IndexSet<SetElement>> {
    pub fn from_inputs(
        owner: Option<Owner>,
        values: impl IntoIterator<Item = Input>,
    ) -> Result<Self, PersistentError> {
        let mut set = Self::new(owner);
        set.bulk_load(|set| set.update(values))?;

        Ok(set)
    }

    #[must_use]
    pub fn contains(&self, element: &SetElement) -> bool {
        self.storage.contains(element)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SetElement> {
        self.storage.iter()
    }

    fn prepare_member(&self, input: Input) -> Result<SetElement, PersistentError> {
        SetElement::try_from(self.prepare(input)?)
    }

    /// Add a member; returns false when it was already present.
    pub fn insert(&mut self, input: impl Into<Input>) -> Result<bool, PersistentError> {
        let member = self.prepare_member(input.into())?;

        self.mutate(|storage| Ok(storage.insert(member)))
    }

    pub fn remove(&mut self, element: &SetElement) -> Result<(), PersistentError> {
        self.mutate(|storage| {
            if storage.shift_remove(element) {
                Ok(())
            } else {
                Err(PersistentError::NoSuchKey {
                    key: format!("{element:?}"),
                })
            }
        })
    }

    /// Remove if present; returns whether anything was removed.
    pub fn discard(&mut self, element: &SetElement) -> Result<bool, PersistentError> {
        self.mutate(|storage| Ok(storage.shift_remove(element)))
    }

    pub fn update(&mut self, values: impl IntoIterator<Item = Input>) -> Result<(), PersistentError> {
        let members = values
            .into_iter()
            .map(|input| self.prepare_member(input))
            .collect::<Result<Vec<_>, _>>()?;

        self.mutate(|storage| {
            storage.extend(members);
            Ok(())
        })
    }

    pub fn intersection_update(&mut self, other: &IndexSet<SetElement>) -> Result<(), PersistentError> {
        self.mutate(|storage| {
            storage.retain(|e| other.contains(e));
            Ok(())
        })
    }

    pub fn difference_update(&mut self, other: &IndexSet<SetElement>) -> Result<(), PersistentError> {
        self.mutate(|storage| {
            storage.retain(|e| !other.contains(e));
            Ok(())
        })
    }

    pub fn clear(&mut self) -> Result<(), PersistentError> {
        self.mutate(|storage| {
            storage.clear();
            Ok(())
        })
    }

    #[must_use]
    pub fn copy_for(&self, owner: &Owner, policy: CopyPolicy, copy_fn: &mut CopyFn<'_>) -> Self {
        let mut copy = Self::new(Some(owner.clone()));
        copy.storage = self
            .storage
            .iter()
            .filter_map(|e| match e {
                SetElement::Scalar(v) => Some(SetElement::Scalar(v.clone())),
                SetElement::Ref(r) => copy_fn(*r, policy).map(SetElement::Ref),
            })
            .collect();

        copy
    }

    #[must_use]
    pub fn clone_for(&self, owner: &Owner) -> Self {
        let mut clone = Self::new(Some(owner.clone()));
        clone.storage.clone_from(&self.storage);

        clone
    }

    /// Sets hold no nested containers, so only level 0 can match; `key` is
    /// ignored.
    pub fn filter_item(
        &mut self,
        item: ItemId,
        level: usize,
        key: &FilterKey,
    ) -> Result<bool, PersistentError> {
        self.filter(item, level, key, true)
    }

    pub(crate) fn filter(
        &mut self,
        item: ItemId,
        level: usize,
        key: &FilterKey,
        remove: bool,
    ) -> Result<bool, PersistentError> {
        if level > 0 {
            return Ok(false);
        }

        let matched = self.contains_at(item, key);
        if matched && remove {
            self.remove(&SetElement::Ref(ItemRef::new(item)))?;
        }

        Ok(matched)
    }

    #[must_use]
    pub fn contains_at(&self, item: ItemId, _key: &FilterKey) -> bool {
        self.storage.contains(&SetElement::Ref(ItemRef::new(item)))
    }
}
