use crate::{
    persistent::{
        CopyFn, CopyPolicy, Element, FilterKey, Input, Owner, Persistent, PersistentError,
        PersistentValue, Storage,
    },
    types::{ItemId, ItemRef},
};

///
/// PersistentTuple
///
/// Fixed contents. Any removal is an `Immutable` error; use `contains_at` for
/// a read-only check.
///

pub type PersistentTuple = Persistent<Box<[Element]>>;

impl Storage for Box<[Element]> {
    fn len(&self) -> usize {
        <[Element]>::len(self)
    }

    fn refs(&self) -> Vec<ItemRef> {
        self.iter().filter_map(Element::as_item_ref).collect()
    }

    fn nested(&self) -> Vec<&PersistentValue> {
        self.iter()
            .filter_map(|e| match e {
                Element::Nested(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    fn nested_mut(&mut self) -> Vec<&mut PersistentValue> {
        self.iter_mut()
            .filter_map(|e| match e {
                Element::Nested(n) => Some(n),
                _ => None,
            })
            .collect()
    }
}

impl Persistent<Box<[Element]>> {
    pub fn from_inputs(
        owner: Option<Owner>,
        values: impl IntoIterator<Item = Input>,
    ) -> Result<Self, PersistentError> {
        let mut tuple = Self::new(owner);
        tuple.storage = values
            .into_iter()
            .map(|input| tuple.prepare(input))
            .collect::<Result<Vec<_>, _>>()?
            .into_boxed_slice();

        Ok(tuple)
    }

    #[must_use]
    pub fn get(&self, position: usize) -> Option<&Element> {
        self.storage.get(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.storage.iter()
    }

    #[must_use]
    pub fn contains(&self, element: &Element) -> bool {
        self.storage.contains(element)
    }

    #[must_use]
    pub fn copy_for(&self, owner: &Owner, policy: CopyPolicy, copy_fn: &mut CopyFn<'_>) -> Self {
        let mut copy = Self::new(Some(owner.clone()));
        copy.storage = self
            .storage
            .iter()
            .filter_map(|e| e.copy_for(owner, policy, copy_fn))
            .collect();

        copy
    }

    #[must_use]
    pub fn clone_for(&self, owner: &Owner) -> Self {
        let mut clone = Self::new(Some(owner.clone()));
        clone.storage = self.storage.iter().map(|e| e.clone_for(owner)).collect();

        clone
    }

    /// Fails with `Immutable` whenever a removal would be needed.
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
        if level == 0 {
            let matched = self.contains_at(item, key);
            if matched && remove {
                return Err(PersistentError::Immutable);
            }
            return Ok(matched);
        }

        for element in self.storage.iter_mut() {
            if let Element::Nested(nested) = element
                && nested.filter(item, level - 1, key, false)?
            {
                return Err(PersistentError::Immutable);
            }
        }

        Ok(false)
    }

    #[must_use]
    pub fn contains_at(&self, item: ItemId, key: &FilterKey) -> bool {
        match key {
            FilterKey::Position(position) => self
                .storage
                .get(*position)
                .is_some_and(|e| e.is_ref_to(item)),
            FilterKey::Name(_) => false,
        }
    }
}
