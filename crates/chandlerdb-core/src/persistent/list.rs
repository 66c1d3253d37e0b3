use crate::{
    persistent::{
        CopyFn, CopyPolicy, Element, FilterKey, Input, Owner, Persistent, PersistentError,
        PersistentValue, Storage, filter_nested,
    },
    types::{ItemId, ItemRef},
    value::Value,
};

///
/// PersistentList
///

pub type PersistentList = Persistent<Vec<Element>>;

impl Storage for Vec<Element> {
    fn len(&self) -> usize {
        Self::len(self)
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

impl Persistent<Vec<Element>> {
    /// Build from inputs without marking dirty.
    pub fn from_inputs(
        owner: Option<Owner>,
        values: impl IntoIterator<Item = Input>,
    ) -> Result<Self, PersistentError> {
        let mut list = Self::new(owner);
        list.bulk_load(|list| list.extend(values))?;

        Ok(list)
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
    pub fn contains_value(&self, value: &Value) -> bool {
        match value {
            Value::Ref(id) => self.contains(&Element::Ref(ItemRef::new(*id))),
            other => self.contains(&Element::Scalar(other.clone())),
        }
    }

    #[must_use]
    pub fn position(&self, element: &Element) -> Option<usize> {
        self.storage.iter().position(|e| e == element)
    }

    pub fn push(&mut self, input: impl Into<Input>) -> Result<(), PersistentError> {
        let element = self.prepare(input.into())?;

        self.mutate(|storage| {
            storage.push(element);
            Ok(())
        })
    }

    pub fn insert(&mut self, position: usize, input: impl Into<Input>) -> Result<(), PersistentError> {
        let element = self.prepare(input.into())?;

        self.mutate(|storage| {
            if position > storage.len() {
                return Err(out_of_range(position, storage.len()));
            }
            storage.insert(position, element);
            Ok(())
        })
    }

    /// Replace the element at `position`, returning the old one.
    pub fn set(&mut self, position: usize, input: impl Into<Input>) -> Result<Element, PersistentError> {
        let element = self.prepare(input.into())?;

        self.mutate(|storage| {
            let len = storage.len();
            storage
                .get_mut(position)
                .map(|slot| std::mem::replace(slot, element))
                .ok_or_else(|| out_of_range(position, len))
        })
    }

    pub fn remove_at(&mut self, position: usize) -> Result<Element, PersistentError> {
        self.mutate(|storage| {
            if position >= storage.len() {
                return Err(out_of_range(position, storage.len()));
            }
            Ok(storage.remove(position))
        })
    }

    /// Remove the first element equal to `element`.
    pub fn remove(&mut self, element: &Element) -> Result<(), PersistentError> {
        let position = self.position(element).ok_or_else(|| PersistentError::NoSuchKey {
            key: format!("{element:?}"),
        })?;

        self.remove_at(position).map(|_| ())
    }

    pub fn pop(&mut self) -> Result<Option<Element>, PersistentError> {
        self.mutate(|storage| Ok(storage.pop()))
    }

    pub fn extend(&mut self, values: impl IntoIterator<Item = Input>) -> Result<(), PersistentError> {
        let elements = values
            .into_iter()
            .map(|input| self.prepare(input))
            .collect::<Result<Vec<_>, _>>()?;

        self.mutate(|storage| {
            storage.extend(elements);
            Ok(())
        })
    }

    pub fn reverse(&mut self) -> Result<(), PersistentError> {
        self.mutate(|storage| {
            storage.reverse();
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

    /// Remove occurrences of `item`.
    ///
    /// At level 0 the element at `key` is removed when it references `item`.
    /// At a deeper level every nested container that matches one level down
    /// is removed from this list.
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
            let FilterKey::Position(position) = key else {
                return Ok(false);
            };
            let matched = self.contains_at(item, key);
            if matched && remove {
                self.remove_at(*position)?;
            }
            return Ok(matched);
        }

        self.check_writable()?;
        let mut matched = Vec::new();
        for (position, element) in self.storage.iter_mut().enumerate() {
            if filter_nested(element, item, level, key)? {
                matched.push(position);
            }
        }
        for position in matched.iter().rev() {
            self.storage.remove(*position);
        }
        if !matched.is_empty() || self.any_nested_dirty() {
            self.touch();
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

const fn out_of_range(position: usize, len: usize) -> PersistentError {
    PersistentError::PositionOutOfRange { position, len }
}
