use crate::{
    persistent::{
        CopyFn, CopyPolicy, Element, FilterKey, Input, Owner, Persistent, PersistentError,
        PersistentValue, Storage, filter_nested,
    },
    types::{ItemId, ItemRef},
};
use indexmap::IndexMap;

///
/// PersistentDict
///
/// String-keyed, insertion ordered.
///

pub type PersistentDict = Persistent<IndexMap<String, Element>>;

impl Storage for IndexMap<String, Element> {
    fn len(&self) -> usize {
        Self::len(self)
    }

    fn refs(&self) -> Vec<ItemRef> {
        self.values().filter_map(Element::as_item_ref).collect()
    }

    fn nested(&self) -> Vec<&PersistentValue> {
        self.values()
            .filter_map(|e| match e {
                Element::Nested(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    fn nested_mut(&mut self) -> Vec<&mut PersistentValue> {
        self.values_mut()
            .filter_map(|e| match e {
                Element::Nested(n) => Some(n),
                _ => None,
            })
            .collect()
    }
}

impl Persistent<IndexMap<String, Element>> {
    /// Build from entries without marking dirty.
    pub fn from_inputs(
        owner: Option<Owner>,
        entries: impl IntoIterator<Item = (String, Input)>,
    ) -> Result<Self, PersistentError> {
        let mut dict = Self::new(owner);
        dict.bulk_load(|dict| dict.update(entries))?;

        Ok(dict)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Element> {
        self.storage.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.storage.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.storage.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Element)> {
        self.storage.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Set `key`, returning the previous element.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        input: impl Into<Input>,
    ) -> Result<Option<Element>, PersistentError> {
        let element = self.prepare(input.into())?;
        let key = key.into();

        self.mutate(|storage| Ok(storage.insert(key, element)))
    }

    /// Return the element at `key`, inserting `input` first when absent.
    /// Only an insertion marks dirty.
    pub fn set_default(
        &mut self,
        key: impl Into<String>,
        input: impl Into<Input>,
    ) -> Result<&Element, PersistentError> {
        let key = key.into();
        if !self.storage.contains_key(&key) {
            self.insert(key.clone(), input)?;
        }

        self.storage.get(&key).ok_or(PersistentError::NoSuchKey { key })
    }

    pub fn remove(&mut self, key: &str) -> Result<Element, PersistentError> {
        self.mutate(|storage| {
            storage
                .shift_remove(key)
                .ok_or_else(|| PersistentError::NoSuchKey {
                    key: key.to_string(),
                })
        })
    }

    pub fn update(
        &mut self,
        entries: impl IntoIterator<Item = (String, Input)>,
    ) -> Result<(), PersistentError> {
        let prepared = entries
            .into_iter()
            .map(|(k, input)| self.prepare(input).map(|e| (k, e)))
            .collect::<Result<Vec<_>, _>>()?;

        self.mutate(|storage| {
            storage.extend(prepared);
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
            .filter_map(|(k, e)| e.copy_for(owner, policy, copy_fn).map(|e| (k.clone(), e)))
            .collect();

        copy
    }

    #[must_use]
    pub fn clone_for(&self, owner: &Owner) -> Self {
        let mut clone = Self::new(Some(owner.clone()));
        clone.storage = self
            .storage
            .iter()
            .map(|(k, e)| (k.clone(), e.clone_for(owner)))
            .collect();

        clone
    }

    /// Remove occurrences of `item`; level semantics match the list's, with
    /// `key` naming a dict key at level 0.
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
            let FilterKey::Name(name) = key else {
                return Ok(false);
            };
            let matched = self.contains_at(item, key);
            if matched && remove {
                self.remove(name)?;
            }
            return Ok(matched);
        }

        self.check_writable()?;
        let mut matched = Vec::new();
        for (k, element) in &mut self.storage {
            if filter_nested(element, item, level, key)? {
                matched.push(k.clone());
            }
        }
        for k in &matched {
            self.storage.shift_remove(k);
        }
        if !matched.is_empty() || self.any_nested_dirty() {
            self.touch();
        }

        Ok(false)
    }

    #[must_use]
    pub fn contains_at(&self, item: ItemId, key: &FilterKey) -> bool {
        match key {
            FilterKey::Name(name) => self.storage.get(name).is_some_and(|e| e.is_ref_to(item)),
            FilterKey::Position(_) => false,
        }
    }
}
