//! Items and the arena that owns them.

use crate::{
    error::InternalError,
    index::IndexContext,
    persistent::{Element, Input, Owner, PersistentError, PersistentValue, prepare_value},
    types::ItemId,
    value::Value,
};
use indexmap::IndexSet;
use std::collections::{BTreeMap, HashMap};

///
/// AttributeValue
///

#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    Scalar(Value),
    Collection(PersistentValue),
}

impl AttributeValue {
    #[must_use]
    pub const fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(value) => Some(value),
            Self::Collection(_) => None,
        }
    }

    #[must_use]
    pub const fn as_collection(&self) -> Option<&PersistentValue> {
        match self {
            Self::Collection(value) => Some(value),
            Self::Scalar(_) => None,
        }
    }

    pub const fn as_collection_mut(&mut self) -> Option<&mut PersistentValue> {
        match self {
            Self::Collection(value) => Some(value),
            Self::Scalar(_) => None,
        }
    }

    fn collect_refs(&self, seen: &mut IndexSet<ItemId>) {
        match self {
            Self::Scalar(Value::Ref(id)) => {
                seen.insert(*id);
            }
            Self::Scalar(_) => {}
            Self::Collection(value) => value.collect_refs(seen),
        }
    }
}

impl From<Value> for AttributeValue {
    fn from(value: Value) -> Self {
        Self::Scalar(value)
    }
}

impl From<PersistentValue> for AttributeValue {
    fn from(value: PersistentValue) -> Self {
        Self::Collection(value)
    }
}

///
/// Item
///
/// Identity, kind and named attribute values. Collection-valued attributes
/// are owned by the item; references to other items are ids only.
///

#[derive(Clone, Debug)]
pub struct Item {
    id: ItemId,
    kind: String,
    name: Option<String>,
    values: BTreeMap<String, AttributeValue>,
    dirty: bool,
}

impl Item {
    #[must_use]
    pub fn new(id: ItemId, kind: impl Into<String>) -> Self {
        Self {
            id,
            kind: kind.into(),
            name: None,
            values: BTreeMap::new(),
            dirty: true,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub const fn id(&self) -> ItemId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
        self.dirty = true;
    }

    /// Scalar value of `attribute`, if set.
    #[must_use]
    pub fn value(&self, attribute: &str) -> Option<&Value> {
        self.values.get(attribute).and_then(AttributeValue::as_scalar)
    }

    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&AttributeValue> {
        self.values.get(attribute)
    }

    #[must_use]
    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.values.contains_key(attribute)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    #[must_use]
    pub fn collection(&self, attribute: &str) -> Option<&PersistentValue> {
        self.values
            .get(attribute)
            .and_then(AttributeValue::as_collection)
    }

    pub fn collection_mut(&mut self, attribute: &str) -> Option<&mut PersistentValue> {
        self.values
            .get_mut(attribute)
            .and_then(AttributeValue::as_collection_mut)
    }

    /// Prepare `input` for `attribute` and store it, returning the previous
    /// value. Containers are owned by this item afterwards.
    pub fn set(
        &mut self,
        attribute: &str,
        input: impl Into<Input>,
    ) -> Result<Option<AttributeValue>, PersistentError> {
        let owner = Owner::new(self.id, attribute);
        let value = match prepare_value(Some(&owner), input.into())? {
            Element::Scalar(value) => AttributeValue::Scalar(value),
            Element::Ref(r) => AttributeValue::Scalar(Value::Ref(r.id())),
            Element::Nested(value) => AttributeValue::Collection(value),
        };
        self.dirty = true;

        Ok(self.values.insert(attribute.to_string(), value))
    }

    /// Store an already-prepared value without going through
    /// `prepare_value`. Used by copies that rewrote ownership themselves.
    pub(crate) fn set_prepared(&mut self, attribute: String, value: AttributeValue) {
        self.values.insert(attribute, value);
        self.dirty = true;
    }

    pub fn remove(&mut self, attribute: &str) -> Option<AttributeValue> {
        let removed = self.values.remove(attribute);
        if removed.is_some() {
            self.dirty = true;
        }

        removed
    }

    /// Dirty when the item itself or any of its containers changed.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
            || self
                .values
                .values()
                .filter_map(AttributeValue::as_collection)
                .any(PersistentValue::is_dirty)
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
        for value in self.values.values_mut() {
            if let AttributeValue::Collection(value) = value {
                value.clear_dirty();
            }
        }
    }

    pub(crate) const fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Items referenced from any attribute, deduplicated.
    #[must_use]
    pub fn iter_refs(&self) -> Vec<ItemId> {
        let mut seen = IndexSet::new();
        for value in self.values.values() {
            value.collect_refs(&mut seen);
        }

        seen.into_iter().collect()
    }
}

///
/// ItemLoader
///
/// Materializes items that the view only knows as stubs.
///

pub trait ItemLoader {
    fn load(&self, id: ItemId) -> Result<Option<Item>, InternalError>;
}

///
/// ItemArena
///
/// Owner of every item in a view. Stubs are ids known to exist but not yet
/// materialized; they read as having no attributes.
///

#[derive(Debug, Default)]
pub struct ItemArena {
    items: HashMap<ItemId, Item>,
    stubs: IndexSet<ItemId>,
}

impl ItemArena {
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len() + self.stubs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.stubs.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(&id) || self.stubs.contains(&id)
    }

    #[must_use]
    pub fn is_stub(&self, id: ItemId) -> bool {
        self.stubs.contains(&id)
    }

    #[must_use]
    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.get_mut(&id)
    }

    pub fn values(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut Item> {
        self.items.values_mut()
    }

    pub(crate) fn insert(&mut self, item: Item) -> Option<Item> {
        self.stubs.shift_remove(&item.id());
        self.items.insert(item.id(), item)
    }

    pub(crate) fn insert_stub(&mut self, id: ItemId) -> bool {
        !self.items.contains_key(&id) && self.stubs.insert(id)
    }

    pub(crate) fn remove(&mut self, id: ItemId) -> Option<Item> {
        self.stubs.shift_remove(&id);
        self.items.remove(&id)
    }

    pub fn stubs(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.stubs.iter().copied()
    }
}

impl IndexContext for ItemArena {
    fn attribute(&self, key: ItemId, attribute: &str) -> Option<&Value> {
        self.items.get(&key).and_then(|item| item.value(attribute))
    }
}

///
/// TESTS
///
