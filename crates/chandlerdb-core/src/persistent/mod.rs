//! Persistence-aware containers.
//!
//! Every container tracks a dirty bit and stores domain objects only as
//! [`ItemRef`] handles. [`prepare_value`] is the single entry point that turns
//! caller input into stored elements.

mod dict;
mod list;
mod set;
mod tuple;


use crate::{
    error::ErrorClass,
    types::{ItemId, ItemRef},
    value::Value,
};
use indexmap::IndexSet;
use std::fmt;
use thiserror::Error as ThisError;

// re-exports
pub use dict::PersistentDict;
pub use list::PersistentList;
pub use set::PersistentSet;
pub use tuple::PersistentTuple;

///
/// PersistentError
///

#[derive(Debug, ThisError)]
pub enum PersistentError {
    #[error("tuple is immutable")]
    Immutable,

    #[error("collection value of {owner} is read-only")]
    ReadOnly { owner: String },

    #[error("nested collections cannot be set members")]
    Unhashable,

    #[error("no such key: {key}")]
    NoSuchKey { key: String },

    #[error("position {position} out of range for length {len}")]
    PositionOutOfRange { position: usize, len: usize },
}

impl PersistentError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::Immutable => ErrorClass::Immutable,
            Self::ReadOnly { .. } | Self::Unhashable | Self::PositionOutOfRange { .. } => {
                ErrorClass::Usage
            }
            Self::NoSuchKey { .. } => ErrorClass::NotFound,
        }
    }
}

///
/// Owner
///
/// The item/attribute pair owning a container value.
///

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Owner {
    pub item: ItemId,
    pub attribute: String,
}

impl Owner {
    #[must_use]
    pub fn new(item: ItemId, attribute: impl Into<String>) -> Self {
        Self {
            item,
            attribute: attribute.into(),
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.item.short(), self.attribute)
    }
}

///
/// CopyPolicy
///
/// How a copy treats the items its references point at.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CopyPolicy {
    /// Keep referencing the same item.
    #[default]
    Copy,
    /// Duplicate the referenced item and reference the duplicate.
    Cascade,
    /// Drop the reference from the copy.
    Remove,
}

/// Decides what a copied reference becomes; `None` drops it.
pub type CopyFn<'a> = dyn FnMut(ItemRef, CopyPolicy) -> Option<ItemRef> + 'a;

///
/// FilterKey
///
/// Where to look for an item at the innermost level of `filter_item`.
/// Sets ignore it.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FilterKey {
    Position(usize),
    Name(String),
}

///
/// Element
///

#[derive(Clone, Debug, PartialEq)]
pub enum Element {
    Scalar(Value),
    Ref(ItemRef),
    Nested(PersistentValue),
}

impl Element {
    #[must_use]
    pub const fn as_item_ref(&self) -> Option<ItemRef> {
        match self {
            Self::Ref(r) => Some(*r),
            _ => None,
        }
    }

    fn is_ref_to(&self, item: ItemId) -> bool {
        self.as_item_ref().is_some_and(|r| r.id() == item)
    }

    fn copy_for(&self, owner: &Owner, policy: CopyPolicy, copy_fn: &mut CopyFn<'_>) -> Option<Self> {
        match self {
            Self::Scalar(v) => Some(Self::Scalar(v.clone())),
            Self::Ref(r) => copy_fn(*r, policy).map(Self::Ref),
            Self::Nested(n) => Some(Self::Nested(n.copy_for(owner, policy, copy_fn))),
        }
    }

    fn clone_for(&self, owner: &Owner) -> Self {
        match self {
            Self::Nested(n) => Self::Nested(n.clone_for(owner)),
            other => other.clone(),
        }
    }
}

///
/// SetElement
///

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum SetElement {
    Scalar(Value),
    Ref(ItemRef),
}

impl TryFrom<Element> for SetElement {
    type Error = PersistentError;

    fn try_from(element: Element) -> Result<Self, Self::Error> {
        match element {
            Element::Scalar(v) => Ok(Self::Scalar(v)),
            Element::Ref(r) => Ok(Self::Ref(r)),
            Element::Nested(_) => Err(PersistentError::Unhashable),
        }
    }
}

impl From<SetElement> for Element {
    fn from(element: SetElement) -> Self {
        match element {
            SetElement::Scalar(v) => Self::Scalar(v),
            SetElement::Ref(r) => Self::Ref(r),
        }
    }
}

///
/// Input
///
/// Caller-supplied value before it is prepared for storage.
///

#[derive(Clone, Debug)]
pub enum Input {
    Value(Value),
    Item(ItemId),
    Ref(ItemRef),
    List(Vec<Self>),
    Dict(Vec<(String, Self)>),
    Tuple(Vec<Self>),
    Set(Vec<Self>),
    Persistent(PersistentValue),
}

impl From<Value> for Input {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<ItemRef> for Input {
    fn from(r: ItemRef) -> Self {
        Self::Ref(r)
    }
}

impl From<PersistentValue> for Input {
    fn from(v: PersistentValue) -> Self {
        Self::Persistent(v)
    }
}

/// Turn caller input into a stored element owned by `owner`.
///
/// Items become references; plain containers become persistent containers;
/// a persistent container already owned elsewhere is copied, an unowned one
/// is adopted.
pub fn prepare_value(owner: Option<&Owner>, input: Input) -> Result<Element, PersistentError> {
    Ok(match input {
        Input::Value(Value::Ref(id)) | Input::Item(id) => Element::Ref(ItemRef::new(id)),
        Input::Ref(r) => Element::Ref(r),
        Input::Value(v) => Element::Scalar(v),
        Input::List(values) => Element::Nested(PersistentValue::List(PersistentList::from_inputs(
            owner.cloned(),
            values,
        )?)),
        Input::Dict(entries) => Element::Nested(PersistentValue::Dict(
            PersistentDict::from_inputs(owner.cloned(), entries)?,
        )),
        Input::Tuple(values) => Element::Nested(PersistentValue::Tuple(
            PersistentTuple::from_inputs(owner.cloned(), values)?,
        )),
        Input::Set(values) => Element::Nested(PersistentValue::Set(PersistentSet::from_inputs(
            owner.cloned(),
            values,
        )?)),
        Input::Persistent(mut value) => match (value.owner(), owner) {
            (Some(current), Some(target)) if current != target => {
                Element::Nested(value.copy_for(target, CopyPolicy::Copy, &mut |r, _| Some(r)))
            }
            _ => {
                value.set_owner(owner.cloned());
                Element::Nested(value)
            }
        },
    })
}

///
/// Storage
///
/// What the generic container needs from its backing store.
///

pub trait Storage: Clone + Default + PartialEq {
    fn len(&self) -> usize;

    /// References held directly by this container.
    fn refs(&self) -> Vec<ItemRef>;

    fn nested(&self) -> Vec<&PersistentValue>;

    fn nested_mut(&mut self) -> Vec<&mut PersistentValue>;
}

///
/// Persistent
///
/// Dirty tracking, ownership and read-only state composed around one
/// backing store.
///

#[derive(Clone, Debug)]
pub struct Persistent<C> {
    owner: Option<Owner>,
    dirty: bool,
    read_only: bool,
    loading: bool,
    storage: C,
}

impl<C: Storage> Default for Persistent<C> {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<C: PartialEq> PartialEq for Persistent<C> {
    fn eq(&self, other: &Self) -> bool {
        self.storage == other.storage
    }
}

impl<C: Storage> Persistent<C> {
    #[must_use]
    pub fn new(owner: Option<Owner>) -> Self {
        Self {
            owner,
            dirty: false,
            read_only: false,
            loading: false,
            storage: C::default(),
        }
    }

    #[must_use]
    pub const fn owner(&self) -> Option<&Owner> {
        self.owner.as_ref()
    }

    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub const fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.len() == 0
    }

    /// Run `f` with dirty marking suppressed.
    pub fn bulk_load<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = std::mem::replace(&mut self.loading, true);
        let result = f(self);
        self.loading = previous;

        result
    }

    /// Clear the dirty bit here and in every nested container.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
        for nested in self.storage.nested_mut() {
            nested.clear_dirty();
        }
    }

    /// Referenced item ids, deduplicated, nested containers included.
    #[must_use]
    pub fn iter_refs(&self) -> Vec<ItemId> {
        let mut seen = IndexSet::new();
        self.collect_refs(&mut seen);

        seen.into_iter().collect()
    }

    pub(crate) fn collect_refs(&self, seen: &mut IndexSet<ItemId>) {
        for r in self.storage.refs() {
            seen.insert(r.id());
        }
        for nested in self.storage.nested() {
            nested.collect_refs(seen);
        }
    }

    pub(crate) fn set_owner(&mut self, owner: Option<Owner>) {
        if self.owner == owner {
            return;
        }
        for nested in self.storage.nested_mut() {
            nested.set_owner(owner.clone());
        }
        self.owner = owner;
    }

    const fn touch(&mut self) {
        if !self.loading {
            self.dirty = true;
        }
    }

    fn check_writable(&self) -> Result<(), PersistentError> {
        if self.read_only {
            return Err(PersistentError::ReadOnly {
                owner: self
                    .owner
                    .as_ref()
                    .map_or_else(|| "unowned value".to_string(), ToString::to_string),
            });
        }

        Ok(())
    }

    fn prepare(&self, input: Input) -> Result<Element, PersistentError> {
        prepare_value(self.owner.as_ref(), input)
    }

    // Mutate storage behind the writable check, marking dirty on success.
    fn mutate<R>(
        &mut self,
        f: impl FnOnce(&mut C) -> Result<R, PersistentError>,
    ) -> Result<R, PersistentError> {
        self.check_writable()?;
        let result = f(&mut self.storage)?;
        self.touch();

        Ok(result)
    }

    fn any_nested_dirty(&self) -> bool {
        self.storage.nested().iter().any(|n| n.is_dirty())
    }
}

///
/// PersistentValue
///

#[derive(Clone, Debug, PartialEq)]
pub enum PersistentValue {
    List(PersistentList),
    Dict(PersistentDict),
    Tuple(PersistentTuple),
    Set(PersistentSet),
}

macro_rules! each_variant {
    ($value:expr, $inner:ident => $body:expr) => {
        match $value {
            PersistentValue::List($inner) => $body,
            PersistentValue::Dict($inner) => $body,
            PersistentValue::Tuple($inner) => $body,
            PersistentValue::Set($inner) => $body,
        }
    };
}

impl PersistentValue {
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::List(_) => "list",
            Self::Dict(_) => "dict",
            Self::Tuple(_) => "tuple",
            Self::Set(_) => "set",
        }
    }

    #[must_use]
    pub fn owner(&self) -> Option<&Owner> {
        each_variant!(self, inner => inner.owner())
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        each_variant!(self, inner => inner.is_dirty())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        each_variant!(self, inner => inner.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        each_variant!(self, inner => inner.set_read_only(read_only));
    }

    pub fn clear_dirty(&mut self) {
        each_variant!(self, inner => inner.clear_dirty());
    }

    #[must_use]
    pub fn iter_refs(&self) -> Vec<ItemId> {
        each_variant!(self, inner => inner.iter_refs())
    }

    pub(crate) fn collect_refs(&self, seen: &mut IndexSet<ItemId>) {
        each_variant!(self, inner => inner.collect_refs(seen));
    }

    pub(crate) fn set_owner(&mut self, owner: Option<Owner>) {
        each_variant!(self, inner => inner.set_owner(owner));
    }

    /// Independent copy for a new owner; every reference goes through `copy_fn`.
    #[must_use]
    pub fn copy_for(&self, owner: &Owner, policy: CopyPolicy, copy_fn: &mut CopyFn<'_>) -> Self {
        match self {
            Self::List(inner) => Self::List(inner.copy_for(owner, policy, copy_fn)),
            Self::Dict(inner) => Self::Dict(inner.copy_for(owner, policy, copy_fn)),
            Self::Tuple(inner) => Self::Tuple(inner.copy_for(owner, policy, copy_fn)),
            Self::Set(inner) => Self::Set(inner.copy_for(owner, policy, copy_fn)),
        }
    }

    /// Structural duplicate that keeps reference identity.
    #[must_use]
    pub fn clone_for(&self, owner: &Owner) -> Self {
        match self {
            Self::List(inner) => Self::List(inner.clone_for(owner)),
            Self::Dict(inner) => Self::Dict(inner.clone_for(owner)),
            Self::Tuple(inner) => Self::Tuple(inner.clone_for(owner)),
            Self::Set(inner) => Self::Set(inner.clone_for(owner)),
        }
    }

    /// Destructively remove occurrences of `item`; see the container-level
    /// `filter_item` methods for the level semantics.
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
        each_variant!(self, inner => inner.filter(item, level, key, remove))
    }

    /// Read-only test for `item` at `key`.
    #[must_use]
    pub fn contains_at(&self, item: ItemId, key: &FilterKey) -> bool {
        each_variant!(self, inner => inner.contains_at(item, key))
    }
}

// Level > 0 walk shared by the mutable containers: drop every nested
// container whose own level-0 check matches, recursing otherwise.
fn filter_nested(
    element: &mut Element,
    item: ItemId,
    level: usize,
    key: &FilterKey,
) -> Result<bool, PersistentError> {
    match element {
        Element::Nested(nested) => nested.filter(item, level - 1, key, false),
        _ => Ok(false),
    }
}
