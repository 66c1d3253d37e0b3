//! Named secondary indexes over a collection's keys.
//!
//! An index is an ordering over keys, never a copy of values. Sorted kinds
//! read attribute values through an [`IndexContext`] supplied by the view.

mod collate;
mod order;
mod range;
mod store;

#[cfg(test)]
mod tests;

use crate::{error::ErrorClass, types::ItemId, value::Value};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt, sync::Arc};
use thiserror::Error as ThisError;

// re-exports
pub use collate::Collator;
pub use order::{Index, IndexKeys};
pub use range::RangeSet;
pub use store::Indexes;

///
/// IndexError
///

#[derive(Debug, ThisError)]
pub enum IndexError {
    #[error("index '{index}' already exists on {collection}")]
    AlreadyExists { collection: String, index: String },

    #[error("no index named '{index}' on {collection}")]
    NoSuchIndex { collection: String, index: String },

    #[error("position {position} out of range for index '{index}' of length {len}")]
    PositionOutOfRange {
        index: String,
        position: isize,
        len: usize,
    },

    #[error("item {item} is not in collection {collection}")]
    NoSuchItemInCollection { collection: String, item: ItemId },

    #[error("key {key} is not in index '{index}'")]
    UnknownKey { index: String, key: ItemId },

    #[error("index '{index}' is invalid and must be revalidated before use")]
    Invalid { index: String },

    #[error("index '{index}' sorts with comparator '{comparator}' which must be supplied on load")]
    ComparatorRequired { index: String, comparator: String },
}

impl IndexError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::AlreadyExists { .. } => ErrorClass::Conflict,
            Self::NoSuchIndex { .. }
            | Self::NoSuchItemInCollection { .. }
            | Self::UnknownKey { .. } => ErrorClass::NotFound,
            Self::PositionOutOfRange { .. } | Self::ComparatorRequired { .. } => ErrorClass::Usage,
            Self::Invalid { .. } => ErrorClass::InvariantViolation,
        }
    }
}

///
/// IndexContext
///
/// Attribute access for sorted indexes. Implemented by the view over its
/// item arena.
///

pub trait IndexContext {
    fn attribute(&self, key: ItemId, attribute: &str) -> Option<&Value>;
}

///
/// KeyComparator
///
/// Caller-supplied ordering for `compare` indexes. The name is persisted with
/// saved index state so the comparator can be re-supplied on load.
///

pub trait KeyComparator {
    fn name(&self) -> &str;

    fn compare(&self, ctx: &dyn IndexContext, left: ItemId, right: ItemId) -> Ordering;
}

///
/// FindMode
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FindMode {
    /// Any matching key.
    Exact,
    /// Lowest matching key in iteration order.
    First,
    /// Highest matching key in iteration order.
    Last,
}

///
/// IndexSpec
///

#[derive(Clone)]
pub enum IndexSpec {
    /// Insertion (collection) order.
    Numeric,
    /// Sorted on one or more attributes; later attributes break ties.
    /// `monitor` overrides which attributes trigger re-sorting; empty means
    /// the sort attributes themselves.
    Attribute {
        attributes: Vec<String>,
        monitor: Vec<String>,
    },
    /// Sorted on the canonical value order of one attribute, ties broken by key.
    Value { attribute: String },
    /// Sorted by collation of a text attribute.
    String {
        attribute: String,
        locale: Option<String>,
    },
    Compare { comparator: Arc<dyn KeyComparator> },
}

impl IndexSpec {
    #[must_use]
    pub fn attribute(name: impl Into<String>) -> Self {
        Self::Attribute {
            attributes: vec![name.into()],
            monitor: Vec::new(),
        }
    }

    #[must_use]
    pub fn string(name: impl Into<String>) -> Self {
        Self::String {
            attribute: name.into(),
            locale: None,
        }
    }

    #[must_use]
    pub const fn is_sorted(&self) -> bool {
        !matches!(self, Self::Numeric)
    }

    /// Attributes whose changes must re-sort a key in this index.
    #[must_use]
    pub fn monitored_attributes(&self) -> Vec<String> {
        match self {
            Self::Numeric | Self::Compare { .. } => Vec::new(),
            Self::Attribute {
                attributes,
                monitor,
            } => {
                if monitor.is_empty() {
                    attributes.clone()
                } else {
                    monitor.clone()
                }
            }
            Self::Value { attribute } | Self::String { attribute, .. } => vec![attribute.clone()],
        }
    }

    /// Persistable descriptor of this spec.
    #[must_use]
    pub fn kind(&self) -> IndexKind {
        match self {
            Self::Numeric => IndexKind::Numeric,
            Self::Attribute {
                attributes,
                monitor,
            } => IndexKind::Attribute {
                attributes: attributes.clone(),
                monitor: monitor.clone(),
            },
            Self::Value { attribute } => IndexKind::Value {
                attribute: attribute.clone(),
            },
            Self::String { attribute, locale } => IndexKind::String {
                attribute: attribute.clone(),
                locale: locale.clone(),
            },
            Self::Compare { comparator } => IndexKind::Compare {
                comparator: comparator.name().to_string(),
            },
        }
    }

    /// Rebuild a spec from its persisted descriptor. `compare` indexes need
    /// their comparator re-supplied.
    pub fn from_kind(
        index: &str,
        kind: &IndexKind,
        comparator: Option<Arc<dyn KeyComparator>>,
    ) -> Result<Self, IndexError> {
        Ok(match kind {
            IndexKind::Numeric => Self::Numeric,
            IndexKind::Attribute {
                attributes,
                monitor,
            } => Self::Attribute {
                attributes: attributes.clone(),
                monitor: monitor.clone(),
            },
            IndexKind::Value { attribute } => Self::Value {
                attribute: attribute.clone(),
            },
            IndexKind::String { attribute, locale } => Self::String {
                attribute: attribute.clone(),
                locale: locale.clone(),
            },
            IndexKind::Compare { comparator: name } => match comparator {
                Some(comparator) if comparator.name() == name => Self::Compare { comparator },
                _ => {
                    return Err(IndexError::ComparatorRequired {
                        index: index.to_string(),
                        comparator: name.clone(),
                    });
                }
            },
        })
    }
}

impl fmt::Debug for IndexSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.kind(), f)
    }
}

///
/// IndexKind
///
/// Serializable descriptor of an index spec.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum IndexKind {
    Numeric,
    Attribute {
        attributes: Vec<String>,
        monitor: Vec<String>,
    },
    Value {
        attribute: String,
    },
    String {
        attribute: String,
        locale: Option<String>,
    },
    Compare {
        comparator: String,
    },
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Numeric => "numeric",
            Self::Attribute { .. } => "attribute",
            Self::Value { .. } => "value",
            Self::String { .. } => "string",
            Self::Compare { .. } => "compare",
        };
        write!(f, "{label}")
    }
}

///
/// IndexSnapshot
///
/// Saved state of one index. Keys are stored in ascending order regardless
/// of direction.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct IndexSnapshot {
    pub name: String,
    pub kind: IndexKind,
    pub keys: Vec<ItemId>,
    pub entry_values: Vec<(ItemId, i32)>,
    pub ranges: RangeSet,
    pub descending: bool,
}
