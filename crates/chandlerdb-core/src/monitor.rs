//! Attribute change monitors.
//!
//! A monitor ties an attribute name to something that must react when that
//! attribute changes on a member item: a sorted index that re-sorts one key,
//! or a filtered collection that re-tests its predicate. Registrations live
//! on the view and are made and dropped together with the index or
//! collection that owns them.

use crate::types::ItemId;
use std::collections::BTreeMap;

///
/// MonitorTarget
///

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum MonitorTarget {
    /// Re-sort the changed key in `index` of `collection`.
    Index { collection: ItemId, index: String },
    /// Re-test the changed item against `collection`'s filter.
    Filter { collection: ItemId },
}

impl MonitorTarget {
    #[must_use]
    pub const fn collection(&self) -> ItemId {
        match self {
            Self::Index { collection, .. } | Self::Filter { collection } => *collection,
        }
    }
}

///
/// ChangeMonitorRegistry
///

#[derive(Clone, Debug, Default)]
pub struct ChangeMonitorRegistry {
    by_attribute: BTreeMap<String, Vec<MonitorTarget>>,
}

impl ChangeMonitorRegistry {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            by_attribute: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_attribute.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_attribute.is_empty()
    }

    /// Register `target` for changes of `attribute`. Returns false when it
    /// was already registered.
    pub fn attach(&mut self, attribute: &str, target: MonitorTarget) -> bool {
        let targets = self.by_attribute.entry(attribute.to_string()).or_default();
        if targets.contains(&target) {
            return false;
        }
        targets.push(target);

        true
    }

    /// Drop one registration. Returns false when it was not registered.
    pub fn detach(&mut self, attribute: &str, target: &MonitorTarget) -> bool {
        let Some(targets) = self.by_attribute.get_mut(attribute) else {
            return false;
        };
        let before = targets.len();
        targets.retain(|t| t != target);
        let removed = targets.len() != before;
        if targets.is_empty() {
            self.by_attribute.remove(attribute);
        }

        removed
    }

    /// Drop every registration made on behalf of `collection`.
    pub fn detach_collection(&mut self, collection: ItemId) -> usize {
        let mut removed = 0;
        self.by_attribute.retain(|_, targets| {
            let before = targets.len();
            targets.retain(|t| t.collection() != collection);
            removed += before - targets.len();
            !targets.is_empty()
        });

        removed
    }

    /// Drop the registrations of one index.
    pub fn detach_index(&mut self, collection: ItemId, index: &str) -> usize {
        let mut removed = 0;
        self.by_attribute.retain(|_, targets| {
            let before = targets.len();
            targets.retain(|t| {
                !matches!(t, MonitorTarget::Index { collection: c, index: i } if *c == collection && i == index)
            });
            removed += before - targets.len();
            !targets.is_empty()
        });

        removed
    }

    #[must_use]
    pub fn targets(&self, attribute: &str) -> &[MonitorTarget] {
        self.by_attribute
            .get(attribute)
            .map_or(&[], Vec::as_slice)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.by_attribute.keys().map(String::as_str)
    }
}

///
/// TESTS
///
