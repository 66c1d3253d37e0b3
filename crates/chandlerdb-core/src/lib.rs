//! Core runtime for ChandlerDB: ordered linked maps, secondary indexes,
//! persistence-aware collection values, notification-aware item collections
//! and the derived set algebra built on top of them.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod collection;
pub mod error;
pub mod index;
pub mod item;
pub mod monitor;
pub mod notify;
pub mod obs;
pub mod persistent;
pub mod serialize;
pub mod types;
pub mod util;
pub mod value;
pub mod view;

#[cfg(test)]
pub(crate) mod test_support;

pub use chandlerdb_config::ViewConfig;

///
/// CONSTANTS
///

/// Maximum number of attributes an attribute index may sort on.
pub const MAX_SORT_ATTRIBUTES: usize = 4;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
///

pub mod prelude {
    pub use crate::{
        collection::{CollectionRole, ItemPredicate},
        index::{FindMode, IndexSpec, KeyComparator},
        item::{AttributeValue, Item},
        notify::{Change, CollectionEvent, NotificationSink, Op},
        persistent::{Element, Input},
        types::{ItemId, ItemRef},
        value::Value,
        view::View,
    };
}
