mod linked_map;

pub use linked_map::{AliasResolver, Keys, LinkedMap, LinkedMapError};
