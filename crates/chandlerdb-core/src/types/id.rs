use derive_more::{Deref, Display};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error as ThisError;
use ulid::Ulid;

///
/// ItemIdError
///

#[derive(Debug, ThisError)]
pub enum ItemIdError {
    #[error("invalid item id string: {0}")]
    InvalidString(String),

    #[error("monotonic error - overflow")]
    GeneratorOverflow,
}

///
/// ItemId
///
/// Stable identity of an item in a view. Collections, indexes and persistent
/// containers store ids; only the view owns items.
///

#[derive(
    Clone,
    Copy,
    Debug,
    Deref,
    Deserialize,
    Display,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ItemId(Ulid);

impl ItemId {
    pub const STORED_SIZE: u32 = 16;

    #[must_use]
    pub const fn nil() -> Self {
        Self(Ulid::nil())
    }

    #[must_use]
    pub const fn from_parts(timestamp_ms: u64, random: u128) -> Self {
        Self(Ulid::from_parts(timestamp_ms, random))
    }

    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    #[must_use]
    pub const fn to_bytes(self) -> [u8; 16] {
        self.0.to_bytes()
    }

    #[must_use]
    pub fn timestamp_ms(self) -> u64 {
        self.0.timestamp_ms()
    }

    /// Monotonic increment; returns `None` on overflow.
    #[must_use]
    pub fn increment(self) -> Option<Self> {
        self.0.increment().map(Self)
    }

    /// Short form used in diagnostics, the last 8 characters of the ULID.
    #[must_use]
    pub fn short(self) -> String {
        let full = self.0.to_string();
        full[full.len() - 8..].to_string()
    }
}

impl FromStr for ItemId {
    type Err = ItemIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|_| ItemIdError::InvalidString(s.to_string()))
    }
}

impl From<Ulid> for ItemId {
    fn from(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_id_parses_its_display_form() {
        let id = ItemId::from_parts(1_700_000_000_000, 42);
        let parsed: ItemId = id.to_string().parse().expect("parse item id");

        assert_eq!(parsed, id);
        assert_eq!(id.short().len(), 8);
    }

    #[test]
    fn item_id_rejects_garbage() {
        assert!(matches!(
            "not-a-ulid".parse::<ItemId>(),
            Err(ItemIdError::InvalidString(_))
        ));
    }

    #[test]
    fn item_id_orders_by_timestamp_first() {
        let early = ItemId::from_parts(1, u128::MAX >> 48);
        let late = ItemId::from_parts(2, 0);

        assert!(early < late);
    }
}
