mod compare;
mod float;
mod rank;

#[cfg(test)]
mod tests;

use crate::types::ItemId;
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt};

// re-exports
pub use compare::{canonical_cmp, missing_last_cmp};
pub use float::Float64;
pub use rank::canonical_rank;

///
/// Value
///
/// Scalar attribute value carried by items.
/// `Null` is a present-but-empty value; sorted indexes treat it like a
/// missing attribute.
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(Float64),
    Text(String),
    /// Milliseconds since the unix epoch.
    Timestamp(i64),
    Ref(ItemId),
    List(Vec<Self>),
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) | Self::Timestamp(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_ref_id(&self) -> Option<ItemId> {
        match self {
            Self::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Build a float value, returning `None` for non-finite input.
    #[must_use]
    pub fn float(v: f64) -> Option<Self> {
        Float64::try_new(v).map(Self::Float)
    }

    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Timestamp(_) => "timestamp",
            Self::Ref(_) => "ref",
            Self::List(_) => "list",
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        canonical_cmp(self, other)
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Timestamp(ms) => write!(f, "@{ms}"),
            Self::Ref(id) => write!(f, "ref({id})"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<ItemId> for Value {
    fn from(id: ItemId) -> Self {
        Self::Ref(id)
    }
}

impl From<Float64> for Value {
    fn from(x: Float64) -> Self {
        Self::Float(x)
    }
}
