use crate::value::Value;

///
/// Canonical Value Rank
///
/// Stable rank used for cross-variant ordering.
///
/// IMPORTANT:
/// Rank order is persisted with saved index snapshots and must remain fixed
/// unless an intentional breaking migration is performed.
///
#[must_use]
pub const fn canonical_rank(value: &Value) -> u8 {
    match value {
        Value::Bool(_) => 0,
        Value::Int(_) => 1,
        Value::Float(_) => 2,
        Value::Timestamp(_) => 3,
        Value::Text(_) => 4,
        Value::Ref(_) => 5,
        Value::List(_) => 6,
        Value::Null => 7,
    }
}
