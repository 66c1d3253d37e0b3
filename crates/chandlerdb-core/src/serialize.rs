mod cbor;

use crate::error::ErrorClass;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error as ThisError;

// re-exports
pub use cbor::MAX_PAYLOAD_BYTES;

///
/// SerializeError
///

#[derive(Debug, ThisError)]
pub enum SerializeError {
    #[error("serialize error: {0}")]
    Serialize(String),

    #[error("deserialize error: {0}")]
    Deserialize(String),
}

impl SerializeError {
    pub(crate) const fn class() -> ErrorClass {
        ErrorClass::Corruption
    }
}

/// Serialize a value using the crate's CBOR codec.
///
/// Used for saved index state; the byte layout is not a public contract.
pub fn serialize<T>(ty: &T) -> Result<Vec<u8>, SerializeError>
where
    T: Serialize,
{
    cbor::serialize(ty)
}

/// Deserialize a value produced by [`serialize`].
pub fn deserialize<T>(bytes: &[u8]) -> Result<T, SerializeError>
where
    T: DeserializeOwned,
{
    cbor::deserialize(bytes)
}
