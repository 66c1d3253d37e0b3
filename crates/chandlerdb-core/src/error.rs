use crate::{
    collection::CollectionError, index::IndexError, persistent::PersistentError,
    serialize::SerializeError, util::LinkedMapError,
};
use chandlerdb_config::ConfigError;
use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Module errors convert into it at the view boundary; the originating
/// module error is preserved in `detail`.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    /// The variant (if present) must correspond to `origin`.
    pub detail: Option<ErrorDetail>,
}

impl InternalError {
    /// Construct an InternalError without structured detail.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    /// Construct a view-origin invariant violation.
    pub(crate) fn view_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::View,
            message.into(),
        )
    }

    /// Construct a view-origin not-found error.
    pub(crate) fn view_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::NotFound, ErrorOrigin::View, message.into())
    }

    /// Construct a view-origin usage error.
    pub(crate) fn view_usage(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Usage, ErrorOrigin::View, message.into())
    }

    /// Construct a notification-origin usage error.
    pub(crate) fn notification_usage(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Usage, ErrorOrigin::Notification, message.into())
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.class, ErrorClass::NotFound)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }

    #[must_use]
    pub const fn index_detail(&self) -> Option<&IndexError> {
        match &self.detail {
            Some(ErrorDetail::Index(err)) => Some(err),
            _ => None,
        }
    }

    #[must_use]
    pub const fn collection_detail(&self) -> Option<&CollectionError> {
        match &self.detail {
            Some(ErrorDetail::Collection(err)) => Some(err),
            _ => None,
        }
    }

    #[must_use]
    pub const fn persistent_detail(&self) -> Option<&PersistentError> {
        match &self.detail {
            Some(ErrorDetail::Persistent(err)) => Some(err),
            _ => None,
        }
    }

    #[must_use]
    pub const fn linked_map_detail(&self) -> Option<&LinkedMapError> {
        match &self.detail {
            Some(ErrorDetail::LinkedMap(err)) => Some(err),
            _ => None,
        }
    }
}

///
/// ErrorDetail
///
/// Structured, origin-specific error detail carried by [`InternalError`].
///

#[derive(Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    LinkedMap(LinkedMapError),
    #[error("{0}")]
    Index(IndexError),
    #[error("{0}")]
    Persistent(PersistentError),
    #[error("{0}")]
    Collection(CollectionError),
}

impl From<LinkedMapError> for InternalError {
    fn from(err: LinkedMapError) -> Self {
        Self {
            class: err.class(),
            origin: ErrorOrigin::LinkedMap,
            message: err.to_string(),
            detail: Some(ErrorDetail::LinkedMap(err)),
        }
    }
}

impl From<IndexError> for InternalError {
    fn from(err: IndexError) -> Self {
        Self {
            class: err.class(),
            origin: ErrorOrigin::Index,
            message: err.to_string(),
            detail: Some(ErrorDetail::Index(err)),
        }
    }
}

impl From<PersistentError> for InternalError {
    fn from(err: PersistentError) -> Self {
        Self {
            class: err.class(),
            origin: ErrorOrigin::Persistent,
            message: err.to_string(),
            detail: Some(ErrorDetail::Persistent(err)),
        }
    }
}

impl From<CollectionError> for InternalError {
    fn from(err: CollectionError) -> Self {
        Self {
            class: err.class(),
            origin: ErrorOrigin::Collection,
            message: err.to_string(),
            detail: Some(ErrorDetail::Collection(err)),
        }
    }
}

impl From<SerializeError> for InternalError {
    fn from(err: SerializeError) -> Self {
        Self::new(
            SerializeError::class(),
            ErrorOrigin::Serialize,
            err.to_string(),
        )
    }
}

impl From<ConfigError> for InternalError {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorClass::Usage, ErrorOrigin::Config, err.to_string())
    }
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Usage,
    NotFound,
    Conflict,
    Unsupported,
    Immutable,
    InvariantViolation,
    Corruption,
    Internal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Usage => "usage",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Unsupported => "unsupported",
            Self::Immutable => "immutable",
            Self::InvariantViolation => "invariant_violation",
            Self::Corruption => "corruption",
            Self::Internal => "internal",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    LinkedMap,
    Index,
    Persistent,
    Collection,
    View,
    Notification,
    Serialize,
    Config,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::LinkedMap => "linked_map",
            Self::Index => "index",
            Self::Persistent => "persistent",
            Self::Collection => "collection",
            Self::View => "view",
            Self::Notification => "notification",
            Self::Serialize => "serialize",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_errors_keep_their_detail() {
        let err: InternalError = IndexError::AlreadyExists {
            collection: "c".into(),
            index: "byName".into(),
        }
        .into();

        assert_eq!(err.class, ErrorClass::Conflict);
        assert_eq!(err.origin, ErrorOrigin::Index);
        assert!(matches!(
            err.index_detail(),
            Some(IndexError::AlreadyExists { .. })
        ));
        assert!(err.display_with_class().starts_with("index:conflict:"));
    }

    #[test]
    fn immutable_class_is_reported_for_tuples() {
        let err: InternalError = PersistentError::Immutable.into();

        assert_eq!(err.class, ErrorClass::Immutable);
        assert_eq!(err.to_string(), "tuple is immutable");
    }
}
