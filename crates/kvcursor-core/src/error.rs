use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable classification.
/// Every fallible public operation in this crate returns it; subsystem errors
/// convert into it through `From`.
///

#[derive(Clone, Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl InternalError {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Construct a cursor-origin `NotAllowed` error.
    pub(crate) fn cursor_not_allowed(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::NotAllowed, ErrorOrigin::Cursor, message)
    }

    /// Construct a transaction-origin `NotAllowed` error.
    pub(crate) fn transaction_not_allowed(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::NotAllowed, ErrorOrigin::Transaction, message)
    }

    /// Construct the error delivered to replies whose task never ran.
    pub(crate) fn transaction_aborted(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Aborted, ErrorOrigin::Transaction, message)
    }

    // Constructors for backing-store implementations.

    pub fn store_corruption(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Corruption, ErrorOrigin::Store, message)
    }

    pub fn store_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Store, message)
    }

    pub fn store_invariant(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvariantViolation, ErrorOrigin::Store, message)
    }

    pub(crate) fn serialize_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Serialize, message)
    }

    #[must_use]
    pub const fn is_not_allowed(&self) -> bool {
        matches!(self.class, ErrorClass::NotAllowed)
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.class, ErrorClass::NotFound)
    }

    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self.class, ErrorClass::Aborted)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorClass
/// Stable classification, independent of message text.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    NotAllowed,
    ReadOnly,
    Data,
    Constraint,
    NotFound,
    Aborted,
    Corruption,
    Internal,
    InvariantViolation,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotAllowed => "not_allowed",
            Self::ReadOnly => "read_only",
            Self::Data => "data",
            Self::Constraint => "constraint",
            Self::NotFound => "not_found",
            Self::Aborted => "aborted",
            Self::Corruption => "corruption",
            Self::Internal => "internal",
            Self::InvariantViolation => "invariant_violation",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Cursor,
    Transaction,
    Store,
    Index,
    Serialize,
    Config,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Cursor => "cursor",
            Self::Transaction => "transaction",
            Self::Store => "store",
            Self::Index => "index",
            Self::Serialize => "serialize",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}
