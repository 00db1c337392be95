//! The module contains the error the engine can throw.
//!
//! Validation errors carry the [`Field`] they refer to, so a caller can point
//! at the exact input that was rejected:
//!
//! - [`UnknownStock`] the identifier or name is not in the catalog.
//! - [`UnknownBatch`] no batch with that id.
//! - [`InvalidQuantity`] non-positive, unparsable, or more than available.
//! - [`InvalidDate`] malformed, impossible, or out of order for the operation.
//! - [`NoPredicate`] a filter query was requested with nothing active.
//! - [`Storage`] the database refused or failed the operation.
//!
//!  [`UnknownStock`]: EngineError::UnknownStock
//!  [`UnknownBatch`]: EngineError::UnknownBatch
//!  [`InvalidQuantity`]: EngineError::InvalidQuantity
//!  [`InvalidDate`]: EngineError::InvalidDate
//!  [`NoPredicate`]: EngineError::NoPredicate
//!  [`Storage`]: EngineError::Storage
use sea_orm::DbErr;
use thiserror::Error;

use crate::Field;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" is not a known stock item")]
    UnknownStock(String),
    #[error("batch {0} not found")]
    UnknownBatch(i32),
    #[error("\"{0}\" already present in the stock catalog")]
    DuplicateStock(String),
    #[error("Invalid quantity for {field}: {reason}")]
    InvalidQuantity { field: Field, reason: String },
    #[error("Invalid date for {field}: {reason}")]
    InvalidDate { field: Field, reason: String },
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: Field, reason: String },
    #[error("at least one search criterion must be active")]
    NoPredicate,
    #[error(transparent)]
    Storage(#[from] DbErr),
}

impl EngineError {
    pub(crate) fn quantity(field: Field, reason: impl Into<String>) -> Self {
        Self::InvalidQuantity {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn date(field: Field, reason: impl Into<String>) -> Self {
        Self::InvalidDate {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn value(field: Field, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }

    /// The input field a validation error refers to, if any.
    pub fn field(&self) -> Option<Field> {
        match self {
            Self::UnknownStock(_) => Some(Field::Stock),
            Self::UnknownBatch(_) => Some(Field::BatchId),
            Self::InvalidQuantity { field, .. }
            | Self::InvalidDate { field, .. }
            | Self::InvalidValue { field, .. } => Some(*field),
            Self::DuplicateStock(_) | Self::NoPredicate | Self::Storage(_) => None,
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::UnknownStock(a), Self::UnknownStock(b)) => a == b,
            (Self::UnknownBatch(a), Self::UnknownBatch(b)) => a == b,
            (Self::DuplicateStock(a), Self::DuplicateStock(b)) => a == b,
            (
                Self::InvalidQuantity {
                    field: fa,
                    reason: ra,
                },
                Self::InvalidQuantity {
                    field: fb,
                    reason: rb,
                },
            )
            | (
                Self::InvalidDate {
                    field: fa,
                    reason: ra,
                },
                Self::InvalidDate {
                    field: fb,
                    reason: rb,
                },
            )
            | (
                Self::InvalidValue {
                    field: fa,
                    reason: ra,
                },
                Self::InvalidValue {
                    field: fb,
                    reason: rb,
                },
            ) => fa == fb && ra == rb,
            (Self::NoPredicate, Self::NoPredicate) => true,
            (Self::Storage(a), Self::Storage(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
