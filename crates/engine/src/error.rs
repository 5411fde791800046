//! The module contains the errors the ledger engine can return.
//!
//! Variants are grouped by how a client should react:
//!
//! - validation ([`InvalidAmount`], [`InvalidName`], [`PayerMismatch`],
//!   [`SplitMismatch`], [`PercentageMismatch`]): fix the input, nothing was written;
//! - [`Forbidden`]: the caller is a member but not the group admin;
//! - [`InvalidState`]: the request is valid but the group is not in a state that allows it;
//! - [`KeyNotFound`]: group, member, expense or settlement does not exist (or is not visible);
//! - [`Conflict`] / [`ExistingKey`]: a uniqueness rule or a concurrent claim rejected the write;
//! - [`Database`]: persistence failure, safe to retry.
//!
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`InvalidName`]: EngineError::InvalidName
//!  [`PayerMismatch`]: EngineError::PayerMismatch
//!  [`SplitMismatch`]: EngineError::SplitMismatch
//!  [`PercentageMismatch`]: EngineError::PercentageMismatch
//!  [`Forbidden`]: EngineError::Forbidden
//!  [`InvalidState`]: EngineError::InvalidState
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`Conflict`]: EngineError::Conflict
//!  [`ExistingKey`]: EngineError::ExistingKey
//!  [`Database`]: EngineError::Database
use sea_orm::DbErr;
use thiserror::Error;

use crate::{MoneyCents, Percentage};

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid name: {0}")]
    InvalidName(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("Payer mismatch: payers total {actual}, expected {expected}")]
    PayerMismatch {
        expected: MoneyCents,
        actual: MoneyCents,
    },
    #[error("Split mismatch: splits total {actual}, expected {expected}")]
    SplitMismatch {
        expected: MoneyCents,
        actual: MoneyCents,
    },
    #[error("Split mismatch: percentages total {actual}, expected 100.00")]
    PercentageMismatch { actual: Percentage },
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// Returns `true` when the failure comes from the store and the request
    /// can be resubmitted unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }

    /// Returns `true` for input errors detected before any write.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount(_)
                | Self::InvalidName(_)
                | Self::InvalidId(_)
                | Self::PayerMismatch { .. }
                | Self::SplitMismatch { .. }
                | Self::PercentageMismatch { .. }
        )
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidName(a), Self::InvalidName(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (
                Self::PayerMismatch {
                    expected: e1,
                    actual: a1,
                },
                Self::PayerMismatch {
                    expected: e2,
                    actual: a2,
                },
            ) => e1 == e2 && a1 == a2,
            (
                Self::SplitMismatch {
                    expected: e1,
                    actual: a1,
                },
                Self::SplitMismatch {
                    expected: e2,
                    actual: a2,
                },
            ) => e1 == e2 && a1 == a2,
            (Self::PercentageMismatch { actual: a }, Self::PercentageMismatch { actual: b }) => {
                a == b
            }
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::InvalidState(a), Self::InvalidState(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
