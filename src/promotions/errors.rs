//! Promotions service errors.

use thiserror::Error;

use crate::{
    discounts::DiscountError,
    repositories::RepositoryError,
    stacking::StackingError,
    validation::{IneligibleReason, ValidationError},
};

/// Errors surfaced by the promotions and redemption services.
#[derive(Debug, Error)]
pub enum PromotionsServiceError {
    /// Identifier or promotional code already taken.
    #[error("promotion already exists")]
    AlreadyExists,

    /// No such promotion, or the code belongs to an inactive one.
    #[error("promotion not found")]
    NotFound,

    /// The promotion exists but can't be used right now.
    #[error("invalid promotion: {0}")]
    InvalidPromotion(IneligibleReason),

    /// Malformed input.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Promotions could not be stacked.
    #[error(transparent)]
    Stacking(#[from] StackingError),

    /// A discount failed to compute.
    #[error(transparent)]
    Discount(#[from] DiscountError),

    /// Persistence failure.
    #[error("storage error")]
    Storage(#[source] RepositoryError),
}

impl From<RepositoryError> for PromotionsServiceError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::AlreadyExists => Self::AlreadyExists,
            RepositoryError::NotFound => Self::NotFound,
            RepositoryError::UsageLimitBelowCount { limit, count } => {
                Self::Validation(ValidationError::UsageLimitBelowCount { limit, count })
            }
            other => Self::Storage(other),
        }
    }
}
