//! Promotion Validation
//!
//! Stateless rule checks. Each check returns `Ok(())` when the rule holds and
//! the reason it doesn't otherwise.

use jiff::Timestamp;
use rust_decimal::Decimal;
use rustc_hash::FxHashSet;
use rusty_money::{Money, iso::Currency};
use thiserror::Error;

use crate::promotions::{Promotion, PromotionKind};

/// Shortest accepted promotional code.
pub const MIN_CODE_LENGTH: usize = 3;

/// Longest accepted promotional code.
pub const MAX_CODE_LENGTH: usize = 20;

/// Why a promotion can't be used right now.
///
/// Variants are declared in reporting precedence order: when several apply,
/// [`check_eligibility`] reports the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IneligibleReason {
    /// The active flag is off.
    #[error("inactive")]
    Inactive,

    /// The window hasn't opened yet.
    #[error("not yet started")]
    NotYetStarted,

    /// The window has closed.
    #[error("expired")]
    Expired,

    /// Every allowed redemption has been used.
    #[error("usage limit reached")]
    UsageLimitReached,
}

/// Promotional code format violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodeFormatError {
    /// Fewer than [`MIN_CODE_LENGTH`] characters.
    #[error("promotional code must have at least 3 characters, got {length}")]
    TooShort {
        /// Length of the candidate in characters
        length: usize,
    },

    /// More than [`MAX_CODE_LENGTH`] characters.
    #[error("promotional code must have at most 20 characters, got {length}")]
    TooLong {
        /// Length of the candidate in characters
        length: usize,
    },

    /// Anything other than `A-Z` and `0-9`.
    #[error("promotional code may only contain uppercase letters and digits")]
    InvalidCharacters,
}

/// Malformed input rejected before any business rule runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Monetary amounts must not be negative.
    #[error("amount must not be negative")]
    NegativeAmount,

    /// Malformed promotional code.
    #[error(transparent)]
    InvalidCode(#[from] CodeFormatError),

    /// The window must end strictly after it starts.
    #[error("promotion must end after it starts (starts at {starts_at}, ends at {ends_at})")]
    InvalidSchedule {
        /// Requested start
        starts_at: Timestamp,

        /// Requested end
        ends_at: Timestamp,
    },

    /// Value out of range for the promotion kind.
    #[error("invalid value {value} for {kind}: {reason}")]
    InvalidValue {
        /// Promotion kind
        kind: PromotionKind,

        /// Rejected value
        value: Decimal,

        /// Rule that was broken
        reason: &'static str,
    },

    /// Usage limits must be positive.
    #[error("usage limit must be greater than zero")]
    InvalidUsageLimit,

    /// A limit can't be set below the redemptions already made.
    #[error("usage limit {limit} is below the current usage count {count}")]
    UsageLimitBelowCount {
        /// Requested limit
        limit: u64,

        /// Current usage count
        count: u64,
    },

    /// Product-scoped promotions must target at least one product.
    #[error("product-scoped promotion must list at least one product")]
    MissingProducts,

    /// Pages are numbered from 1.
    #[error("page must be at least 1")]
    InvalidPage,

    /// Page sizes must be positive.
    #[error("page limit must be at least 1")]
    InvalidPageLimit,
}

/// Valid iff `starts_at <= point_in_time <= ends_at`.
///
/// # Errors
///
/// Returns [`IneligibleReason::NotYetStarted`] or [`IneligibleReason::Expired`].
pub fn check_window(promotion: &Promotion, point_in_time: Timestamp) -> Result<(), IneligibleReason> {
    if point_in_time < promotion.starts_at {
        return Err(IneligibleReason::NotYetStarted);
    }

    if point_in_time > promotion.ends_at {
        return Err(IneligibleReason::Expired);
    }

    Ok(())
}

/// Valid iff the promotion has no usage limit or has uses left.
///
/// # Errors
///
/// Returns [`IneligibleReason::UsageLimitReached`].
pub fn check_usage(promotion: &Promotion) -> Result<(), IneligibleReason> {
    match promotion.usage_limit {
        Some(limit) if promotion.usage_count >= limit => Err(IneligibleReason::UsageLimitReached),
        _ => Ok(()),
    }
}

/// Valid iff the active flag is set.
///
/// # Errors
///
/// Returns [`IneligibleReason::Inactive`].
pub fn check_active(promotion: &Promotion) -> Result<(), IneligibleReason> {
    if promotion.active {
        Ok(())
    } else {
        Err(IneligibleReason::Inactive)
    }
}

/// Combined active, window and usage check.
///
/// Short-circuits on the first failure, in the order inactive, not yet
/// started, expired, usage limit reached.
///
/// # Errors
///
/// Returns the first [`IneligibleReason`] that applies.
pub fn check_eligibility(
    promotion: &Promotion,
    point_in_time: Timestamp,
) -> Result<(), IneligibleReason> {
    check_active(promotion)?;
    check_window(promotion, point_in_time)?;
    check_usage(promotion)
}

/// Valid iff the candidate has 3 to 20 characters, all `A-Z` or `0-9`.
///
/// # Errors
///
/// Returns the first [`CodeFormatError`] that applies, length first.
pub fn check_code_format(candidate: &str) -> Result<(), CodeFormatError> {
    let length = candidate.chars().count();

    if length < MIN_CODE_LENGTH {
        return Err(CodeFormatError::TooShort { length });
    }

    if length > MAX_CODE_LENGTH {
        return Err(CodeFormatError::TooLong { length });
    }

    if !candidate
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return Err(CodeFormatError::InvalidCharacters);
    }

    Ok(())
}

/// Valid iff the amount isn't negative.
///
/// # Errors
///
/// Returns [`ValidationError::NegativeAmount`].
pub fn check_amount(amount: &Money<'_, Currency>) -> Result<(), ValidationError> {
    if amount.is_negative() {
        Err(ValidationError::NegativeAmount)
    } else {
        Ok(())
    }
}

/// Valid iff `ends_at > starts_at`.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidSchedule`].
pub fn check_schedule(starts_at: Timestamp, ends_at: Timestamp) -> Result<(), ValidationError> {
    if ends_at > starts_at {
        Ok(())
    } else {
        Err(ValidationError::InvalidSchedule { starts_at, ends_at })
    }
}

/// Valid iff `value` is in range for `kind`.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidValue`].
pub fn check_value(kind: PromotionKind, value: Decimal) -> Result<(), ValidationError> {
    let broken = match kind {
        PromotionKind::PercentageDiscount
            if value <= Decimal::ZERO || value > Decimal::ONE_HUNDRED =>
        {
            Some("percentage must be greater than 0 and at most 100")
        }
        PromotionKind::FixedDiscount if value < Decimal::ZERO => {
            Some("fixed amount must not be negative")
        }
        PromotionKind::FreeShipping if !value.is_zero() => Some("free shipping must have a zero value"),
        PromotionKind::BuyNGetM if value < Decimal::ZERO => {
            Some("value must not be negative")
        }
        _ => None,
    };

    match broken {
        Some(reason) => Err(ValidationError::InvalidValue {
            kind,
            value,
            reason,
        }),
        None => Ok(()),
    }
}

/// Valid iff the limit is unset, or positive and not below `usage_count`.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidUsageLimit`] or
/// [`ValidationError::UsageLimitBelowCount`].
pub fn check_usage_limit(usage_limit: Option<u64>, usage_count: u64) -> Result<(), ValidationError> {
    match usage_limit {
        Some(0) => Err(ValidationError::InvalidUsageLimit),
        Some(limit) if limit < usage_count => Err(ValidationError::UsageLimitBelowCount {
            limit,
            count: usage_count,
        }),
        _ => Ok(()),
    }
}

/// Valid iff the promotion targets at least one category, or at least one
/// product when it has no categories.
///
/// # Errors
///
/// Returns [`ValidationError::MissingProducts`].
pub fn check_scope(
    products: &FxHashSet<String>,
    categories: Option<&FxHashSet<String>>,
) -> Result<(), ValidationError> {
    let has_categories = categories.is_some_and(|categories| !categories.is_empty());

    if has_categories || !products.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingProducts)
    }
}

/// Check every record-level invariant of a promotion.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found.
pub fn validate_promotion(promotion: &Promotion) -> Result<(), ValidationError> {
    check_schedule(promotion.starts_at, promotion.ends_at)?;
    check_value(promotion.kind, promotion.value)?;
    check_usage_limit(promotion.usage_limit, promotion.usage_count)?;
    check_scope(
        &promotion.applies_to_products,
        promotion.applies_to_categories.as_ref(),
    )
}
