//! Stacking
//!
//! Applies several promotions to one amount, one after another, in priority
//! order. Each promotion sees the amount left by the ones before it.

use jiff::Timestamp;
use rust_decimal::Decimal;
use rusty_money::{Money, MoneyError, iso::Currency};
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    discounts::{DiscountError, calculate_discount},
    promotions::{Promotion, PromotionKind, PromotionUuid},
    validation::{IneligibleReason, ValidationError, check_amount, check_eligibility},
};

/// Errors raised while stacking promotions.
#[derive(Debug, Error)]
pub enum StackingError {
    /// At most one percentage discount may be stacked.
    #[error("only one percentage discount can be applied at a time")]
    IncompatiblePromotions,

    /// Percentage discounts may not add up to more than 100%.
    #[error("combined percentage discounts of {total}% exceed 100%")]
    ExcessiveDiscount {
        /// Sum of the percentage values
        total: Decimal,
    },

    /// A candidate failed its eligibility check.
    #[error("promotion {promotion} is not eligible: {reason}")]
    Ineligible {
        /// The rejected promotion
        promotion: PromotionUuid,

        /// Why it was rejected
        reason: IneligibleReason,
    },

    /// The input amount was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A single discount failed to compute.
    #[error(transparent)]
    Discount(#[from] DiscountError),

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// One step of a stacked discount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppliedPromotion<'a> {
    /// Promotion applied
    pub promotion: PromotionUuid,

    /// Its kind
    pub kind: PromotionKind,

    /// Amount it took off the running total
    pub discount: Money<'a, Currency>,
}

/// Applied promotions, in application order.
pub type AppliedPromotions<'a> = SmallVec<[AppliedPromotion<'a>; 4]>;

/// Outcome of stacking promotions on an amount.
#[derive(Debug, Clone, PartialEq)]
pub struct StackedDiscount<'a> {
    /// Amount left to pay
    pub final_amount: Money<'a, Currency>,

    /// Sum of every applied discount
    pub total_discount: Money<'a, Currency>,

    /// Promotions that changed the amount, in application order
    pub applied: AppliedPromotions<'a>,
}

/// Stack `promotions` on `amount`, assuming every candidate is eligible.
///
/// Promotions are applied in priority order (percentage, fixed, free
/// shipping, buy-N-get-M), keeping input order among equals. Steps that take
/// nothing off are left out of the breakdown, and buy-N-get-M promotions
/// never take anything off.
///
/// # Errors
///
/// Returns an error if:
/// - more than one percentage discount is given (`StackingError::IncompatiblePromotions`).
/// - percentage values add up to more than 100 (`StackingError::ExcessiveDiscount`).
/// - `amount` is negative (`StackingError::Validation`).
/// - a discount fails to compute (`StackingError::Discount`).
pub fn resolve<'a>(
    promotions: &[Promotion],
    amount: Money<'a, Currency>,
) -> Result<StackedDiscount<'a>, StackingError> {
    check_amount(&amount)?;

    let mut percentages = promotions
        .iter()
        .filter(|promotion| promotion.kind == PromotionKind::PercentageDiscount);

    let total_percentage = match (percentages.next(), percentages.next()) {
        (Some(_), Some(_)) => return Err(StackingError::IncompatiblePromotions),
        (Some(percentage), None) => percentage.value,
        (None, _) => Decimal::ZERO,
    };

    if total_percentage > Decimal::ONE_HUNDRED {
        return Err(StackingError::ExcessiveDiscount {
            total: total_percentage,
        });
    }

    let mut ordered: SmallVec<[&Promotion; 4]> = promotions.iter().collect();

    ordered.sort_by_key(|promotion| promotion.kind.priority());

    let mut running = amount;
    let mut total_discount = Money::from_minor(0, amount.currency());
    let mut applied = AppliedPromotions::new();

    for promotion in ordered {
        if promotion.kind == PromotionKind::BuyNGetM {
            continue;
        }

        let outcome = calculate_discount(promotion, running)?;

        if outcome.discount.is_zero() {
            continue;
        }

        total_discount = total_discount.add(outcome.discount)?;
        running = outcome.final_amount;

        applied.push(AppliedPromotion {
            promotion: promotion.uuid,
            kind: promotion.kind,
            discount: outcome.discount,
        });
    }

    Ok(StackedDiscount {
        final_amount: running,
        total_discount,
        applied,
    })
}

/// Check every candidate's eligibility at `point_in_time`, then [`resolve`].
///
/// # Errors
///
/// Returns `StackingError::Ineligible` for the first ineligible candidate, in
/// input order, or any error [`resolve`] returns.
pub fn resolve_at<'a>(
    promotions: &[Promotion],
    amount: Money<'a, Currency>,
    point_in_time: Timestamp,
) -> Result<StackedDiscount<'a>, StackingError> {
    for promotion in promotions {
        check_eligibility(promotion, point_in_time).map_err(|reason| {
            StackingError::Ineligible {
                promotion: promotion.uuid,
                reason,
            }
        })?;
    }

    resolve(promotions, amount)
}
