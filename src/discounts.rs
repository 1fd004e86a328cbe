//! Discounts
//!
//! Computes the effect of a single promotion on a monetary amount. All
//! arithmetic happens in the currency's minor units.

use decimal_percentage::Percentage;
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use rusty_money::{Money, MoneyError, iso::Currency};
use thiserror::Error;

use crate::{
    promotions::{Promotion, PromotionKind},
    validation::{ValidationError, check_amount},
};

/// Errors specific to discount calculations.
#[derive(Debug, Error)]
pub enum DiscountError {
    /// The kind has no computation rule.
    #[error("unsupported promotion kind: {0}")]
    UnsupportedPromotionKind(PromotionKind),

    /// The input amount was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed or was not finite")]
    PercentConversion,

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Result of applying one promotion to an amount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscountOutcome<'a> {
    /// Amount taken off
    pub discount: Money<'a, Currency>,

    /// Amount left to pay, never negative
    pub final_amount: Money<'a, Currency>,
}

/// Calculate the discount `promotion` yields on `amount`.
///
/// Percentage discounts are rounded half away from zero to the currency's
/// minor unit. Fixed discounts read `value` in major units of the amount's
/// currency and are capped at the amount. Free shipping never changes the
/// amount.
///
/// # Errors
///
/// Returns an error if:
/// - `amount` is negative (`DiscountError::Validation`).
/// - the promotion is a buy-N-get-M (`DiscountError::UnsupportedPromotionKind`).
/// - a value cannot be safely represented in minor units
///   (`DiscountError::PercentConversion`).
pub fn calculate_discount<'a>(
    promotion: &Promotion,
    amount: Money<'a, Currency>,
) -> Result<DiscountOutcome<'a>, DiscountError> {
    check_amount(&amount)?;

    let currency = amount.currency();
    let amount_minor = amount.to_minor_units();

    let discount_minor = match promotion.kind {
        PromotionKind::PercentageDiscount => {
            percent_of_minor(&percentage_points(promotion.value)?, amount_minor)?
        }
        PromotionKind::FixedDiscount => {
            major_to_minor(promotion.value, currency)?.min(amount_minor)
        }
        PromotionKind::FreeShipping => 0,
        PromotionKind::BuyNGetM => {
            return Err(DiscountError::UnsupportedPromotionKind(promotion.kind));
        }
    };

    let final_minor = amount_minor
        .checked_sub(discount_minor)
        .ok_or(DiscountError::PercentConversion)?
        .max(0);

    Ok(DiscountOutcome {
        discount: Money::from_minor(discount_minor, currency),
        final_amount: Money::from_minor(final_minor, currency),
    })
}

/// Interpret a value in percent points (`10` is 10%).
///
/// # Errors
///
/// Returns `DiscountError::PercentConversion` if the value can't be scaled.
pub fn percentage_points(value: Decimal) -> Result<Percentage, DiscountError> {
    value
        .checked_div(Decimal::ONE_HUNDRED)
        .map(Percentage::from)
        .ok_or(DiscountError::PercentConversion)
}

/// Calculate the discount amount in minor units based on a percentage and a minor unit amount.
///
/// # Errors
///
/// Returns an error if:
/// - The percentage calculation overflows or cannot be safely represented (`DiscountError::PercentConversion`).
pub fn percent_of_minor(percent: &Percentage, minor: i64) -> Result<i64, DiscountError> {
    let minor = Decimal::from_i64(minor).ok_or(DiscountError::PercentConversion)?;

    ((*percent) * Decimal::ONE)
        .checked_mul(minor)
        .ok_or(DiscountError::PercentConversion)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(DiscountError::PercentConversion)
}

/// Convert a major-unit value to minor units of `currency`.
fn major_to_minor(value: Decimal, currency: &Currency) -> Result<i64, DiscountError> {
    let scale = 10_i64
        .checked_pow(currency.exponent)
        .ok_or(DiscountError::PercentConversion)?;

    value
        .checked_mul(Decimal::from(scale))
        .ok_or(DiscountError::PercentConversion)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(DiscountError::PercentConversion)
}
