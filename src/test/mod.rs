//! Test helpers shared by unit tests.

use jiff::{SignedDuration, Timestamp};
use rust_decimal::Decimal;
use rustc_hash::FxHashSet;

use crate::promotions::{
    Promotion, PromotionKind, PromotionUuid, PromoCode, data::NewPromotion,
};


/// 2026-01-01T00:00:00Z
const WINDOW_START: i64 = 1_767_225_600;

/// Thirty days after [`WINDOW_START`].
const WINDOW_END: i64 = WINDOW_START + 30 * 24 * 60 * 60;

pub(crate) fn window_start() -> Result<Timestamp, jiff::Error> {
    Timestamp::from_second(WINDOW_START)
}

pub(crate) fn window_end() -> Result<Timestamp, jiff::Error> {
    Timestamp::from_second(WINDOW_END)
}

/// A point inside the sample window.
pub(crate) fn during() -> Result<Timestamp, jiff::Error> {
    window_start()?.checked_add(SignedDuration::from_hours(24))
}

pub(crate) fn before_start() -> Result<Timestamp, jiff::Error> {
    window_start()?.checked_sub(SignedDuration::from_secs(1))
}

pub(crate) fn after_end() -> Result<Timestamp, jiff::Error> {
    window_end()?.checked_add(SignedDuration::from_secs(1))
}

/// An active, unlimited, product-scoped promotion over the sample window.
pub(crate) fn promotion(kind: PromotionKind, value: i64) -> Result<Promotion, jiff::Error> {
    let starts_at = window_start()?;

    Ok(Promotion {
        uuid: PromotionUuid::new(),
        name: format!("{kind} {value}"),
        description: String::new(),
        kind,
        value: Decimal::from(value),
        applies_to_products: FxHashSet::from_iter(["sku-1".to_string()]),
        applies_to_categories: None,
        starts_at,
        ends_at: window_end()?,
        promo_code: None,
        usage_limit: None,
        usage_count: 0,
        active: true,
        created_at: starts_at,
        updated_at: starts_at,
    })
}

/// Creation payload matching [`promotion`], optionally code-gated.
pub(crate) fn new_promotion(
    kind: PromotionKind,
    value: i64,
    code: Option<PromoCode>,
) -> Result<NewPromotion, jiff::Error> {
    Ok(NewPromotion {
        uuid: PromotionUuid::new(),
        name: format!("{kind} {value}"),
        description: String::new(),
        kind,
        value: Decimal::from(value),
        applies_to_products: FxHashSet::from_iter(["sku-1".to_string()]),
        applies_to_categories: None,
        starts_at: window_start()?,
        ends_at: window_end()?,
        promo_code: code,
        usage_limit: None,
    })
}
