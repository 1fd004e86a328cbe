//! Promotion Data
//!
//! Creation and update payloads accepted by the promotions service.

use jiff::Timestamp;
use rust_decimal::Decimal;
use rustc_hash::FxHashSet;

use crate::{
    promotions::{PromoCode, Promotion, PromotionKind, PromotionUuid},
    validation::{
        ValidationError, check_schedule, check_scope, check_usage_limit, check_value,
        validate_promotion,
    },
};

/// New Promotion Data
#[derive(Debug, Clone, PartialEq)]
pub struct NewPromotion {
    /// Identifier to create the promotion under
    pub uuid: PromotionUuid,

    /// Display name
    pub name: String,

    /// Display description
    pub description: String,

    /// Promotion kind
    pub kind: PromotionKind,

    /// Magnitude; its meaning depends on `kind`
    pub value: Decimal,

    /// Targeted products
    pub applies_to_products: FxHashSet<String>,

    /// Targeted categories
    pub applies_to_categories: Option<FxHashSet<String>>,

    /// Window start
    pub starts_at: Timestamp,

    /// Window end
    pub ends_at: Timestamp,

    /// Optional promotional code
    pub promo_code: Option<PromoCode>,

    /// Optional redemption cap
    pub usage_limit: Option<u64>,
}

impl NewPromotion {
    /// Check the payload against the record invariants.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_schedule(self.starts_at, self.ends_at)?;
        check_value(self.kind, self.value)?;
        check_usage_limit(self.usage_limit, 0)?;
        check_scope(
            &self.applies_to_products,
            self.applies_to_categories.as_ref(),
        )
    }

    /// Build the initial record: no redemptions yet, active.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the record would break an invariant
    /// (schedule, value range, usage limit, product scope).
    pub fn into_promotion(self, created_at: Timestamp) -> Result<Promotion, ValidationError> {
        self.validate()?;

        Ok(Promotion {
            uuid: self.uuid,
            name: self.name,
            description: self.description,
            kind: self.kind,
            value: self.value,
            applies_to_products: self.applies_to_products,
            applies_to_categories: self.applies_to_categories,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            promo_code: self.promo_code,
            usage_limit: self.usage_limit,
            usage_count: 0,
            active: true,
            created_at,
            updated_at: created_at,
        })
    }
}

/// Promotion Update Data
///
/// `None` leaves a field untouched. Optional fields use a nested `Option` so
/// they can also be cleared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromotionUpdate {
    /// New display name
    pub name: Option<String>,

    /// New display description
    pub description: Option<String>,

    /// New kind
    pub kind: Option<PromotionKind>,

    /// New value
    pub value: Option<Decimal>,

    /// New product targets
    pub applies_to_products: Option<FxHashSet<String>>,

    /// New (or cleared) category targets
    pub applies_to_categories: Option<Option<FxHashSet<String>>>,

    /// New window start
    pub starts_at: Option<Timestamp>,

    /// New window end
    pub ends_at: Option<Timestamp>,

    /// New (or cleared) promotional code
    pub promo_code: Option<Option<PromoCode>>,

    /// New (or cleared) usage limit
    pub usage_limit: Option<Option<u64>>,

    /// New active flag
    pub active: Option<bool>,
}

impl PromotionUpdate {
    /// Merge this update onto `current`.
    ///
    /// The identifier, usage count and creation time are always carried over
    /// from `current`. The merged record is validated as a whole, so a new end
    /// date is checked against the stored start date and vice versa.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the merged record would break an
    /// invariant.
    pub fn apply_to(
        &self,
        current: &Promotion,
        updated_at: Timestamp,
    ) -> Result<Promotion, ValidationError> {
        let promotion = Promotion {
            uuid: current.uuid,
            name: self.name.clone().unwrap_or_else(|| current.name.clone()),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| current.description.clone()),
            kind: self.kind.unwrap_or(current.kind),
            value: self.value.unwrap_or(current.value),
            applies_to_products: self
                .applies_to_products
                .clone()
                .unwrap_or_else(|| current.applies_to_products.clone()),
            applies_to_categories: self
                .applies_to_categories
                .clone()
                .unwrap_or_else(|| current.applies_to_categories.clone()),
            starts_at: self.starts_at.unwrap_or(current.starts_at),
            ends_at: self.ends_at.unwrap_or(current.ends_at),
            promo_code: self
                .promo_code
                .clone()
                .unwrap_or_else(|| current.promo_code.clone()),
            usage_limit: self.usage_limit.unwrap_or(current.usage_limit),
            usage_count: current.usage_count,
            active: self.active.unwrap_or(current.active),
            created_at: current.created_at,
            updated_at,
        };

        validate_promotion(&promotion)?;

        Ok(promotion)
    }

    /// Whether applying this update would change the promotional code.
    pub fn changes_code(&self, current: &Promotion) -> bool {
        self.promo_code
            .as_ref()
            .is_some_and(|code| code != &current.promo_code)
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::test::{after_end, during, new_promotion, promotion, window_start};

    use super::*;

    #[test]
    fn new_promotions_start_unused_and_active() -> TestResult {
        let code = PromoCode::parse("WELCOME10")?;
        let new = new_promotion(PromotionKind::PercentageDiscount, 10, Some(code.clone()))?;
        let uuid = new.uuid;

        let promotion = new.into_promotion(window_start()?)?;

        assert_eq!(promotion.uuid, uuid);
        assert_eq!(promotion.usage_count, 0);
        assert!(promotion.active);
        assert_eq!(promotion.promo_code, Some(code));
        assert_eq!(promotion.created_at, promotion.updated_at);

        Ok(())
    }

    #[test]
    fn new_promotions_must_end_after_they_start() -> TestResult {
        let mut new = new_promotion(PromotionKind::FixedDiscount, 5, None)?;
        new.ends_at = new.starts_at;

        let result = new.into_promotion(window_start()?);

        assert!(matches!(result, Err(ValidationError::InvalidSchedule { .. })));

        Ok(())
    }

    #[test]
    fn free_shipping_must_have_zero_value() -> TestResult {
        let new = new_promotion(PromotionKind::FreeShipping, 5, None)?;

        let result = new.into_promotion(window_start()?);

        assert!(matches!(
            result,
            Err(ValidationError::InvalidValue {
                kind: PromotionKind::FreeShipping,
                ..
            })
        ));

        Ok(())
    }

    #[test]
    fn update_keeps_identity_and_usage() -> TestResult {
        let mut current = promotion(PromotionKind::FixedDiscount, 5)?;
        current.usage_count = 4;

        let update = PromotionUpdate {
            name: Some("Renamed".to_string()),
            value: Some(Decimal::from(7)),
            active: Some(false),
            ..PromotionUpdate::default()
        };

        let updated = update.apply_to(&current, during()?)?;

        assert_eq!(updated.uuid, current.uuid);
        assert_eq!(updated.usage_count, 4);
        assert_eq!(updated.created_at, current.created_at);
        assert_eq!(updated.updated_at, during()?);
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.value, Decimal::from(7));
        assert!(!updated.active);
        assert_eq!(updated.starts_at, current.starts_at);

        Ok(())
    }

    #[test]
    fn update_validates_merged_schedule() -> TestResult {
        let current = promotion(PromotionKind::FixedDiscount, 5)?;

        let update = PromotionUpdate {
            starts_at: Some(after_end()?),
            ..PromotionUpdate::default()
        };

        let result = update.apply_to(&current, during()?);

        assert!(matches!(result, Err(ValidationError::InvalidSchedule { .. })));

        Ok(())
    }

    #[test]
    fn update_validates_value_against_merged_kind() -> TestResult {
        let current = promotion(PromotionKind::FixedDiscount, 500)?;

        let update = PromotionUpdate {
            kind: Some(PromotionKind::PercentageDiscount),
            ..PromotionUpdate::default()
        };

        let result = update.apply_to(&current, during()?);

        assert!(matches!(result, Err(ValidationError::InvalidValue { .. })));

        Ok(())
    }

    #[test]
    fn update_cannot_drop_limit_below_usage() -> TestResult {
        let mut current = promotion(PromotionKind::FixedDiscount, 5)?;
        current.usage_limit = Some(10);
        current.usage_count = 6;

        let update = PromotionUpdate {
            usage_limit: Some(Some(5)),
            ..PromotionUpdate::default()
        };

        let result = update.apply_to(&current, during()?);

        assert_eq!(
            result,
            Err(ValidationError::UsageLimitBelowCount { limit: 5, count: 6 })
        );

        Ok(())
    }

    #[test]
    fn nested_options_can_clear_fields() -> TestResult {
        let mut current = promotion(PromotionKind::FixedDiscount, 5)?;
        current.promo_code = Some(PromoCode::parse("OLDCODE")?);
        current.usage_limit = Some(3);

        let update = PromotionUpdate {
            promo_code: Some(None),
            usage_limit: Some(None),
            ..PromotionUpdate::default()
        };

        assert!(update.changes_code(&current));

        let updated = update.apply_to(&current, during()?)?;

        assert_eq!(updated.promo_code, None);
        assert_eq!(updated.usage_limit, None);

        Ok(())
    }

    #[test]
    fn same_code_is_not_a_change() -> TestResult {
        let mut current = promotion(PromotionKind::FixedDiscount, 5)?;
        current.promo_code = Some(PromoCode::parse("SAMECODE")?);

        let update = PromotionUpdate {
            promo_code: Some(Some(PromoCode::parse("SAMECODE")?)),
            ..PromotionUpdate::default()
        };

        assert!(!update.changes_code(&current));
        assert!(!PromotionUpdate::default().changes_code(&current));

        Ok(())
    }
}
