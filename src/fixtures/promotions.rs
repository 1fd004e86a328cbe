//! Promotion Fixtures

use std::str::FromStr;

use jiff::Timestamp;
use rust_decimal::Decimal;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;

use crate::{
    fixtures::FixtureError,
    promotions::{PromoCode, PromotionKind, PromotionUuid, data::NewPromotion},
};

/// Wrapper for promotions in YAML
#[derive(Debug, Deserialize)]
pub struct PromotionsFixture {
    /// Map of promotion key -> promotion fixture
    pub promotions: FxHashMap<String, PromotionFixture>,
}

/// Promotion fixture from YAML
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PromotionFixture {
    /// Promotion name
    pub name: String,

    /// Promotion description
    #[serde(default)]
    pub description: String,

    /// Promotion kind, e.g. `percentage_discount`
    pub kind: PromotionKind,

    /// Decimal magnitude as a string, e.g. "10" or "5.50"
    pub value: String,

    /// Targeted product identifiers
    #[serde(default)]
    pub products: FxHashSet<String>,

    /// Targeted category identifiers
    #[serde(default)]
    pub categories: Option<FxHashSet<String>>,

    /// Window start (RFC 3339)
    pub starts_at: Timestamp,

    /// Window end (RFC 3339)
    pub ends_at: Timestamp,

    /// Promotional code
    #[serde(default)]
    pub code: Option<String>,

    /// Redemption cap
    #[serde(default)]
    pub usage_limit: Option<u64>,
}

impl TryFrom<PromotionFixture> for NewPromotion {
    type Error = FixtureError;

    fn try_from(fixture: PromotionFixture) -> Result<Self, Self::Error> {
        let value = Decimal::from_str(&fixture.value)
            .map_err(|_err| FixtureError::InvalidValue(fixture.value.clone()))?;

        let promo_code = fixture
            .code
            .as_deref()
            .map(PromoCode::parse)
            .transpose()?;

        let promotion = NewPromotion {
            uuid: PromotionUuid::new(),
            name: fixture.name,
            description: fixture.description,
            kind: fixture.kind,
            value,
            applies_to_products: fixture.products,
            applies_to_categories: fixture.categories,
            starts_at: fixture.starts_at,
            ends_at: fixture.ends_at,
            promo_code,
            usage_limit: fixture.usage_limit,
        };

        promotion.validate()?;

        Ok(promotion)
    }
}
