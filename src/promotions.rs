//! Promotions

use std::{fmt, str::FromStr};

use jiff::Timestamp;
use rust_decimal::Decimal;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::uuids::TypedUuid;

pub mod codes;
pub mod data;
mod errors;
pub mod query;
pub mod service;

pub use codes::PromoCode;
pub use errors::PromotionsServiceError;

/// Promotion UUID
pub type PromotionUuid = TypedUuid<Promotion>;

/// The closed set of promotion kinds.
///
/// The declaration order is also the stacking priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionKind {
    /// Percentage off the amount (`value` is in percent points).
    PercentageDiscount,

    /// Fixed amount off (`value` is in the currency's major units).
    FixedDiscount,

    /// Free shipping; only signals eligibility, never changes the amount.
    FreeShipping,

    /// Buy N, get M. No computation rule exists for this kind.
    BuyNGetM,
}

impl PromotionKind {
    /// Stacking priority; lower numbers are applied first.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::PercentageDiscount => 1,
            Self::FixedDiscount => 2,
            Self::FreeShipping => 3,
            Self::BuyNGetM => 4,
        }
    }

    /// Stable string form used in storage and fixtures.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PercentageDiscount => "percentage_discount",
            Self::FixedDiscount => "fixed_discount",
            Self::FreeShipping => "free_shipping",
            Self::BuyNGetM => "buy_n_get_m",
        }
    }
}

impl fmt::Display for PromotionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown promotion kind string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown promotion kind: {0}")]
pub struct UnknownPromotionKind(pub String);

impl FromStr for PromotionKind {
    type Err = UnknownPromotionKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage_discount" => Ok(Self::PercentageDiscount),
            "fixed_discount" => Ok(Self::FixedDiscount),
            "free_shipping" => Ok(Self::FreeShipping),
            "buy_n_get_m" => Ok(Self::BuyNGetM),
            other => Err(UnknownPromotionKind(other.to_string())),
        }
    }
}

/// Promotion record
#[derive(Debug, Clone, PartialEq)]
pub struct Promotion {
    /// Unique identifier
    pub uuid: PromotionUuid,

    /// Display name
    pub name: String,

    /// Display description
    pub description: String,

    /// Promotion kind
    pub kind: PromotionKind,

    /// Magnitude; its meaning depends on `kind`
    pub value: Decimal,

    /// Product identifiers the promotion targets
    pub applies_to_products: FxHashSet<String>,

    /// Category identifiers the promotion targets
    pub applies_to_categories: Option<FxHashSet<String>>,

    /// Start of the validity window (inclusive)
    pub starts_at: Timestamp,

    /// End of the validity window (inclusive)
    pub ends_at: Timestamp,

    /// Optional promotional code, unique across all promotions
    pub promo_code: Option<PromoCode>,

    /// Maximum number of redemptions
    pub usage_limit: Option<u64>,

    /// Number of redemptions so far
    pub usage_count: u64,

    /// Administrative on/off switch, independent of the window
    pub active: bool,

    /// Creation time
    pub created_at: Timestamp,

    /// Last administrative update
    pub updated_at: Timestamp,
}

impl Promotion {
    /// A promotion without categories is scoped to its products.
    pub fn is_product_scoped(&self) -> bool {
        self.applies_to_categories
            .as_ref()
            .is_none_or(FxHashSet::is_empty)
    }

    /// Whether the promotion lists the given product.
    pub fn targets_product(&self, product: &str) -> bool {
        self.applies_to_products.contains(product)
    }

    /// Whether the promotion lists the given category.
    pub fn targets_category(&self, category: &str) -> bool {
        self.applies_to_categories
            .as_ref()
            .is_some_and(|categories| categories.contains(category))
    }

    /// Number of redemptions left, if limited.
    pub fn remaining_uses(&self) -> Option<u64> {
        self.usage_limit
            .map(|limit| limit.saturating_sub(self.usage_count))
    }
}
