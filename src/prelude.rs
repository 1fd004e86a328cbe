//! Promo Engine prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    config::{EngineConfig, LogFormat, LoggingConfig},
    discounts::{DiscountError, DiscountOutcome, calculate_discount},
    fixtures::{Fixture, FixtureError},
    observability::{ObservabilityError, build_subscriber, init_subscriber},
    promotions::{
        PromoCode, Promotion, PromotionKind, PromotionUuid, PromotionsServiceError,
        data::{NewPromotion, PromotionUpdate},
        query::{
            Pagination, PromotionFilter, PromotionSort, PromotionTarget, PromotionsPage,
            SortDirection,
        },
        service::{PromotionsService, StorePromotionsService},
    },
    redemption::{RedemptionCoordinator, RedemptionService},
    repositories::{
        InMemoryPromotionsRepository, PromotionsRepository, RepositoryError, UsageOutcome,
    },
    stacking::{AppliedPromotion, StackedDiscount, StackingError, resolve, resolve_at},
    validation::{CodeFormatError, IneligibleReason, ValidationError, check_eligibility},
};

#[cfg(feature = "postgres")]
pub use crate::{config::DatabaseConfig, repositories::PgPromotionsRepository};
