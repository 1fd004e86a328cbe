//! Redemption
//!
//! Consumes one use of a promotional code. The eligibility check and the
//! usage increment happen under the repository's lock on the promotion, so
//! redemptions of one code are linearized and none fail because another got
//! there first.

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use tracing::{Span, debug, info};

use crate::{
    promotions::{PromoCode, Promotion, PromotionsServiceError},
    repositories::{PromotionsRepository, UsageOutcome},
    validation::ValidationError,
};

/// Coordinates redemptions against a promotions repository.
#[derive(Debug, Clone)]
pub struct RedemptionCoordinator<R> {
    promotions: R,
}

impl<R: PromotionsRepository> RedemptionCoordinator<R> {
    /// Coordinate redemptions against `promotions`.
    #[must_use]
    pub fn new(promotions: R) -> Self {
        Self { promotions }
    }
}

#[async_trait]
impl<R: PromotionsRepository> RedemptionService for RedemptionCoordinator<R> {
    #[tracing::instrument(
        name = "redemption.service.redeem",
        skip(self, code),
        fields(
            promo_code = %code,
            point_in_time = %point_in_time,
            promotion_uuid = tracing::field::Empty
        ),
        err
    )]
    async fn redeem(
        &self,
        code: &str,
        point_in_time: Timestamp,
    ) -> Result<Promotion, PromotionsServiceError> {
        let code = PromoCode::parse(code).map_err(ValidationError::from)?;

        let promotion = self
            .promotions
            .find_by_code(&code)
            .await?
            .filter(|promotion| promotion.active)
            .ok_or(PromotionsServiceError::NotFound)?;

        Span::current().record("promotion_uuid", tracing::field::display(promotion.uuid));

        match self
            .promotions
            .increment_usage(promotion.uuid, point_in_time)
            .await?
        {
            UsageOutcome::Incremented(redeemed) => {
                info!(
                    promotion_uuid = %redeemed.uuid,
                    usage_count = redeemed.usage_count,
                    "redeemed promotion"
                );

                Ok(redeemed)
            }
            UsageOutcome::Ineligible(reason) => {
                debug!(promotion_uuid = %promotion.uuid, %reason, "promotion not redeemable");

                Err(PromotionsServiceError::InvalidPromotion(reason))
            }
        }
    }
}

/// Redemption of promotional codes.
#[automock]
#[async_trait]
pub trait RedemptionService: Send + Sync {
    /// Redeem `code` at `point_in_time`, returning the promotion with its
    /// usage count incremented by one.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the code is malformed (`PromotionsServiceError::Validation`).
    /// - no active promotion has this code (`PromotionsServiceError::NotFound`).
    /// - the promotion is not eligible (`PromotionsServiceError::InvalidPromotion`).
    async fn redeem(
        &self,
        code: &str,
        point_in_time: Timestamp,
    ) -> Result<Promotion, PromotionsServiceError>;
}
