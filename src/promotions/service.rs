//! Promotions Service

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use rustc_hash::FxHashSet;
use rusty_money::{Money, iso::Currency};
use tracing::{Span, info};

use crate::{
    promotions::{
        PromoCode, Promotion, PromotionUuid, PromotionsServiceError,
        data::{NewPromotion, PromotionUpdate},
        query::{Pagination, PromotionFilter, PromotionTarget, PromotionsPage},
    },
    repositories::PromotionsRepository,
    stacking::{StackedDiscount, resolve_at},
    validation::ValidationError,
};

/// Promotions service over any [`PromotionsRepository`].
#[derive(Debug, Clone)]
pub struct StorePromotionsService<R> {
    promotions: R,
}

impl<R: PromotionsRepository> StorePromotionsService<R> {
    /// Create a new promotions service.
    #[must_use]
    pub fn new(promotions: R) -> Self {
        Self { promotions }
    }

    async fn live_promotions(
        &self,
        target: PromotionTarget,
        point_in_time: Timestamp,
    ) -> Result<Vec<Promotion>, PromotionsServiceError> {
        let promotions = self
            .promotions
            .find_live_promotions(target, point_in_time)
            .await?;

        Span::current().record("promotion_count", promotions.len());

        Ok(promotions)
    }
}

#[async_trait]
impl<R: PromotionsRepository> PromotionsService for StorePromotionsService<R> {
    #[tracing::instrument(
        name = "promotions.service.create_promotion",
        skip(self, promotion),
        fields(
            promotion_uuid = %promotion.uuid,
            promotion_kind = %promotion.kind,
            has_code = promotion.promo_code.is_some()
        ),
        err
    )]
    async fn create_promotion(
        &self,
        promotion: NewPromotion,
    ) -> Result<Promotion, PromotionsServiceError> {
        let promotion = promotion.into_promotion(Timestamp::now())?;

        let record = self.promotions.create_promotion(promotion).await?;

        info!(promotion_uuid = %record.uuid, "created promotion");

        Ok(record)
    }

    #[tracing::instrument(
        name = "promotions.service.update_promotion",
        skip(self, update),
        fields(promotion_uuid = %uuid),
        err
    )]
    async fn update_promotion(
        &self,
        uuid: PromotionUuid,
        update: PromotionUpdate,
    ) -> Result<Promotion, PromotionsServiceError> {
        let current = self
            .promotions
            .find_by_uuid(uuid)
            .await?
            .ok_or(PromotionsServiceError::NotFound)?;

        let merged = update.apply_to(&current, Timestamp::now())?;

        // The stored usage count wins; the limit is rechecked against it.
        let record = self.promotions.update_promotion(merged).await?;

        info!(
            promotion_uuid = %record.uuid,
            code_changed = update.changes_code(&current),
            "updated promotion"
        );

        Ok(record)
    }

    #[tracing::instrument(
        name = "promotions.service.get_promotion",
        skip(self),
        fields(promotion_uuid = %uuid),
        err
    )]
    async fn get_promotion(&self, uuid: PromotionUuid) -> Result<Promotion, PromotionsServiceError> {
        self.promotions
            .find_by_uuid(uuid)
            .await?
            .ok_or(PromotionsServiceError::NotFound)
    }

    #[tracing::instrument(
        name = "promotions.service.list_promotions",
        skip(self, filter),
        fields(
            page = pagination.page(),
            limit = pagination.limit(),
            total = tracing::field::Empty
        ),
        err
    )]
    async fn list_promotions(
        &self,
        filter: PromotionFilter,
        pagination: Pagination,
    ) -> Result<PromotionsPage, PromotionsServiceError> {
        let page = self
            .promotions
            .list_promotions(&filter, &pagination)
            .await?;

        Span::current().record("total", page.total);

        Ok(page)
    }

    #[tracing::instrument(
        name = "promotions.service.promotions_for_product",
        skip(self),
        fields(promotion_count = tracing::field::Empty),
        err
    )]
    async fn promotions_for_product(
        &self,
        product: String,
        point_in_time: Timestamp,
    ) -> Result<Vec<Promotion>, PromotionsServiceError> {
        self.live_promotions(PromotionTarget::Product(product), point_in_time)
            .await
    }

    #[tracing::instrument(
        name = "promotions.service.promotions_for_category",
        skip(self),
        fields(promotion_count = tracing::field::Empty),
        err
    )]
    async fn promotions_for_category(
        &self,
        category: String,
        point_in_time: Timestamp,
    ) -> Result<Vec<Promotion>, PromotionsServiceError> {
        self.live_promotions(PromotionTarget::Category(category), point_in_time)
            .await
    }

    #[tracing::instrument(
        name = "promotions.service.evaluate_codes",
        skip(self, codes, amount),
        fields(
            code_count = codes.len(),
            amount = %amount,
            applied_count = tracing::field::Empty
        ),
        err
    )]
    async fn evaluate_codes(
        &self,
        codes: Vec<String>,
        amount: Money<'static, Currency>,
        point_in_time: Timestamp,
    ) -> Result<StackedDiscount<'static>, PromotionsServiceError> {
        let mut seen = FxHashSet::default();
        let mut promotions = Vec::with_capacity(codes.len());

        for code in &codes {
            let code = PromoCode::parse(code).map_err(ValidationError::from)?;

            let promotion = self
                .promotions
                .find_by_code(&code)
                .await?
                .filter(|promotion| promotion.active)
                .ok_or(PromotionsServiceError::NotFound)?;

            // The same code given twice stacks once.
            if seen.insert(promotion.uuid) {
                promotions.push(promotion);
            }
        }

        let stacked = resolve_at(&promotions, amount, point_in_time)?;

        Span::current().record("applied_count", stacked.applied.len());

        Ok(stacked)
    }
}

/// Administration and read-side evaluation of promotions.
#[automock]
#[async_trait]
pub trait PromotionsService: Send + Sync {
    /// Create a promotion with no redemptions, active.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed promotion, `AlreadyExists` when the
    /// identifier or code is taken.
    async fn create_promotion(
        &self,
        promotion: NewPromotion,
    ) -> Result<Promotion, PromotionsServiceError>;

    /// Merge `update` onto the stored promotion. Redemptions that land
    /// meanwhile are kept.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Validation` for an invalid merged record or a usage
    /// limit below the stored count, `AlreadyExists` for a taken code.
    async fn update_promotion(
        &self,
        uuid: PromotionUuid,
        update: PromotionUpdate,
    ) -> Result<Promotion, PromotionsServiceError>;

    /// # Errors
    ///
    /// `NotFound` if no promotion has this identifier.
    async fn get_promotion(&self, uuid: PromotionUuid) -> Result<Promotion, PromotionsServiceError>;

    /// # Errors
    ///
    /// Storage failures only.
    async fn list_promotions(
        &self,
        filter: PromotionFilter,
        pagination: Pagination,
    ) -> Result<PromotionsPage, PromotionsServiceError>;

    /// Active promotions for `product` whose window contains `point_in_time`.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    async fn promotions_for_product(
        &self,
        product: String,
        point_in_time: Timestamp,
    ) -> Result<Vec<Promotion>, PromotionsServiceError>;

    /// Active promotions for `category` whose window contains `point_in_time`.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    async fn promotions_for_category(
        &self,
        category: String,
        point_in_time: Timestamp,
    ) -> Result<Vec<Promotion>, PromotionsServiceError>;

    /// Stack the promotions behind `codes` onto `amount`. Nothing is
    /// redeemed.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed code, `NotFound` for an unknown or
    /// inactive one, `Stacking` when the promotions can't be combined or one
    /// is ineligible.
    async fn evaluate_codes(
        &self,
        codes: Vec<String>,
        amount: Money<'static, Currency>,
        point_in_time: Timestamp,
    ) -> Result<StackedDiscount<'static>, PromotionsServiceError>;
}
