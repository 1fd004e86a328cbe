//! In-memory Promotions Repository
//!
//! Every promotion sits behind its own mutex, so writes to one promotion are
//! serialized without blocking the others. Locks are always taken in the
//! order: code index, promotion index, promotion.

use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use rustc_hash::FxHashMap;
use tokio::sync::{Mutex, RwLock};

use crate::{
    promotions::{
        PromoCode, Promotion, PromotionUuid,
        query::{Pagination, PromotionFilter, PromotionTarget, PromotionsPage, is_live},
    },
    repositories::{PromotionsRepository, RepositoryError, UsageOutcome},
    validation::check_eligibility,
};

type Entry = Arc<Mutex<Promotion>>;

#[derive(Debug, Default)]
struct State {
    promotions: RwLock<FxHashMap<PromotionUuid, Entry>>,
    codes: RwLock<FxHashMap<PromoCode, PromotionUuid>>,
}

/// Process-local promotion storage.
///
/// Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPromotionsRepository {
    state: Arc<State>,
}

impl InMemoryPromotionsRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, uuid: PromotionUuid) -> Option<Entry> {
        self.state.promotions.read().await.get(&uuid).cloned()
    }

    /// Copy every stored promotion.
    async fn snapshot(&self) -> Vec<Promotion> {
        let entries: Vec<Entry> = self.state.promotions.read().await.values().cloned().collect();

        let mut promotions = Vec::with_capacity(entries.len());

        for entry in entries {
            promotions.push(entry.lock().await.clone());
        }

        promotions
    }
}

#[async_trait]
impl PromotionsRepository for InMemoryPromotionsRepository {
    async fn create_promotion(&self, promotion: Promotion) -> Result<Promotion, RepositoryError> {
        let mut codes = self.state.codes.write().await;
        let mut promotions = self.state.promotions.write().await;

        if promotions.contains_key(&promotion.uuid) {
            return Err(RepositoryError::AlreadyExists);
        }

        if let Some(code) = &promotion.promo_code {
            if codes.contains_key(code) {
                return Err(RepositoryError::AlreadyExists);
            }

            codes.insert(code.clone(), promotion.uuid);
        }

        promotions.insert(promotion.uuid, Arc::new(Mutex::new(promotion.clone())));

        Ok(promotion)
    }

    async fn update_promotion(&self, promotion: Promotion) -> Result<Promotion, RepositoryError> {
        let mut codes = self.state.codes.write().await;

        let entry = self
            .entry(promotion.uuid)
            .await
            .ok_or(RepositoryError::NotFound)?;

        let mut stored = entry.lock().await;

        if let Some(limit) = promotion
            .usage_limit
            .filter(|limit| *limit < stored.usage_count)
        {
            return Err(RepositoryError::UsageLimitBelowCount {
                limit,
                count: stored.usage_count,
            });
        }

        if stored.promo_code != promotion.promo_code {
            let taken = promotion
                .promo_code
                .as_ref()
                .and_then(|code| codes.get(code))
                .is_some_and(|owner| *owner != promotion.uuid);

            if taken {
                return Err(RepositoryError::AlreadyExists);
            }

            if let Some(old) = &stored.promo_code {
                codes.remove(old);
            }

            if let Some(code) = &promotion.promo_code {
                codes.insert(code.clone(), promotion.uuid);
            }
        }

        *stored = Promotion {
            usage_count: stored.usage_count,
            created_at: stored.created_at,
            ..promotion
        };

        Ok(stored.clone())
    }

    async fn find_by_uuid(&self, uuid: PromotionUuid) -> Result<Option<Promotion>, RepositoryError> {
        let Some(entry) = self.entry(uuid).await else {
            return Ok(None);
        };

        let promotion = entry.lock().await.clone();

        Ok(Some(promotion))
    }

    async fn find_by_code(&self, code: &PromoCode) -> Result<Option<Promotion>, RepositoryError> {
        let Some(uuid) = self.state.codes.read().await.get(code).copied() else {
            return Ok(None);
        };

        // The code may have moved between the index read and the entry read.
        let promotion = self
            .find_by_uuid(uuid)
            .await?
            .filter(|promotion| promotion.promo_code.as_ref() == Some(code));

        Ok(promotion)
    }

    async fn increment_usage(
        &self,
        uuid: PromotionUuid,
        point_in_time: Timestamp,
    ) -> Result<UsageOutcome, RepositoryError> {
        let entry = self.entry(uuid).await.ok_or(RepositoryError::NotFound)?;

        let mut stored = entry.lock().await;

        if let Err(reason) = check_eligibility(&stored, point_in_time) {
            return Ok(UsageOutcome::Ineligible(reason));
        }

        stored.usage_count = stored
            .usage_count
            .checked_add(1)
            .ok_or(RepositoryError::InvalidData)?;

        Ok(UsageOutcome::Incremented(stored.clone()))
    }

    async fn list_promotions(
        &self,
        filter: &PromotionFilter,
        pagination: &Pagination,
    ) -> Result<PromotionsPage, RepositoryError> {
        let mut matching: Vec<Promotion> = self
            .snapshot()
            .await
            .into_iter()
            .filter(|promotion| filter.matches(promotion))
            .collect();

        matching.sort_by(|a, b| pagination.compare(a, b));

        let total = u64::try_from(matching.len()).unwrap_or(u64::MAX);
        let offset = usize::try_from(pagination.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(pagination.limit()).unwrap_or(usize::MAX);

        let promotions = matching.into_iter().skip(offset).take(limit).collect();

        Ok(PromotionsPage {
            promotions,
            total,
            page: pagination.page(),
            total_pages: pagination.total_pages(total),
        })
    }

    async fn find_live_promotions(
        &self,
        target: PromotionTarget,
        point_in_time: Timestamp,
    ) -> Result<Vec<Promotion>, RepositoryError> {
        let mut live: Vec<Promotion> = self
            .snapshot()
            .await
            .into_iter()
            .filter(|promotion| is_live(promotion, point_in_time) && target.matches(promotion))
            .collect();

        live.sort_by(|a, b| a.starts_at.cmp(&b.starts_at).then_with(|| a.uuid.cmp(&b.uuid)));

        Ok(live)
    }
}

#[cfg(test)]
mod tests {
    use rustc_hash::FxHashSet;
    use testresult::TestResult;

    use crate::{
        promotions::{
            PromotionKind,
            query::{PromotionSort, SortDirection},
        },
        test::{after_end, before_start, during, promotion},
        validation::IneligibleReason,
    };

    use super::*;

    fn coded(kind: PromotionKind, value: i64, code: &str) -> TestResult<Promotion> {
        let mut promotion = promotion(kind, value)?;
        promotion.promo_code = Some(PromoCode::parse(code)?);

        Ok(promotion)
    }

    #[tokio::test]
    async fn create_then_find() -> TestResult {
        let repository = InMemoryPromotionsRepository::new();
        let promotion = coded(PromotionKind::FixedDiscount, 5, "FIVEOFF")?;

        repository.create_promotion(promotion.clone()).await?;

        assert_eq!(
            repository.find_by_uuid(promotion.uuid).await?,
            Some(promotion.clone())
        );
        assert_eq!(
            repository.find_by_code(&PromoCode::parse("FIVEOFF")?).await?,
            Some(promotion)
        );
        assert_eq!(
            repository.find_by_code(&PromoCode::parse("MISSING")?).await?,
            None
        );

        Ok(())
    }

    #[tokio::test]
    async fn duplicate_uuid_or_code_is_rejected() -> TestResult {
        let repository = InMemoryPromotionsRepository::new();
        let promotion = coded(PromotionKind::FixedDiscount, 5, "FIVEOFF")?;

        repository.create_promotion(promotion.clone()).await?;

        let same_uuid = repository.create_promotion(promotion).await;

        assert!(matches!(same_uuid, Err(RepositoryError::AlreadyExists)));

        let same_code = repository
            .create_promotion(coded(PromotionKind::FixedDiscount, 7, "FIVEOFF")?)
            .await;

        assert!(matches!(same_code, Err(RepositoryError::AlreadyExists)));

        Ok(())
    }

    #[tokio::test]
    async fn increment_checks_eligibility_under_the_lock() -> TestResult {
        let repository = InMemoryPromotionsRepository::new();
        let mut promotion = promotion(PromotionKind::FixedDiscount, 5)?;
        promotion.usage_limit = Some(2);

        repository.create_promotion(promotion.clone()).await?;

        let first = repository.increment_usage(promotion.uuid, during()?).await?;

        assert!(matches!(first, UsageOutcome::Incremented(ref p) if p.usage_count == 1));

        let too_early = repository
            .increment_usage(promotion.uuid, before_start()?)
            .await?;

        assert_eq!(
            too_early,
            UsageOutcome::Ineligible(IneligibleReason::NotYetStarted)
        );

        repository.increment_usage(promotion.uuid, during()?).await?;

        let over_limit = repository.increment_usage(promotion.uuid, during()?).await?;

        assert_eq!(
            over_limit,
            UsageOutcome::Ineligible(IneligibleReason::UsageLimitReached)
        );
        assert_eq!(
            repository
                .find_by_uuid(promotion.uuid)
                .await?
                .map(|p| p.usage_count),
            Some(2)
        );

        let missing = repository
            .increment_usage(PromotionUuid::new(), during()?)
            .await;

        assert!(matches!(missing, Err(RepositoryError::NotFound)));

        Ok(())
    }

    #[tokio::test]
    async fn concurrent_increments_all_land() -> TestResult {
        let repository = InMemoryPromotionsRepository::new();
        let mut promotion = promotion(PromotionKind::FixedDiscount, 5)?;
        promotion.usage_limit = Some(500);

        repository.create_promotion(promotion.clone()).await?;

        let uuid = promotion.uuid;
        let at = during()?;
        let mut tasks = tokio::task::JoinSet::new();

        for _ in 0..500 {
            let repository = repository.clone();

            tasks.spawn(async move { repository.increment_usage(uuid, at).await });
        }

        let mut incremented = 0;

        while let Some(outcome) = tasks.join_next().await {
            if matches!(outcome??, UsageOutcome::Incremented(_)) {
                incremented += 1;
            }
        }

        assert_eq!(incremented, 500);
        assert_eq!(
            repository
                .find_by_uuid(promotion.uuid)
                .await?
                .map(|p| p.usage_count),
            Some(500)
        );

        Ok(())
    }

    #[tokio::test]
    async fn update_keeps_usage_and_moves_code() -> TestResult {
        let repository = InMemoryPromotionsRepository::new();
        let promotion = coded(PromotionKind::FixedDiscount, 5, "OLDCODE")?;

        repository.create_promotion(promotion.clone()).await?;
        repository.increment_usage(promotion.uuid, during()?).await?;

        let mut changed = promotion.clone();
        changed.name = "Renamed".to_string();
        changed.promo_code = Some(PromoCode::parse("NEWCODE")?);
        changed.created_at = during()?;

        let updated = repository.update_promotion(changed).await?;

        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.usage_count, 1);
        assert_eq!(updated.created_at, promotion.created_at);
        assert_eq!(repository.find_by_code(&PromoCode::parse("OLDCODE")?).await?, None);
        assert_eq!(
            repository
                .find_by_code(&PromoCode::parse("NEWCODE")?)
                .await?
                .map(|p| p.uuid),
            Some(promotion.uuid)
        );

        Ok(())
    }

    #[tokio::test]
    async fn update_checks_the_limit_against_the_stored_count() -> TestResult {
        let repository = InMemoryPromotionsRepository::new();
        let promotion = promotion(PromotionKind::FixedDiscount, 5)?;

        repository.create_promotion(promotion.clone()).await?;

        for _ in 0..3 {
            repository.increment_usage(promotion.uuid, during()?).await?;
        }

        let mut lowered = promotion.clone();
        lowered.usage_limit = Some(2);

        let result = repository.update_promotion(lowered).await;

        assert!(matches!(
            result,
            Err(RepositoryError::UsageLimitBelowCount { limit: 2, count: 3 })
        ));

        let mut exact = promotion.clone();
        exact.usage_limit = Some(3);

        let updated = repository.update_promotion(exact).await?;

        assert_eq!(updated.usage_limit, Some(3));
        assert_eq!(updated.usage_count, 3);

        Ok(())
    }

    #[tokio::test]
    async fn update_rejects_taken_code() -> TestResult {
        let repository = InMemoryPromotionsRepository::new();
        let first = coded(PromotionKind::FixedDiscount, 5, "FIRST")?;
        let second = coded(PromotionKind::FixedDiscount, 5, "SECOND")?;

        repository.create_promotion(first.clone()).await?;
        repository.create_promotion(second.clone()).await?;

        let mut changed = second;
        changed.promo_code = first.promo_code;

        let result = repository.update_promotion(changed).await;

        assert!(matches!(result, Err(RepositoryError::AlreadyExists)));

        Ok(())
    }

    #[tokio::test]
    async fn list_filters_sorts_and_pages() -> TestResult {
        let repository = InMemoryPromotionsRepository::new();

        for name in ["Delta", "Alpha", "Charlie", "Bravo", "Echo"] {
            let mut promotion = promotion(PromotionKind::FixedDiscount, 5)?;
            promotion.name = name.to_string();

            repository.create_promotion(promotion).await?;
        }

        let mut inactive = promotion(PromotionKind::PercentageDiscount, 10)?;
        inactive.active = false;

        repository.create_promotion(inactive).await?;

        let filter = PromotionFilter {
            active: Some(true),
            ..PromotionFilter::default()
        };

        let pagination =
            Pagination::new(2, 2)?.sorted_by(PromotionSort::Name, SortDirection::Asc);

        let page = repository.list_promotions(&filter, &pagination).await?;

        let names: Vec<_> = page.promotions.iter().map(|p| p.name.as_str()).collect();

        assert_eq!(names, vec!["Charlie", "Delta"]);
        assert_eq!(page.total, 5);
        assert_eq!(page.page, 2);
        assert_eq!(page.total_pages, 3);

        let beyond = repository
            .list_promotions(&filter, &Pagination::new(9, 2)?)
            .await?;

        assert!(beyond.promotions.is_empty());
        assert_eq!(beyond.total, 5);

        Ok(())
    }

    #[tokio::test]
    async fn live_promotions_by_target() -> TestResult {
        let repository = InMemoryPromotionsRepository::new();

        let product = promotion(PromotionKind::FixedDiscount, 5)?;

        let mut category = promotion(PromotionKind::PercentageDiscount, 10)?;
        category.applies_to_categories = Some(FxHashSet::from_iter(["shoes".to_string()]));

        let mut inactive = promotion(PromotionKind::FixedDiscount, 2)?;
        inactive.active = false;

        repository.create_promotion(product.clone()).await?;
        repository.create_promotion(category.clone()).await?;
        repository.create_promotion(inactive).await?;

        let for_product = repository
            .find_live_promotions(PromotionTarget::Product("sku-1".to_string()), during()?)
            .await?;

        assert_eq!(for_product.len(), 2);
        assert!(for_product.iter().all(|p| p.active));

        let for_category = repository
            .find_live_promotions(PromotionTarget::Category("shoes".to_string()), during()?)
            .await?;

        assert_eq!(for_category, vec![category]);

        let later = repository
            .find_live_promotions(PromotionTarget::Product("sku-1".to_string()), after_end()?)
            .await?;

        assert!(later.is_empty());

        Ok(())
    }
}
