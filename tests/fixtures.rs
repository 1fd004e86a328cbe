//! Integration tests for seeding promotions from bundled fixtures

use jiff::Timestamp;
use rusty_money::{Money, iso::USD};
use testresult::TestResult;

use promo_engine::{
    fixtures::Fixture,
    promotions::{
        PromotionsServiceError,
        query::{Pagination, PromotionFilter},
        service::{PromotionsService, StorePromotionsService},
    },
    redemption::{RedemptionCoordinator, RedemptionService},
    repositories::InMemoryPromotionsRepository,
    validation::IneligibleReason,
};

async fn seeded() -> TestResult<StorePromotionsService<InMemoryPromotionsRepository>> {
    let fixture = Fixture::from_set("seasonal")?;
    let service = StorePromotionsService::new(InMemoryPromotionsRepository::new());

    for promotion in fixture.promotions() {
        service.create_promotion(promotion.clone()).await?;
    }

    Ok(service)
}

#[tokio::test]
async fn seasonal_set_seeds_every_promotion() -> TestResult {
    let service = seeded().await?;

    let page = service
        .list_promotions(PromotionFilter::default(), Pagination::default())
        .await?;

    assert_eq!(page.total, 4);
    assert_eq!(page.total_pages, 1);

    let shoes = service
        .list_promotions(
            PromotionFilter {
                category: Some("shoes".to_string()),
                ..PromotionFilter::default()
            },
            Pagination::default(),
        )
        .await?;

    assert_eq!(shoes.total, 2);

    Ok(())
}

#[tokio::test]
async fn spring_codes_stack_in_april() -> TestResult {
    let service = seeded().await?;
    let april: Timestamp = "2026-04-15T10:00:00Z".parse()?;

    let stacked = service
        .evaluate_codes(
            vec![
                "WELCOME5".to_string(),
                "SPRING10".to_string(),
                "SHIPFREE".to_string(),
            ],
            Money::from_minor(8_000, USD),
            april,
        )
        .await?;

    assert_eq!(stacked.final_amount, Money::from_minor(6_700, USD));
    assert_eq!(stacked.total_discount, Money::from_minor(1_300, USD));
    assert_eq!(stacked.applied.len(), 2);

    Ok(())
}

#[tokio::test]
async fn flash_sale_is_only_redeemable_during_its_hour() -> TestResult {
    let repository = InMemoryPromotionsRepository::new();
    let service = StorePromotionsService::new(repository.clone());
    let coordinator = RedemptionCoordinator::new(repository);

    let fixture = Fixture::from_set("seasonal")?;

    service
        .create_promotion(fixture.promotion("flash-sale")?.clone())
        .await?;

    let early: Timestamp = "2026-11-27T11:59:59Z".parse()?;
    let during: Timestamp = "2026-11-27T12:30:00Z".parse()?;

    let too_early = coordinator.redeem("FLASH25", early).await;

    assert!(matches!(
        too_early,
        Err(PromotionsServiceError::InvalidPromotion(
            IneligibleReason::NotYetStarted
        ))
    ));

    let redeemed = coordinator.redeem("FLASH25", during).await?;

    assert_eq!(redeemed.usage_count, 1);
    assert_eq!(redeemed.remaining_uses(), Some(99));

    Ok(())
}
