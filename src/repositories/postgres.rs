//! Postgres Promotions Repository

use async_trait::async_trait;
use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use rustc_hash::FxHashSet;
use sqlx::{
    FromRow, PgPool, Postgres, Row, migrate::MigrateError, postgres::PgPoolOptions,
    postgres::PgRow, query_as, query_scalar,
};

use crate::{
    config::DatabaseConfig,
    promotions::{
        PromoCode, Promotion, PromotionKind, PromotionUuid,
        query::{Pagination, PromotionFilter, PromotionTarget, PromotionsPage},
    },
    repositories::{PromotionsRepository, RepositoryError, UsageOutcome},
    validation::check_eligibility,
};

const COLUMN_USAGE_LIMIT: &str = "usage_limit";
const COLUMN_USAGE_COUNT: &str = "usage_count";

const CREATE_PROMOTION_SQL: &str = include_str!("sql/create_promotion.sql");
const UPDATE_PROMOTION_SQL: &str = include_str!("sql/update_promotion.sql");
const FIND_PROMOTION_BY_UUID_SQL: &str = include_str!("sql/find_promotion_by_uuid.sql");
const FIND_PROMOTION_FOR_UPDATE_SQL: &str = include_str!("sql/find_promotion_for_update.sql");
const FIND_PROMOTION_BY_CODE_SQL: &str = include_str!("sql/find_promotion_by_code.sql");
const INCREMENT_USAGE_SQL: &str = include_str!("sql/increment_usage.sql");
const COUNT_PROMOTIONS_SQL: &str = include_str!("sql/count_promotions.sql");
const LIST_PROMOTIONS_SQL: &str = include_str!("sql/list_promotions.sql");
const FIND_LIVE_FOR_PRODUCT_SQL: &str = include_str!("sql/find_live_promotions_for_product.sql");
const FIND_LIVE_FOR_CATEGORY_SQL: &str = include_str!("sql/find_live_promotions_for_category.sql");

/// Promotion storage in `PostgreSQL`.
///
/// Redemptions lock the promotion row for the eligibility check and the
/// increment. A check constraint keeps the counter within the usage limit.
#[derive(Debug, Clone)]
pub struct PgPromotionsRepository {
    pool: PgPool,
}

impl PgPromotionsRepository {
    /// Wrap an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `PostgreSQL`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;

        Ok(Self::new(pool))
    }

    /// Apply the bundled migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails to apply.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!().run(&self.pool).await
    }
}

#[async_trait]
impl PromotionsRepository for PgPromotionsRepository {
    async fn create_promotion(&self, promotion: Promotion) -> Result<Promotion, RepositoryError> {
        let created = query_as::<Postgres, Promotion>(CREATE_PROMOTION_SQL)
            .bind(promotion.uuid.into_uuid())
            .bind(&promotion.name)
            .bind(&promotion.description)
            .bind(promotion.kind.as_str())
            .bind(promotion.value)
            .bind(sorted(&promotion.applies_to_products))
            .bind(promotion.applies_to_categories.as_ref().map(sorted))
            .bind(SqlxTimestamp::from(promotion.starts_at))
            .bind(SqlxTimestamp::from(promotion.ends_at))
            .bind(promotion.promo_code.as_ref().map(PromoCode::as_str))
            .bind(try_optional_i64_from_u64(promotion.usage_limit, COLUMN_USAGE_LIMIT)?)
            .bind(try_i64_from_u64(promotion.usage_count, COLUMN_USAGE_COUNT)?)
            .bind(promotion.active)
            .bind(SqlxTimestamp::from(promotion.created_at))
            .bind(SqlxTimestamp::from(promotion.updated_at))
            .fetch_one(&self.pool)
            .await?;

        Ok(created)
    }

    async fn update_promotion(&self, promotion: Promotion) -> Result<Promotion, RepositoryError> {
        let updated = query_as::<Postgres, Promotion>(UPDATE_PROMOTION_SQL)
            .bind(promotion.uuid.into_uuid())
            .bind(&promotion.name)
            .bind(&promotion.description)
            .bind(promotion.kind.as_str())
            .bind(promotion.value)
            .bind(sorted(&promotion.applies_to_products))
            .bind(promotion.applies_to_categories.as_ref().map(sorted))
            .bind(SqlxTimestamp::from(promotion.starts_at))
            .bind(SqlxTimestamp::from(promotion.ends_at))
            .bind(promotion.promo_code.as_ref().map(PromoCode::as_str))
            .bind(try_optional_i64_from_u64(promotion.usage_limit, COLUMN_USAGE_LIMIT)?)
            .bind(promotion.active)
            .bind(SqlxTimestamp::from(promotion.updated_at))
            .fetch_optional(&self.pool)
            .await?;

        if let Some(updated) = updated {
            return Ok(updated);
        }

        // No row matched: either it is gone or the limit is below the count.
        match (self.find_by_uuid(promotion.uuid).await?, promotion.usage_limit) {
            (Some(stored), Some(limit)) => Err(RepositoryError::UsageLimitBelowCount {
                limit,
                count: stored.usage_count,
            }),
            _ => Err(RepositoryError::NotFound),
        }
    }

    async fn find_by_uuid(&self, uuid: PromotionUuid) -> Result<Option<Promotion>, RepositoryError> {
        let promotion = query_as::<Postgres, Promotion>(FIND_PROMOTION_BY_UUID_SQL)
            .bind(uuid.into_uuid())
            .fetch_optional(&self.pool)
            .await?;

        Ok(promotion)
    }

    async fn find_by_code(&self, code: &PromoCode) -> Result<Option<Promotion>, RepositoryError> {
        let promotion = query_as::<Postgres, Promotion>(FIND_PROMOTION_BY_CODE_SQL)
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(promotion)
    }

    async fn increment_usage(
        &self,
        uuid: PromotionUuid,
        point_in_time: Timestamp,
    ) -> Result<UsageOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let locked = query_as::<Postgres, Promotion>(FIND_PROMOTION_FOR_UPDATE_SQL)
            .bind(uuid.into_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        if let Err(reason) = check_eligibility(&locked, point_in_time) {
            tx.rollback().await?;

            return Ok(UsageOutcome::Ineligible(reason));
        }

        let incremented = query_as::<Postgres, Promotion>(INCREMENT_USAGE_SQL)
            .bind(uuid.into_uuid())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(UsageOutcome::Incremented(incremented))
    }

    async fn list_promotions(
        &self,
        filter: &PromotionFilter,
        pagination: &Pagination,
    ) -> Result<PromotionsPage, RepositoryError> {
        let kind = filter.kind.map(PromotionKind::as_str);
        let starts_from = filter.starts_from.map(SqlxTimestamp::from);
        let ends_by = filter.ends_by.map(SqlxTimestamp::from);

        let total: i64 = query_scalar(COUNT_PROMOTIONS_SQL)
            .bind(filter.active)
            .bind(kind)
            .bind(filter.category.as_deref())
            .bind(filter.code.as_deref())
            .bind(starts_from)
            .bind(ends_by)
            .fetch_one(&self.pool)
            .await?;

        // Sort keys come from a closed set of column names, never from input.
        let sql = LIST_PROMOTIONS_SQL
            .replace("{sort}", pagination.sort().column())
            .replace("{direction}", pagination.direction().as_sql());

        let promotions = query_as::<Postgres, Promotion>(&sql)
            .bind(filter.active)
            .bind(kind)
            .bind(filter.category.as_deref())
            .bind(filter.code.as_deref())
            .bind(starts_from)
            .bind(ends_by)
            .bind(i64::from(pagination.limit()))
            .bind(try_i64_from_u64(pagination.offset(), "offset")?)
            .fetch_all(&self.pool)
            .await?;

        let total = u64::try_from(total).map_err(|e| sqlx::Error::ColumnDecode {
            index: "count".to_string(),
            source: Box::new(e),
        })?;

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
        let (sql, identifier) = match &target {
            PromotionTarget::Product(product) => (FIND_LIVE_FOR_PRODUCT_SQL, product),
            PromotionTarget::Category(category) => (FIND_LIVE_FOR_CATEGORY_SQL, category),
        };

        let promotions = query_as::<Postgres, Promotion>(sql)
            .bind(identifier)
            .bind(SqlxTimestamp::from(point_in_time))
            .fetch_all(&self.pool)
            .await?;

        Ok(promotions)
    }
}

fn sorted(identifiers: &FxHashSet<String>) -> Vec<String> {
    let mut identifiers: Vec<String> = identifiers.iter().cloned().collect();

    identifiers.sort_unstable();

    identifiers
}

fn try_optional_i64_from_u64(
    value: Option<u64>,
    column: &'static str,
) -> Result<Option<i64>, sqlx::Error> {
    value.map(|v| try_i64_from_u64(v, column)).transpose()
}

fn try_i64_from_u64(value: u64, column: &'static str) -> Result<i64, sqlx::Error> {
    i64::try_from(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn try_u64_from_i64(value: i64, column: &'static str) -> Result<u64, sqlx::Error> {
    u64::try_from(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

impl<'r> FromRow<'r, PgRow> for Promotion {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let kind = row
            .try_get::<String, _>("kind")?
            .parse::<PromotionKind>()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "kind".to_string(),
                source: Box::new(e),
            })?;

        let promo_code = row
            .try_get::<Option<String>, _>("promo_code")?
            .map(PromoCode::try_from)
            .transpose()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "promo_code".to_string(),
                source: Box::new(e),
            })?;

        let usage_limit = row
            .try_get::<Option<i64>, _>(COLUMN_USAGE_LIMIT)?
            .map(|limit| try_u64_from_i64(limit, COLUMN_USAGE_LIMIT))
            .transpose()?;

        Ok(Self {
            uuid: PromotionUuid::from_uuid(row.try_get("uuid")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            kind,
            value: row.try_get("value")?,
            applies_to_products: row
                .try_get::<Vec<String>, _>("applies_to_products")?
                .into_iter()
                .collect(),
            applies_to_categories: row
                .try_get::<Option<Vec<String>>, _>("applies_to_categories")?
                .map(|categories| categories.into_iter().collect()),
            starts_at: row.try_get::<SqlxTimestamp, _>("starts_at")?.to_jiff(),
            ends_at: row.try_get::<SqlxTimestamp, _>("ends_at")?.to_jiff(),
            promo_code,
            usage_limit,
            usage_count: try_u64_from_i64(row.try_get(COLUMN_USAGE_COUNT)?, COLUMN_USAGE_COUNT)?,
            active: row.try_get("active")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}
