//! Repositories
//!
//! Persistence for promotions. Every write to one promotion is serialized
//! by the store, and only redemptions ever touch `usage_count`.

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use thiserror::Error;

use crate::{
    promotions::{
        PromoCode, Promotion, PromotionUuid,
        query::{Pagination, PromotionFilter, PromotionTarget, PromotionsPage},
    },
    validation::IneligibleReason,
};

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryPromotionsRepository;

#[cfg(feature = "postgres")]
pub use postgres::PgPromotionsRepository;

/// Repository errors.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Identifier or promotional code already taken.
    #[error("promotion already exists")]
    AlreadyExists,

    /// No promotion with that identifier.
    #[error("promotion not found")]
    NotFound,

    /// The stored record would break an invariant.
    #[error("invalid data")]
    InvalidData,

    /// The requested usage limit is below the redemptions already recorded.
    #[error("usage limit {limit} is below the current usage count {count}")]
    UsageLimitBelowCount {
        /// Requested limit
        limit: u64,

        /// Stored usage count
        count: u64,
    },

    /// Underlying database failure.
    #[cfg(feature = "postgres")]
    #[error("storage error")]
    Sql(#[source] sqlx::Error),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for RepositoryError {
    fn from(error: sqlx::Error) -> Self {
        use sqlx::error::{DatabaseError, ErrorKind};

        if matches!(error, sqlx::Error::RowNotFound) {
            return Self::NotFound;
        }

        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::UniqueViolation) => Self::AlreadyExists,
            Some(ErrorKind::CheckViolation | ErrorKind::NotNullViolation) => Self::InvalidData,
            _ => Self::Sql(error),
        }
    }
}

/// Result of a redemption attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum UsageOutcome {
    /// One use was recorded; this is the stored record afterwards.
    Incremented(Promotion),

    /// The promotion can't be used at that instant; nothing was written.
    Ineligible(IneligibleReason),
}

/// Promotion storage.
#[automock]
#[async_trait]
pub trait PromotionsRepository: Send + Sync {
    /// Store a new promotion.
    async fn create_promotion(&self, promotion: Promotion) -> Result<Promotion, RepositoryError>;

    /// Replace the administrative fields of a stored promotion.
    ///
    /// Neither `usage_count` nor `created_at` is ever written. The usage
    /// limit is checked against the stored count at write time, so an update
    /// racing redemptions can't leave the count above the limit.
    async fn update_promotion(&self, promotion: Promotion) -> Result<Promotion, RepositoryError>;

    /// Fetch a promotion by identifier.
    async fn find_by_uuid(&self, uuid: PromotionUuid) -> Result<Option<Promotion>, RepositoryError>;

    /// Fetch a promotion by its exact promotional code.
    async fn find_by_code(&self, code: &PromoCode) -> Result<Option<Promotion>, RepositoryError>;

    /// Record one redemption if the promotion is eligible at `point_in_time`.
    ///
    /// The eligibility check and the increment happen under one lock on the
    /// promotion, so concurrent redemptions never exceed the usage limit and
    /// never fail because of each other.
    async fn increment_usage(
        &self,
        uuid: PromotionUuid,
        point_in_time: Timestamp,
    ) -> Result<UsageOutcome, RepositoryError>;

    /// List promotions matching `filter`, one page at a time.
    async fn list_promotions(
        &self,
        filter: &PromotionFilter,
        pagination: &Pagination,
    ) -> Result<PromotionsPage, RepositoryError>;

    /// Active promotions whose window contains `point_in_time` and that list
    /// `target`, earliest start first.
    async fn find_live_promotions(
        &self,
        target: PromotionTarget,
        point_in_time: Timestamp,
    ) -> Result<Vec<Promotion>, RepositoryError>;
}
