//! Promotion Queries
//!
//! Filtering, sorting and pagination of promotion listings.

use std::cmp::Ordering;

use jiff::Timestamp;

use crate::{
    promotions::{Promotion, PromotionKind},
    validation::{ValidationError, check_active, check_window},
};

/// Listing filter. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromotionFilter {
    /// Match on the active flag
    pub active: Option<bool>,

    /// Match on the promotion kind
    pub kind: Option<PromotionKind>,

    /// Promotions targeting this category
    pub category: Option<String>,

    /// Case-insensitive substring of the promotional code
    pub code: Option<String>,

    /// Promotions starting at or after this instant
    pub starts_from: Option<Timestamp>,

    /// Promotions ending at or before this instant
    pub ends_by: Option<Timestamp>,
}

impl PromotionFilter {
    /// Whether `promotion` passes every set criterion.
    pub fn matches(&self, promotion: &Promotion) -> bool {
        if self.active.is_some_and(|active| promotion.active != active) {
            return false;
        }

        if self.kind.is_some_and(|kind| promotion.kind != kind) {
            return false;
        }

        if self
            .category
            .as_ref()
            .is_some_and(|category| !promotion.targets_category(category))
        {
            return false;
        }

        if let Some(needle) = &self.code {
            let needle = needle.to_lowercase();

            let found = promotion
                .promo_code
                .as_ref()
                .is_some_and(|code| code.as_str().to_lowercase().contains(&needle));

            if !found {
                return false;
            }
        }

        if self
            .starts_from
            .is_some_and(|starts_from| promotion.starts_at < starts_from)
        {
            return false;
        }

        if self.ends_by.is_some_and(|ends_by| promotion.ends_at > ends_by) {
            return false;
        }

        true
    }
}

/// Sort key for listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PromotionSort {
    /// Creation time
    #[default]
    CreatedAt,

    /// Window start
    StartsAt,

    /// Window end
    EndsAt,

    /// Display name
    Name,
}

impl PromotionSort {
    /// Compare two promotions on this key alone.
    pub fn compare(self, a: &Promotion, b: &Promotion) -> Ordering {
        match self {
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::StartsAt => a.starts_at.cmp(&b.starts_at),
            Self::EndsAt => a.ends_at.cmp(&b.ends_at),
            Self::Name => a.name.cmp(&b.name),
        }
    }

    /// Column name in storage.
    pub const fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::StartsAt => "starts_at",
            Self::EndsAt => "ends_at",
            Self::Name => "name",
        }
    }
}

/// Sort direction for listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest first
    Asc,

    /// Largest first
    #[default]
    Desc,
}

impl SortDirection {
    /// Orient an ascending ordering in this direction.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }

    /// SQL keyword.
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Page selection for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    limit: u32,
    sort: PromotionSort,
    direction: SortDirection,
}

impl Pagination {
    /// Page size used when none is given.
    pub const DEFAULT_LIMIT: u32 = 10;

    /// Select page `page` (from 1) of `limit` promotions, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidPage`] or
    /// [`ValidationError::InvalidPageLimit`] for zero values.
    pub fn new(page: u32, limit: u32) -> Result<Self, ValidationError> {
        if page == 0 {
            return Err(ValidationError::InvalidPage);
        }

        if limit == 0 {
            return Err(ValidationError::InvalidPageLimit);
        }

        Ok(Self {
            page,
            limit,
            sort: PromotionSort::default(),
            direction: SortDirection::default(),
        })
    }

    /// Change the ordering.
    #[must_use]
    pub fn sorted_by(self, sort: PromotionSort, direction: SortDirection) -> Self {
        Self {
            sort,
            direction,
            ..self
        }
    }

    /// Page number, from 1.
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Page size.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Sort key.
    pub fn sort(&self) -> PromotionSort {
        self.sort
    }

    /// Sort direction.
    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    /// Number of promotions before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// Number of pages needed for `total` promotions.
    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.limit))
    }

    /// Full ordering for listings: the sort key, then the identifier so that
    /// ties are stable across pages.
    pub fn compare(&self, a: &Promotion, b: &Promotion) -> Ordering {
        self.direction
            .apply(self.sort.compare(a, b).then_with(|| a.uuid.cmp(&b.uuid)))
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: Self::DEFAULT_LIMIT,
            sort: PromotionSort::default(),
            direction: SortDirection::default(),
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct PromotionsPage {
    /// Promotions on this page
    pub promotions: Vec<Promotion>,

    /// Number of promotions matching the filter, across all pages
    pub total: u64,

    /// Page number, from 1
    pub page: u32,

    /// Number of pages
    pub total_pages: u64,
}

/// What a live-promotion lookup targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromotionTarget {
    /// A product identifier
    Product(String),

    /// A category identifier
    Category(String),
}

impl PromotionTarget {
    /// Whether `promotion` lists this target.
    pub fn matches(&self, promotion: &Promotion) -> bool {
        match self {
            Self::Product(product) => promotion.targets_product(product),
            Self::Category(category) => promotion.targets_category(category),
        }
    }
}

/// Active, with a window containing `point_in_time`.
pub fn is_live(promotion: &Promotion, point_in_time: Timestamp) -> bool {
    check_active(promotion).is_ok() && check_window(promotion, point_in_time).is_ok()
}
