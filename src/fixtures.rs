//! Fixtures
//!
//! Promotion sets described in YAML, for seeding repositories in tests and
//! local runs.

use std::{fs, path::PathBuf};

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::{
    fixtures::promotions::PromotionsFixture,
    promotions::data::NewPromotion,
    validation::{CodeFormatError, ValidationError},
};

pub mod promotions;

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid decimal value
    #[error("Invalid promotion value: {0}")]
    InvalidValue(String),

    /// Malformed promotional code
    #[error("Invalid promotional code: {0}")]
    InvalidCode(#[from] CodeFormatError),

    /// The promotion breaks a record invariant
    #[error("Invalid promotion data: {0}")]
    InvalidPromotionData(#[from] ValidationError),

    /// Promotion not found
    #[error("Promotion not found: {0}")]
    PromotionNotFound(String),
}

/// Fixture
#[derive(Debug)]
pub struct Fixture {
    /// Base path for fixture files
    base_path: PathBuf,

    /// Fixture key -> creation payload
    promotions: FxHashMap<String, NewPromotion>,
}

impl Fixture {
    /// Create a new empty fixture with default base path
    pub fn new() -> Self {
        Self::with_base_path("./fixtures")
    }

    /// Create a new empty fixture with custom base path
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            promotions: FxHashMap::default(),
        }
    }

    /// Load promotions from `promotions/<name>.yml` under the base path.
    ///
    /// Keys already loaded are replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a
    /// promotion is invalid.
    pub fn load_promotions(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let file_path = self
            .base_path
            .join("promotions")
            .join(format!("{name}.yml"));

        let contents = fs::read_to_string(&file_path)?;
        let fixture: PromotionsFixture = serde_norway::from_str(&contents)?;

        for (key, promotion_fixture) in fixture.promotions {
            let promotion = NewPromotion::try_from(promotion_fixture)?;

            self.promotions.insert(key, promotion);
        }

        Ok(self)
    }

    /// Load a named promotion set from the default base path.
    ///
    /// # Errors
    ///
    /// Returns an error if the fixture file cannot be loaded.
    pub fn from_set(name: &str) -> Result<Self, FixtureError> {
        let mut fixture = Self::new();

        fixture.load_promotions(name)?;

        Ok(fixture)
    }

    /// Get a promotion by its fixture key
    ///
    /// # Errors
    ///
    /// Returns an error if the promotion is not found.
    pub fn promotion(&self, key: &str) -> Result<&NewPromotion, FixtureError> {
        self.promotions
            .get(key)
            .ok_or_else(|| FixtureError::PromotionNotFound(key.to_string()))
    }

    /// All loaded promotions, ordered by fixture key.
    pub fn promotions(&self) -> Vec<&NewPromotion> {
        let mut keyed: Vec<_> = self.promotions.iter().collect();

        keyed.sort_by(|(a, _), (b, _)| a.cmp(b));

        keyed.into_iter().map(|(_, promotion)| promotion).collect()
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}
