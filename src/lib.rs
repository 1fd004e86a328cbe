//! Promo Engine
//!
//! Promo Engine evaluates promotions: it computes discounts, checks
//! eligibility, stacks several promotions onto one amount and redeems
//! promotional codes without ever exceeding a usage limit.

pub mod config;
pub mod discounts;
pub mod fixtures;
pub mod observability;
pub mod prelude;
pub mod promotions;
pub mod redemption;
pub mod repositories;
pub mod stacking;
pub mod uuids;
pub mod validation;

#[cfg(test)]
mod test;
