//! Price point suggestion from the observed price/quantity relation.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::facts::ProductFacts;
use super::regression::LinearFit;
use crate::domain::product::ProductId;
use crate::errors::AnalyticsError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimalPriceResult {
    pub product_id: ProductId,
    pub product_name: String,
    pub optimal_price: i64,
}

/// Sweeps whole-number prices from the floor of the lowest observed price to
/// `headroom` above the floor of the highest, and keeps the first price with
/// the largest predicted quantity. Revenue is deliberately not considered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriceOptimizer {
    min_observations: usize,
    headroom: i64,
}

impl Default for PriceOptimizer {
    fn default() -> Self {
        Self { min_observations: 5, headroom: 5 }
    }
}

impl PriceOptimizer {
    pub fn new(min_observations: usize, headroom: i64) -> Self {
        Self { min_observations, headroom }
    }

    pub fn optimize_product(
        &self,
        product: &ProductFacts<'_>,
    ) -> Result<OptimalPriceResult, AnalyticsError> {
        if product.lines.len() < self.min_observations {
            return Err(AnalyticsError::InsufficientData {
                required: self.min_observations,
                available: product.lines.len(),
            });
        }

        let (lowest, highest) = price_bounds(product)?;
        let upper = highest.checked_add(self.headroom).ok_or_else(|| {
            AnalyticsError::ComputationFailure(format!(
                "price ceiling {highest} plus headroom {} overflows",
                self.headroom
            ))
        })?;

        let points = product
            .lines
            .iter()
            .map(|line| Ok((decimal_to_f64(line.unit_price)?, f64::from(line.quantity))))
            .collect::<Result<Vec<_>, AnalyticsError>>()?;
        let fit = LinearFit::fit(&points)?;

        let mut best: Option<(i64, f64)> = None;
        for candidate in lowest..=upper {
            let predicted = fit.predict(candidate as f64);
            if best.map_or(true, |(_, best_quantity)| predicted > best_quantity) {
                best = Some((candidate, predicted));
            }
        }

        let (optimal_price, _) = best.ok_or_else(|| {
            AnalyticsError::ComputationFailure("candidate price range is empty".to_string())
        })?;

        Ok(OptimalPriceResult {
            product_id: product.product_id,
            product_name: product.product_name.to_string(),
            optimal_price,
        })
    }

    pub fn optimize(&self, products: &[ProductFacts<'_>]) -> Vec<OptimalPriceResult> {
        products
            .iter()
            .filter_map(|product| match self.optimize_product(product) {
                Ok(result) => Some(result),
                Err(error) => {
                    debug!(
                        event_name = "analytics.pricing.skipped",
                        product_id = %product.product_id,
                        error = %error,
                        "product omitted from price optimization"
                    );
                    None
                }
            })
            .collect()
    }
}

fn price_bounds(product: &ProductFacts<'_>) -> Result<(i64, i64), AnalyticsError> {
    let mut prices = product.lines.iter().map(|line| line.unit_price);
    let first = prices.next().ok_or(AnalyticsError::InsufficientData { required: 1, available: 0 })?;
    let (min, max) =
        prices.fold((first, first), |(lo, hi), price| (lo.min(price), hi.max(price)));

    Ok((floor_to_i64(min)?, floor_to_i64(max)?))
}

fn floor_to_i64(value: Decimal) -> Result<i64, AnalyticsError> {
    value.floor().to_i64().ok_or_else(|| {
        AnalyticsError::ComputationFailure(format!("price {value} does not fit an integer"))
    })
}

fn decimal_to_f64(value: Decimal) -> Result<f64, AnalyticsError> {
    value
        .to_f64()
        .ok_or_else(|| AnalyticsError::ComputationFailure(format!("price {value} is not representable")))
}
