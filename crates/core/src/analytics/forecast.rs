//! Demand forecasting: a straight-line trend over a product's daily totals,
//! extrapolated past its last observed day.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::aggregation::ProductSeries;
use super::regression::LinearFit;
use crate::domain::product::ProductId;
use crate::errors::AnalyticsError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub product_id: ProductId,
    pub product_name: String,
    pub predicted_quantity: i64,
}

/// Fits `total_quantity ~ day_offset` and evaluates the fit `horizon_days`
/// after the last observed day. The result is rounded half-to-even and is
/// not clamped, so a falling trend can project a negative quantity.
pub fn project_series(
    series: &ProductSeries<'_>,
    min_days: usize,
    horizon_days: i64,
) -> Result<i64, AnalyticsError> {
    if series.len() < min_days {
        return Err(AnalyticsError::InsufficientData {
            required: min_days,
            available: series.len(),
        });
    }

    let points: Vec<(f64, f64)> = series
        .points
        .iter()
        .map(|point| (point.day_offset as f64, point.total_quantity as f64))
        .collect();
    let fit = LinearFit::fit(&points)?;

    let last_day = series.max_day_offset().unwrap_or_default();
    let projected = fit.predict((last_day + horizon_days) as f64);
    if !projected.is_finite() {
        return Err(AnalyticsError::ComputationFailure(format!(
            "projection for product {} is not finite",
            series.product_id
        )));
    }

    Ok(projected.round_ties_even() as i64)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DemandForecaster {
    min_days: usize,
    horizon_days: i64,
}

impl Default for DemandForecaster {
    fn default() -> Self {
        Self { min_days: 2, horizon_days: 30 }
    }
}

impl DemandForecaster {
    pub fn new(min_days: usize, horizon_days: i64) -> Self {
        Self { min_days, horizon_days }
    }

    pub fn forecast_product(
        &self,
        series: &ProductSeries<'_>,
    ) -> Result<ForecastResult, AnalyticsError> {
        let predicted_quantity = project_series(series, self.min_days, self.horizon_days)?;

        Ok(ForecastResult {
            product_id: series.product_id,
            product_name: series.product_name.to_string(),
            predicted_quantity,
        })
    }

    pub fn forecast(&self, series: &[ProductSeries<'_>]) -> Vec<ForecastResult> {
        series
            .iter()
            .filter_map(|product| match self.forecast_product(product) {
                Ok(result) => Some(result),
                Err(error) => {
                    debug!(
                        event_name = "analytics.forecast.skipped",
                        product_id = %product.product_id,
                        error = %error,
                        "product omitted from demand forecast"
                    );
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::DemandForecaster;
    use crate::analytics::aggregation::aggregate_all;
    use crate::analytics::facts::{group_by_product, SaleLineFact};
    use crate::domain::product::ProductId;

    fn fact(id: i64, name: &str, offset: i64, quantity: u32) -> SaleLineFact {
        let start = NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date");
        SaleLineFact {
            product_id: ProductId(id),
            product_name: name.to_string(),
            sale_date: start + chrono::Duration::days(offset),
            quantity,
            unit_price: Decimal::new(999, 2),
        }
    }

    fn forecast(facts: &[SaleLineFact]) -> Vec<super::ForecastResult> {
        let groups = group_by_product(facts);
        let series = aggregate_all(&groups);
        DemandForecaster::default().forecast(&series)
    }

    #[test]
    fn widget_line_extrapolates_thirty_days_past_last_sale() {
        let results = forecast(&[fact(1, "Widget", 0, 10), fact(1, "Widget", 10, 20)]);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].product_name, "Widget");
        assert_eq!(results[0].predicted_quantity, 50);
    }

    #[test]
    fn constant_demand_predicts_the_same_constant() {
        let results = forecast(&[
            fact(1, "Salt", 0, 4),
            fact(1, "Salt", 3, 4),
            fact(1, "Salt", 9, 4),
            fact(1, "Salt", 20, 4),
        ]);

        assert_eq!(results[0].predicted_quantity, 4);
    }

    #[test]
    fn single_day_products_are_omitted() {
        let results = forecast(&[
            fact(1, "Once", 0, 3),
            fact(1, "Once", 0, 8),
            fact(2, "Twice", 0, 1),
            fact(2, "Twice", 1, 2),
        ]);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].product_id, ProductId(2));
    }

    #[test]
    fn falling_trend_is_not_clamped_at_zero() {
        let results = forecast(&[fact(1, "Fad", 0, 30), fact(1, "Fad", 10, 10)]);

        // slope -2, last day 10, horizon 30 => 30 - 2 * 40
        assert_eq!(results[0].predicted_quantity, -50);
    }

    #[test]
    fn rounding_is_half_to_even() {
        // (0, 1) and (2, 2): slope 0.5, intercept 1, predict at 32 => 17.0
        // (0, 2) and (4, 3): slope 0.25, intercept 2, predict at 34 => 10.5 => 10
        let results = forecast(&[
            fact(1, "Even", 0, 1),
            fact(1, "Even", 2, 2),
            fact(2, "Half", 0, 2),
            fact(2, "Half", 4, 3),
        ]);

        assert_eq!(results[0].predicted_quantity, 17);
        assert_eq!(results[1].predicted_quantity, 10);
    }

    #[test]
    fn empty_history_forecasts_nothing() {
        assert!(forecast(&[]).is_empty());
    }
}
