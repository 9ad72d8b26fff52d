//! Demand anomaly detection over per-product daily totals.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::aggregation::ProductSeries;
use super::isolation::{IsolationForest, IsolationForestParams};
use crate::domain::product::ProductId;
use crate::errors::AnalyticsError;

/// A day on which a product's total quantity sat outside the bulk of its
/// history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub product_id: ProductId,
    pub product_name: String,
    pub date: NaiveDate,
    pub quantity: u64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnomalyDetector {
    min_days: usize,
    forest: IsolationForestParams,
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self { min_days: 2, forest: IsolationForestParams::default() }
    }
}

impl AnomalyDetector {
    pub fn new(min_days: usize, forest: IsolationForestParams) -> Self {
        Self { min_days, forest }
    }

    /// Scores one product's daily quantities. Every product is scored with a
    /// forest seeded identically, so results do not depend on which other
    /// products are present.
    pub fn detect_product(
        &self,
        series: &ProductSeries<'_>,
    ) -> Result<Vec<AnomalyRecord>, AnalyticsError> {
        if series.len() < self.min_days {
            return Err(AnalyticsError::InsufficientData {
                required: self.min_days,
                available: series.len(),
            });
        }

        let quantities: Vec<f64> =
            series.points.iter().map(|point| point.total_quantity as f64).collect();
        let labels = IsolationForest::fit_predict(&quantities, &self.forest)?;

        Ok(series
            .points
            .iter()
            .zip(labels)
            .filter(|(_, outlier)| *outlier)
            .map(|(point, _)| AnomalyRecord {
                product_id: series.product_id,
                product_name: series.product_name.to_string(),
                date: point.date,
                quantity: point.total_quantity,
            })
            .collect())
    }

    pub fn detect(&self, series: &[ProductSeries<'_>]) -> Vec<AnomalyRecord> {
        let mut anomalies = Vec::new();

        for product in series {
            match self.detect_product(product) {
                Ok(records) => anomalies.extend(records),
                Err(error) => debug!(
                    event_name = "analytics.anomaly.skipped",
                    product_id = %product.product_id,
                    error = %error,
                    "product omitted from anomaly detection"
                ),
            }
        }

        anomalies
    }
}
