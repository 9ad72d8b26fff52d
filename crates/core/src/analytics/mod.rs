//! Sales analytics over historical sale lines.
//!
//! Every analysis starts from the flat [`SaleLineFact`] list (or the
//! per-sale [`SaleBasket`] list for recommendations), so the engine never
//! touches storage itself. Products that cannot be analysed are left out of
//! the result rather than failing the batch.

pub mod aggregation;
pub mod anomaly;
pub mod facts;
pub mod forecast;
pub mod isolation;
pub mod pricing;
pub mod recommend;
pub mod regression;
pub mod restock;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::AnalyticsConfig;

pub use aggregation::{aggregate_all, aggregate_daily, DailyAggregate, ProductSeries};
pub use anomaly::{AnomalyDetector, AnomalyRecord};
pub use facts::{group_by_product, ProductFacts, SaleBasket, SaleLineFact};
pub use forecast::{DemandForecaster, ForecastResult};
pub use isolation::{IsolationForest, IsolationForestParams};
pub use pricing::{OptimalPriceResult, PriceOptimizer};
pub use recommend::{CoPurchaseGraph, Recommendation};
pub use restock::{RestockAdvisor, RestockSuggestion};

/// Every analysis in one payload, as shown on the store dashboard.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardReport {
    pub forecasts: Vec<ForecastResult>,
    pub anomalies: Vec<AnomalyRecord>,
    pub optimal_prices: Vec<OptimalPriceResult>,
    pub restock: Vec<RestockSuggestion>,
    pub recommendations: Vec<Recommendation>,
}

impl DashboardReport {
    pub fn is_empty(&self) -> bool {
        self.forecasts.is_empty()
            && self.anomalies.is_empty()
            && self.optimal_prices.is_empty()
            && self.restock.is_empty()
            && self.recommendations.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnalyticsEngine {
    forecaster: DemandForecaster,
    detector: AnomalyDetector,
    optimizer: PriceOptimizer,
    advisor: RestockAdvisor,
}

impl Default for AnalyticsEngine {
    fn default() -> Self {
        Self::from_config(&AnalyticsConfig::default())
    }
}

impl AnalyticsEngine {
    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self {
            forecaster: DemandForecaster::new(
                config.forecast_min_days,
                config.forecast_horizon_days,
            ),
            detector: AnomalyDetector::new(
                config.anomaly_min_days,
                IsolationForestParams {
                    trees: config.anomaly_trees,
                    contamination: config.anomaly_contamination,
                    seed: config.anomaly_seed,
                },
            ),
            optimizer: PriceOptimizer::new(config.price_min_observations, config.price_headroom),
            advisor: RestockAdvisor::new(config.restock_min_days, config.restock_horizon_days),
        }
    }

    pub fn forecast(&self, facts: &[SaleLineFact]) -> Vec<ForecastResult> {
        let groups = group_by_product(facts);
        self.forecaster.forecast(&aggregate_all(&groups))
    }

    pub fn anomalies(&self, facts: &[SaleLineFact]) -> Vec<AnomalyRecord> {
        let groups = group_by_product(facts);
        self.detector.detect(&aggregate_all(&groups))
    }

    /// Price sweeps use raw sale lines, not daily totals.
    pub fn optimal_prices(&self, facts: &[SaleLineFact]) -> Vec<OptimalPriceResult> {
        self.optimizer.optimize(&group_by_product(facts))
    }

    pub fn restock(&self, facts: &[SaleLineFact]) -> Vec<RestockSuggestion> {
        let groups = group_by_product(facts);
        self.advisor.suggest(&aggregate_all(&groups))
    }

    pub fn recommendations(&self, baskets: &[SaleBasket]) -> Vec<Recommendation> {
        CoPurchaseGraph::from_baskets(baskets).recommendations()
    }

    pub fn checkout_recommendations(
        &self,
        baskets: &[SaleBasket],
        purchased: &[String],
    ) -> Vec<String> {
        CoPurchaseGraph::from_baskets(baskets).recommend_for(purchased)
    }

    pub fn dashboard(&self, facts: &[SaleLineFact], baskets: &[SaleBasket]) -> DashboardReport {
        let groups = group_by_product(facts);
        let series = aggregate_all(&groups);

        let report = DashboardReport {
            forecasts: self.forecaster.forecast(&series),
            anomalies: self.detector.detect(&series),
            optimal_prices: self.optimizer.optimize(&groups),
            restock: self.advisor.suggest(&series),
            recommendations: CoPurchaseGraph::from_baskets(baskets).recommendations(),
        };

        info!(
            event_name = "analytics.dashboard.built",
            facts = facts.len(),
            baskets = baskets.len(),
            forecasts = report.forecasts.len(),
            anomalies = report.anomalies.len(),
            optimal_prices = report.optimal_prices.len(),
            restock = report.restock.len(),
            recommendations = report.recommendations.len(),
            "dashboard report built"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::{AnalyticsEngine, SaleBasket, SaleLineFact};
    use crate::config::AnalyticsConfig;
    use crate::domain::product::ProductId;
    use crate::domain::sale::SaleId;

    fn fact(id: i64, name: &str, day: u32, quantity: u32, price: i64) -> SaleLineFact {
        SaleLineFact {
            product_id: ProductId(id),
            product_name: name.to_string(),
            sale_date: NaiveDate::from_ymd_opt(2024, 5, day).expect("valid date"),
            quantity,
            unit_price: Decimal::from(price),
        }
    }

    fn basket(id: i64, names: &[&str]) -> SaleBasket {
        SaleBasket {
            sale_id: SaleId(id),
            product_names: names.iter().map(|name| name.to_string()).collect(),
        }
    }

    fn widget_history() -> Vec<SaleLineFact> {
        vec![fact(1, "Widget", 1, 10, 5), fact(1, "Widget", 2, 12, 5), fact(1, "Widget", 3, 14, 5)]
    }

    #[test]
    fn empty_history_yields_an_empty_dashboard() {
        let report = AnalyticsEngine::default().dashboard(&[], &[]);

        assert!(report.is_empty());
    }

    #[test]
    fn empty_dashboard_serializes_every_section() {
        let value = serde_json::to_value(AnalyticsEngine::default().dashboard(&[], &[]))
            .expect("serialize dashboard");

        for section in ["forecasts", "anomalies", "optimal_prices", "restock", "recommendations"] {
            assert_eq!(value[section], serde_json::json!([]), "section {section}");
        }
    }

    #[test]
    fn widget_trend_is_projected_thirty_days_out() {
        let facts = widget_history();

        let forecasts = AnalyticsEngine::default().forecast(&facts);

        assert_eq!(forecasts.len(), 1);
        assert_eq!(forecasts[0].predicted_quantity, 74);
    }

    #[test]
    fn configured_horizon_changes_the_projection() {
        let config = AnalyticsConfig { forecast_horizon_days: 1, ..AnalyticsConfig::default() };
        let facts = widget_history();

        let forecasts = AnalyticsEngine::from_config(&config).forecast(&facts);

        assert_eq!(forecasts[0].predicted_quantity, 16);
    }

    #[test]
    fn dashboard_combines_every_analysis() {
        let mut facts = Vec::new();
        for day in 1..=6 {
            facts.push(fact(1, "Tea", day, day, 10 + i64::from(day)));
            facts.push(fact(2, "Mug", day, 2, 8));
        }
        let baskets = vec![basket(1, &["Tea", "Mug"]), basket(2, &["Tea", "Mug", "Spoon"])];

        let report = AnalyticsEngine::default().dashboard(&facts, &baskets);

        assert_eq!(report.forecasts.len(), 2);
        assert_eq!(report.restock.len(), 2);
        assert_eq!(report.optimal_prices.len(), 1, "Mug has a single price and cannot be fit");
        assert_eq!(report.optimal_prices[0].product_name, "Tea");
        assert_eq!(report.recommendations.len(), 3);
        assert_eq!(report.recommendations[0].product_name, "Mug");
        assert_eq!(report.recommendations[0].recommended_product, "Tea");
    }

    #[test]
    fn checkout_recommendations_cover_only_the_purchase() {
        let baskets = vec![basket(1, &["Tea", "Mug"]), basket(2, &["Coffee", "Filter"])];

        let recommended = AnalyticsEngine::default()
            .checkout_recommendations(&baskets, &["Tea".to_string(), "Tea".to_string()]);

        assert_eq!(recommended, vec!["Mug".to_string()]);
    }
}
