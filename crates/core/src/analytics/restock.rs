use serde::{Deserialize, Serialize};
use tracing::debug;

use super::aggregation::ProductSeries;
use super::forecast::project_series;
use crate::domain::product::ProductId;

/// Suggested quantity to have on hand for the coming week.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestockSuggestion {
    pub product_id: ProductId,
    pub product_name: String,
    pub recommended_quantity: i64,
}

/// Short-horizon variant of the demand forecast that only trusts products
/// with a longer sales history.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RestockAdvisor {
    min_days: usize,
    horizon_days: i64,
}

impl Default for RestockAdvisor {
    fn default() -> Self {
        Self { min_days: 5, horizon_days: 7 }
    }
}

impl RestockAdvisor {
    pub fn new(min_days: usize, horizon_days: i64) -> Self {
        Self { min_days, horizon_days }
    }

    pub fn suggest(&self, series: &[ProductSeries<'_>]) -> Vec<RestockSuggestion> {
        let mut suggestions = Vec::new();

        for product in series {
            match project_series(product, self.min_days, self.horizon_days) {
                Ok(recommended_quantity) => suggestions.push(RestockSuggestion {
                    product_id: product.product_id,
                    product_name: product.product_name.to_string(),
                    recommended_quantity,
                }),
                Err(error) => debug!(
                    event_name = "analytics.restock.skipped",
                    product_id = %product.product_id,
                    error = %error,
                    "product omitted from restock suggestions"
                ),
            }
        }

        suggestions
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::RestockAdvisor;
    use crate::analytics::aggregation::aggregate_all;
    use crate::analytics::facts::{group_by_product, SaleLineFact};
    use crate::domain::product::ProductId;

    fn daily(id: i64, quantities: &[u32]) -> Vec<SaleLineFact> {
        let start = NaiveDate::from_ymd_opt(2024, 2, 1).expect("valid date");
        quantities
            .iter()
            .enumerate()
            .map(|(offset, quantity)| SaleLineFact {
                product_id: ProductId(id),
                product_name: format!("item-{id}"),
                sale_date: start + chrono::Duration::days(offset as i64),
                quantity: *quantity,
                unit_price: Decimal::ONE,
            })
            .collect()
    }

    #[test]
    fn linear_growth_projects_one_week_ahead() {
        let facts = daily(1, &[1, 2, 3, 4, 5]);
        let groups = group_by_product(&facts);

        let suggestions = RestockAdvisor::default().suggest(&aggregate_all(&groups));

        // last offset 4, horizon 7 => day 11 => 12 units
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].recommended_quantity, 12);
    }

    #[test]
    fn products_with_fewer_than_five_days_are_skipped() {
        let mut facts = daily(1, &[3, 3, 3, 3]);
        facts.extend(daily(2, &[2, 2, 2, 2, 2]));
        let groups = group_by_product(&facts);

        let suggestions = RestockAdvisor::default().suggest(&aggregate_all(&groups));

        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].product_id, ProductId(2));
        assert_eq!(suggestions[0].recommended_quantity, 2);
    }
}
