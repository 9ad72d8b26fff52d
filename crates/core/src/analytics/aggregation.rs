use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::facts::ProductFacts;
use crate::domain::product::ProductId;

/// Total quantity sold for one product on one calendar day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub total_quantity: u64,
    /// Days since the product's own first observed sale date.
    pub day_offset: i64,
}

/// A product's daily aggregates, sorted by date ascending.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductSeries<'a> {
    pub product_id: ProductId,
    pub product_name: &'a str,
    pub points: Vec<DailyAggregate>,
}

impl ProductSeries<'_> {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn max_day_offset(&self) -> Option<i64> {
        self.points.last().map(|point| point.day_offset)
    }
}

/// Sums same-day quantities and numbers each day relative to the first.
///
/// Returns `None` for a product without facts so that it is absent from the
/// output rather than present with an empty series.
pub fn aggregate_daily<'a>(group: &ProductFacts<'a>) -> Option<ProductSeries<'a>> {
    let mut totals: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for line in &group.lines {
        *totals.entry(line.sale_date).or_insert(0) += u64::from(line.quantity);
    }

    let first_date = *totals.keys().next()?;
    let points = totals
        .into_iter()
        .map(|(date, total_quantity)| DailyAggregate {
            date,
            total_quantity,
            day_offset: (date - first_date).num_days(),
        })
        .collect();

    Some(ProductSeries { product_id: group.product_id, product_name: group.product_name, points })
}

pub fn aggregate_all<'a>(groups: &[ProductFacts<'a>]) -> Vec<ProductSeries<'a>> {
    groups.iter().filter_map(aggregate_daily).collect()
}
