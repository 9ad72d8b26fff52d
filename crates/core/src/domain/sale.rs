use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::billing::{BillLine, BillTotals};
use crate::domain::product::ProductId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SaleId(pub i64);

impl fmt::Display for SaleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A requested checkout line before it has been priced against the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A priced sale ready to be persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSale {
    pub sold_at: DateTime<Utc>,
    pub customer_email: Option<String>,
    pub lines: Vec<BillLine>,
    pub totals: BillTotals,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub price_per_unit: Decimal,
}

/// A sale as it exists after the transactional write has committed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedSale {
    pub id: SaleId,
    pub sold_at: DateTime<Utc>,
    pub customer_email: Option<String>,
    pub items: Vec<SaleItem>,
    pub totals: BillTotals,
}

impl CompletedSale {
    pub fn product_names(&self) -> Vec<String> {
        self.items.iter().map(|item| item.product_name.clone()).collect()
    }
}
