use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;
use crate::domain::sale::SaleId;

/// One sale line, flattened from sale + sale item + product.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLineFact {
    pub product_id: ProductId,
    pub product_name: String,
    pub sale_date: NaiveDate,
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// The product names purchased together in one sale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleBasket {
    pub sale_id: SaleId,
    pub product_names: Vec<String>,
}

/// All facts for a single product. `product_name` is the name carried by the
/// first fact seen for the id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductFacts<'a> {
    pub product_id: ProductId,
    pub product_name: &'a str,
    pub lines: Vec<&'a SaleLineFact>,
}

/// Groups facts by product id, in order of each product's first appearance.
pub fn group_by_product(facts: &[SaleLineFact]) -> Vec<ProductFacts<'_>> {
    let mut positions: HashMap<ProductId, usize> = HashMap::new();
    let mut groups: Vec<ProductFacts<'_>> = Vec::new();

    for fact in facts {
        let index = *positions.entry(fact.product_id).or_insert_with(|| {
            groups.push(ProductFacts {
                product_id: fact.product_id,
                product_name: &fact.product_name,
                lines: Vec::new(),
            });
            groups.len() - 1
        });
        groups[index].lines.push(fact);
    }

    groups
}
