//! Checkout arithmetic: pricing cart lines against the catalog and deriving
//! the invoice totals (18% GST, flat 10% discount).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::{Product, ProductId};
use crate::domain::sale::CartLine;
use crate::errors::DomainError;

pub fn tax_rate() -> Decimal {
    Decimal::new(18, 2)
}

pub fn discount_rate() -> Decimal {
    Decimal::new(10, 2)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub final_amount: Decimal,
}

impl BillTotals {
    pub fn compute(lines: &[BillLine]) -> Self {
        let subtotal: Decimal = lines.iter().map(|line| line.line_total).sum();
        let tax = subtotal * tax_rate();
        let discount = subtotal * discount_rate();

        Self { subtotal, tax, discount, final_amount: subtotal + tax - discount }
    }
}

/// Prices each requested line at the product's current catalog price.
///
/// Zero-quantity lines are dropped; a cart that is empty after that, or that
/// references a product missing from `catalog`, is rejected.
pub fn price_cart(catalog: &[Product], cart: &[CartLine]) -> Result<Vec<BillLine>, DomainError> {
    let mut lines = Vec::new();

    for requested in cart.iter().filter(|line| line.quantity > 0) {
        let product = catalog
            .iter()
            .find(|product| product.id == requested.product_id)
            .ok_or(DomainError::UnknownProduct(requested.product_id))?;

        lines.push(BillLine {
            product_id: product.id,
            product_name: product.name.clone(),
            quantity: requested.quantity,
            unit_price: product.unit_price,
            line_total: product.unit_price * Decimal::from(requested.quantity),
        });
    }

    if lines.is_empty() {
        return Err(DomainError::EmptyCart);
    }

    Ok(lines)
}
