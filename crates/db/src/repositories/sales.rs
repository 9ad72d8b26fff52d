use sqlx::Row;
use tracing::info;

use tantrata_core::analytics::{SaleBasket, SaleLineFact};
use tantrata_core::billing::BillTotals;
use tantrata_core::domain::product::ProductId;
use tantrata_core::domain::sale::{CompletedSale, NewSale, SaleId, SaleItem};

use super::{
    decode_decimal, decode_quantity, decode_timestamp, RepositoryError, SaleRepository,
    SalesHistoryRepository,
};
use crate::DbPool;

/// Sales history reads and checkout writes over the `sale` / `sale_item`
/// tables.
pub struct SqlSalesRepository {
    pool: DbPool,
}

impl SqlSalesRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SalesHistoryRepository for SqlSalesRepository {
    async fn load_sale_lines(&self) -> Result<Vec<SaleLineFact>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT si.product_id, p.name AS product_name, s.sold_at, si.quantity, si.price_per_unit
             FROM sale_item si
             JOIN sale s ON s.id = si.sale_id
             JOIN product p ON p.id = si.product_id
             ORDER BY si.id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<SaleLineFact, RepositoryError> {
                let sold_at: String = row.try_get("sold_at")?;
                let price: String = row.try_get("price_per_unit")?;

                Ok(SaleLineFact {
                    product_id: ProductId(row.try_get("product_id")?),
                    product_name: row.try_get("product_name")?,
                    sale_date: decode_timestamp("sale.sold_at", &sold_at)?.date_naive(),
                    quantity: decode_quantity("sale_item.quantity", row.try_get("quantity")?)?,
                    unit_price: decode_decimal("sale_item.price_per_unit", &price)?,
                })
            })
            .collect()
    }

    async fn load_baskets(&self) -> Result<Vec<SaleBasket>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT si.sale_id, p.name AS product_name
             FROM sale_item si
             JOIN product p ON p.id = si.product_id
             ORDER BY si.sale_id, si.id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut baskets: Vec<SaleBasket> = Vec::new();
        for row in rows {
            let sale_id = SaleId(row.try_get("sale_id")?);
            let product_name: String = row.try_get("product_name")?;

            match baskets.last_mut() {
                Some(basket) if basket.sale_id == sale_id => {
                    basket.product_names.push(product_name);
                }
                _ => baskets.push(SaleBasket { sale_id, product_names: vec![product_name] }),
            }
        }

        Ok(baskets)
    }
}

#[async_trait::async_trait]
impl SaleRepository for SqlSalesRepository {
    async fn record_sale(&self, sale: NewSale) -> Result<CompletedSale, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO sale (sold_at, customer_email, subtotal, tax, discount, final_amount)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(sale.sold_at.to_rfc3339())
        .bind(sale.customer_email.as_deref())
        .bind(sale.totals.subtotal.to_string())
        .bind(sale.totals.tax.to_string())
        .bind(sale.totals.discount.to_string())
        .bind(sale.totals.final_amount.to_string())
        .execute(&mut *tx)
        .await?;
        let sale_id = SaleId(inserted.last_insert_rowid());

        let mut items = Vec::with_capacity(sale.lines.len());
        for line in &sale.lines {
            sqlx::query(
                "INSERT INTO sale_item (sale_id, product_id, quantity, price_per_unit)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(sale_id.0)
            .bind(line.product_id.0)
            .bind(i64::from(line.quantity))
            .bind(line.unit_price.to_string())
            .execute(&mut *tx)
            .await?;

            let updated =
                sqlx::query("UPDATE product SET stock_quantity = stock_quantity - ?1 WHERE id = ?2")
                    .bind(i64::from(line.quantity))
                    .bind(line.product_id.0)
                    .execute(&mut *tx)
                    .await?;
            if updated.rows_affected() == 0 {
                return Err(RepositoryError::ProductNotFound(line.product_id));
            }

            items.push(SaleItem {
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                price_per_unit: line.unit_price,
            });
        }

        tx.commit().await?;

        info!(
            event_name = "persistence.sale.recorded",
            sale_id = %sale_id,
            line_count = items.len(),
            final_amount = %sale.totals.final_amount,
            "sale recorded"
        );

        Ok(CompletedSale {
            id: sale_id,
            sold_at: sale.sold_at,
            customer_email: sale.customer_email,
            items,
            totals: sale.totals,
        })
    }

    async fn find_sale(&self, id: SaleId) -> Result<Option<CompletedSale>, RepositoryError> {
        let Some(row) = sqlx::query(
            "SELECT id, sold_at, customer_email, subtotal, tax, discount, final_amount
             FROM sale WHERE id = ?1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let item_rows = sqlx::query(
            "SELECT si.product_id, p.name AS product_name, si.quantity, si.price_per_unit
             FROM sale_item si
             JOIN product p ON p.id = si.product_id
             WHERE si.sale_id = ?1
             ORDER BY si.id",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        let items = item_rows
            .iter()
            .map(|item| -> Result<SaleItem, RepositoryError> {
                let price: String = item.try_get("price_per_unit")?;
                Ok(SaleItem {
                    product_id: ProductId(item.try_get("product_id")?),
                    product_name: item.try_get("product_name")?,
                    quantity: decode_quantity("sale_item.quantity", item.try_get("quantity")?)?,
                    price_per_unit: decode_decimal("sale_item.price_per_unit", &price)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let sold_at: String = row.try_get("sold_at")?;
        let money = |column: &str| -> Result<_, RepositoryError> {
            let raw: String = row.try_get(column)?;
            decode_decimal(&format!("sale.{column}"), &raw)
        };

        Ok(Some(CompletedSale {
            id,
            sold_at: decode_timestamp("sale.sold_at", &sold_at)?,
            customer_email: row.try_get("customer_email")?,
            items,
            totals: BillTotals {
                subtotal: money("subtotal")?,
                tax: money("tax")?,
                discount: money("discount")?,
                final_amount: money("final_amount")?,
            },
        }))
    }
}
