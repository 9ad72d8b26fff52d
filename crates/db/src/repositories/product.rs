use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use tantrata_core::domain::product::{NewProduct, Product, ProductId};

use super::{decode_decimal, ProductRepository, RepositoryError};
use crate::DbPool;

const PRODUCT_COLUMNS: &str = "id, name, description, unit_price, stock_quantity";

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(product_from_row).collect()
    }

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE id = ?1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn insert(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO product (name, description, unit_price, stock_quantity)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.unit_price.to_string())
        .bind(product.stock_quantity)
        .execute(&self.pool)
        .await?;

        Ok(Product {
            id: ProductId(result.last_insert_rowid()),
            name: product.name,
            description: product.description,
            unit_price: product.unit_price,
            stock_quantity: product.stock_quantity,
        })
    }

    async fn add_batch(
        &self,
        id: ProductId,
        quantity: u32,
        received_at: DateTime<Utc>,
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE product SET stock_quantity = stock_quantity + ?1 WHERE id = ?2",
        )
        .bind(i64::from(quantity))
        .bind(id.0)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::ProductNotFound(id));
        }

        sqlx::query("INSERT INTO batch (product_id, quantity, date_added) VALUES (?1, ?2, ?3)")
            .bind(id.0)
            .bind(i64::from(quantity))
            .bind(received_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE id = ?1"))
            .bind(id.0)
            .fetch_one(&mut *tx)
            .await?;
        let product = product_from_row(&row)?;

        tx.commit().await?;
        Ok(product)
    }
}

fn product_from_row(row: &SqliteRow) -> Result<Product, RepositoryError> {
    let unit_price: String = row.try_get("unit_price")?;

    Ok(Product {
        id: ProductId(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        unit_price: decode_decimal("product.unit_price", &unit_price)?,
        stock_quantity: row.try_get("stock_quantity")?,
    })
}
