use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use tantrata_core::analytics::{SaleBasket, SaleLineFact};
use tantrata_core::domain::product::{NewProduct, Product, ProductId};
use tantrata_core::domain::sale::{CompletedSale, NewSale, SaleId};

pub mod memory;
pub mod product;
pub mod sales;

pub use memory::{InMemoryProductRepository, InMemorySalesRepository};
pub use product::SqlProductRepository;
pub use sales::SqlSalesRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("product {0} not found")]
    ProductNotFound(ProductId),
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Product>, RepositoryError>;
    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;
    async fn insert(&self, product: NewProduct) -> Result<Product, RepositoryError>;

    /// Records a stock intake batch and adds it to the product's stock.
    async fn add_batch(
        &self,
        id: ProductId,
        quantity: u32,
        received_at: DateTime<Utc>,
    ) -> Result<Product, RepositoryError>;
}

/// Read side used by the analytics engine.
#[async_trait]
pub trait SalesHistoryRepository: Send + Sync {
    /// Every sale line joined with its sale date and product name, in the
    /// order the lines were recorded. Lines whose product has been removed
    /// are not returned.
    async fn load_sale_lines(&self) -> Result<Vec<SaleLineFact>, RepositoryError>;

    /// Product names per sale, for co-purchase counting.
    async fn load_baskets(&self) -> Result<Vec<SaleBasket>, RepositoryError>;
}

#[async_trait]
pub trait SaleRepository: Send + Sync {
    /// Persists the sale and its lines atomically and takes the sold
    /// quantities out of stock.
    async fn record_sale(&self, sale: NewSale) -> Result<CompletedSale, RepositoryError>;
    async fn find_sale(&self, id: SaleId) -> Result<Option<CompletedSale>, RepositoryError>;
}

pub(crate) fn decode_decimal(column: &str, raw: &str) -> Result<Decimal, RepositoryError> {
    raw.parse::<Decimal>().map_err(|error| {
        RepositoryError::Decode(format!("{column} `{raw}` is not a decimal: {error}"))
    })
}

pub(crate) fn decode_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|error| {
            RepositoryError::Decode(format!("{column} `{raw}` is not RFC 3339: {error}"))
        })
}

pub(crate) fn decode_quantity(column: &str, raw: i64) -> Result<u32, RepositoryError> {
    u32::try_from(raw)
        .map_err(|_| RepositoryError::Decode(format!("{column} `{raw}` is not a valid quantity")))
}
