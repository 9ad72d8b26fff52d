use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use tantrata_core::analytics::{SaleBasket, SaleLineFact};
use tantrata_core::domain::product::{NewProduct, Product, ProductId};
use tantrata_core::domain::sale::{CompletedSale, NewSale, SaleId, SaleItem};

use super::{ProductRepository, RepositoryError, SaleRepository, SalesHistoryRepository};

/// Catalog kept in a shared map so that an [`InMemorySalesRepository`] built
/// from it sees the same stock levels.
#[derive(Clone, Default)]
pub struct InMemoryProductRepository {
    products: Arc<RwLock<BTreeMap<ProductId, Product>>>,
}

impl InMemoryProductRepository {
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let products = products.into_iter().map(|product| (product.id, product)).collect();
        Self { products: Arc::new(RwLock::new(products)) }
    }
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(self.products.read().await.values().cloned().collect())
    }

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn insert(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let mut products = self.products.write().await;
        let next_id = products.keys().next_back().map_or(1, |last| last.0 + 1);
        let product = Product {
            id: ProductId(next_id),
            name: product.name,
            description: product.description,
            unit_price: product.unit_price,
            stock_quantity: product.stock_quantity,
        };
        products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn add_batch(
        &self,
        id: ProductId,
        quantity: u32,
        _received_at: DateTime<Utc>,
    ) -> Result<Product, RepositoryError> {
        let mut products = self.products.write().await;
        let product = products.get_mut(&id).ok_or(RepositoryError::ProductNotFound(id))?;
        product.stock_quantity += i64::from(quantity);
        Ok(product.clone())
    }
}

#[derive(Clone, Default)]
pub struct InMemorySalesRepository {
    catalog: InMemoryProductRepository,
    sales: Arc<RwLock<Vec<CompletedSale>>>,
}

impl InMemorySalesRepository {
    pub fn new(catalog: InMemoryProductRepository) -> Self {
        Self { catalog, sales: Arc::default() }
    }
}

#[async_trait::async_trait]
impl SalesHistoryRepository for InMemorySalesRepository {
    async fn load_sale_lines(&self) -> Result<Vec<SaleLineFact>, RepositoryError> {
        let sales = self.sales.read().await;
        let products = self.catalog.products.read().await;

        Ok(sales
            .iter()
            .flat_map(|sale| sale.items.iter().map(move |item| (sale, item)))
            .filter_map(|(sale, item)| {
                let product = products.get(&item.product_id)?;
                Some(SaleLineFact {
                    product_id: item.product_id,
                    product_name: product.name.clone(),
                    sale_date: sale.sold_at.date_naive(),
                    quantity: item.quantity,
                    unit_price: item.price_per_unit,
                })
            })
            .collect())
    }

    async fn load_baskets(&self) -> Result<Vec<SaleBasket>, RepositoryError> {
        let sales = self.sales.read().await;
        let products = self.catalog.products.read().await;

        Ok(sales
            .iter()
            .map(|sale| SaleBasket {
                sale_id: sale.id,
                product_names: sale
                    .items
                    .iter()
                    .filter_map(|item| products.get(&item.product_id))
                    .map(|product| product.name.clone())
                    .collect(),
            })
            .filter(|basket| !basket.product_names.is_empty())
            .collect())
    }
}

#[async_trait::async_trait]
impl SaleRepository for InMemorySalesRepository {
    async fn record_sale(&self, sale: NewSale) -> Result<CompletedSale, RepositoryError> {
        // Same lock order as the readers: sales, then products.
        let mut sales = self.sales.write().await;
        let mut products = self.catalog.products.write().await;
        if let Some(missing) = sale.lines.iter().find(|line| !products.contains_key(&line.product_id))
        {
            return Err(RepositoryError::ProductNotFound(missing.product_id));
        }

        let mut items = Vec::with_capacity(sale.lines.len());
        for line in &sale.lines {
            if let Some(product) = products.get_mut(&line.product_id) {
                product.stock_quantity -= i64::from(line.quantity);
            }
            items.push(SaleItem {
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                price_per_unit: line.unit_price,
            });
        }

        let completed = CompletedSale {
            id: SaleId(sales.len() as i64 + 1),
            sold_at: sale.sold_at,
            customer_email: sale.customer_email,
            items,
            totals: sale.totals,
        };
        sales.push(completed.clone());
        Ok(completed)
    }

    async fn find_sale(&self, id: SaleId) -> Result<Option<CompletedSale>, RepositoryError> {
        Ok(self.sales.read().await.iter().find(|sale| sale.id == id).cloned())
    }
}
