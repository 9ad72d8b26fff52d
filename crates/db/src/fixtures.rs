use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Catalog rows the demo history is built on.
const SEED_PRODUCTS: &[SeedProductContract] = &[
    SeedProductContract { id: 1, name: "Green Tea", unit_price: "4.50", stock_quantity: 120 },
    SeedProductContract { id: 2, name: "Ceramic Mug", unit_price: "8.00", stock_quantity: 60 },
    SeedProductContract { id: 3, name: "Honey Jar", unit_price: "6.25", stock_quantity: 80 },
    SeedProductContract { id: 4, name: "Tea Infuser", unit_price: "3.75", stock_quantity: 40 },
];

const SEED_BATCH_COUNT: i64 = 4;
const SEED_SALE_COUNT: i64 = 20;
const SEED_SALE_ITEM_COUNT: i64 = 45;
const SEED_FIRST_SALE_DATE: &str = "2024-01-01";
const SEED_LAST_SALE_DATE: &str = "2024-01-10";

#[derive(Debug, Clone, Copy)]
struct SeedProductContract {
    id: i64,
    name: &'static str,
    unit_price: &'static str,
    stock_quantity: i64,
}

/// Deterministic ten-day sales history for a small tea shop.
///
/// Every analysis has something to report on it: a price-sensitive product,
/// steady sellers, one demand spike and overlapping baskets.
pub struct SeedDataset;

impl SeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    /// Replaces all catalog and sales rows with the demo dataset.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            products_seeded: SEED_PRODUCTS.iter().map(|product| product.name).collect(),
            sales_seeded: SEED_SALE_COUNT as usize,
            sale_items_seeded: SEED_SALE_ITEM_COUNT as usize,
        })
    }

    /// Checks that the seeded rows are present and untouched.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for product in SEED_PRODUCTS {
            let matches: i64 = sqlx::query_scalar(
                "SELECT EXISTS(
                    SELECT 1 FROM product
                    WHERE id = ?1 AND name = ?2 AND unit_price = ?3 AND stock_quantity = ?4
                 )",
            )
            .bind(product.id)
            .bind(product.name)
            .bind(product.unit_price)
            .bind(product.stock_quantity)
            .fetch_one(pool)
            .await?;
            checks.push((product.name, matches == 1));
        }

        let batch_count: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM batch").fetch_one(pool).await?;
        checks.push(("batch-count", batch_count == SEED_BATCH_COUNT));

        let sale_count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM sale").fetch_one(pool).await?;
        checks.push(("sale-count", sale_count == SEED_SALE_COUNT));

        let item_count: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM sale_item").fetch_one(pool).await?;
        checks.push(("sale-item-count", item_count == SEED_SALE_ITEM_COUNT));

        let (first_day, last_day): (Option<String>, Option<String>) =
            sqlx::query_as("SELECT MIN(substr(sold_at, 1, 10)), MAX(substr(sold_at, 1, 10)) FROM sale")
                .fetch_one(pool)
                .await?;
        checks.push(("first-sale-date", first_day.as_deref() == Some(SEED_FIRST_SALE_DATE)));
        checks.push(("last-sale-date", last_day.as_deref() == Some(SEED_LAST_SALE_DATE)));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub products_seeded: Vec<&'static str>,
    pub sales_seeded: usize,
    pub sale_items_seeded: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect_with_settings, migrations};

    #[test]
    fn sql_fixture_is_valid() {
        assert!(!SeedDataset::SQL.is_empty());
        assert!(SeedDataset::SQL.contains("INSERT INTO sale_item"));
    }

    #[tokio::test]
    async fn verify_seed_contract_and_idempotency() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");

        let first = SeedDataset::load(&pool).await.expect("load seed fixtures");
        let first_verification = SeedDataset::verify(&pool).await.expect("verify seed fixtures");
        assert!(first_verification.all_present, "{:?}", first_verification.checks);
        assert_eq!(first.products_seeded.len(), 4);

        SeedDataset::load(&pool).await.expect("reload seed fixtures");
        let second_verification = SeedDataset::verify(&pool).await.expect("re-verify seed fixtures");
        assert!(second_verification.all_present);
        assert_eq!(first_verification.checks, second_verification.checks);
    }

    #[tokio::test]
    async fn verification_notices_a_changed_stock_level() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");
        SeedDataset::load(&pool).await.expect("load seed fixtures");

        sqlx::query("UPDATE product SET stock_quantity = 0 WHERE id = 2")
            .execute(&pool)
            .await
            .expect("update stock");

        let verification = SeedDataset::verify(&pool).await.expect("verify");
        assert!(!verification.all_present);
        assert!(verification.checks.contains(&("Ceramic Mug", false)));
    }

    #[test]
    fn seed_contract_json_matches_rust_seed_constants() {
        let contract: serde_json::Value =
            serde_json::from_str(include_str!("../../../config/fixtures/demo_seed_contract.json"))
                .expect("demo seed contract JSON must parse");

        assert_eq!(contract["sale_count"].as_i64(), Some(SEED_SALE_COUNT));
        assert_eq!(contract["sale_item_count"].as_i64(), Some(SEED_SALE_ITEM_COUNT));
        assert_eq!(contract["batch_count"].as_i64(), Some(SEED_BATCH_COUNT));
        assert_eq!(contract["first_sale_date"].as_str(), Some(SEED_FIRST_SALE_DATE));
        assert_eq!(contract["last_sale_date"].as_str(), Some(SEED_LAST_SALE_DATE));

        let products = contract["products"].as_array().expect("products should be an array");
        assert_eq!(products.len(), SEED_PRODUCTS.len());
        for (contract_product, product) in products.iter().zip(SEED_PRODUCTS) {
            assert_eq!(contract_product["id"].as_i64(), Some(product.id));
            assert_eq!(contract_product["name"].as_str(), Some(product.name));
            assert_eq!(contract_product["unit_price"].as_str(), Some(product.unit_price));
            assert_eq!(contract_product["stock_quantity"].as_i64(), Some(product.stock_quantity));
        }
    }
}
