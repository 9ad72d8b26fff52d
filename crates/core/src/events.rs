use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::sale::{CompletedSale, SaleId};

/// Emitted once a sale has been committed. Consumers react to it after the
/// checkout response has been returned, so nothing they do can undo the sale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleCompleted {
    pub event_id: Uuid,
    pub correlation_id: String,
    pub sale_id: SaleId,
    pub customer_email: Option<String>,
    pub product_names: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

impl SaleCompleted {
    pub fn from_sale(sale: &CompletedSale, correlation_id: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            correlation_id: correlation_id.into(),
            sale_id: sale.id,
            customer_email: sale.customer_email.clone(),
            product_names: sale.product_names(),
            completed_at: sale.sold_at,
        }
    }
}
