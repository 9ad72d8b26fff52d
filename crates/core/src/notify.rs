use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::sale::SaleId;

/// "Customers also bought" message for one completed sale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationNotice {
    pub sale_id: SaleId,
    pub recipient: String,
    pub purchased: Vec<String>,
    pub recommended: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("notification template failure: {0}")]
    Template(String),
    #[error("notification delivery failure: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &RecommendationNotice) -> Result<(), NotificationError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _notice: &RecommendationNotice) -> Result<(), NotificationError> {
        Ok(())
    }
}
