//! Post-sale side effects. The checkout handler only publishes
//! [`SaleCompleted`]; this consumer turns each event into "customers also
//! bought" suggestions and hands them to the configured [`Notifier`].

use std::sync::Arc;

use tantrata_core::analytics::AnalyticsEngine;
use tantrata_core::events::SaleCompleted;
use tantrata_core::notify::{Notifier, RecommendationNotice};
use tantrata_db::SalesHistoryRepository;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsumerOutcome {
    Notified(RecommendationNotice),
    Skipped(&'static str),
    Failed(String),
}

#[derive(Clone)]
pub struct RecommendationConsumer {
    history: Arc<dyn SalesHistoryRepository>,
    engine: AnalyticsEngine,
    notifier: Arc<dyn Notifier>,
}

impl RecommendationConsumer {
    pub fn new(
        history: Arc<dyn SalesHistoryRepository>,
        engine: AnalyticsEngine,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { history, engine, notifier }
    }

    /// Drains `events` until every sender has been dropped.
    pub fn spawn(self, mut events: mpsc::Receiver<SaleCompleted>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.handle(&event).await;
            }
            debug!(event_name = "checkout.consumer.stopped", "sale event channel closed");
        })
    }

    pub async fn handle(&self, event: &SaleCompleted) -> ConsumerOutcome {
        let Some(recipient) = event.customer_email.clone() else {
            debug!(
                event_name = "checkout.recommendations.skipped",
                correlation_id = %event.correlation_id,
                sale_id = %event.sale_id,
                reason = "no_customer_email",
                "sale has no customer email"
            );
            return ConsumerOutcome::Skipped("no_customer_email");
        };

        let baskets = match self.history.load_baskets().await {
            Ok(baskets) => baskets,
            Err(error) => {
                warn!(
                    event_name = "checkout.recommendations.history_failed",
                    correlation_id = %event.correlation_id,
                    sale_id = %event.sale_id,
                    error = %error,
                    "could not load purchase history for recommendations"
                );
                return ConsumerOutcome::Failed(error.to_string());
            }
        };

        let recommended = self.engine.checkout_recommendations(&baskets, &event.product_names);
        if recommended.is_empty() {
            debug!(
                event_name = "checkout.recommendations.skipped",
                correlation_id = %event.correlation_id,
                sale_id = %event.sale_id,
                reason = "no_co_purchases",
                "no co-purchased products to suggest"
            );
            return ConsumerOutcome::Skipped("no_co_purchases");
        }

        let notice = RecommendationNotice {
            sale_id: event.sale_id,
            recipient,
            purchased: event.product_names.clone(),
            recommended,
        };

        // The sale is already committed; delivery problems are only reported.
        if let Err(error) = self.notifier.notify(&notice).await {
            warn!(
                event_name = "checkout.recommendations.notify_failed",
                correlation_id = %event.correlation_id,
                sale_id = %event.sale_id,
                error = %error,
                "recommendation notification failed"
            );
            return ConsumerOutcome::Failed(error.to_string());
        }

        info!(
            event_name = "checkout.recommendations.sent",
            correlation_id = %event.correlation_id,
            sale_id = %event.sale_id,
            recommended = notice.recommended.len(),
            "recommendations delivered"
        );
        ConsumerOutcome::Notified(notice)
    }
}
