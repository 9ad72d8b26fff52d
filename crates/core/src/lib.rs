pub mod analytics;
pub mod billing;
pub mod config;
pub mod domain;
pub mod errors;
pub mod events;
pub mod notify;

pub use analytics::{
    AnalyticsEngine, AnomalyRecord, DashboardReport, ForecastResult, OptimalPriceResult,
    Recommendation, RestockSuggestion, SaleBasket, SaleLineFact,
};
pub use billing::{price_cart, BillLine, BillTotals};
pub use config::{AnalyticsConfig, AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::product::{NewProduct, Product, ProductId};
pub use domain::sale::{CartLine, CompletedSale, NewSale, SaleId, SaleItem};
pub use errors::{AnalyticsError, ApplicationError, DomainError, InterfaceError};
pub use events::SaleCompleted;
pub use notify::{NoopNotifier, NotificationError, Notifier, RecommendationNotice};
