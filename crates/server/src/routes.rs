//! JSON API.
//!
//! - `GET  /analytics/forecast`         demand forecast per product
//! - `GET  /analytics/anomalies`        unusual sales days
//! - `GET  /analytics/prices`           revenue-blind optimal prices
//! - `GET  /analytics/restock`          one-week restock suggestions
//! - `GET  /analytics/recommendations`  best co-purchase per product
//! - `GET  /analytics/dashboard`        all of the above in one report
//! - `POST /checkout`                   record a sale and return its invoice
//! - `GET  /sales/{sale_id}`            invoice for a recorded sale
//! - `GET  /inventory`                  catalog with current stock levels
//! - `POST /products/{product_id}/batches`  receive a stock batch

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tantrata_core::analytics::{
    AnalyticsEngine, AnomalyRecord, DashboardReport, ForecastResult, OptimalPriceResult,
    Recommendation, RestockSuggestion, SaleBasket, SaleLineFact,
};
use tantrata_core::billing::{price_cart, BillTotals};
use tantrata_core::domain::product::{Product, ProductId};
use tantrata_core::domain::sale::{CartLine, CompletedSale, NewSale, SaleId};
use tantrata_core::errors::{ApplicationError, DomainError, InterfaceError};
use tantrata_core::events::SaleCompleted;
use tantrata_db::{ProductRepository, RepositoryError, SaleRepository, SalesHistoryRepository};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{info, warn};
use uuid::Uuid;

const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct ApiState {
    products: Arc<dyn ProductRepository>,
    sales: Arc<dyn SaleRepository>,
    history: Arc<dyn SalesHistoryRepository>,
    engine: AnalyticsEngine,
    events: mpsc::Sender<SaleCompleted>,
}

impl ApiState {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        sales: Arc<dyn SaleRepository>,
        history: Arc<dyn SalesHistoryRepository>,
        engine: AnalyticsEngine,
        events: mpsc::Sender<SaleCompleted>,
    ) -> Self {
        Self { products, sales, history, engine, events }
    }
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub customer_email: Option<String>,
    pub items: Vec<CartLine>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub correlation_id: String,
    #[serde(flatten)]
    pub sale: CompletedSale,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: Option<String>,
    pub correlation_id: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn not_found(detail: String, correlation_id: String) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: ErrorBody {
                error: "The requested record does not exist.".to_string(),
                detail: Some(detail),
                correlation_id,
            },
        }
    }
}

impl From<InterfaceError> for ApiError {
    fn from(error: InterfaceError) -> Self {
        let (status, detail) = match &error {
            InterfaceError::BadRequest { message, .. } => {
                (StatusCode::BAD_REQUEST, Some(message.clone()))
            }
            InterfaceError::ServiceUnavailable { .. } => (StatusCode::SERVICE_UNAVAILABLE, None),
        };
        Self {
            status,
            body: ErrorBody {
                error: error.user_message().to_string(),
                detail,
                correlation_id: error.correlation_id().to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/analytics/forecast", get(forecast))
        .route("/analytics/anomalies", get(anomalies))
        .route("/analytics/prices", get(prices))
        .route("/analytics/restock", get(restock))
        .route("/analytics/recommendations", get(recommendations))
        .route("/analytics/dashboard", get(dashboard))
        .route("/checkout", post(checkout))
        .route("/sales/{sale_id}", get(sale_invoice))
        .route("/inventory", get(inventory))
        .route("/products/{product_id}/batches", post(add_batch))
        .with_state(state)
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn repository_failure(error: RepositoryError) -> ApplicationError {
    match error {
        RepositoryError::ProductNotFound(id) => DomainError::UnknownProduct(id).into(),
        other => ApplicationError::Persistence(other.to_string()),
    }
}

fn interface_error(error: ApplicationError, correlation_id: String) -> ApiError {
    warn!(
        event_name = "api.request.failed",
        correlation_id = %correlation_id,
        error = %error,
        "request failed"
    );
    error.into_interface(correlation_id).into()
}

// ---------------------------------------------------------------------------
// Analytics handlers
// ---------------------------------------------------------------------------

async fn load_facts(state: &ApiState, headers: &HeaderMap) -> Result<Vec<SaleLineFact>, ApiError> {
    state
        .history
        .load_sale_lines()
        .await
        .map_err(|error| interface_error(repository_failure(error), correlation_id(headers)))
}

async fn load_baskets(state: &ApiState, headers: &HeaderMap) -> Result<Vec<SaleBasket>, ApiError> {
    state
        .history
        .load_baskets()
        .await
        .map_err(|error| interface_error(repository_failure(error), correlation_id(headers)))
}

async fn forecast(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ForecastResult>>, ApiError> {
    let facts = load_facts(&state, &headers).await?;
    Ok(Json(state.engine.forecast(&facts)))
}

async fn anomalies(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<AnomalyRecord>>, ApiError> {
    let facts = load_facts(&state, &headers).await?;
    Ok(Json(state.engine.anomalies(&facts)))
}

async fn prices(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<OptimalPriceResult>>, ApiError> {
    let facts = load_facts(&state, &headers).await?;
    Ok(Json(state.engine.optimal_prices(&facts)))
}

async fn restock(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<RestockSuggestion>>, ApiError> {
    let facts = load_facts(&state, &headers).await?;
    Ok(Json(state.engine.restock(&facts)))
}

async fn recommendations(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Recommendation>>, ApiError> {
    let baskets = load_baskets(&state, &headers).await?;
    Ok(Json(state.engine.recommendations(&baskets)))
}

async fn dashboard(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<DashboardReport>, ApiError> {
    let facts = load_facts(&state, &headers).await?;
    let baskets = load_baskets(&state, &headers).await?;
    Ok(Json(state.engine.dashboard(&facts, &baskets)))
}

// ---------------------------------------------------------------------------
// Checkout handlers
// ---------------------------------------------------------------------------

async fn checkout(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), ApiError> {
    let correlation_id = correlation_id(&headers);

    let sale = match record_checkout(&state, request).await {
        Ok(sale) => sale,
        Err(error) => return Err(interface_error(error, correlation_id)),
    };

    info!(
        event_name = "checkout.sale.completed",
        correlation_id = %correlation_id,
        sale_id = %sale.id,
        lines = sale.items.len(),
        final_amount = %sale.totals.final_amount,
        "sale recorded"
    );

    // The sale is committed at this point; a full or closed channel only
    // costs the follow-up notification.
    match state.events.try_send(SaleCompleted::from_sale(&sale, correlation_id.clone())) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => warn!(
            event_name = "checkout.event.dropped",
            correlation_id = %correlation_id,
            sale_id = %event.sale_id,
            reason = "channel_full",
            "sale event not published"
        ),
        Err(TrySendError::Closed(event)) => warn!(
            event_name = "checkout.event.dropped",
            correlation_id = %correlation_id,
            sale_id = %event.sale_id,
            reason = "channel_closed",
            "sale event not published"
        ),
    }

    Ok((StatusCode::CREATED, Json(InvoiceResponse { correlation_id, sale })))
}

async fn record_checkout(
    state: &ApiState,
    request: CheckoutRequest,
) -> Result<CompletedSale, ApplicationError> {
    let customer_email = normalize_email(request.customer_email)?;
    let catalog = state.products.list().await.map_err(repository_failure)?;
    let lines = price_cart(&catalog, &request.items)?;
    let totals = BillTotals::compute(&lines);

    state
        .sales
        .record_sale(NewSale { sold_at: Utc::now(), customer_email, lines, totals })
        .await
        .map_err(repository_failure)
}

fn normalize_email(raw: Option<String>) -> Result<Option<String>, DomainError> {
    let Some(email) = raw.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
    else {
        return Ok(None);
    };

    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(Some(email)),
        _ => Err(DomainError::InvariantViolation(format!(
            "customer_email `{email}` is not an email address"
        ))),
    }
}

async fn sale_invoice(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(sale_id): Path<i64>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let found = state
        .sales
        .find_sale(SaleId(sale_id))
        .await
        .map_err(|error| interface_error(repository_failure(error), correlation_id.clone()))?;

    match found {
        Some(sale) => Ok(Json(InvoiceResponse { correlation_id, sale })),
        None => Err(ApiError::not_found(format!("sale {sale_id} not found"), correlation_id)),
    }
}

// ---------------------------------------------------------------------------
// Inventory handlers
// ---------------------------------------------------------------------------

async fn inventory(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Product>>, ApiError> {
    state
        .products
        .list()
        .await
        .map(Json)
        .map_err(|error| interface_error(repository_failure(error), correlation_id(&headers)))
}

async fn add_batch(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(product_id): Path<i64>,
    Json(request): Json<BatchRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let correlation_id = correlation_id(&headers);
    if request.quantity == 0 {
        let error = DomainError::InvariantViolation("batch quantity must be positive".to_string());
        return Err(interface_error(error.into(), correlation_id));
    }

    let product = state
        .products
        .add_batch(ProductId(product_id), request.quantity, Utc::now())
        .await
        .map_err(|error| interface_error(repository_failure(error), correlation_id.clone()))?;

    info!(
        event_name = "inventory.batch.received",
        correlation_id = %correlation_id,
        product_id = %product.id,
        quantity = request.quantity,
        stock_quantity = product.stock_quantity,
        "stock batch recorded"
    );
    Ok((StatusCode::CREATED, Json(product)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use tantrata_core::analytics::AnalyticsEngine;
    use tantrata_core::billing::{price_cart, BillTotals};
    use tantrata_core::domain::product::{Product, ProductId};
    use tantrata_core::domain::sale::{CartLine, NewSale, SaleId};
    use tantrata_core::events::SaleCompleted;
    use tantrata_db::{
        InMemoryProductRepository, InMemorySalesRepository, ProductRepository, SaleRepository,
    };
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use super::{normalize_email, router, ApiState};

    struct Harness {
        app: Router,
        catalog: InMemoryProductRepository,
        sales: InMemorySalesRepository,
        events: mpsc::Receiver<SaleCompleted>,
    }

    fn catalog() -> Vec<Product> {
        vec![
            Product {
                id: ProductId(1),
                name: "Widget".to_string(),
                description: String::new(),
                unit_price: Decimal::new(1200, 2),
                stock_quantity: 100,
            },
            Product {
                id: ProductId(2),
                name: "Gadget".to_string(),
                description: String::new(),
                unit_price: Decimal::new(600, 2),
                stock_quantity: 100,
            },
        ]
    }

    fn harness() -> Harness {
        let catalog = InMemoryProductRepository::with_products(catalog());
        let sales = InMemorySalesRepository::new(catalog.clone());
        let (sender, events) = mpsc::channel(8);
        let state = ApiState::new(
            Arc::new(catalog.clone()),
            Arc::new(sales.clone()),
            Arc::new(sales.clone()),
            AnalyticsEngine::default(),
            sender,
        );
        Harness { app: router(state), catalog, sales, events }
    }

    async fn record(sales: &InMemorySalesRepository, day: &str, cart: &[(i64, u32)]) {
        let cart: Vec<CartLine> = cart
            .iter()
            .map(|(id, quantity)| CartLine { product_id: ProductId(*id), quantity: *quantity })
            .collect();
        let lines = price_cart(&catalog(), &cart).expect("price");
        let totals = BillTotals::compute(&lines);
        let sold_at: DateTime<Utc> = format!("{day}T10:00:00Z").parse().expect("timestamp");
        sales
            .record_sale(NewSale { sold_at, customer_email: None, lines, totals })
            .await
            .expect("record sale");
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.expect("router should respond");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).expect("request")
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn post_checkout(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/checkout")
            .header("content-type", "application/json")
            .header("x-correlation-id", "req-checkout")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn forecast_route_projects_daily_totals() {
        let harness = harness();
        record(&harness.sales, "2024-01-01", &[(1, 10)]).await;
        record(&harness.sales, "2024-01-02", &[(1, 12)]).await;
        record(&harness.sales, "2024-01-03", &[(1, 14)]).await;

        let (status, body) = send(&harness.app, get("/analytics/forecast")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["product_name"], "Widget");
        assert_eq!(body[0]["predicted_quantity"], 74);
    }

    #[tokio::test]
    async fn dashboard_on_empty_history_has_empty_sections() {
        let harness = harness();

        let (status, body) = send(&harness.app, get("/analytics/dashboard")).await;

        assert_eq!(status, StatusCode::OK);
        for section in ["forecasts", "anomalies", "optimal_prices", "restock", "recommendations"] {
            assert_eq!(body[section], json!([]), "{section} should be empty");
        }
    }

    #[tokio::test]
    async fn recommendations_route_pairs_co_purchased_products() {
        let harness = harness();
        record(&harness.sales, "2024-01-01", &[(1, 1), (2, 1)]).await;

        let (status, body) = send(&harness.app, get("/analytics/recommendations")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([
                { "product_name": "Gadget", "recommended_product": "Widget", "co_count": 1 },
                { "product_name": "Widget", "recommended_product": "Gadget", "co_count": 1 }
            ])
        );
    }

    #[tokio::test]
    async fn checkout_records_sale_and_publishes_event() {
        let mut harness = harness();

        let (status, body) = send(
            &harness.app,
            post_checkout(json!({
                "customer_email": "ana@example.com",
                "items": [
                    { "product_id": 1, "quantity": 1 },
                    { "product_id": 2, "quantity": 2 },
                    { "product_id": 2, "quantity": 0 }
                ]
            })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["correlation_id"], "req-checkout");
        assert_eq!(body["id"], 1);
        assert_eq!(body["items"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["totals"]["subtotal"], "24.00");
        assert_eq!(body["totals"]["final_amount"], "25.9200");

        let event = harness.events.try_recv().expect("sale event should be published");
        assert_eq!(event.sale_id, SaleId(1));
        assert_eq!(event.correlation_id, "req-checkout");
        assert_eq!(event.product_names, vec!["Widget".to_string(), "Gadget".to_string()]);

        let widget = harness.catalog.find_by_id(ProductId(1)).await.expect("find").expect("widget");
        assert_eq!(widget.stock_quantity, 99);
    }

    #[tokio::test]
    async fn checkout_with_unknown_product_is_a_bad_request() {
        let mut harness = harness();

        let (status, body) = send(
            &harness.app,
            post_checkout(json!({ "items": [{ "product_id": 9, "quantity": 1 }] })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["correlation_id"], "req-checkout");
        assert_eq!(body["detail"], "product 9 does not exist in the catalog");
        assert!(harness.events.try_recv().is_err(), "no event for a rejected checkout");
    }

    #[tokio::test]
    async fn checkout_without_positive_quantities_is_rejected() {
        let harness = harness();

        let (status, body) = send(
            &harness.app,
            post_checkout(json!({ "items": [{ "product_id": 1, "quantity": 0 }] })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "cart has no lines with a positive quantity");
    }

    #[tokio::test]
    async fn checkout_survives_a_closed_event_channel() {
        let Harness { app, events, .. } = harness();
        drop(events);

        let (status, _) =
            send(&app, post_checkout(json!({ "items": [{ "product_id": 1, "quantity": 1 }] })))
                .await;

        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn sale_invoice_reads_back_recorded_totals() {
        let harness = harness();
        record(&harness.sales, "2024-01-05", &[(2, 3)]).await;

        let (status, body) = send(&harness.app, get("/sales/1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totals"]["subtotal"], "18.00");
        assert_eq!(body["items"][0]["product_name"], "Gadget");

        let (status, body) = send(&harness.app, get("/sales/42")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "sale 42 not found");
    }

    #[tokio::test]
    async fn received_batch_raises_stock_shown_in_inventory() {
        let harness = harness();

        let (status, body) =
            send(&harness.app, post_json("/products/2/batches", json!({ "quantity": 25 }))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["name"], "Gadget");
        assert_eq!(body["stock_quantity"], 125);

        let (status, body) = send(&harness.app, get("/inventory")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["stock_quantity"], 100);
        assert_eq!(body[1]["stock_quantity"], 125);
    }

    #[tokio::test]
    async fn batch_for_unknown_product_is_a_bad_request() {
        let harness = harness();

        let (status, body) =
            send(&harness.app, post_json("/products/9/batches", json!({ "quantity": 5 }))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "product 9 does not exist in the catalog");
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let harness = harness();

        let (status, body) =
            send(&harness.app, post_json("/products/1/batches", json!({ "quantity": 0 }))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "domain invariant violation: batch quantity must be positive");
        let widget = harness.catalog.find_by_id(ProductId(1)).await.expect("find").expect("widget");
        assert_eq!(widget.stock_quantity, 100);
    }

    #[test]
    fn emails_are_trimmed_and_checked() {
        assert_eq!(
            normalize_email(Some("  ana@example.com ".to_string())),
            Ok(Some("ana@example.com".to_string()))
        );
        assert_eq!(normalize_email(Some("   ".to_string())), Ok(None));
        assert_eq!(normalize_email(None), Ok(None));
        assert!(normalize_email(Some("ana.example.com".to_string())).is_err());
    }
}
