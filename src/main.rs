//! Top-up Storefront - order intake and receipt service

use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::StatusCode, routing::{get, post, put}, Json, Router};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;
use validator::Validate;
use topup_storefront::domain::aggregates::{eligible_payment_methods, sum_line_totals, CartItem, CustomerInfo, NewOrder, Order, OrderStatus, PaymentMethod};
use topup_storefront::domain::events::DomainEvent;
use topup_storefront::storage::{cleanup_old_receipts, CleanupPolicy, CleanupReport, LocalImageStore};
use topup_storefront::{Config, OrderStore, PgOrderStore, StoreError};

const CLEANUP_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Clone)]
pub struct AppState { pub orders: Arc<PgOrderStore>, pub nats: Option<async_nats::Client>, pub images: Arc<LocalImageStore>, pub cleanup: CleanupPolicy, pub settings: SettingsResponse }

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;
    let db = PgPoolOptions::new().max_connections(10).connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;
    let nats = match &config.nats_url {
        Some(url) => async_nats::connect(url.as_str()).await.map_err(|e| tracing::warn!(error = %e, "NATS unavailable, events will not be published")).ok(),
        None => None,
    };
    let images = Arc::new(LocalImageStore::new(&config.receipts_dir, &config.receipts_public_url));
    let cleanup = CleanupPolicy { max_age: config.receipt_max_age, ..CleanupPolicy::default() };
    let settings = SettingsResponse { checkout_mode: config.checkout.mode.as_str(), messenger_url: config.checkout.messenger_url.clone(), poll_interval_secs: config.poll_interval.as_secs() };
    let state = AppState { orders: Arc::new(PgOrderStore::new(db)), nats, images: images.clone(), cleanup: cleanup.clone(), settings };

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_PERIOD);
        loop {
            interval.tick().await;
            if let Err(e) = cleanup_old_receipts(images.as_ref(), &cleanup, Utc::now()).await {
                tracing::error!(error = %e, "scheduled receipt cleanup failed");
            }
        }
    });

    let app = Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "topup-storefront"})) }))
        .route("/api/v1/checkout/settings", get(|State(s): State<AppState>| async move { Json(s.settings) }))
        .route("/api/v1/orders", post(create_order))
        .route("/api/v1/orders/:id", get(get_order))
        .route("/api/v1/orders/:id/status", put(update_order_status))
        .route("/api/v1/payment-methods", get(list_payment_methods))
        .route("/api/v1/receipts/cleanup", post(run_cleanup))
        .nest_service("/receipts", ServeDir::new(&config.receipts_dir))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive())).with_state(state);

    tracing::info!(port = config.port, mode = ?config.checkout.mode, "Top-up Storefront listening");
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}

/// What a storefront client needs to drive checkout and order tracking.
#[derive(Clone, Debug, Serialize)] pub struct SettingsResponse { pub checkout_mode: &'static str, pub messenger_url: String, pub poll_interval_secs: u64 }

type ApiError = (StatusCode, String);

fn store_error(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound(id) => (StatusCode::NOT_FOUND, format!("order {id} not found")),
        StoreError::Order(e) => (StatusCode::CONFLICT, e.to_string()),
        e => { tracing::error!(error = %e, "order store failure"); (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()) }
    }
}

async fn publish(s: &AppState, event: &DomainEvent) {
    let Some(nats) = &s.nats else { return };
    match serde_json::to_vec(event) {
        Ok(payload) => if let Err(e) = nats.publish(event.subject().to_string(), payload.into()).await { tracing::warn!(error = %e, subject = event.subject(), "event publish failed") },
        Err(e) => tracing::warn!(error = %e, "event encoding failed"),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "order has no items"))] pub order_items: Vec<CartItem>,
    pub customer_info: CustomerInfo,
    #[validate(length(min = 1, message = "payment method is required"))] pub payment_method_id: String,
    #[validate(url)] pub receipt_url: Option<String>,
    pub total_price: Decimal,
}

async fn create_order(State(s): State<AppState>, Json(r): Json<CreateOrderRequest>) -> Result<(StatusCode, Json<Order>), ApiError> {
    r.validate().map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    let total = sum_line_totals(&r.order_items).map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    if total != r.total_price {
        return Err((StatusCode::UNPROCESSABLE_ENTITY, format!("total {} does not match items ({total})", r.total_price)));
    }
    let methods = s.orders.list_payment_methods().await.map_err(store_error)?;
    if !eligible_payment_methods(&methods, total).iter().any(|m| m.id == r.payment_method_id) {
        return Err((StatusCode::UNPROCESSABLE_ENTITY, format!("payment method {} is not available for this order", r.payment_method_id)));
    }
    let order = s.orders.create_order(NewOrder { order_items: r.order_items, customer_info: r.customer_info, payment_method_id: r.payment_method_id, receipt_url: r.receipt_url, total_price: total }).await.map_err(store_error)?;
    publish(&s, &order.created_event()).await;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn get_order(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Order>, ApiError> {
    s.orders.fetch_order(id).await.map_err(store_error)?.map(Json).ok_or((StatusCode::NOT_FOUND, "Not found".to_string()))
}

#[derive(Debug, Deserialize)] pub struct UpdateStatusRequest { pub status: OrderStatus }

async fn update_order_status(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<UpdateStatusRequest>) -> Result<Json<Order>, ApiError> {
    let (order, event) = s.orders.update_status(id, r.status).await.map_err(store_error)?;
    publish(&s, &event).await;
    Ok(Json(order))
}

#[derive(Debug, Deserialize)] pub struct PaymentMethodParams { pub total: Option<Decimal> }
#[derive(Debug, Serialize)] pub struct PaymentMethodsResponse { pub data: Vec<PaymentMethod>, pub total: Option<Decimal> }

async fn list_payment_methods(State(s): State<AppState>, Query(p): Query<PaymentMethodParams>) -> Result<Json<PaymentMethodsResponse>, ApiError> {
    let methods = s.orders.list_payment_methods().await.map_err(store_error)?;
    let data = match p.total {
        Some(total) => eligible_payment_methods(&methods, total).into_iter().cloned().collect(),
        None => methods,
    };
    Ok(Json(PaymentMethodsResponse { data, total: p.total }))
}

async fn run_cleanup(State(s): State<AppState>) -> Result<Json<CleanupReport>, ApiError> {
    cleanup_old_receipts(s.images.as_ref(), &s.cleanup, Utc::now()).await.map(Json).map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
