//! Postgres-backed order store.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;
use crate::domain::aggregates::{CartItem, CustomerInfo, NewOrder, Order, OrderStatus, PaymentMethod};
use crate::domain::events::DomainEvent;
use super::{OrderStore, StoreError};

#[derive(Clone, Debug)]
pub struct PgOrderStore {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_items: Json<Vec<CartItem>>,
    customer_info: Json<CustomerInfo>,
    payment_method_id: String,
    receipt_url: Option<String>,
    total_price: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;
    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: row.id, order_items: row.order_items.0, customer_info: row.customer_info.0,
            payment_method_id: row.payment_method_id, receipt_url: row.receipt_url,
            total_price: row.total_price, status: row.status.parse()?,
            created_at: row.created_at, updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentMethodRow {
    id: String,
    name: String,
    account_number: String,
    account_name: String,
    qr_code_url: Option<String>,
    max_order_amount: Option<Decimal>,
}

impl From<PaymentMethodRow> for PaymentMethod {
    fn from(row: PaymentMethodRow) -> Self {
        PaymentMethod {
            id: row.id, name: row.name, account_number: row.account_number,
            account_name: row.account_name, qr_code_url: row.qr_code_url,
            max_order_amount: row.max_order_amount,
        }
    }
}

const ORDER_COLUMNS: &str =
    "id, order_items, customer_info, payment_method_id, receipt_url, total_price, status, created_at, updated_at";

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    /// Active payment methods in display order.
    pub async fn list_payment_methods(&self) -> Result<Vec<PaymentMethod>, StoreError> {
        let rows = sqlx::query_as::<_, PaymentMethodRow>(
            "SELECT id, name, account_number, account_name, qr_code_url, max_order_amount FROM payment_methods WHERE active ORDER BY sort_order, name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PaymentMethod::from).collect())
    }
}

impl OrderStore for PgOrderStore {
    async fn create_order(&self, new: NewOrder) -> Result<Order, StoreError> {
        let order = Order::create(new);
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order.id)
        .bind(Json(&order.order_items))
        .bind(Json(&order.customer_info))
        .bind(&order.payment_method_id)
        .bind(&order.receipt_url)
        .bind(order.total_price)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .fetch_one(&self.pool)
        .await?;
        tracing::info!(order_id = %row.id, total = %row.total_price, "order created");
        row.try_into()
    }

    async fn fetch_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Order::try_from).transpose()
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<(Order, DomainEvent), StoreError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound(id))?;
        let mut order = Order::try_from(row)?;
        let event = order.transition(status)?;
        sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(order.id)
            .bind(order.status.as_str())
            .bind(order.updated_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::info!(order_id = %id, status = %order.status, "order status updated");
        Ok((order, event))
    }
}
