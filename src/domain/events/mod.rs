//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;
use crate::domain::aggregates::OrderStatus;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "domain", rename_all = "snake_case")]
pub enum DomainEvent {
    Order(OrderEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { order_id: Uuid, total: Decimal, payment_method_id: String },
    StatusChanged { order_id: Uuid, from: OrderStatus, to: OrderStatus },
}

impl DomainEvent {
    /// Message-bus subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Order(OrderEvent::Created { .. }) => "orders.created",
            Self::Order(OrderEvent::StatusChanged { .. }) => "orders.status_changed",
        }
    }
}
