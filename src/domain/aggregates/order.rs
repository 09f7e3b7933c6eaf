//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use crate::domain::aggregates::cart::CartItem;
use crate::domain::events::{DomainEvent, OrderEvent};

/// Buyer details attached to an order, keyed by field label.
///
/// Values are usually strings; a "multiple accounts" order nests an array of objects.
pub type CustomerInfo = serde_json::Map<String, serde_json::Value>;

/// A placed order. Its status is changed by staff, outside the storefront.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_items: Vec<CartItem>,
    pub customer_info: CustomerInfo,
    pub payment_method_id: String,
    #[serde(default)]
    pub receipt_url: Option<String>,
    pub total_price: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to create an order record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_items: Vec<CartItem>,
    pub customer_info: CustomerInfo,
    pub payment_method_id: String,
    #[serde(default)]
    pub receipt_url: Option<String>,
    pub total_price: Decimal,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Approved,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool { matches!(self, Self::Approved | Self::Rejected) }

    /// Text shown to the buyer. Pending and processing look the same.
    pub fn display_label(self) -> &'static str {
        match self {
            Self::Pending | Self::Processing => "Processing",
            Self::Approved => "Succeeded",
            Self::Rejected => "Rejected",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn allowed_transitions(self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Processing, Approved, Rejected],
            Processing => &[Approved, Rejected],
            Approved | Rejected => &[],
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

impl Order {
    pub fn create(new: NewOrder) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), order_items: new.order_items, customer_info: new.customer_info,
            payment_method_id: new.payment_method_id, receipt_url: new.receipt_url,
            total_price: new.total_price, status: OrderStatus::Pending, created_at: now, updated_at: now,
        }
    }

    pub fn created_event(&self) -> DomainEvent {
        DomainEvent::Order(OrderEvent::Created {
            order_id: self.id, total: self.total_price, payment_method_id: self.payment_method_id.clone(),
        })
    }

    /// Moves the order to `next`, as staff do when they review a payment.
    pub fn transition(&mut self, next: OrderStatus) -> Result<DomainEvent, OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::IllegalTransition { from: self.status, to: next });
        }
        let from = self.status;
        self.status = next;
        self.updated_at = Utc::now();
        Ok(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, from, to: next }))
    }

    /// Short reference shown to the buyer.
    pub fn reference(&self) -> String {
        self.id.simple().to_string().chars().take(8).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("unknown order status `{0}`")]
    UnknownStatus(String),

    #[error("order cannot move from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_order() -> NewOrder {
        NewOrder {
            order_items: vec![], customer_info: CustomerInfo::new(), payment_method_id: "gcash".into(),
            receipt_url: None, total_price: Decimal::new(200, 0),
        }
    }

    #[test]
    fn test_order_workflow() {
        let mut order = Order::create(new_order());
        assert_eq!(order.status, OrderStatus::Pending);
        order.transition(OrderStatus::Processing).unwrap();
        let event = order.transition(OrderStatus::Approved).unwrap();
        assert!(order.status.is_terminal());
        assert!(matches!(event, DomainEvent::Order(OrderEvent::StatusChanged { to: OrderStatus::Approved, .. })));
        assert!(order.transition(OrderStatus::Rejected).is_err());
    }

    #[test]
    fn test_status_labels_and_parsing() {
        assert_eq!(OrderStatus::Pending.display_label(), OrderStatus::Processing.display_label());
        assert_eq!(OrderStatus::Approved.display_label(), "Succeeded");
        assert_eq!("rejected".parse::<OrderStatus>().unwrap(), OrderStatus::Rejected);
        assert!("shipped".parse::<OrderStatus>().is_err());
        assert_eq!(serde_json::to_string(&OrderStatus::Processing).unwrap(), "\"processing\"");
    }

    #[test]
    fn test_reference_is_eight_chars() {
        assert_eq!(Order::create(new_order()).reference().len(), 8);
    }
}
