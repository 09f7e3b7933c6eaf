//! Order persistence and status tracking.

use std::future::Future;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::aggregates::{NewOrder, Order, OrderError, OrderStatus};
use crate::domain::events::DomainEvent;

pub mod memory;
pub mod poller;
pub mod postgres;

pub use memory::MemoryOrderStore;
pub use poller::{Dismissal, OrderStatusPoller, TickOutcome};
pub use postgres::PgOrderStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("order store unavailable: {0}")]
    Unavailable(String),

    #[error("order {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Order(#[from] OrderError),
}

/// Where orders live. Status changes happen out-of-band (staff review), so
/// readers must re-fetch to observe them.
pub trait OrderStore: Send + Sync {
    fn create_order(&self, new: NewOrder) -> impl Future<Output = Result<Order, StoreError>> + Send;

    /// `Ok(None)` when no such order exists.
    fn fetch_order(&self, id: Uuid) -> impl Future<Output = Result<Option<Order>, StoreError>> + Send;

    fn update_status(
        &self,
        id: Uuid,
        status: OrderStatus,
    ) -> impl Future<Output = Result<(Order, DomainEvent), StoreError>> + Send;
}
