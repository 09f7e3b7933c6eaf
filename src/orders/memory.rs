//! In-process order store.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;
use crate::domain::aggregates::{NewOrder, Order, OrderStatus};
use crate::domain::events::DomainEvent;
use super::{OrderStore, StoreError};

/// Keeps orders in a map. Besides serving tests, it can replay a scripted
/// status history per order, one step per fetch, to stand in for staff action.
#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    orders: Mutex<HashMap<Uuid, Order>>,
    scripts: Mutex<HashMap<Uuid, VecDeque<Option<OrderStatus>>>>,
    fetches: AtomicUsize,
    fail_creates: AtomicBool,
}

impl MemoryOrderStore {
    pub fn new() -> Self { Self::default() }

    /// Each later fetch of `id` first applies the next step: `Some(status)`
    /// sets the status, `None` makes that single fetch report the order missing.
    pub fn script(&self, id: Uuid, steps: impl IntoIterator<Item = Option<OrderStatus>>) {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.insert(id, steps.into_iter().collect());
        }
    }

    pub fn set_fail_creates(&self, fail: bool) { self.fail_creates.store(fail, Ordering::SeqCst); }

    pub fn fetch_count(&self) -> usize { self.fetches.load(Ordering::SeqCst) }

    pub fn len(&self) -> usize { self.orders.lock().map(|o| o.len()).unwrap_or(0) }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    fn lock_orders(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, Order>>, StoreError> {
        self.orders.lock().map_err(|_| StoreError::Unavailable("order map poisoned".into()))
    }

    fn next_step(&self, id: Uuid) -> Option<Option<OrderStatus>> {
        self.scripts.lock().ok()?.get_mut(&id)?.pop_front()
    }
}

impl OrderStore for MemoryOrderStore {
    async fn create_order(&self, new: NewOrder) -> Result<Order, StoreError> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("create rejected".into()));
        }
        let order = Order::create(new);
        self.lock_orders()?.insert(order.id, order.clone());
        Ok(order)
    }

    async fn fetch_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let step = self.next_step(id);
        let mut orders = self.lock_orders()?;
        match step {
            Some(None) => Ok(None),
            Some(Some(status)) => Ok(orders.get_mut(&id).map(|o| {
                if o.status != status {
                    o.status = status;
                    o.updated_at = chrono::Utc::now();
                }
                o.clone()
            })),
            None => Ok(orders.get(&id).cloned()),
        }
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<(Order, DomainEvent), StoreError> {
        let mut orders = self.lock_orders()?;
        let order = orders.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        let event = order.transition(status)?;
        Ok((order.clone(), event))
    }
}
