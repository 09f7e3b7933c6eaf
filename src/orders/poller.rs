//! Tracks one order until staff approve or reject it.
//!
//! The poller only observes: status changes happen in the order store. It
//! fetches once when opened, then once per tick. Before every tick it checks
//! whether the known status is terminal, so a finished order is never fetched
//! again, whatever timer is still pending.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;
use crate::checkout::form::CheckoutForm;
use crate::domain::aggregates::{Order, OrderStatus};
use crate::session::{Session, SessionError};
use super::OrderStore;

/// Result of one fetch attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Updated(OrderStatus),
    Unchanged(OrderStatus),
    /// The store has no such order.
    Missing,
    /// The store could not be reached; last known state kept.
    Failed,
    /// No fetch was made: the tracker is closed or the order is finished.
    Skipped,
}

/// What the caller should do after the buyer dismisses the tracker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dismissal {
    /// Order approved; session cleared, go back to browsing.
    ReturnToMenu,
    /// Order still open or rejected; stay where you are.
    Stay,
}

pub struct OrderStatusPoller<O> {
    store: Arc<O>,
    session: Session,
    order_id: Uuid,
    order: Option<Order>,
    open: bool,
    loading: bool,
}

impl<O> std::fmt::Debug for OrderStatusPoller<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderStatusPoller")
            .field("order_id", &self.order_id)
            .field("status", &self.status())
            .field("open", &self.open)
            .field("loading", &self.loading)
            .finish()
    }
}

impl<O> OrderStatusPoller<O> {
    pub fn new(store: Arc<O>, session: Session, order_id: Uuid) -> Self {
        Self { store, session, order_id, order: None, open: false, loading: false }
    }

    pub fn order_id(&self) -> Uuid { self.order_id }
    pub fn order(&self) -> Option<&Order> { self.order.as_ref() }
    pub fn status(&self) -> Option<OrderStatus> { self.order.as_ref().map(|o| o.status) }
    pub fn is_open(&self) -> bool { self.open }
    pub fn is_loading(&self) -> bool { self.loading }
    pub fn is_terminal(&self) -> bool { self.status().is_some_and(OrderStatus::is_terminal) }
    pub fn status_label(&self) -> Option<&'static str> { self.status().map(OrderStatus::display_label) }

    /// The guard checked before each tick.
    pub fn should_poll(&self) -> bool { self.open && !self.is_terminal() }

    /// Hides the tracker. Order data is kept for the next open.
    pub fn close(&mut self) {
        self.open = false;
    }

    /// Closes the tracker for good. An approved order ends the checkout:
    /// the current order id and the checkout form are removed from the session.
    pub fn dismiss(&mut self) -> Result<Dismissal, SessionError> {
        self.close();
        if self.status() == Some(OrderStatus::Approved) {
            self.session.clear_current_order_id()?;
            CheckoutForm::clear(&self.session)?;
            tracing::info!(order_id = %self.order_id, "approved order dismissed, session cleared");
            return Ok(Dismissal::ReturnToMenu);
        }
        Ok(Dismissal::Stay)
    }
}

impl<O: OrderStore> OrderStatusPoller<O> {
    /// Opens the tracker. Without data yet this is the initial load: the
    /// loading flag is raised until it resolves, and a missing order clears
    /// the stale id from the session. Reopening with known data shows it
    /// immediately; a finished order is not fetched again.
    pub async fn open(&mut self) -> TickOutcome {
        self.open = true;
        if self.order.is_none() {
            self.loading = true;
            let outcome = self.fetch(true).await;
            self.loading = false;
            outcome
        } else if self.is_terminal() {
            TickOutcome::Skipped
        } else {
            self.fetch(false).await
        }
    }

    pub async fn tick(&mut self) -> TickOutcome {
        if !self.should_poll() {
            return TickOutcome::Skipped;
        }
        self.fetch(false).await
    }

    /// Opens the tracker and polls every `period` until the order is finished
    /// or `close` fires. Each fetch completes before the next tick is awaited.
    pub async fn run(&mut self, period: Duration, mut close: watch::Receiver<bool>) -> Option<OrderStatus> {
        if *close.borrow() {
            return self.status();
        }
        self.open().await;
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;
        while self.should_poll() {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                changed = close.changed() => {
                    if changed.is_err() || *close.borrow() {
                        self.close();
                    }
                }
            }
        }
        self.status()
    }

    async fn fetch(&mut self, initial: bool) -> TickOutcome {
        match self.store.fetch_order(self.order_id).await {
            Ok(Some(order)) => {
                let previous = self.status();
                let changed = previous != Some(order.status)
                    || self.order.as_ref().map(|o| o.updated_at) != Some(order.updated_at);
                let status = order.status;
                if changed {
                    tracing::info!(order_id = %self.order_id, ?previous, ?status, "order status observed");
                    self.order = Some(order);
                    TickOutcome::Updated(status)
                } else {
                    TickOutcome::Unchanged(status)
                }
            }
            Ok(None) if initial => {
                tracing::warn!(order_id = %self.order_id, "order not found, clearing stale reference");
                self.order = None;
                if let Err(e) = self.session.clear_current_order_id() {
                    tracing::warn!(error = %e, "could not clear stale order id");
                }
                TickOutcome::Missing
            }
            Ok(None) => {
                tracing::debug!(order_id = %self.order_id, "order missing on poll, keeping last known state");
                TickOutcome::Missing
            }
            Err(e) => {
                tracing::warn!(order_id = %self.order_id, error = %e, "order fetch failed");
                TickOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use crate::domain::aggregates::{CustomerInfo, NewOrder};
    use crate::orders::MemoryOrderStore;
    use crate::session::keys;

    async fn placed(store: &MemoryOrderStore, session: &Session) -> Uuid {
        let order = store
            .create_order(NewOrder {
                order_items: vec![], customer_info: CustomerInfo::new(), payment_method_id: "gcash".into(),
                receipt_url: None, total_price: Decimal::new(200, 0),
            })
            .await
            .unwrap();
        session.set_current_order_id(order.id).unwrap();
        order.id
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_approved_then_stops() {
        let store = Arc::new(MemoryOrderStore::new());
        let session = Session::in_memory();
        let id = placed(&store, &session).await;
        store.script(id, [Some(OrderStatus::Pending), Some(OrderStatus::Pending), Some(OrderStatus::Approved)]);

        let mut poller = OrderStatusPoller::new(store.clone(), session.clone(), id);
        let (_tx, rx) = watch::channel(false);
        let status = poller.run(Duration::from_secs(3), rx).await;

        assert_eq!(status, Some(OrderStatus::Approved));
        assert_eq!(store.fetch_count(), 3);
        assert_eq!(poller.tick().await, TickOutcome::Skipped);
        assert_eq!(store.fetch_count(), 3);
        assert_eq!(poller.status_label(), Some("Succeeded"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_signal_stops_polling() {
        let store = Arc::new(MemoryOrderStore::new());
        let session = Session::in_memory();
        let id = placed(&store, &session).await;
        let mut poller = OrderStatusPoller::new(store.clone(), session, id);
        let (tx, rx) = watch::channel(false);

        let closer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            tx.send(true).ok();
            tx
        });
        let status = poller.run(Duration::from_secs(3), rx).await;
        let _tx = closer.await.unwrap();

        assert_eq!(status, Some(OrderStatus::Pending));
        assert!(!poller.is_open());
        let fetched = store.fetch_count();
        assert_eq!(fetched, 4);
        assert_eq!(poller.tick().await, TickOutcome::Skipped);
        assert_eq!(store.fetch_count(), fetched);
    }

    #[tokio::test]
    async fn test_initial_not_found_clears_stale_id() {
        let store = Arc::new(MemoryOrderStore::new());
        let session = Session::in_memory();
        let stale = Uuid::new_v4();
        session.set_current_order_id(stale).unwrap();

        let mut poller = OrderStatusPoller::new(store, session.clone(), stale);
        assert_eq!(poller.open().await, TickOutcome::Missing);
        assert!(!poller.is_loading());
        assert!(poller.order().is_none());
        assert!(session.current_order_id().is_none());
    }

    #[tokio::test]
    async fn test_later_not_found_is_ignored() {
        let store = Arc::new(MemoryOrderStore::new());
        let session = Session::in_memory();
        let id = placed(&store, &session).await;
        store.script(id, [Some(OrderStatus::Processing), None]);

        let mut poller = OrderStatusPoller::new(store, session.clone(), id);
        assert_eq!(poller.open().await, TickOutcome::Updated(OrderStatus::Processing));
        assert_eq!(poller.tick().await, TickOutcome::Missing);
        assert_eq!(poller.status(), Some(OrderStatus::Processing));
        assert_eq!(session.current_order_id(), Some(id));
    }

    #[tokio::test]
    async fn test_reopen_keeps_state_without_loading() {
        let store = Arc::new(MemoryOrderStore::new());
        let session = Session::in_memory();
        let id = placed(&store, &session).await;
        store.script(id, [Some(OrderStatus::Rejected)]);

        let mut poller = OrderStatusPoller::new(store.clone(), session.clone(), id);
        poller.open().await;
        poller.close();
        assert_eq!(poller.status(), Some(OrderStatus::Rejected));

        assert_eq!(poller.open().await, TickOutcome::Skipped);
        assert!(!poller.is_loading());
        assert_eq!(store.fetch_count(), 1);

        assert_eq!(poller.dismiss().unwrap(), Dismissal::Stay);
        assert_eq!(session.current_order_id(), Some(id));
    }

    #[tokio::test]
    async fn test_reopen_pending_order_refreshes_in_place() {
        let store = Arc::new(MemoryOrderStore::new());
        let session = Session::in_memory();
        let id = placed(&store, &session).await;
        store.script(id, [Some(OrderStatus::Pending), None, Some(OrderStatus::Processing)]);

        let mut poller = OrderStatusPoller::new(store.clone(), session.clone(), id);
        assert_eq!(poller.open().await, TickOutcome::Updated(OrderStatus::Pending));
        poller.close();
        assert!(!poller.should_poll());
        assert!(poller.order().is_some());

        // A miss on reopen is a poll miss, not an initial load: nothing is cleared.
        assert_eq!(poller.open().await, TickOutcome::Missing);
        assert!(poller.is_open());
        assert!(!poller.is_loading());
        assert_eq!(poller.status(), Some(OrderStatus::Pending));
        assert_eq!(session.current_order_id(), Some(id));
        assert_eq!(store.fetch_count(), 2);

        poller.close();
        assert_eq!(poller.open().await, TickOutcome::Updated(OrderStatus::Processing));
        assert!(!poller.is_loading());
        assert_eq!(store.fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_dismissing_approved_order_clears_session() {
        let store = Arc::new(MemoryOrderStore::new());
        let session = Session::in_memory();
        let id = placed(&store, &session).await;
        session.set_string(keys::PAYMENT_METHOD_ID, "gcash").unwrap();
        store.script(id, [Some(OrderStatus::Approved)]);

        let mut poller = OrderStatusPoller::new(store, session.clone(), id);
        poller.open().await;
        assert_eq!(poller.dismiss().unwrap(), Dismissal::ReturnToMenu);
        assert!(session.current_order_id().is_none());
        assert!(session.get_string(keys::PAYMENT_METHOD_ID).is_none());
    }
}
