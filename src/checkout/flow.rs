//! The checkout state machine that sits between the cart and a placed order.

use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::Arc;
use url::Url;
use uuid::Uuid;
use crate::checkout::fields::{BulkSlot, FieldRequirements, MissingField, DEFAULT_FIELD_KEY, DEFAULT_FIELD_LABEL};
use crate::checkout::form::CheckoutForm;
use crate::checkout::message::{messenger_link, order_message};
use crate::checkout::CheckoutError;
use crate::config::{CheckoutMode, CheckoutSettings};
use crate::domain::aggregates::{
    eligible_payment_methods, Cart, CartItem, CustomerInfo, NewOrder, OrderStatus, PaymentMethod,
};
use crate::domain::value_objects::ProductId;
use crate::orders::{Dismissal, OrderStatusPoller, OrderStore};
use crate::session::Session;
use crate::storage::{ImageStore, RECEIPTS_BUCKET};

pub const PAYMENT_METHOD_INFO_KEY: &str = "Payment Method";

/// An order placed earlier in this session, found again on entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExistingOrder {
    pub id: Uuid,
    pub status: OrderStatus,
}

impl ExistingOrder {
    /// A pending or processing order must be tracked, not placed again.
    pub fn blocks_new_order(&self) -> bool { !self.status.is_terminal() }
}

pub struct Checkout<O, I> {
    session: Session,
    orders: Arc<O>,
    images: Arc<I>,
    settings: CheckoutSettings,
    payment_methods: Vec<PaymentMethod>,
    items: Vec<CartItem>,
    total: Decimal,
    requirements: FieldRequirements,
    form: CheckoutForm,
    payment_method: Option<PaymentMethod>,
    has_copied_message: bool,
    existing_order: Option<ExistingOrder>,
}

impl<O, I> std::fmt::Debug for Checkout<O, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkout")
            .field("mode", &self.settings.mode)
            .field("total", &self.total)
            .field("payment_method", &self.payment_method.as_ref().map(|m| &m.id))
            .field("existing_order", &self.existing_order)
            .finish_non_exhaustive()
    }
}

impl<O: OrderStore, I: ImageStore> Checkout<O, I> {
    /// Enters checkout for `cart`, resuming the persisted form and re-attaching
    /// any order still recorded in the session.
    pub async fn enter(
        session: Session,
        orders: Arc<O>,
        images: Arc<I>,
        settings: CheckoutSettings,
        payment_methods: Vec<PaymentMethod>,
        cart: &Cart,
    ) -> Result<Self, CheckoutError> {
        let form = CheckoutForm::load(&session);
        let mut checkout = Self {
            session,
            orders,
            images,
            settings,
            payment_methods,
            items: cart.items().to_vec(),
            total: cart.total_price()?,
            requirements: FieldRequirements::resolve(cart.items()),
            form,
            payment_method: None,
            has_copied_message: false,
            existing_order: None,
        };
        checkout.restore_payment_method()?;
        checkout.reattach_existing_order().await?;
        Ok(checkout)
    }

    fn restore_payment_method(&mut self) -> Result<(), CheckoutError> {
        let Some(saved) = self.form.payment_method_id.clone() else { return Ok(()) };
        match self.payment_methods.iter().find(|m| m.id == saved) {
            Some(method) if method.accepts(self.total) => {
                self.payment_method = Some(method.clone());
                Ok(())
            }
            _ => {
                tracing::debug!(method = %saved, total = %self.total, "dropping saved payment method");
                self.form.payment_method_id = None;
                self.save()
            }
        }
    }

    async fn reattach_existing_order(&mut self) -> Result<(), CheckoutError> {
        let Some(id) = self.session.current_order_id() else { return Ok(()) };
        match self.orders.fetch_order(id).await {
            Ok(Some(order)) if order.status == OrderStatus::Approved => {
                tracing::info!(order_id = %id, "previous order approved, starting fresh");
                self.session.clear_current_order_id()?;
            }
            Ok(Some(order)) => {
                tracing::info!(order_id = %id, status = %order.status, "re-attached previous order");
                self.existing_order = Some(ExistingOrder { id, status: order.status });
            }
            Ok(None) => {
                tracing::warn!(order_id = %id, "previous order not found, clearing stale reference");
                self.session.clear_current_order_id()?;
            }
            Err(e) => {
                tracing::warn!(order_id = %id, error = %e, "could not check previous order");
            }
        }
        Ok(())
    }

    /// Follows a cart change: re-derives the required fields and drops a
    /// payment method the new total no longer qualifies for.
    pub fn update_cart(&mut self, cart: &Cart) -> Result<(), CheckoutError> {
        self.items = cart.items().to_vec();
        self.total = cart.total_price()?;
        self.requirements = FieldRequirements::resolve(cart.items());
        let ineligible = self.payment_method.as_ref().is_some_and(|m| !m.accepts(self.total));
        if ineligible {
            tracing::info!(total = %self.total, "selected payment method no longer eligible");
            self.clear_payment_method()?;
        }
        Ok(())
    }

    pub fn mode(&self) -> CheckoutMode { self.settings.mode }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn total(&self) -> Decimal { self.total }
    pub fn form(&self) -> &CheckoutForm { &self.form }
    pub fn requirements(&self) -> &FieldRequirements { &self.requirements }
    pub fn payment_method(&self) -> Option<&PaymentMethod> { self.payment_method.as_ref() }
    pub fn existing_order(&self) -> Option<ExistingOrder> { self.existing_order }
    pub fn has_copied_message(&self) -> bool { self.has_copied_message }

    pub fn eligible_payment_methods(&self) -> Vec<&PaymentMethod> {
        eligible_payment_methods(&self.payment_methods, self.total)
    }

    pub fn select_payment_method(&mut self, id: &str) -> Result<(), CheckoutError> {
        let method = self
            .eligible_payment_methods()
            .into_iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| CheckoutError::PaymentMethodUnavailable(id.to_string()))?;
        self.form.payment_method_id = Some(method.id.clone());
        self.payment_method = Some(method);
        self.save()
    }

    pub fn clear_payment_method(&mut self) -> Result<(), CheckoutError> {
        self.payment_method = None;
        self.form.payment_method_id = None;
        self.save()
    }

    /// Returns `false` when the product or position does not ask for a value.
    pub fn set_field_value(&mut self, product: &ProductId, position: usize, value: &str) -> Result<bool, CheckoutError> {
        if !self.requirements.set_value(&mut self.form, product, position, value) {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    pub fn set_default_value(&mut self, value: &str) -> Result<(), CheckoutError> {
        FieldRequirements::set_default_value(&mut self.form, value);
        self.save()
    }

    pub fn toggle_bulk_product(&mut self, product: &ProductId, selected: bool) -> Result<(), CheckoutError> {
        if !self.requirements.bulk_available() {
            return Ok(());
        }
        self.requirements.toggle_bulk_product(&mut self.form, product, selected);
        self.save()
    }

    pub fn set_bulk_value(&mut self, index: usize, value: &str) -> Result<(), CheckoutError> {
        self.requirements.set_bulk_value(&mut self.form, index, value);
        self.save()
    }

    pub fn bulk_slots(&self) -> Vec<BulkSlot<'_>> { self.requirements.bulk_slots(&self.form) }

    pub fn missing_fields(&self) -> Vec<MissingField> { self.requirements.missing_fields(&self.form) }

    pub fn is_details_valid(&self) -> bool { self.requirements.is_details_valid(&self.form) }

    /// Uploads a payment receipt. On failure the attempt is forgotten so the buyer can retry.
    pub async fn upload_receipt(&mut self, file_name: &str, bytes: Vec<u8>) -> Result<String, CheckoutError> {
        self.form.receipt_preview = Some(file_name.to_string());
        match self.images.upload(RECEIPTS_BUCKET, file_name, bytes).await {
            Ok(url) => {
                self.form.receipt_image_url = Some(url.clone());
                self.save()?;
                Ok(url)
            }
            Err(e) => {
                tracing::warn!(file = file_name, error = %e, "receipt upload failed");
                self.form.receipt_preview = None;
                self.form.receipt_image_url = None;
                self.save()?;
                Err(e.into())
            }
        }
    }

    pub fn remove_receipt(&mut self) -> Result<(), CheckoutError> {
        self.form.receipt_image_url = None;
        self.form.receipt_preview = None;
        self.has_copied_message = false;
        self.save()
    }

    pub fn order_message(&self) -> String {
        order_message(
            &self.requirements,
            &self.form,
            &self.items,
            self.total,
            self.payment_method.as_ref().map(|m| m.name.as_str()),
        )
    }

    /// Returns the message for the clipboard and unlocks sending.
    pub fn copy_message(&mut self) -> Result<String, CheckoutError> {
        if self.payment_method.is_none() {
            return Err(CheckoutError::MissingPaymentMethod);
        }
        self.has_copied_message = true;
        Ok(self.order_message())
    }

    /// Messenger mode: the deep link that opens a chat with the order pre-filled.
    pub fn submit_via_messenger(&self) -> Result<Url, CheckoutError> {
        if self.settings.mode != CheckoutMode::Messenger {
            return Err(CheckoutError::WrongMode(self.settings.mode));
        }
        self.check_ready()?;
        if !self.has_copied_message {
            return Err(CheckoutError::MessageNotCopied);
        }
        let link = messenger_link(&self.settings.messenger_url, &self.order_message())?;
        tracing::info!(total = %self.total, "order sent via messenger");
        Ok(link)
    }

    /// Direct mode: creates the order and returns an opened tracker for it.
    pub async fn place_order(&mut self) -> Result<OrderStatusPoller<O>, CheckoutError> {
        if self.settings.mode != CheckoutMode::Direct {
            return Err(CheckoutError::WrongMode(self.settings.mode));
        }
        let method = self.check_ready()?.clone();
        if let Some(existing) = self.existing_order.filter(ExistingOrder::blocks_new_order) {
            return Err(CheckoutError::OrderInProgress(existing.id));
        }
        let new_order = NewOrder {
            order_items: self.items.clone(),
            customer_info: self.customer_info(&method),
            payment_method_id: method.id.clone(),
            receipt_url: self.form.receipt_image_url.clone(),
            total_price: self.total,
        };
        let order = self.orders.create_order(new_order).await.map_err(|e| {
            tracing::warn!(error = %e, "order creation failed");
            CheckoutError::OrderFailed(e)
        })?;
        self.session.set_current_order_id(order.id)?;
        self.existing_order = Some(ExistingOrder { id: order.id, status: order.status });
        tracing::info!(order_id = %order.id, reference = %order.reference(), total = %order.total_price, "order placed");

        let mut poller = OrderStatusPoller::new(self.orders.clone(), self.session.clone(), order.id);
        poller.open().await;
        Ok(poller)
    }

    /// A tracker for the re-attached order, not yet opened.
    pub fn track_existing_order(&self) -> Option<OrderStatusPoller<O>> {
        self.existing_order
            .map(|existing| OrderStatusPoller::new(self.orders.clone(), self.session.clone(), existing.id))
    }

    /// Applies what the buyer saw in the tracker once it is closed.
    pub fn tracker_closed(&mut self, poller: &OrderStatusPoller<O>, dismissal: Dismissal) {
        match dismissal {
            Dismissal::ReturnToMenu => {
                self.existing_order = None;
                self.form = CheckoutForm::default();
                self.payment_method = None;
                self.has_copied_message = false;
            }
            Dismissal::Stay => {
                if let Some(status) = poller.status() {
                    self.existing_order = Some(ExistingOrder { id: poller.order_id(), status });
                }
            }
        }
    }

    fn check_ready(&self) -> Result<&PaymentMethod, CheckoutError> {
        if self.items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let method = self.payment_method.as_ref().ok_or(CheckoutError::MissingPaymentMethod)?;
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(CheckoutError::IncompleteDetails(missing));
        }
        Ok(method)
    }

    fn customer_info(&self, method: &PaymentMethod) -> CustomerInfo {
        let mut info = CustomerInfo::new();
        info.insert(PAYMENT_METHOD_INFO_KEY.to_string(), Value::String(method.name.clone()));
        if self.requirements.is_default() {
            if let Some(ign) = self.form.value(DEFAULT_FIELD_KEY).filter(|v| !v.is_empty()) {
                info.insert(DEFAULT_FIELD_LABEL.to_string(), Value::String(ign.to_string()));
            }
        } else {
            for product in self.requirements.products() {
                for (label, value) in product.filled_values(&self.form) {
                    info.insert(label.to_string(), Value::String(value.to_string()));
                }
            }
        }
        info
    }

    fn save(&self) -> Result<(), CheckoutError> {
        self.form.save(&self.session)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{CustomField, Product};
    use crate::orders::{MemoryOrderStore, TickOutcome};
    use crate::session::keys;
    use crate::storage::LocalImageStore;
    use serde_json::json;

    struct Harness {
        session: Session,
        orders: Arc<MemoryOrderStore>,
        images: Arc<LocalImageStore>,
        _dir: tempfile::TempDir,
    }

    impl Harness {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            Self {
                session: Session::in_memory(),
                orders: Arc::new(MemoryOrderStore::new()),
                images: Arc::new(LocalImageStore::new(dir.path(), "http://localhost/receipts")),
                _dir: dir,
            }
        }

        fn cart(&self) -> Cart { Cart::load(self.session.clone()) }

        async fn enter(&self, mode: CheckoutMode, cart: &Cart) -> Checkout<MemoryOrderStore, LocalImageStore> {
            let settings = CheckoutSettings { mode, ..CheckoutSettings::default() };
            Checkout::enter(self.session.clone(), self.orders.clone(), self.images.clone(), settings, methods(), cart)
                .await
                .unwrap()
        }
    }

    fn methods() -> Vec<PaymentMethod> {
        vec![
            PaymentMethod::new("gcash", "GCash").with_max_order_amount(Decimal::new(500, 0)),
            PaymentMethod::new("bank", "BPI"),
        ]
    }

    fn game_a() -> Product { Product::new("game-a", "Game A", Decimal::new(100, 0)) }

    #[tokio::test]
    async fn test_direct_order_end_to_end() {
        let h = Harness::new();
        let mut cart = h.cart();
        cart.add_to_cart(&game_a(), 2, None, vec![]).unwrap();
        assert_eq!(cart.total_price().unwrap(), Decimal::new(200, 0));

        let mut checkout = h.enter(CheckoutMode::Direct, &cart).await;
        assert!(checkout.requirements().is_default());
        checkout.set_default_value("Player1").unwrap();
        checkout.select_payment_method("gcash").unwrap();

        let poller = checkout.place_order().await.unwrap();
        let order = poller.order().unwrap().clone();
        assert_eq!(order.total_price, Decimal::new(200, 0));
        assert_eq!(
            Value::Object(order.customer_info.clone()),
            json!({"Payment Method": "GCash", "IGN": "Player1"})
        );
        assert_eq!(order.payment_method_id, "gcash");
        assert_eq!(order.order_items.len(), 1);
        assert_eq!(h.session.current_order_id(), Some(order.id));
        assert_eq!(poller.status(), Some(OrderStatus::Pending));
        assert!(poller.is_open());
    }

    #[tokio::test]
    async fn test_custom_fields_become_customer_info() {
        let h = Harness::new();
        let mut cart = h.cart();
        let game = Product::new("mlbb", "MLBB", Decimal::new(50, 0))
            .with_custom_field(CustomField::new("uid", "User ID", true))
            .with_custom_field(CustomField::new("zone", "Zone ID", true));
        cart.add_to_cart(&game, 1, None, vec![]).unwrap();

        let mut checkout = h.enter(CheckoutMode::Direct, &cart).await;
        checkout.select_payment_method("bank").unwrap();
        checkout.set_field_value(&game.id, 0, "12345").unwrap();
        assert!(matches!(checkout.place_order().await, Err(CheckoutError::IncompleteDetails(m)) if m.len() == 1));

        checkout.set_field_value(&game.id, 1, "6789").unwrap();
        let poller = checkout.place_order().await.unwrap();
        let info = &poller.order().unwrap().customer_info;
        assert_eq!(info.get("User ID"), Some(&json!("12345")));
        assert_eq!(info.get("Zone ID"), Some(&json!("6789")));
    }

    #[tokio::test]
    async fn test_failed_create_persists_nothing() {
        let h = Harness::new();
        let mut cart = h.cart();
        cart.add_to_cart(&game_a(), 1, None, vec![]).unwrap();
        let mut checkout = h.enter(CheckoutMode::Direct, &cart).await;
        checkout.set_default_value("Player1").unwrap();
        checkout.select_payment_method("bank").unwrap();

        h.orders.set_fail_creates(true);
        let err = checkout.place_order().await.unwrap_err();
        assert!(err.is_retryable());
        assert!(h.session.current_order_id().is_none());
        assert!(checkout.existing_order().is_none());

        h.orders.set_fail_creates(false);
        assert!(checkout.place_order().await.is_ok());
    }

    #[tokio::test]
    async fn test_requires_payment_method() {
        let h = Harness::new();
        let mut cart = h.cart();
        cart.add_to_cart(&game_a(), 1, None, vec![]).unwrap();
        let mut checkout = h.enter(CheckoutMode::Direct, &cart).await;
        checkout.set_default_value("Player1").unwrap();
        assert!(matches!(checkout.place_order().await, Err(CheckoutError::MissingPaymentMethod)));
        assert!(h.orders.is_empty());
    }

    #[tokio::test]
    async fn test_ineligible_method_is_dropped_when_total_grows() {
        let h = Harness::new();
        let mut cart = h.cart();
        let line = cart.add_to_cart(&game_a(), 4, None, vec![]).unwrap();
        let mut checkout = h.enter(CheckoutMode::Direct, &cart).await;
        checkout.select_payment_method("gcash").unwrap();
        assert_eq!(h.session.get_string(keys::PAYMENT_METHOD_ID).as_deref(), Some("gcash"));

        cart.update_quantity(&line, 5).unwrap();
        checkout.update_cart(&cart).unwrap();
        assert!(checkout.payment_method().is_none());
        assert!(h.session.get_string(keys::PAYMENT_METHOD_ID).is_none());
        assert!(matches!(
            checkout.select_payment_method("gcash"),
            Err(CheckoutError::PaymentMethodUnavailable(_))
        ));
        assert_eq!(checkout.eligible_payment_methods().len(), 1);
    }

    #[tokio::test]
    async fn test_saved_method_restored_only_when_eligible() {
        let h = Harness::new();
        let mut cart = h.cart();
        cart.add_to_cart(&game_a(), 1, None, vec![]).unwrap();
        h.session.set_string(keys::PAYMENT_METHOD_ID, "gcash").unwrap();
        let checkout = h.enter(CheckoutMode::Direct, &cart).await;
        assert_eq!(checkout.payment_method().map(|m| m.id.as_str()), Some("gcash"));

        let mut big = h.cart();
        big.add_to_cart(&game_a(), 9, None, vec![]).unwrap();
        let checkout = h.enter(CheckoutMode::Direct, &big).await;
        assert!(checkout.payment_method().is_none());
        assert!(h.session.get_string(keys::PAYMENT_METHOD_ID).is_none());
    }

    #[tokio::test]
    async fn test_pending_order_is_reattached_and_blocks_resubmission() {
        let h = Harness::new();
        let mut cart = h.cart();
        cart.add_to_cart(&game_a(), 1, None, vec![]).unwrap();
        let mut first = h.enter(CheckoutMode::Direct, &cart).await;
        first.set_default_value("Player1").unwrap();
        first.select_payment_method("bank").unwrap();
        let placed = first.place_order().await.unwrap().order_id();

        let mut again = h.enter(CheckoutMode::Direct, &cart).await;
        assert_eq!(again.existing_order(), Some(ExistingOrder { id: placed, status: OrderStatus::Pending }));
        assert_eq!(again.form().value(DEFAULT_FIELD_KEY), Some("Player1"));
        assert!(matches!(again.place_order().await, Err(CheckoutError::OrderInProgress(id)) if id == placed));
        assert_eq!(h.orders.len(), 1);

        let mut tracker = again.track_existing_order().unwrap();
        assert_eq!(tracker.open().await, TickOutcome::Updated(OrderStatus::Pending));
    }

    #[tokio::test]
    async fn test_rejected_order_allows_order_again() {
        let h = Harness::new();
        let mut cart = h.cart();
        cart.add_to_cart(&game_a(), 1, None, vec![]).unwrap();
        let mut checkout = h.enter(CheckoutMode::Direct, &cart).await;
        checkout.set_default_value("Player1").unwrap();
        checkout.select_payment_method("bank").unwrap();
        let mut poller = checkout.place_order().await.unwrap();
        let first = poller.order_id();

        h.orders.update_status(first, OrderStatus::Rejected).await.unwrap();
        poller.tick().await;
        let dismissal = poller.dismiss().unwrap();
        assert_eq!(dismissal, Dismissal::Stay);
        checkout.tracker_closed(&poller, dismissal);
        assert_eq!(checkout.existing_order().map(|e| e.status), Some(OrderStatus::Rejected));
        assert_eq!(h.session.current_order_id(), Some(first));

        let second = checkout.place_order().await.unwrap().order_id();
        assert_ne!(first, second);
        assert_eq!(h.session.current_order_id(), Some(second));
    }

    #[tokio::test]
    async fn test_approved_order_resets_checkout() {
        let h = Harness::new();
        let mut cart = h.cart();
        cart.add_to_cart(&game_a(), 1, None, vec![]).unwrap();
        let mut checkout = h.enter(CheckoutMode::Direct, &cart).await;
        checkout.set_default_value("Player1").unwrap();
        checkout.select_payment_method("bank").unwrap();
        let mut poller = checkout.place_order().await.unwrap();

        h.orders.update_status(poller.order_id(), OrderStatus::Approved).await.unwrap();
        poller.tick().await;
        let dismissal = poller.dismiss().unwrap();
        assert_eq!(dismissal, Dismissal::ReturnToMenu);
        checkout.tracker_closed(&poller, dismissal);
        assert!(checkout.existing_order().is_none());
        assert!(checkout.payment_method().is_none());
        assert_eq!(CheckoutForm::load(&h.session), CheckoutForm::default());
        assert!(h.session.current_order_id().is_none());
    }

    #[tokio::test]
    async fn test_entry_heals_stale_or_finished_orders() {
        let h = Harness::new();
        let mut cart = h.cart();
        cart.add_to_cart(&game_a(), 1, None, vec![]).unwrap();

        h.session.set_current_order_id(Uuid::new_v4()).unwrap();
        let checkout = h.enter(CheckoutMode::Direct, &cart).await;
        assert!(checkout.existing_order().is_none());
        assert!(h.session.current_order_id().is_none());

        let mut first = h.enter(CheckoutMode::Direct, &cart).await;
        first.set_default_value("P").unwrap();
        first.select_payment_method("bank").unwrap();
        let id = first.place_order().await.unwrap().order_id();
        h.orders.update_status(id, OrderStatus::Approved).await.unwrap();
        let checkout = h.enter(CheckoutMode::Direct, &cart).await;
        assert!(checkout.existing_order().is_none());
        assert!(h.session.current_order_id().is_none());
    }

    #[tokio::test]
    async fn test_messenger_requires_copy_first() {
        let h = Harness::new();
        let mut cart = h.cart();
        cart.add_to_cart(&game_a(), 2, None, vec![]).unwrap();
        let mut checkout = h.enter(CheckoutMode::Messenger, &cart).await;
        checkout.set_default_value("Player1").unwrap();

        assert!(matches!(checkout.copy_message(), Err(CheckoutError::MissingPaymentMethod)));
        checkout.select_payment_method("gcash").unwrap();
        assert!(matches!(checkout.submit_via_messenger(), Err(CheckoutError::MessageNotCopied)));

        let message = checkout.copy_message().unwrap();
        assert!(message.contains("TOTAL: ₱200"));
        let link = checkout.submit_via_messenger().unwrap();
        assert!(link.as_str().starts_with("https://m.me/Rnold77?text="));
        assert!(h.orders.is_empty());
        assert!(matches!(checkout.place_order().await, Err(CheckoutError::WrongMode(CheckoutMode::Messenger))));

        checkout.remove_receipt().unwrap();
        assert!(!checkout.has_copied_message());
    }

    #[tokio::test]
    async fn test_receipt_upload_success_and_failure() {
        let h = Harness::new();
        let mut cart = h.cart();
        cart.add_to_cart(&game_a(), 1, None, vec![]).unwrap();
        let mut checkout = h.enter(CheckoutMode::Direct, &cart).await;

        let err = checkout.upload_receipt("receipt.png", vec![]).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Upload(_)));
        assert!(checkout.form().receipt_preview.is_none());
        assert!(checkout.form().receipt_image_url.is_none());

        let url = checkout.upload_receipt("receipt.png", vec![1, 2, 3]).await.unwrap();
        assert_eq!(checkout.form().receipt_image_url.as_deref(), Some(url.as_str()));
        assert_eq!(h.session.get_string(keys::RECEIPT_IMAGE_URL), Some(url));

        checkout.remove_receipt().unwrap();
        assert!(h.session.get_string(keys::RECEIPT_IMAGE_URL).is_none());
    }

    #[tokio::test]
    async fn test_bulk_entry_through_checkout() {
        let h = Harness::new();
        let mut cart = h.cart();
        let a = Product::new("a", "A", Decimal::ONE).with_custom_field(CustomField::new("uid", "UID", true));
        let b = Product::new("b", "B", Decimal::ONE).with_custom_field(CustomField::new("uid", "UID", true));
        cart.add_to_cart(&a, 1, None, vec![]).unwrap();
        cart.add_to_cart(&b, 1, None, vec![]).unwrap();
        let mut checkout = h.enter(CheckoutMode::Direct, &cart).await;

        checkout.toggle_bulk_product(&a.id, true).unwrap();
        checkout.toggle_bulk_product(&b.id, true).unwrap();
        assert_eq!(checkout.bulk_slots().len(), 1);
        checkout.set_bulk_value(0, "999").unwrap();
        assert!(checkout.is_details_valid());

        let resumed = CheckoutForm::load(&h.session);
        assert_eq!(resumed.bulk_selected_products.len(), 2);
        assert_eq!(resumed.value("b_0_uid"), Some("999"));
    }
}
