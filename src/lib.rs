//! Top-up Storefront
//!
//! Checkout core of a game top-up shop: buyers fill a cart with currency
//! packages, give the account details each game needs, and either send the
//! order to the seller over Messenger or place it directly and watch staff
//! approve it.
//!
//! ## Features
//! - Session-persisted cart with package variations and add-ons
//! - Per-game custom fields with bulk entry
//! - Payment methods limited by order total
//! - Messenger hand-off or direct order placement
//! - Order status tracking until approval or rejection
//! - Payment receipt upload and expiry

use thiserror::Error;

pub mod checkout;
pub mod config;
pub mod domain;
pub mod menu;
pub mod orders;
pub mod session;
pub mod storage;

pub use checkout::{Checkout, CheckoutError, CheckoutForm, ExistingOrder, FieldRequirements};
pub use config::{CheckoutMode, CheckoutSettings, Config, ConfigError};
pub use domain::aggregates::{Cart, CartError, CartItem, Order, OrderError, OrderStatus, PaymentMethod, Product};
pub use menu::{MenuFilter, View};
pub use orders::{MemoryOrderStore, OrderStatusPoller, OrderStore, PgOrderStore, StoreError};
pub use session::{Session, SessionError};
pub use storage::{ImageStore, LocalImageStore, UploadError};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
