//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod payment_method;

pub use product::{AddOn, CustomField, Product, SelectedAddOn, Variation};
pub use order::{CustomerInfo, NewOrder, Order, OrderError, OrderStatus};
pub use cart::{sum_line_totals, Cart, CartError, CartItem};
pub use payment_method::{eligible_payment_methods, PaymentMethod};
