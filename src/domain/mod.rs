//! Storefront domain: catalog products, cart, orders, payment methods.
pub mod aggregates;
pub mod events;
pub mod value_objects;
