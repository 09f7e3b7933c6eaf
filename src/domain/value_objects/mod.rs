//! Value Objects for the storefront

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identifier of a catalog product (a game).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(value: impl Into<String>) -> Self { Self(value.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl From<&str> for ProductId {
    fn from(value: &str) -> Self { Self::new(value) }
}

/// Identity of one cart line.
///
/// The same product may sit in the cart several times (one line per package
/// picked), so each line carries the product it came from plus a token minted
/// when the line was created.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartItemId {
    pub base_product_id: ProductId,
    pub instance_token: Uuid,
}

impl CartItemId {
    pub fn generate(base_product_id: ProductId) -> Self {
        Self { base_product_id, instance_token: Uuid::new_v4() }
    }
}

impl fmt::Display for CartItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.base_product_id, self.instance_token)
    }
}

/// Quantity of a cart line. Never zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub const ONE: Quantity = Quantity(1);

    /// Returns `None` for zero.
    pub fn new(value: u32) -> Option<Self> {
        if value == 0 { None } else { Some(Self(value)) }
    }

    /// Signed input as it arrives from a quantity stepper; anything below one is no quantity at all.
    pub fn from_signed(value: i64) -> Option<Self> {
        u32::try_from(value).ok().and_then(Self::new)
    }

    pub fn value(&self) -> u32 { self.0 }
    pub fn as_decimal(&self) -> Decimal { Decimal::from(self.0) }
}

impl Default for Quantity { fn default() -> Self { Self::ONE } }

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;
    fn try_from(value: u32) -> Result<Self, Self::Error> { Self::new(value).ok_or(QuantityError::Zero) }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self { q.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuantityError {
    #[error("quantity must be at least 1")]
    Zero,
}

/// Percentage taken off a product's price while it is on discount.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscountPercent(Decimal);

impl DiscountPercent {
    /// Clamped to `0..=100`.
    pub fn new(value: Decimal) -> Self {
        Self(value.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED))
    }

    pub fn value(&self) -> Decimal { self.0 }

    /// `price * (1 - discount / 100)`.
    pub fn apply(&self, price: Decimal) -> Decimal {
        price * (Decimal::ONE - self.0 / Decimal::ONE_HUNDRED)
    }
}

/// Formats an amount the way the storefront prints pesos: no trailing zeros.
pub fn format_peso(amount: Decimal) -> String {
    format!("₱{}", amount.normalize())
}
