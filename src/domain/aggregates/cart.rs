//! Cart Aggregate

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::domain::aggregates::product::{CustomField, Product, SelectedAddOn, Variation};
use crate::domain::value_objects::{CartItemId, ProductId, Quantity};
use crate::session::{keys, Session, SessionError};

/// One line of the cart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    pub quantity: Quantity,
    /// Price of a single unit, discount and add-ons included.
    pub unit_price: Decimal,
    #[serde(default)]
    pub selected_variation: Option<Variation>,
    #[serde(default)]
    pub selected_add_ons: Vec<SelectedAddOn>,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
}

impl CartItem {
    pub fn product_id(&self) -> &ProductId { &self.id.base_product_id }
    pub fn line_total(&self) -> Result<Decimal, CartError> {
        self.unit_price.checked_mul(self.quantity.as_decimal()).ok_or(CartError::PriceOverflow)
    }
}

/// Sum of the line totals, failing instead of overflowing.
pub fn sum_line_totals(items: &[CartItem]) -> Result<Decimal, CartError> {
    items.iter().try_fold(Decimal::ZERO, |total, item| {
        total.checked_add(item.line_total()?).ok_or(CartError::PriceOverflow)
    })
}

/// The shopping cart, written through to the session on every change.
#[derive(Debug)]
pub struct Cart {
    items: Vec<CartItem>,
    session: Session,
}

impl Cart {
    /// Restores the cart saved in `session`, or starts empty.
    pub fn load(session: Session) -> Self {
        let items = session.load::<Vec<CartItem>>(keys::CART).unwrap_or_default();
        Self { items, session }
    }

    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn add_to_cart(
        &mut self,
        product: &Product,
        quantity: u32,
        variation: Option<&Variation>,
        add_ons: Vec<SelectedAddOn>,
    ) -> Result<CartItemId, CartError> {
        if !product.available {
            return Err(CartError::Unavailable(product.id.clone()));
        }
        let quantity = Quantity::new(quantity).ok_or(CartError::InvalidQuantity)?;
        let item = CartItem {
            id: CartItemId::generate(product.id.clone()),
            name: product.name.clone(),
            image: product.image.clone(),
            quantity,
            unit_price: product.unit_price(variation, &add_ons),
            selected_variation: variation.cloned(),
            selected_add_ons: add_ons,
            custom_fields: product.custom_fields.clone(),
        };
        let id = item.id.clone();
        tracing::debug!(item = %id, unit_price = %item.unit_price, "cart item added");
        self.items.push(item);
        if let Err(e) = self.total_price() {
            self.items.pop();
            return Err(e);
        }
        self.persist()?;
        Ok(id)
    }

    /// Sets a line's quantity; zero or below drops the line. Unknown ids are ignored.
    pub fn update_quantity(&mut self, id: &CartItemId, quantity: i64) -> Result<(), CartError> {
        let Some(pos) = self.items.iter().position(|i| &i.id == id) else { return Ok(()) };
        match Quantity::from_signed(quantity) {
            Some(q) => {
                let Some(item) = self.items.get_mut(pos) else { return Ok(()) };
                let previous = std::mem::replace(&mut item.quantity, q);
                if let Err(e) = self.total_price() {
                    if let Some(item) = self.items.get_mut(pos) {
                        item.quantity = previous;
                    }
                    return Err(e);
                }
            }
            None => {
                self.items.remove(pos);
            }
        }
        self.persist()
    }

    pub fn remove_from_cart(&mut self, id: &CartItemId) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| &i.id != id);
        if self.items.len() == before { return Ok(()); }
        self.persist()
    }

    pub fn clear_cart(&mut self) -> Result<(), CartError> {
        self.items.clear();
        self.session.remove(keys::CART)?;
        Ok(())
    }

    pub fn total_items(&self) -> u32 {
        self.items.iter().map(|i| i.quantity.value()).sum()
    }

    /// Errors only when the total does not fit a `Decimal`.
    pub fn total_price(&self) -> Result<Decimal, CartError> {
        sum_line_totals(&self.items)
    }

    /// Units of `product_id` across every line it appears on.
    pub fn quantity_of(&self, product_id: &ProductId) -> u32 {
        self.items.iter().filter(|i| i.product_id() == product_id).map(|i| i.quantity.value()).sum()
    }

    fn persist(&self) -> Result<(), CartError> {
        self.session.save(keys::CART, &self.items)?;
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum CartError {
    #[error("product {0} is not available")]
    Unavailable(ProductId),

    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("order total is too large")]
    PriceOverflow,

    #[error(transparent)]
    Session(#[from] SessionError),
}
