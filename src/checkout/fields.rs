//! Which buyer details an order needs, and the bulk-entry shortcut.
//!
//! Each product in the cart may declare an ordered list of [`CustomField`]s
//! (player id, server, ...). A product bought several times, possibly as
//! different packages, is asked for its details once. When nothing in the
//! cart declares fields, the order falls back to a single in-game-name field.
//!
//! Bulk entry lets the buyer fill matching positions of several products at
//! once. Values are aligned by field *position*, not by key: slot 0 writes the
//! first field of every selected product whatever that field is called. A
//! bulk write is a broadcast; editing one product's field afterwards is never
//! undone until the bulk value itself changes again.

use std::fmt;
use crate::checkout::form::CheckoutForm;
use crate::domain::aggregates::{CartItem, CustomField};
use crate::domain::value_objects::ProductId;

pub const DEFAULT_FIELD_KEY: &str = "default_ign";
pub const DEFAULT_FIELD_LABEL: &str = "IGN";

/// Address of one field value: product, position in its field list, field key.
/// The position keeps duplicate keys apart. `_` and `%` in the product id are
/// percent-escaped so the first `_` always ends the id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FieldValueKey<'a> {
    pub product_id: &'a ProductId,
    pub position: usize,
    pub key: &'a str,
}

impl fmt::Display for FieldValueKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.product_id.as_str().chars() {
            match c {
                '%' => f.write_str("%25")?,
                '_' => f.write_str("%5F")?,
                c => write!(f, "{c}")?,
            }
        }
        write!(f, "_{}_{}", self.position, self.key)
    }
}

/// A product whose details must be collected.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedProduct {
    pub product_id: ProductId,
    pub name: String,
    pub fields: Vec<CustomField>,
}

impl ResolvedProduct {
    pub fn value_key(&self, position: usize) -> Option<String> {
        self.fields.get(position).map(|field| {
            FieldValueKey { product_id: &self.product_id, position, key: &field.key }.to_string()
        })
    }

    /// `(label, value)` for each field that has a non-empty value, in field order.
    pub fn filled_values<'a>(&'a self, form: &'a CheckoutForm) -> Vec<(&'a str, &'a str)> {
        self.fields
            .iter()
            .enumerate()
            .filter_map(|(position, field)| {
                let key = FieldValueKey { product_id: &self.product_id, position, key: &field.key };
                form.value(&key.to_string()).filter(|v| !v.is_empty()).map(|v| (field.label.as_str(), v))
            })
            .collect()
    }
}

/// A bulk input slot. `field` is the first selected product's field at that
/// position, used for the label; `None` when that product has fewer fields.
#[derive(Clone, Debug, PartialEq)]
pub struct BulkSlot<'a> {
    pub index: usize,
    pub field: Option<&'a CustomField>,
}

/// A required field left blank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MissingField {
    pub product: String,
    pub label: String,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.product.is_empty() { write!(f, "{}", self.label) } else { write!(f, "{}: {}", self.product, self.label) }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldRequirements {
    /// At least one cart product declares fields; one entry per product.
    PerProduct(Vec<ResolvedProduct>),
    /// Nothing declares fields; a single in-game name covers the order.
    Default,
}

impl FieldRequirements {
    /// Derives the requirements from the cart, keeping cart order and the
    /// first line seen for each product.
    pub fn resolve(items: &[CartItem]) -> Self {
        let mut products: Vec<ResolvedProduct> = Vec::new();
        for item in items.iter().filter(|i| !i.custom_fields.is_empty()) {
            if products.iter().any(|p| &p.product_id == item.product_id()) {
                continue;
            }
            products.push(ResolvedProduct {
                product_id: item.product_id().clone(),
                name: item.name.clone(),
                fields: item.custom_fields.clone(),
            });
        }
        if products.is_empty() { Self::Default } else { Self::PerProduct(products) }
    }

    pub fn products(&self) -> &[ResolvedProduct] {
        match self {
            Self::PerProduct(products) => products,
            Self::Default => &[],
        }
    }

    pub fn product(&self, id: &ProductId) -> Option<&ResolvedProduct> {
        self.products().iter().find(|p| &p.product_id == id)
    }

    pub fn is_default(&self) -> bool { matches!(self, Self::Default) }

    pub fn bulk_available(&self) -> bool { self.products().len() >= 2 }

    fn selected<'a>(&'a self, form: &'a CheckoutForm) -> impl Iterator<Item = &'a ResolvedProduct> + 'a {
        self.products().iter().filter(move |p| form.bulk_selected_products.contains(&p.product_id))
    }

    /// One slot per position up to the longest field list among selected products.
    pub fn bulk_slots<'a>(&'a self, form: &'a CheckoutForm) -> Vec<BulkSlot<'a>> {
        let mut selected = self.selected(form).peekable();
        let Some(reference) = selected.peek().copied() else { return Vec::new() };
        let width = selected.map(|p| p.fields.len()).max().unwrap_or(0);
        (0..width).map(|index| BulkSlot { index, field: reference.fields.get(index) }).collect()
    }

    /// Adds or drops a product from the bulk selection. Adding re-broadcasts
    /// the current bulk values so the new product picks them up.
    pub fn toggle_bulk_product(&self, form: &mut CheckoutForm, id: &ProductId, selected: bool) {
        let present = form.bulk_selected_products.contains(id);
        if selected {
            if present || self.product(id).is_none() {
                return;
            }
            form.bulk_selected_products.push(id.clone());
            self.broadcast_all(form);
        } else if present {
            form.bulk_selected_products.retain(|p| p != id);
        }
    }

    /// Stores bulk slot `index` and writes `value` into that position of every selected product.
    pub fn set_bulk_value(&self, form: &mut CheckoutForm, index: usize, value: impl Into<String>) {
        let value = value.into();
        form.bulk_input_values.insert(index, value.clone());
        self.broadcast(form, index, &value);
    }

    fn broadcast_all(&self, form: &mut CheckoutForm) {
        let values: Vec<(usize, String)> = form.bulk_input_values.iter().map(|(i, v)| (*i, v.clone())).collect();
        for (index, value) in values {
            self.broadcast(form, index, &value);
        }
    }

    fn broadcast(&self, form: &mut CheckoutForm, index: usize, value: &str) {
        let targets: Vec<String> = self.selected(form).filter_map(|p| p.value_key(index)).collect();
        for key in targets {
            form.custom_field_values.insert(key, value.to_string());
        }
    }

    /// Sets one product's field directly. Unknown products or positions are ignored.
    pub fn set_value(&self, form: &mut CheckoutForm, id: &ProductId, position: usize, value: impl Into<String>) -> bool {
        let Some(key) = self.product(id).and_then(|p| p.value_key(position)) else { return false };
        form.custom_field_values.insert(key, value.into());
        true
    }

    pub fn set_default_value(form: &mut CheckoutForm, value: impl Into<String>) {
        form.custom_field_values.insert(DEFAULT_FIELD_KEY.to_string(), value.into());
    }

    pub fn missing_fields(&self, form: &CheckoutForm) -> Vec<MissingField> {
        let blank = |key: &str| form.value(key).map_or(true, |v| v.trim().is_empty());
        match self {
            Self::Default => {
                if blank(DEFAULT_FIELD_KEY) {
                    vec![MissingField { product: String::new(), label: DEFAULT_FIELD_LABEL.to_string() }]
                } else {
                    Vec::new()
                }
            }
            Self::PerProduct(products) => products
                .iter()
                .flat_map(|p| {
                    p.fields.iter().enumerate().filter_map(move |(position, field)| {
                        let key = FieldValueKey { product_id: &p.product_id, position, key: &field.key };
                        (field.required && blank(&key.to_string()))
                            .then(|| MissingField { product: p.name.clone(), label: field.label.clone() })
                    })
                })
                .collect(),
        }
    }

    pub fn is_details_valid(&self, form: &CheckoutForm) -> bool {
        self.missing_fields(form).is_empty()
    }
}
