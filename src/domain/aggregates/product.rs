//! Product Aggregate

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::value_objects::{DiscountPercent, ProductId};

/// Catalog entry for a game, with the currency packages it is sold in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    pub base_price: Decimal,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub popular: bool,
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default)]
    pub discount: Option<DiscountPercent>,
    #[serde(default)]
    pub variations: Vec<Variation>,
    #[serde(default)]
    pub add_ons: Vec<AddOn>,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
}

fn default_available() -> bool { true }

/// A currency package of a product, e.g. "86 Diamonds".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Variation { pub id: String, pub name: String, pub price: Decimal }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddOn { pub id: String, pub name: String, pub price: Decimal }

/// An add-on picked for a cart line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectedAddOn {
    pub name: String,
    pub price: Decimal,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 { 1 }

/// Information the seller needs from the buyer for this product, e.g. a player id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub placeholder: String,
    #[serde(default)]
    pub required: bool,
}

impl CustomField {
    pub fn new(key: impl Into<String>, label: impl Into<String>, required: bool) -> Self {
        Self { key: key.into(), label: label.into(), placeholder: String::new(), required }
    }
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, base_price: Decimal) -> Self {
        Self {
            id: ProductId::new(id), name: name.into(), description: String::new(), image: None,
            base_price, category: String::new(), popular: false, available: true, discount: None,
            variations: vec![], add_ons: vec![], custom_fields: vec![],
        }
    }

    pub fn with_variation(mut self, id: impl Into<String>, name: impl Into<String>, price: Decimal) -> Self {
        self.variations.push(Variation { id: id.into(), name: name.into(), price });
        self
    }

    pub fn with_custom_field(mut self, field: CustomField) -> Self {
        self.custom_fields.push(field);
        self
    }

    pub fn with_discount(mut self, percent: Decimal) -> Self {
        self.discount = Some(DiscountPercent::new(percent));
        self
    }

    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn variation(&self, id: &str) -> Option<&Variation> {
        self.variations.iter().find(|v| v.id == id)
    }

    /// Price of one unit: the package (or base) price with the product discount
    /// applied once, plus add-ons at list price.
    pub fn unit_price(&self, variation: Option<&Variation>, add_ons: &[SelectedAddOn]) -> Decimal {
        let base = variation.map_or(self.base_price, |v| v.price);
        let discounted = self.discount.map_or(base, |d| d.apply(base));
        let extras: Decimal = add_ons.iter().map(|a| a.price * Decimal::from(a.quantity)).sum();
        discounted + extras
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_price_uses_variation_and_discount() {
        let p = Product::new("mlbb", "Mobile Legends", Decimal::new(50, 0))
            .with_variation("86", "86 Diamonds", Decimal::new(100, 0))
            .with_discount(Decimal::new(20, 0));
        assert_eq!(p.unit_price(p.variation("86"), &[]), Decimal::new(80, 0));
        assert_eq!(p.unit_price(None, &[]), Decimal::new(40, 0));
    }

    #[test]
    fn test_add_ons_are_not_discounted() {
        let p = Product::new("gi", "Genshin", Decimal::new(100, 0)).with_discount(Decimal::new(50, 0));
        let extras = [SelectedAddOn { name: "Welkin".into(), price: Decimal::new(10, 0), quantity: 2 }];
        assert_eq!(p.unit_price(None, &extras), Decimal::new(70, 0));
    }

    #[test]
    fn test_deserialize_defaults() {
        let p: Product = serde_json::from_str(r#"{"id":"x","name":"X","base_price":"5"}"#).unwrap();
        assert!(p.available);
        assert!(p.custom_fields.is_empty());
    }
}
