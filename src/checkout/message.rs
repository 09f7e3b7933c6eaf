//! The order message sent to the seller in messenger mode.

use rust_decimal::Decimal;
use url::Url;
use crate::checkout::fields::{FieldRequirements, DEFAULT_FIELD_KEY, DEFAULT_FIELD_LABEL};
use crate::checkout::form::CheckoutForm;
use crate::domain::aggregates::CartItem;
use crate::domain::value_objects::format_peso;

struct ValueGroup<'a> {
    values: Vec<&'a str>,
    names: Vec<&'a str>,
    labels: Vec<&'a str>,
}

/// Buyer details, with products that were given identical values (usually
/// through bulk entry) listed together above one shared block of fields.
fn details_section(requirements: &FieldRequirements, form: &CheckoutForm) -> String {
    if requirements.is_default() {
        return format!("{DEFAULT_FIELD_LABEL}: {}", form.value(DEFAULT_FIELD_KEY).unwrap_or_default());
    }
    let mut groups: Vec<ValueGroup<'_>> = Vec::new();
    for product in requirements.products() {
        let filled = product.filled_values(form);
        if filled.is_empty() {
            continue;
        }
        let (labels, values): (Vec<&str>, Vec<&str>) = filled.into_iter().unzip();
        let existing = groups.iter().position(|g| g.values == values);
        match existing.and_then(|i| groups.get_mut(i)) {
            Some(group) => group.names.push(product.name.as_str()),
            None => groups.push(ValueGroup { values, names: vec![product.name.as_str()], labels }),
        }
    }
    let mut lines: Vec<String> = Vec::new();
    for group in &groups {
        lines.extend(group.names.iter().map(|n| n.to_string()));
        lines.extend(group.labels.iter().zip(&group.values).map(|(label, value)| format!("{label}: {value}")));
    }
    lines.join("\n")
}

fn item_line(item: &CartItem) -> String {
    let mut line = format!("• {}", item.name);
    if let Some(variation) = &item.selected_variation {
        line.push_str(&format!(" ({})", variation.name));
    }
    line.push_str(&format!(" x{} - {}", item.quantity.value(), item.line_total().map(format_peso).unwrap_or_default()));
    line
}

pub fn order_message(
    requirements: &FieldRequirements,
    form: &CheckoutForm,
    items: &[CartItem],
    total: Decimal,
    payment_method: Option<&str>,
) -> String {
    let lines: Vec<String> = items.iter().map(item_line).collect();
    format!(
        "{}\n\nORDER DETAILS:\n{}\n\nTOTAL: {}\n\nPayment: {}",
        details_section(requirements, form),
        lines.join("\n"),
        format_peso(total),
        payment_method.unwrap_or_default(),
    )
    .trim()
    .to_string()
}

/// `<base>?text=<message>`, the message query-encoded.
pub fn messenger_link(base: &str, message: &str) -> Result<Url, url::ParseError> {
    Url::parse_with_params(base, &[("text", message)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{Cart, CustomField, Product};
    use crate::domain::value_objects::ProductId;
    use crate::session::Session;

    fn game(id: &str, name: &str) -> Product {
        Product::new(id, name, Decimal::new(100, 0))
            .with_custom_field(CustomField::new("uid", "User ID", true))
            .with_custom_field(CustomField::new("server", "Server", false))
    }

    #[test]
    fn test_default_field_message() {
        let mut cart = Cart::load(Session::in_memory());
        let p = Product::new("a", "Game A", Decimal::new(100, 0)).with_variation("v", "100 Gems", Decimal::new(100, 0));
        cart.add_to_cart(&p, 2, p.variation("v"), vec![]).unwrap();
        let reqs = FieldRequirements::resolve(cart.items());
        let mut form = CheckoutForm::default();
        FieldRequirements::set_default_value(&mut form, "Player1");

        let msg = order_message(&reqs, &form, cart.items(), cart.total_price().unwrap(), Some("GCash"));
        assert_eq!(
            msg,
            "IGN: Player1\n\nORDER DETAILS:\n• Game A (100 Gems) x2 - ₱200\n\nTOTAL: ₱200\n\nPayment: GCash"
        );
    }

    #[test]
    fn test_bulk_filled_products_share_a_block() {
        let mut cart = Cart::load(Session::in_memory());
        for p in [game("a", "Game A"), game("b", "Game B"), game("c", "Game C")] {
            cart.add_to_cart(&p, 1, None, vec![]).unwrap();
        }
        let reqs = FieldRequirements::resolve(cart.items());
        let mut form = CheckoutForm::default();
        reqs.toggle_bulk_product(&mut form, &ProductId::new("a"), true);
        reqs.toggle_bulk_product(&mut form, &ProductId::new("b"), true);
        reqs.set_bulk_value(&mut form, 0, "555");
        reqs.set_value(&mut form, &ProductId::new("c"), 0, "777");

        let msg = order_message(&reqs, &form, cart.items(), cart.total_price().unwrap(), None);
        assert!(msg.starts_with("Game A\nGame B\nUser ID: 555\nGame C\nUser ID: 777\n\nORDER DETAILS:"));
        assert!(msg.ends_with("TOTAL: ₱300\n\nPayment:"));
    }

    #[test]
    fn test_messenger_link_encodes_message() {
        let link = messenger_link("https://m.me/shop", "IGN: A&B\nTOTAL: ₱5").unwrap();
        assert_eq!(link.host_str(), Some("m.me"));
        let text = link.query_pairs().find(|(k, _)| k == "text").map(|(_, v)| v.into_owned());
        assert_eq!(text.as_deref(), Some("IGN: A&B\nTOTAL: ₱5"));
        assert!(!link.as_str().contains('\n'));
    }
}
