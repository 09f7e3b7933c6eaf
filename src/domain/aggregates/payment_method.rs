//! Payment methods offered at checkout

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An account the buyer can pay into (e-wallet, bank).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    pub name: String,
    pub account_number: String,
    pub account_name: String,
    #[serde(default)]
    pub qr_code_url: Option<String>,
    /// Exclusive upper bound on the order total this method accepts.
    #[serde(default)]
    pub max_order_amount: Option<Decimal>,
}

impl PaymentMethod {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(), name: name.into(), account_number: String::new(),
            account_name: String::new(), qr_code_url: None, max_order_amount: None,
        }
    }

    pub fn with_max_order_amount(mut self, max: Decimal) -> Self {
        self.max_order_amount = Some(max);
        self
    }

    pub fn accepts(&self, total: Decimal) -> bool {
        self.max_order_amount.map_or(true, |max| total < max)
    }
}

/// Methods that can take an order of `total`, in catalog order.
pub fn eligible_payment_methods(methods: &[PaymentMethod], total: Decimal) -> Vec<&PaymentMethod> {
    methods.iter().filter(|m| m.accepts(total)).collect()
}

/// File name offered when the buyer saves a method's QR code.
pub fn qr_download_name(method: &PaymentMethod) -> String {
    let slug = method.name.to_lowercase().split_whitespace().collect::<Vec<_>>().join("-");
    format!("qr-code-{slug}.png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_order_amount_is_exclusive() {
        let methods = vec![
            PaymentMethod::new("gcash", "GCash").with_max_order_amount(Decimal::new(500, 0)),
            PaymentMethod::new("bank", "Bank Transfer"),
        ];
        let ids = |total| eligible_payment_methods(&methods, total).iter().map(|m| m.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(Decimal::new(49999, 2)), vec!["gcash", "bank"]);
        assert_eq!(ids(Decimal::new(500, 0)), vec!["bank"]);
        assert_eq!(ids(Decimal::new(750, 0)), vec!["bank"]);
    }

    #[test]
    fn test_qr_download_name() {
        assert_eq!(qr_download_name(&PaymentMethod::new("m", "Maya  Wallet")), "qr-code-maya-wallet.png");
    }
}
