//! Checkout: buyer details, payment method, and order submission.

use thiserror::Error;
use uuid::Uuid;
use crate::config::CheckoutMode;
use crate::domain::aggregates::CartError;
use crate::orders::StoreError;
use crate::session::SessionError;
use crate::storage::UploadError;

pub mod fields;
pub mod flow;
pub mod form;
pub mod message;

pub use fields::{FieldRequirements, FieldValueKey, MissingField, ResolvedProduct};
pub use flow::{Checkout, ExistingOrder};
pub use form::CheckoutForm;

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("no payment method selected")]
    MissingPaymentMethod,

    #[error("payment method {0} is not available for this order")]
    PaymentMethodUnavailable(String),

    #[error("missing details: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    IncompleteDetails(Vec<MissingField>),

    #[error("copy the order message before sending it")]
    MessageNotCopied,

    #[error("not available in {0:?} checkout mode")]
    WrongMode(CheckoutMode),

    #[error("order {0} is still being processed")]
    OrderInProgress(Uuid),

    #[error("order could not be placed: {0}")]
    OrderFailed(#[source] StoreError),

    #[error("invalid messenger link: {0}")]
    MessengerLink(#[from] url::ParseError),

    #[error("receipt upload failed: {0}")]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl CheckoutError {
    /// Whether repeating the same action can succeed without the buyer changing anything.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::OrderFailed(_) | Self::Upload(UploadError::Io(_)) | Self::Session(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_read_like_the_other_errors() {
        let failed = CheckoutError::OrderFailed(StoreError::Unavailable("timeout".into()));
        assert_eq!(CheckoutError::MissingPaymentMethod.to_string(), "no payment method selected");
        assert_eq!(failed.to_string(), "order could not be placed: order store unavailable: timeout");
        assert!(failed.is_retryable());
    }

    #[test]
    fn test_cart_overflow_is_not_retryable() {
        let err = CheckoutError::from(CartError::PriceOverflow);
        assert_eq!(err.to_string(), "order total is too large");
        assert!(!err.is_retryable());
    }
}
