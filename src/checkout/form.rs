//! The in-progress checkout form, persisted so a reload resumes where the buyer left off.

use std::collections::BTreeMap;
use crate::domain::value_objects::ProductId;
use crate::session::{keys, Session, SessionError};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckoutForm {
    pub payment_method_id: Option<String>,
    /// Field values addressed by the rendered [`FieldValueKey`](super::fields::FieldValueKey).
    pub custom_field_values: BTreeMap<String, String>,
    pub receipt_image_url: Option<String>,
    pub receipt_preview: Option<String>,
    /// Bulk slot index to value.
    pub bulk_input_values: BTreeMap<usize, String>,
    pub bulk_selected_products: Vec<ProductId>,
}

impl CheckoutForm {
    pub fn load(session: &Session) -> Self {
        Self {
            payment_method_id: session.get_string(keys::PAYMENT_METHOD_ID),
            custom_field_values: session.load(keys::CUSTOM_FIELD_VALUES).unwrap_or_default(),
            receipt_image_url: session.get_string(keys::RECEIPT_IMAGE_URL),
            receipt_preview: session.get_string(keys::RECEIPT_PREVIEW),
            bulk_input_values: session.load(keys::BULK_INPUT_VALUES).unwrap_or_default(),
            bulk_selected_products: session.load(keys::BULK_SELECTED_GAMES).unwrap_or_default(),
        }
    }

    pub fn save(&self, session: &Session) -> Result<(), SessionError> {
        session.set_optional(keys::PAYMENT_METHOD_ID, self.payment_method_id.as_deref())?;
        session.save(keys::CUSTOM_FIELD_VALUES, &self.custom_field_values)?;
        session.set_optional(keys::RECEIPT_IMAGE_URL, self.receipt_image_url.as_deref())?;
        session.set_optional(keys::RECEIPT_PREVIEW, self.receipt_preview.as_deref())?;
        session.save(keys::BULK_INPUT_VALUES, &self.bulk_input_values)?;
        session.save(keys::BULK_SELECTED_GAMES, &self.bulk_selected_products)?;
        Ok(())
    }

    /// Forgets every persisted checkout key.
    pub fn clear(session: &Session) -> Result<(), SessionError> {
        for key in [
            keys::PAYMENT_METHOD_ID,
            keys::CUSTOM_FIELD_VALUES,
            keys::RECEIPT_IMAGE_URL,
            keys::RECEIPT_PREVIEW,
            keys::BULK_INPUT_VALUES,
            keys::BULK_SELECTED_GAMES,
        ] {
            session.remove(key)?;
        }
        Ok(())
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.custom_field_values.get(key).map(String::as_str)
    }
}
