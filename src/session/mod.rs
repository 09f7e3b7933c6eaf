//! Reload-durable session state.
//!
//! The storefront keeps the cart, the current view, menu filters, the
//! in-progress checkout form and the id of the last placed order in a plain
//! string key-value store (browser local storage in production). Everything in
//! the crate reaches that store through [`Session`], which adds typed JSON
//! access on top of [`KeyValueStore`]. A missing or unreadable key is never an
//! error: callers get `None` and fall back to their documented default.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use uuid::Uuid;

/// Storage key names. These are a compatibility contract with sessions that
/// were written by earlier builds, so they never change.
pub mod keys {
    pub const CART: &str = "tarchier_cart";
    pub const CUSTOMER_VIEW: &str = "tarchier_customer_view";
    pub const MENU_CATEGORY: &str = "tarchier_menu_category";
    pub const MENU_SEARCH: &str = "tarchier_menu_search";
    pub const PAYMENT_METHOD_ID: &str = "tarchier_checkout_paymentMethodId";
    pub const CUSTOM_FIELD_VALUES: &str = "tarchier_checkout_customFieldValues";
    pub const RECEIPT_IMAGE_URL: &str = "tarchier_checkout_receiptImageUrl";
    pub const RECEIPT_PREVIEW: &str = "tarchier_checkout_receiptPreview";
    pub const BULK_INPUT_VALUES: &str = "tarchier_checkout_bulkInputValues";
    pub const BULK_SELECTED_GAMES: &str = "tarchier_checkout_bulkSelectedGames";
    pub const CURRENT_ORDER_ID: &str = "current_order_id";
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session storage unavailable: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not encode session value: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("session storage lock poisoned")]
    Poisoned,
}

/// Raw string storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), SessionError>;
    fn remove(&self, key: &str) -> Result<(), SessionError>;
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.entries.write().map_err(|_| SessionError::Poisoned)?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.entries.write().map_err(|_| SessionError::Poisoned)?.remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object on disk, rewritten on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileStore {
    /// Opens `path`, starting empty if the file is missing or not a JSON object.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "discarding unreadable session file");
                HashMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, entries: RwLock::new(entries) })
    }

    fn flush(&self, entries: &HashMap<String, String>) -> Result<(), SessionError> {
        let raw = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let mut entries = self.entries.write().map_err(|_| SessionError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        let mut entries = self.entries.write().map_err(|_| SessionError::Poisoned)?;
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

/// Typed handle over a shared [`KeyValueStore`]. Cheap to clone.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self { Self { store } }

    pub fn in_memory() -> Self { Self::new(Arc::new(MemoryStore::new())) }

    pub fn get_string(&self, key: &str) -> Option<String> { self.store.get(key) }

    pub fn set_string(&self, key: &str, value: &str) -> Result<(), SessionError> { self.store.set(key, value) }

    /// Stores `Some` values and removes the key for `None`.
    pub fn set_optional(&self, key: &str, value: Option<&str>) -> Result<(), SessionError> {
        match value {
            Some(v) => self.store.set(key, v),
            None => self.store.remove(key),
        }
    }

    pub fn remove(&self, key: &str) -> Result<(), SessionError> { self.store.remove(key) }

    /// Decodes a JSON value. Malformed data is treated as absent.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.store.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "ignoring malformed session value");
                None
            }
        }
    }

    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), SessionError> {
        let raw = serde_json::to_string(value)?;
        self.store.set(key, &raw)
    }

    pub fn current_order_id(&self) -> Option<Uuid> {
        let raw = self.store.get(keys::CURRENT_ORDER_ID)?;
        match Uuid::parse_str(raw.trim()) {
            Ok(id) => Some(id),
            Err(_) => {
                tracing::warn!(value = %raw, "ignoring malformed current order id");
                None
            }
        }
    }

    pub fn set_current_order_id(&self, id: Uuid) -> Result<(), SessionError> {
        self.store.set(keys::CURRENT_ORDER_ID, &id.to_string())
    }

    pub fn clear_current_order_id(&self) -> Result<(), SessionError> {
        self.store.remove(keys::CURRENT_ORDER_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_missing_and_malformed_values_are_absent() {
        let session = Session::in_memory();
        assert!(session.load::<Vec<String>>(keys::BULK_SELECTED_GAMES).is_none());
        session.set_string(keys::BULK_SELECTED_GAMES, "{not json").unwrap();
        assert!(session.load::<Vec<String>>(keys::BULK_SELECTED_GAMES).is_none());
        session.set_string(keys::CURRENT_ORDER_ID, "nope").unwrap();
        assert!(session.current_order_id().is_none());
    }

    #[test]
    fn test_typed_round_trip() {
        let session = Session::in_memory();
        let mut values = BTreeMap::new();
        values.insert("mlbb_0_uid".to_string(), "1234".to_string());
        session.save(keys::CUSTOM_FIELD_VALUES, &values).unwrap();
        assert_eq!(session.load::<BTreeMap<String, String>>(keys::CUSTOM_FIELD_VALUES), Some(values));
        session.set_optional(keys::RECEIPT_PREVIEW, None).unwrap();
        assert!(session.get_string(keys::RECEIPT_PREVIEW).is_none());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let id = Uuid::new_v4();
        {
            let session = Session::new(Arc::new(FileStore::open(&path).unwrap()));
            session.set_current_order_id(id).unwrap();
            session.set_string(keys::MENU_SEARCH, "genshin").unwrap();
        }
        let session = Session::new(Arc::new(FileStore::open(&path).unwrap()));
        assert_eq!(session.current_order_id(), Some(id));
        assert_eq!(session.get_string(keys::MENU_SEARCH).as_deref(), Some("genshin"));
        session.clear_current_order_id().unwrap();
        let session = Session::new(Arc::new(FileStore::open(&path).unwrap()));
        assert!(session.current_order_id().is_none());
    }

    #[test]
    fn test_file_store_ignores_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "garbage").unwrap();
        let store = FileStore::open(&path).unwrap();
        assert!(store.get(keys::CART).is_none());
    }
}
