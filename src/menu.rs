//! Storefront navigation: which screen the buyer is on and how the catalog is filtered.

use std::fmt;
use std::str::FromStr;
use crate::domain::aggregates::{Cart, Product};
use crate::session::{keys, Session, SessionError};

pub const ALL_CATEGORY: &str = "all";
pub const POPULAR_CATEGORY: &str = "popular";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum View {
    #[default]
    Menu,
    Cart,
    Checkout,
}

impl View {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Menu => "menu",
            Self::Cart => "cart",
            Self::Checkout => "checkout",
        }
    }

    /// The persisted view, or the menu when nothing valid was saved.
    pub fn load(session: &Session) -> Self {
        session.get_string(keys::CUSTOMER_VIEW).and_then(|v| v.parse().ok()).unwrap_or_default()
    }

    pub fn save(self, session: &Session) -> Result<(), SessionError> {
        session.set_string(keys::CUSTOMER_VIEW, self.as_str())
    }

    /// Cart and checkout make no sense with nothing in the cart.
    pub fn for_cart(self, cart: &Cart) -> Self {
        match self {
            Self::Cart | Self::Checkout if cart.is_empty() => Self::Menu,
            view => view,
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "menu" => Ok(Self::Menu),
            "cart" => Ok(Self::Cart),
            "checkout" => Ok(Self::Checkout),
            other => Err(format!("unknown view `{other}`")),
        }
    }
}

/// Category tab and search box of the catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuFilter {
    category: String,
    search: String,
}

impl Default for MenuFilter {
    fn default() -> Self { Self { category: ALL_CATEGORY.to_string(), search: String::new() } }
}

impl MenuFilter {
    pub fn load(session: &Session) -> Self {
        Self {
            category: session.get_string(keys::MENU_CATEGORY).unwrap_or_else(|| ALL_CATEGORY.to_string()),
            search: session.get_string(keys::MENU_SEARCH).unwrap_or_default(),
        }
    }

    pub fn save(&self, session: &Session) -> Result<(), SessionError> {
        session.set_string(keys::MENU_CATEGORY, &self.category)?;
        session.set_string(keys::MENU_SEARCH, &self.search)
    }

    pub fn category(&self) -> &str { &self.category }
    pub fn search(&self) -> &str { &self.search }

    /// Switching tabs clears the search.
    pub fn select_category(&mut self, category: impl Into<String>) {
        self.category = category.into();
        self.search.clear();
    }

    /// Typing a search widens the view to every category.
    pub fn set_search(&mut self, query: impl Into<String>) {
        self.search = query.into();
        if !self.search.trim().is_empty() {
            self.category = ALL_CATEGORY.to_string();
        }
    }

    /// Drops a "popular" tab once the loaded catalog has nothing popular.
    pub fn reconcile(&mut self, products: &[Product]) {
        if self.category == POPULAR_CATEGORY && !products.is_empty() && !products.iter().any(|p| p.popular) {
            self.category = ALL_CATEGORY.to_string();
        }
    }

    /// Category first, then a case-insensitive name match.
    pub fn filter_products<'a>(&self, products: &'a [Product]) -> Vec<&'a Product> {
        let query = self.search.trim().to_lowercase();
        products
            .iter()
            .filter(|p| match self.category.as_str() {
                ALL_CATEGORY => true,
                POPULAR_CATEGORY => p.popular,
                category => p.category == category,
            })
            .filter(|p| query.is_empty() || p.name.to_lowercase().contains(&query))
            .collect()
    }
}
