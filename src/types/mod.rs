//! Domain and wire types for the seller dashboard core.
//!
//! Domain records (`SellerAccount`, `Product`) are what the dashboard
//! stores and reconciles; the remaining structs mirror provider payloads
//! and are deserialized leniently (missing numbers default to zero,
//! unknown fields are collected instead of rejected).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Display value for an account that has never completed a sync.
pub const NEVER_SYNCED: &str = "Nunca";

/// Fallback title for items the provider returns without one.
pub const UNTITLED_PRODUCT: &str = "Produto sem título";

/// Fallback category for items the provider returns without one.
pub const UNCATEGORIZED: &str = "Sem categoria";

/// Lifecycle status of a linked seller account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// Synchronized at least once and usable.
    Active,
    /// Registered locally, not yet synchronized.
    Inactive,
    /// Blocked by the provider.
    Suspended,
}

impl AccountStatus {
    /// Stable string form, matching the serialized representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Suspended => "suspended",
        }
    }
}

/// One linked marketplace seller identity.
///
/// The `id` is generated locally and survives reconciliation; `user_id`
/// is assigned by the provider on the first successful sync and becomes
/// a second stable key alongside `nickname`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SellerAccount {
    /// Locally generated identifier.
    pub id: String,
    /// Provider user id, populated by the first successful sync.
    #[serde(default)]
    pub user_id: Option<u64>,
    /// Seller nickname; reconciliation key until `user_id` is known.
    pub nickname: String,
    /// Contact email.
    pub email: String,
    /// Lifecycle status.
    pub status: AccountStatus,
    /// Derived 0-100 standing score.
    pub reputation: u8,
    /// Provider-reported sales counter.
    pub sales: u64,
    /// Number of listings found on the last sync.
    pub products: u64,
    /// Display-formatted timestamp of the last successful sync.
    pub last_sync: String,
    /// Bearer credential for API calls.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Credential for renewing the access token without re-consent.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl SellerAccount {
    /// Create a freshly registered account: inactive, zero metrics,
    /// never synchronized.
    pub fn new(nickname: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            nickname: nickname.into(),
            email: email.into(),
            status: AccountStatus::Inactive,
            reputation: 0,
            sales: 0,
            products: 0,
            last_sync: NEVER_SYNCED.to_string(),
            access_token: None,
            refresh_token: None,
        }
    }

    /// Attach an access token (builder style).
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Attach a refresh token (builder style).
    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }
}

/// Listing status of a marketplace item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    /// Listed and purchasable.
    Active,
    /// Temporarily hidden by the seller.
    Paused,
    /// Listing closed.
    Ended,
}

impl ProductStatus {
    /// Map the provider's item status string.
    ///
    /// Unrecognized values collapse to `Paused` rather than failing the
    /// whole item.
    pub fn from_provider(status: &str) -> Self {
        match status {
            "active" => Self::Active,
            "closed" => Self::Ended,
            _ => Self::Paused,
        }
    }
}

/// One marketplace listing, as stored by the dashboard.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Provider item id.
    pub id: String,
    /// Listing title.
    pub title: String,
    /// Price in the site currency.
    pub price: f64,
    /// Available stock.
    pub stock: u32,
    /// Listing status.
    pub status: ProductStatus,
    /// Nickname of the owning account.
    pub account: String,
    /// View counter. The provider does not expose this reliably, so
    /// synchronized products always carry 0 here.
    pub views: u64,
    /// Units sold.
    pub sales: u64,
    /// Category label.
    pub category: String,
    /// Picture URLs.
    #[serde(default)]
    pub images: Vec<String>,
    /// Listing description.
    #[serde(default)]
    pub description: String,
}

/// Seller reputation block inside the profile payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SellerReputation {
    /// Tier identifier, e.g. `5_green`.
    #[serde(default)]
    pub level_id: Option<String>,
    /// Power-seller grade (`platinum`, `gold`, ...), absent for
    /// ordinary sellers.
    #[serde(default)]
    pub power_seller_status: Option<String>,
}

/// Profile payload returned by `GET /users/me`.
#[derive(Clone, Debug, Deserialize)]
pub struct SellerProfile {
    /// Provider user id.
    pub id: u64,
    /// Seller nickname.
    pub nickname: String,
    /// Contact email; absent unless granted by scope.
    #[serde(default)]
    pub email: Option<String>,
    /// Provider-side account status.
    #[serde(default)]
    pub status: Option<String>,
    /// Marketplace site, e.g. `MLB`.
    #[serde(default)]
    pub site_id: Option<String>,
    /// Reputation block.
    #[serde(default)]
    pub seller_reputation: Option<SellerReputation>,
    /// Fields this crate does not interpret.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Token payload returned by the token endpoint.
///
/// Transient: only `access_token`/`refresh_token` are ever folded into a
/// [`SellerAccount`]; the payload itself is never persisted.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    /// Bearer credential.
    pub access_token: String,
    /// Usually `Bearer`.
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Validity window in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Rotation credential, present when `offline_access` was granted.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
    /// Provider user id the token belongs to.
    #[serde(default)]
    pub user_id: Option<u64>,
    /// Additional provider fields.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Sales counters from `GET /users/{id}/metrics`.
///
/// Zero-defaulting on purpose: a missing or denied metrics endpoint
/// degrades to zeroed counters instead of failing the sync.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SalesMetrics {
    /// Sales in the reported period.
    #[serde(default)]
    pub period_sales: u64,
    /// Lifetime sales.
    #[serde(default)]
    pub total_sales: u64,
    /// Fields this crate does not interpret.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Response of `GET /users/{id}/items/search`: item ids only.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ItemSearchResponse {
    /// Item ids owned by the seller.
    #[serde(default)]
    pub results: Vec<String>,
}

/// One picture entry inside an item detail payload.
#[derive(Clone, Debug, Deserialize)]
pub struct Picture {
    /// Picture URL.
    #[serde(default)]
    pub url: Option<String>,
}

/// Item detail payload from `GET /items/{id}`.
#[derive(Clone, Debug, Deserialize)]
pub struct ItemDetail {
    /// Provider item id.
    pub id: String,
    /// Listing title.
    #[serde(default)]
    pub title: Option<String>,
    /// Price in the site currency.
    #[serde(default)]
    pub price: Option<f64>,
    /// Available stock.
    #[serde(default)]
    pub available_quantity: Option<u32>,
    /// Provider listing status string.
    #[serde(default)]
    pub status: Option<String>,
    /// Units sold.
    #[serde(default)]
    pub sold_quantity: Option<u64>,
    /// Provider category id.
    #[serde(default)]
    pub category_id: Option<String>,
    /// Picture entries.
    #[serde(default)]
    pub pictures: Option<Vec<Picture>>,
    /// Listing description.
    #[serde(default)]
    pub description: Option<String>,
}

impl ItemDetail {
    /// Map into the dashboard's [`Product`] shape, applying the fixed
    /// fallbacks for fields the provider omitted. `owner` becomes the
    /// product's `account` key.
    pub fn into_product(self, owner: &str) -> Product {
        let title = match self.title {
            Some(t) if !t.trim().is_empty() => t,
            _ => UNTITLED_PRODUCT.to_string(),
        };
        let category = match self.category_id {
            Some(c) if !c.trim().is_empty() => c,
            _ => UNCATEGORIZED.to_string(),
        };
        Product {
            id: self.id,
            title,
            price: self.price.unwrap_or(0.0),
            stock: self.available_quantity.unwrap_or(0),
            status: self
                .status
                .as_deref()
                .map(ProductStatus::from_provider)
                .unwrap_or(ProductStatus::Paused),
            account: owner.to_string(),
            views: 0,
            sales: self.sold_quantity.unwrap_or(0),
            category,
            images: self
                .pictures
                .unwrap_or_default()
                .into_iter()
                .filter_map(|p| p.url)
                .collect(),
            description: self.description.unwrap_or_default(),
        }
    }
}

/// Result of a pre-flight credential check.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CredentialReport {
    /// True when `errors` is empty.
    pub valid: bool,
    /// One entry per problem found, in field order.
    pub errors: Vec<String>,
}
