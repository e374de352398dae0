//! Dashboard store: the account/product collections behind the UI,
//! with reconciliation of freshly synchronized data and aggregate
//! metrics.
//!
//! Persistence is injected (see [`persistence`]); every mutation
//! commits a snapshot, mirroring the original storage model without any
//! ambient module state.

use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use tracing::{info, instrument};

use crate::errors::MeliResult;
use crate::types::{Product, SellerAccount};

pub mod persistence;

pub use persistence::{InMemoryBackend, JsonFileBackend, PersistenceBackend};

/// Persisted shape of the dashboard collections.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DashboardState {
    /// Linked seller accounts.
    #[serde(default)]
    pub accounts: Vec<SellerAccount>,
    /// Listings across all accounts.
    #[serde(default)]
    pub products: Vec<Product>,
}

/// Aggregate numbers for the dashboard header cards.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DashboardMetrics {
    /// Sales summed over accounts.
    pub total_sales: u64,
    /// Product counts summed over accounts.
    pub total_products: u64,
    /// Views summed over products.
    pub total_views: u64,
    /// Revenue estimate: price x sales summed over products.
    pub total_revenue: f64,
    /// Revenue per sale; zero when there are no sales.
    pub average_ticket: f64,
    /// Sales per hundred views; zero when there are no views.
    pub conversion_rate: f64,
}

/// Account/product collections with injected persistence.
pub struct DashboardStore<B> {
    backend: B,
    state: RwLock<DashboardState>,
}

impl<B: PersistenceBackend<DashboardState>> DashboardStore<B> {
    /// Open the store, loading the last snapshot if one exists.
    pub fn open(backend: B) -> MeliResult<Self> {
        let state = backend.load()?.unwrap_or_default();
        Ok(Self {
            backend,
            state: RwLock::new(state),
        })
    }

    /// All accounts, in insertion order.
    pub fn accounts(&self) -> Vec<SellerAccount> {
        self.state.read().expect("store lock poisoned").accounts.clone()
    }

    /// All products.
    pub fn products(&self) -> Vec<Product> {
        self.state.read().expect("store lock poisoned").products.clone()
    }

    /// Products owned by the given account nickname.
    pub fn products_for(&self, nickname: &str) -> Vec<Product> {
        self.state
            .read()
            .expect("store lock poisoned")
            .products
            .iter()
            .filter(|p| p.account == nickname)
            .cloned()
            .collect()
    }

    /// Look an account up by its local id.
    pub fn account(&self, id: &str) -> Option<SellerAccount> {
        self.state
            .read()
            .expect("store lock poisoned")
            .accounts
            .iter()
            .find(|a| a.id == id)
            .cloned()
    }

    /// Register a new account.
    pub fn add_account(&self, account: SellerAccount) -> MeliResult<()> {
        let mut state = self.state.write().expect("store lock poisoned");
        state.accounts.push(account);
        self.commit(&state)
    }

    /// Replace an account by local id. Returns false when no account
    /// has that id.
    pub fn update_account(&self, account: SellerAccount) -> MeliResult<bool> {
        let mut state = self.state.write().expect("store lock poisoned");
        match state.accounts.iter_mut().find(|a| a.id == account.id) {
            Some(existing) => {
                *existing = account;
                self.commit(&state)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Delete an account and every product it owns. Returns false when
    /// no account has that id.
    pub fn remove_account(&self, id: &str) -> MeliResult<bool> {
        let mut state = self.state.write().expect("store lock poisoned");
        let Some(position) = state.accounts.iter().position(|a| a.id == id) else {
            return Ok(false);
        };
        let removed = state.accounts.remove(position);
        state.products.retain(|p| p.account != removed.nickname);
        self.commit(&state)?;
        Ok(true)
    }

    /// Reconcile a freshly synchronized account and its product list
    /// into the collections. Returns the number of products stored.
    ///
    /// An existing account with the same nickname — or the same
    /// provider user id — is replaced in place, keeping only its local
    /// id; otherwise the account is appended. The product list is a
    /// full replace per account: everything previously stored under the
    /// nickname is dropped and the fresh list appended, so listings
    /// removed on the marketplace side disappear locally.
    #[instrument(skip(self, account, products), fields(nickname = %account.nickname))]
    pub fn import_sync(
        &self,
        account: SellerAccount,
        products: Vec<Product>,
    ) -> MeliResult<usize> {
        let mut state = self.state.write().expect("store lock poisoned");
        let nickname = account.nickname.clone();

        let existing = state.accounts.iter_mut().find(|a| {
            a.nickname == account.nickname
                || (a.user_id.is_some() && a.user_id == account.user_id)
        });
        match existing {
            Some(existing) => {
                let local_id = existing.id.clone();
                *existing = account;
                existing.id = local_id;
            }
            None => state.accounts.push(account),
        }

        state.products.retain(|p| p.account != nickname);
        let count = products.len();
        state.products.extend(products.into_iter().map(|mut p| {
            // Enforce the ownership key whatever the fetch tagged.
            p.account = nickname.clone();
            p
        }));

        self.commit(&state)?;
        info!(products = count, "account reconciled");
        Ok(count)
    }

    /// Aggregate metrics over the current collections.
    pub fn metrics(&self) -> DashboardMetrics {
        let state = self.state.read().expect("store lock poisoned");

        let total_sales: u64 = state.accounts.iter().map(|a| a.sales).sum();
        let total_products: u64 = state.accounts.iter().map(|a| a.products).sum();
        let total_views: u64 = state.products.iter().map(|p| p.views).sum();
        let total_revenue: f64 = state
            .products
            .iter()
            .map(|p| p.price * p.sales as f64)
            .sum();

        let average_ticket = if total_sales > 0 {
            total_revenue / total_sales as f64
        } else {
            0.0
        };
        let conversion_rate = if total_views > 0 {
            (total_sales as f64 / total_views as f64) * 100.0
        } else {
            0.0
        };

        DashboardMetrics {
            total_sales,
            total_products,
            total_views,
            total_revenue,
            average_ticket,
            conversion_rate,
        }
    }

    fn commit(&self, state: &DashboardState) -> MeliResult<()> {
        self.backend.save(state)
    }
}

impl<B> std::fmt::Debug for DashboardStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read().expect("store lock poisoned");
        f.debug_struct("DashboardStore")
            .field("accounts", &state.accounts.len())
            .field("products", &state.products.len())
            .finish()
    }
}
