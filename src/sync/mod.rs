//! Account synchronization: turns a stored account record into an
//! updated one by composing the client's profile, product and metrics
//! calls.
//!
//! The profile fetch is mandatory — its failure aborts the sync and the
//! caller's account is left untouched. Products and sales statistics
//! are enrichment: their failures are recorded per phase instead of
//! aborting, so a caller can tell "fully synced" from "profile synced,
//! enrichment stale" without the sync ever failing for optional data.

use chrono::Local;
use tracing::{info, instrument, warn};

use crate::client::MercadoLivreClient;
use crate::errors::MeliResult;
use crate::types::{AccountStatus, Product, SellerAccount};

pub mod reputation;
pub mod supervisor;

/// Display format for the account's last-sync field.
const LAST_SYNC_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Provenance of one enrichment phase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Enrichment {
    /// Phase completed and the corresponding fields are current.
    Fresh,
    /// Phase failed; the corresponding fields kept their prior values.
    Degraded {
        /// Why the phase was skipped.
        reason: String,
    },
}

impl Enrichment {
    fn degraded(reason: impl std::fmt::Display) -> Self {
        Self::Degraded {
            reason: reason.to_string(),
        }
    }

    /// True when this phase did not complete.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Outcome of one successful sync: the updated account, its fresh
/// product list and the provenance of each enrichment phase.
#[derive(Clone, Debug)]
pub struct SyncReport {
    /// Updated account value; the input account is never mutated.
    pub account: SellerAccount,
    /// Freshly fetched products (empty when the phase degraded).
    pub products: Vec<Product>,
    /// Products phase provenance.
    pub products_outcome: Enrichment,
    /// Sales-statistics phase provenance.
    pub stats_outcome: Enrichment,
}

impl SyncReport {
    /// True when every phase completed.
    pub fn is_fully_fresh(&self) -> bool {
        !self.products_outcome.is_degraded() && !self.stats_outcome.is_degraded()
    }
}

impl MercadoLivreClient {
    /// Synchronize one account against the marketplace.
    ///
    /// Returns a new account value with nickname, email, reputation,
    /// product count, sales count, provider user id and last-sync
    /// timestamp refreshed, and status promoted to active. Enrichment
    /// failures leave the corresponding counters at their prior values
    /// and are reported as [`Enrichment::Degraded`].
    #[instrument(skip(self, account), fields(account_id = %account.id, nickname = %account.nickname))]
    pub async fn sync_account(&self, account: &SellerAccount) -> MeliResult<SyncReport> {
        let profile = self.get_user_info().await?;

        let (products, product_count, products_outcome) =
            match self.get_products(profile.id, &profile.nickname).await {
                Ok(products) => {
                    let count = products.len() as u64;
                    (products, count, Enrichment::Fresh)
                }
                Err(e) => {
                    warn!(error = %e, "products phase degraded");
                    (Vec::new(), account.products, Enrichment::degraded(e))
                }
            };

        let (sales, stats_outcome) = match self.get_sales_stats(profile.id).await {
            Ok(metrics) => {
                let sales = if metrics.period_sales > 0 {
                    metrics.period_sales
                } else if metrics.total_sales > 0 {
                    metrics.total_sales
                } else {
                    account.sales
                };
                (sales, Enrichment::Fresh)
            }
            Err(e) => {
                warn!(error = %e, "stats phase degraded");
                (account.sales, Enrichment::degraded(e))
            }
        };

        let mut updated = account.clone();
        updated.user_id = Some(profile.id);
        if !profile.nickname.trim().is_empty() {
            updated.nickname = profile.nickname.clone();
        }
        if let Some(email) = profile.email.as_deref().filter(|e| !e.trim().is_empty()) {
            updated.email = email.to_string();
        }
        updated.reputation = reputation::score(profile.seller_reputation.as_ref());
        updated.products = product_count;
        updated.sales = sales;
        updated.status = AccountStatus::Active;
        updated.last_sync = Local::now().format(LAST_SYNC_FORMAT).to_string();

        info!(
            user_id = profile.id,
            products = updated.products,
            sales = updated.sales,
            "account synchronized"
        );

        Ok(SyncReport {
            account: updated,
            products,
            products_outcome,
            stats_outcome,
        })
    }
}
