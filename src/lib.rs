//! Mercado Livre seller dashboard core.
//!
//! The synchronization pipeline behind a multi-account seller
//! dashboard: exchange an OAuth authorization code for tokens, pull
//! account/product/sales data from the marketplace REST API, reconcile
//! it into local collections, and classify failures into actionable
//! guidance. A small permission-gated user directory covers the
//! dashboard's internal operators.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use mercadolivre_client::{exchange_code_for_token, MercadoLivreClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let token = exchange_code_for_token(
//!         "TG-the-code-from-the-redirect",
//!         "1234567890",
//!         "client-secret",
//!         "https://myapp.example.com/callback",
//!     )
//!     .await?;
//!
//!     let client = MercadoLivreClient::new(token.access_token, token.refresh_token)?;
//!     let account = mercadolivre_client::SellerAccount::new("minha_loja", "eu@example.com");
//!     let report = client.sync_account(&account).await?;
//!
//!     println!(
//!         "{}: {} products, {} sales",
//!         report.account.nickname, report.account.products, report.account.sales
//!     );
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `config`: endpoints, timeouts and sync limits
//! - `errors`: error hierarchy and provider-error classification
//! - `types`: domain records and provider wire types
//! - `transport`: injectable HTTP layer (reqwest + mock)
//! - `auth`: token-format heuristic, credential checks, authorization
//!   URL assembly, code/refresh grants
//! - `client`: authenticated marketplace calls for one credential pair
//! - `sync`: account synchronization, reputation policy, supervision
//! - `store`: account/product collections with reconciliation
//! - `directory`: permission-gated dashboard users

#![warn(missing_docs)]

pub mod auth;
pub mod client;
pub mod config;
pub mod directory;
pub mod errors;
pub mod store;
pub mod sync;
pub mod transport;
pub mod types;

pub use auth::{
    build_authorization_url, diagnose_authorization_error, exchange_code_for_token,
    generate_state, is_valid_token_format, validate_credentials, TokenExchanger,
};
pub use client::{test_api_connection, test_api_connection_with, MercadoLivreClient};
pub use config::{MeliConfig, MeliConfigBuilder};
pub use errors::{MeliError, MeliResult, SCOPE_REMEDIATION};
pub use store::{DashboardState, DashboardStore, InMemoryBackend, JsonFileBackend};
pub use sync::supervisor::SyncSupervisor;
pub use sync::{Enrichment, SyncReport};
pub use types::{
    AccountStatus, CredentialReport, Product, ProductStatus, SellerAccount, SellerProfile,
    TokenResponse,
};
