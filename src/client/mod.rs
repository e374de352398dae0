//! Marketplace client: authenticated calls against the provider's REST
//! API for one credential pair.
//!
//! One instance corresponds to one access/refresh token pair, not to a
//! session. Token fields are only mutated by
//! [`MercadoLivreClient::refresh_access_token`]; every other operation
//! is read-only with respect to instance state.

use futures::future::join_all;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, instrument, warn};

use crate::auth::{is_valid_token_format, TokenExchanger};
use crate::config::MeliConfig;
use crate::errors::{
    classify_api_error, MeliError, MeliResult, ResponseError, ValidationError,
};
use crate::transport::{HttpRequest, HttpTransport, ReqwestTransport};
use crate::types::{
    ItemDetail, ItemSearchResponse, Product, SalesMetrics, SellerProfile, TokenResponse,
};

/// Client for the marketplace REST API, bound to one credential pair.
pub struct MercadoLivreClient {
    config: Arc<MeliConfig>,
    transport: Arc<dyn HttpTransport>,
    access_token: RwLock<SecretString>,
    refresh_token: RwLock<Option<SecretString>>,
}

impl MercadoLivreClient {
    /// Create a client with the production transport and default
    /// configuration.
    ///
    /// The token is not validated here; each operation gates on it so
    /// the failure surfaces next to the call that needed it.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
    ) -> MeliResult<Self> {
        let config = MeliConfig::default();
        let transport = Arc::new(ReqwestTransport::new(config.timeout)?);
        Ok(Self::with_transport(config, transport, access_token, refresh_token))
    }

    /// Create a client with explicit configuration and the production
    /// transport.
    pub fn with_config(
        config: MeliConfig,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
    ) -> MeliResult<Self> {
        let transport = Arc::new(ReqwestTransport::new(config.timeout)?);
        Ok(Self::with_transport(config, transport, access_token, refresh_token))
    }

    /// Create a client with an injected transport.
    pub fn with_transport(
        config: MeliConfig,
        transport: Arc<dyn HttpTransport>,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            access_token: RwLock::new(SecretString::new(access_token.into())),
            refresh_token: RwLock::new(refresh_token.map(SecretString::new)),
        }
    }

    /// The client's configuration.
    pub fn config(&self) -> &MeliConfig {
        &self.config
    }

    fn current_token(&self) -> String {
        self.access_token
            .read()
            .expect("token lock poisoned")
            .expose_secret()
            .clone()
    }

    fn bearer_headers(&self, token: &str) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("authorization".to_string(), format!("Bearer {token}"));
        headers.insert("accept".to_string(), "application/json".to_string());
        headers
    }

    /// Token presence + format gate shared by the authenticated calls.
    fn checked_token(&self) -> MeliResult<String> {
        let token = self.current_token();
        if token.trim().is_empty() {
            return Err(MeliError::Validation(ValidationError::MissingRequired {
                field: "access_token",
            }));
        }
        if !is_valid_token_format(&token) {
            return Err(MeliError::TokenFormat {
                preview: token.chars().take(30).collect(),
            });
        }
        Ok(token.trim().to_string())
    }

    fn parse<T: serde::de::DeserializeOwned>(body: &str) -> MeliResult<T> {
        serde_json::from_str(body).map_err(|e| {
            MeliError::Response(ResponseError::Deserialization {
                message: e.to_string(),
            })
        })
    }

    /// Fetch the authenticated seller's profile (`GET /users/me`).
    ///
    /// Gates on token presence and format before touching the network,
    /// so a pasted authorization code is reported as such instead of as
    /// an opaque 401.
    #[instrument(skip(self))]
    pub async fn get_user_info(&self) -> MeliResult<SellerProfile> {
        let token = self.checked_token()?;
        let url = self.config.api_url("users/me");
        debug!(url = %url, "fetching seller profile");

        let response = self
            .transport
            .send(HttpRequest::get(url, self.bearer_headers(&token)))
            .await?;

        if !response.is_success() {
            return Err(classify_api_error(response.status, &response.body));
        }
        Self::parse(&response.body)
    }

    /// Fetch the seller's listings, mapped into [`Product`] records
    /// tagged with `owner` as their account key.
    ///
    /// An empty search result is an empty success. Otherwise up to
    /// `max_items_per_sync` item details are fetched concurrently; an
    /// individual detail failure drops that item from the result and
    /// the call still succeeds with whatever resolved. Result order
    /// follows resolution, not the search order.
    #[instrument(skip(self))]
    pub async fn get_products(&self, seller_id: u64, owner: &str) -> MeliResult<Vec<Product>> {
        let token = self.checked_token()?;

        let url = self.config.api_url(&format!("users/{seller_id}/items/search"));
        let response = self
            .transport
            .send(HttpRequest::get(url, self.bearer_headers(&token)))
            .await?;

        if !response.is_success() {
            return Err(classify_api_error(response.status, &response.body));
        }
        let search: ItemSearchResponse = Self::parse(&response.body)?;
        if search.results.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = search
            .results
            .into_iter()
            .take(self.config.max_items_per_sync)
            .collect();
        debug!(items = ids.len(), "fetching item details");

        let fetches = ids.iter().map(|id| self.fetch_item(id, &token, owner));
        let resolved = join_all(fetches).await;
        Ok(resolved.into_iter().flatten().collect())
    }

    /// One item-detail fetch. Failures are logged and swallowed: a
    /// single broken listing must not fail the whole product sync.
    async fn fetch_item(&self, item_id: &str, token: &str, owner: &str) -> Option<Product> {
        if item_id.trim().is_empty() {
            return None;
        }
        let url = self.config.api_url(&format!("items/{item_id}"));
        let response = self
            .transport
            .send(HttpRequest::get(url, self.bearer_headers(token)))
            .await;

        match response {
            Ok(response) if response.is_success() => {
                match Self::parse::<ItemDetail>(&response.body) {
                    Ok(detail) => Some(detail.into_product(owner)),
                    Err(e) => {
                        warn!(item_id = %item_id, error = %e, "dropping undecodable item");
                        None
                    }
                }
            }
            Ok(response) => {
                debug!(item_id = %item_id, status = response.status, "dropping failed item fetch");
                None
            }
            Err(e) => {
                debug!(item_id = %item_id, error = %e, "dropping failed item fetch");
                None
            }
        }
    }

    /// Fetch the seller's sales counters (`GET /users/{id}/metrics`).
    ///
    /// Provider errors are returned to the caller; the synchronizer
    /// treats them as a degraded phase rather than a sync failure.
    #[instrument(skip(self))]
    pub async fn get_sales_stats(&self, seller_id: u64) -> MeliResult<SalesMetrics> {
        let token = self.checked_token()?;

        let url = self.config.api_url(&format!("users/{seller_id}/metrics"));
        let response = self
            .transport
            .send(HttpRequest::get(url, self.bearer_headers(&token)))
            .await?;

        if !response.is_success() {
            return Err(classify_api_error(response.status, &response.body));
        }
        Self::parse(&response.body)
    }

    /// Renew the access token through the refresh grant.
    ///
    /// Requires a refresh token supplied at construction (or by a
    /// previous rotation). Internal tokens are updated only on success;
    /// on failure the client keeps its current credentials.
    #[instrument(skip_all, fields(client_id = %client_id))]
    pub async fn refresh_access_token(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> MeliResult<TokenResponse> {
        let refresh = self
            .refresh_token
            .read()
            .expect("token lock poisoned")
            .as_ref()
            .map(|t| t.expose_secret().clone());
        let refresh = refresh.ok_or(MeliError::Validation(ValidationError::MissingRequired {
            field: "refresh_token",
        }))?;

        let exchanger =
            TokenExchanger::with_transport((*self.config).clone(), self.transport.clone());
        let token = exchanger.refresh(&refresh, client_id, client_secret).await?;

        *self.access_token.write().expect("token lock poisoned") =
            SecretString::new(token.access_token.clone());
        if let Some(rotated) = &token.refresh_token {
            *self.refresh_token.write().expect("token lock poisoned") =
                Some(SecretString::new(rotated.clone()));
        }
        Ok(token)
    }
}

impl std::fmt::Debug for MercadoLivreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MercadoLivreClient")
            .field("api_base", &self.config.api_base.as_str())
            .field("access_token", &"[REDACTED]")
            .field(
                "has_refresh_token",
                &self.refresh_token.read().expect("token lock poisoned").is_some(),
            )
            .finish()
    }
}

/// Probe the API with a candidate access token: non-empty check, then a
/// one-shot profile fetch. This is what the dashboard's "test
/// connection" button calls.
pub async fn test_api_connection(access_token: &str) -> MeliResult<SellerProfile> {
    if access_token.trim().is_empty() {
        return Err(MeliError::Validation(ValidationError::MissingRequired {
            field: "access_token",
        }));
    }
    MercadoLivreClient::new(access_token, None)?.get_user_info().await
}

/// Variant of [`test_api_connection`] with explicit configuration, used
/// when the API base is overridden (tests, staging).
pub async fn test_api_connection_with(
    config: MeliConfig,
    access_token: &str,
) -> MeliResult<SellerProfile> {
    if access_token.trim().is_empty() {
        return Err(MeliError::Validation(ValidationError::MissingRequired {
            field: "access_token",
        }));
    }
    MercadoLivreClient::with_config(config, access_token, None)?
        .get_user_info()
        .await
}
