//! Token-endpoint grants: authorization-code exchange and refresh.
//!
//! One-shot by design: a consumed or expired authorization code cannot
//! be recovered by retrying, so no retry layer wraps these calls.

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::config::MeliConfig;
use crate::errors::{classify_token_error, MeliError, MeliResult, ResponseError, ValidationError};
use crate::transport::{HttpRequest, HttpTransport, ReqwestTransport};
use crate::types::TokenResponse;

/// Issues grants against the provider's token endpoint.
pub struct TokenExchanger {
    config: Arc<MeliConfig>,
    transport: Arc<dyn HttpTransport>,
}

impl TokenExchanger {
    /// Create an exchanger with the production transport.
    pub fn new(config: MeliConfig) -> MeliResult<Self> {
        let transport = Arc::new(ReqwestTransport::new(config.timeout)?);
        Ok(Self {
            config: Arc::new(config),
            transport,
        })
    }

    /// Create an exchanger with an injected transport.
    pub fn with_transport(config: MeliConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }

    fn token_url(&self) -> String {
        self.config.api_url("oauth/token")
    }

    /// Exchange an authorization code for a token pair.
    ///
    /// All four parameters are validated up front; a missing one is
    /// reported by name and no request is issued. Whitespace inside the
    /// code is stripped before transmission: codes never legitimately
    /// contain it, but copy-paste from the redirect URL often inserts
    /// it.
    #[instrument(skip_all, fields(client_id = %client_id.trim()))]
    pub async fn exchange_code(
        &self,
        code: &str,
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
    ) -> MeliResult<TokenResponse> {
        require_non_empty(code, "code")?;
        require_non_empty(client_id, "client_id")?;
        require_non_empty(client_secret, "client_secret")?;
        require_non_empty(redirect_uri, "redirect_uri")?;

        let clean_code: String = code.chars().filter(|c| !c.is_whitespace()).collect();
        debug!(code_len = clean_code.len(), "exchanging authorization code");

        let secret = SecretString::new(client_secret.trim().to_string());
        let request = HttpRequest::form_post(
            self.token_url(),
            &[
                ("grant_type", "authorization_code"),
                ("client_id", client_id.trim()),
                ("client_secret", secret.expose_secret()),
                ("code", &clean_code),
                ("redirect_uri", redirect_uri.trim()),
            ],
        );

        self.send_grant(request).await
    }

    /// Obtain a fresh access token from a refresh token.
    #[instrument(skip_all, fields(client_id = %client_id.trim()))]
    pub async fn refresh(
        &self,
        refresh_token: &str,
        client_id: &str,
        client_secret: &str,
    ) -> MeliResult<TokenResponse> {
        require_non_empty(refresh_token, "refresh_token")?;
        require_non_empty(client_id, "client_id")?;
        require_non_empty(client_secret, "client_secret")?;

        let secret = SecretString::new(client_secret.trim().to_string());
        let request = HttpRequest::form_post(
            self.token_url(),
            &[
                ("grant_type", "refresh_token"),
                ("client_id", client_id.trim()),
                ("client_secret", secret.expose_secret()),
                ("refresh_token", refresh_token.trim()),
            ],
        );

        self.send_grant(request).await
    }

    async fn send_grant(&self, request: HttpRequest) -> MeliResult<TokenResponse> {
        let response = self.transport.send(request).await?;

        if !response.is_success() {
            return Err(classify_token_error(response.status, &response.body));
        }

        serde_json::from_str(&response.body).map_err(|e| {
            MeliError::Response(ResponseError::Deserialization {
                message: e.to_string(),
            })
        })
    }
}

impl std::fmt::Debug for TokenExchanger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenExchanger")
            .field("token_url", &self.token_url())
            .finish()
    }
}

/// One-shot authorization-code exchange against the production
/// endpoints; matches the shape the dashboard UI calls.
pub async fn exchange_code_for_token(
    code: &str,
    client_id: &str,
    client_secret: &str,
    redirect_uri: &str,
) -> MeliResult<TokenResponse> {
    TokenExchanger::new(MeliConfig::default())?
        .exchange_code(code, client_id, client_secret, redirect_uri)
        .await
}

fn require_non_empty(value: &str, field: &'static str) -> MeliResult<()> {
    if value.trim().is_empty() {
        return Err(MeliError::Validation(ValidationError::MissingRequired {
            field,
        }));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProviderError;
    use crate::transport::MockTransport;

    fn exchanger(transport: Arc<MockTransport>) -> TokenExchanger {
        TokenExchanger::with_transport(MeliConfig::default(), transport)
    }

    fn token_body() -> serde_json::Value {
        serde_json::json!({
            "access_token": "APP_USR-123-456-abc",
            "token_type": "Bearer",
            "expires_in": 21600,
            "refresh_token": "TG-999",
            "user_id": 999
        })
    }

    #[tokio::test]
    async fn test_missing_fields_issue_no_request() {
        let transport = Arc::new(MockTransport::new());
        let exchanger = exchanger(transport.clone());

        let cases: [(&str, &str, &str, &str, &str); 4] = [
            ("", "123", "secret", "https://cb", "code"),
            ("CODE-1", "  ", "secret", "https://cb", "client_id"),
            ("CODE-1", "123", "", "https://cb", "client_secret"),
            ("CODE-1", "123", "secret", " \t", "redirect_uri"),
        ];

        for (code, id, secret, uri, expected_field) in cases {
            let err = exchanger
                .exchange_code(code, id, secret, uri)
                .await
                .unwrap_err();
            match err {
                MeliError::Validation(ValidationError::MissingRequired { field }) => {
                    assert_eq!(field, expected_field)
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_exchange_success_sends_form_grant() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(200, &token_body());
        let exchanger = exchanger(transport.clone());

        let token = exchanger
            .exchange_code("CODE-abc-123", "123456", "s3cret", "https://cb.example.com")
            .await
            .unwrap();

        assert_eq!(token.access_token, "APP_USR-123-456-abc");
        assert_eq!(token.expires_in, Some(21600));
        assert_eq!(token.user_id, Some(999));

        let request = transport.last_request().unwrap();
        assert!(request.url.ends_with("/oauth/token"));
        let body = request.body.unwrap();
        assert!(body.contains("grant_type=authorization_code"));
        assert!(body.contains("code=CODE-abc-123"));
        assert!(body.contains("client_id=123456"));
        assert!(body.contains("redirect_uri=https%3A%2F%2Fcb.example.com"));
    }

    #[tokio::test]
    async fn test_whitespace_is_stripped_from_code() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(200, &token_body());
        let exchanger = exchanger(transport.clone());

        let pasted = "TG-1234 5678\t90ab\ncdef";
        exchanger
            .exchange_code(pasted, "123456", "s3cret", "https://cb.example.com")
            .await
            .unwrap();

        let body = transport.last_request().unwrap().body.unwrap();
        assert!(body.contains("code=TG-1234567890abcdef"));
        // The transmitted code is shorter than what was pasted.
        assert!("TG-1234567890abcdef".len() < pasted.len());
    }

    #[tokio::test]
    async fn test_invalid_grant_classification() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_response(
            400,
            r#"{"error":"invalid_grant","error_description":"code already consumed"}"#,
        );
        let exchanger = exchanger(transport);

        let err = exchanger
            .exchange_code("TG-old", "123456", "s3cret", "https://cb.example.com")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MeliError::Provider(ProviderError::InvalidGrant { .. })
        ));
        assert!(err.remediation().contains("single-use"));
    }

    #[tokio::test]
    async fn test_network_failure_is_distinct_category() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_network_error("connection refused");
        let exchanger = exchanger(transport.clone());

        let err = exchanger
            .exchange_code("TG-123456789", "123456", "s3cret", "https://cb.example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, MeliError::Network(_)));
        // Exactly one attempt: no automatic retry on a one-shot grant.
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_grant() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(200, &token_body());
        let exchanger = exchanger(transport.clone());

        let token = exchanger
            .refresh("TG-refresh-1", "123456", "s3cret")
            .await
            .unwrap();
        assert_eq!(token.access_token, "APP_USR-123-456-abc");

        let body = transport.last_request().unwrap().body.unwrap();
        assert!(body.contains("grant_type=refresh_token"));
        assert!(body.contains("refresh_token=TG-refresh-1"));
    }
}
