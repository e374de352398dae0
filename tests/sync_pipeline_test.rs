//! End-to-end pipeline tests over the real HTTP transport, against a
//! local mock of the provider's endpoints: code exchange, connection
//! test, full account sync and reconciliation into the store.

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mercadolivre_client::{
    test_api_connection_with, AccountStatus, DashboardState, DashboardStore, InMemoryBackend,
    MeliConfig, MeliError, MercadoLivreClient, SellerAccount, TokenExchanger,
    SCOPE_REMEDIATION,
};

const ACCESS_TOKEN: &str = "APP_USR-1234567890-123456-abc";

fn config_for(server: &MockServer) -> MeliConfig {
    MeliConfig::builder()
        .api_base(&server.uri())
        .unwrap()
        .build()
}

fn profile_body() -> serde_json::Value {
    json!({
        "id": 999,
        "nickname": "loja_x",
        "email": "loja_x@example.com",
        "status": "active",
        "site_id": "MLB",
        "seller_reputation": {"level_id": "4_light_green", "power_seller_status": null}
    })
}

#[tokio::test]
async fn exchange_then_test_connection() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=TG-1234567890"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": ACCESS_TOKEN,
            "token_type": "Bearer",
            "expires_in": 21600,
            "user_id": 999
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/me"))
        .and(header("authorization", format!("Bearer {ACCESS_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body()))
        .mount(&server)
        .await;

    let config = config_for(&server);

    // Whitespace pasted into the code is stripped before transmission.
    let exchanger = TokenExchanger::new(config.clone()).unwrap();
    let token = exchanger
        .exchange_code(
            "TG-12345 67890\n",
            "1234567890",
            "client-secret",
            "https://myapp.example.com/callback",
        )
        .await
        .unwrap();

    assert_eq!(token.access_token, ACCESS_TOKEN);
    assert_eq!(token.expires_in, Some(21600));

    let profile = test_api_connection_with(config, &token.access_token)
        .await
        .unwrap();
    assert_eq!(profile.id, 999);
    assert_eq!(profile.nickname, "loja_x");
    assert_eq!(profile.status.as_deref(), Some("active"));
}

#[tokio::test]
async fn expired_code_gets_single_use_guidance() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "authorization code has been used"
        })))
        .mount(&server)
        .await;

    let exchanger = TokenExchanger::new(config_for(&server)).unwrap();
    let err = exchanger
        .exchange_code("TG-old-code-123", "1234567890", "secret", "https://cb.example.com")
        .await
        .unwrap_err();

    let guidance = err.remediation();
    assert!(guidance.contains("single-use"));
    assert!(guidance.contains("10 minutes"));
}

#[tokio::test]
async fn forbidden_profile_gets_scope_remediation() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({"message": "forbidden"})),
        )
        .mount(&server)
        .await;

    let err = test_api_connection_with(config_for(&server), ACCESS_TOKEN)
        .await
        .unwrap_err();
    assert_eq!(err.remediation(), SCOPE_REMEDIATION);
    assert!(err.needs_reauth());
}

#[tokio::test]
async fn full_sync_and_reconciliation() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body()))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/999/items/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": ["MLB1", "MLB2", "MLB3"]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/items/MLB1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "MLB1",
            "title": "Mouse Gamer RGB",
            "price": 89.9,
            "available_quantity": 15,
            "status": "active",
            "sold_quantity": 23,
            "category_id": "MLB1712",
            "pictures": [{"url": "https://http2.mlstatic.com/mouse.jpg"}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/items/MLB2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "MLB2",
            "status": "paused"
        })))
        .mount(&server)
        .await;

    // One listing consistently unavailable: dropped, never fatal.
    Mock::given(method("GET"))
        .and(path("/items/MLB3"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"message": "item not found"})),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/999/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "period_sales": 42,
            "total_sales": 1200
        })))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let client = MercadoLivreClient::with_config(config, ACCESS_TOKEN, None).unwrap();

    // The store already knows this seller under its nickname.
    let store = DashboardStore::open(InMemoryBackend::<DashboardState>::new()).unwrap();
    let mut stored = SellerAccount::new("loja_x", "old@example.com");
    stored.id = "1".to_string();
    stored.products = 9;
    store.add_account(stored.clone()).unwrap();

    let report = client.sync_account(&stored).await.unwrap();

    assert!(report.is_fully_fresh());
    assert_eq!(report.account.user_id, Some(999));
    assert_eq!(report.account.status, AccountStatus::Active);
    assert_eq!(report.account.reputation, 85);
    assert_eq!(report.account.products, 2);
    assert_eq!(report.account.sales, 42);
    assert_eq!(report.products.len(), 2);

    let imported = store
        .import_sync(report.account.clone(), report.products.clone())
        .unwrap();
    assert_eq!(imported, 2);

    let accounts = store.accounts();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].id, "1");
    assert_eq!(accounts[0].products, 2);

    let products = store.products_for("loja_x");
    assert_eq!(products.len(), 2);
    let untitled = products.iter().find(|p| p.id == "MLB2").unwrap();
    assert_eq!(untitled.title, "Produto sem título");
    assert_eq!(untitled.category, "Sem categoria");
}

#[tokio::test]
async fn profile_failure_aborts_whole_sync() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "invalid token"})),
        )
        .mount(&server)
        .await;

    let client =
        MercadoLivreClient::with_config(config_for(&server), ACCESS_TOKEN, None).unwrap();

    let account = SellerAccount::new("loja_x", "x@example.com");
    let before = account.clone();

    let err = client.sync_account(&account).await.unwrap_err();
    assert!(matches!(err, MeliError::Provider(_)));
    assert_eq!(account, before);
}
