use std::sync::Arc;
use std::time::Duration;

use marquee_sync::{
    AuthSignal, HttpResourceClient, MemoryTokenStore, ResourceClient, SyncError, TokenState,
};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn tokens(token: &str, tenant_key: Option<&str>) -> Arc<MemoryTokenStore> {
    Arc::new(MemoryTokenStore::new(TokenState {
        token: Some(token.to_string()),
        tenant_key: tenant_key.map(str::to_string),
        ..Default::default()
    }))
}

fn client(server: &MockServer, tenant_key: Option<&str>) -> HttpResourceClient {
    HttpResourceClient::new(
        &server.uri(),
        Duration::from_secs(5),
        tokens("access-1", tenant_key),
    )
    .unwrap()
}

// ── Single resource ─────────────────────────────────────────────

#[tokio::test]
async fn get_sends_bearer_and_tenant_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/screens/S1"))
        .and(header("Authorization", "Bearer access-1"))
        .and(header("Authorization-Tenant-Key", "ABC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "@id": "/v1/screens/S1" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, Some("ABC"));
    let screen = client.get("/v1/screens/S1").await.unwrap();
    assert_eq!(screen["@id"], "/v1/screens/S1");
}

#[tokio::test]
async fn configured_tenant_key_is_the_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/screens/S1"))
        .and(header("Authorization-Tenant-Key", "FROM-CONFIG"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, None).with_tenant_key("FROM-CONFIG");
    client.get("/v1/screens/S1").await.unwrap();
}

#[tokio::test]
async fn unauthorized_raises_signal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/screens/S1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = client(&server, None);
    let mut signals = client.subscribe();

    let err = client.get("/v1/screens/S1").await.unwrap_err();
    assert_eq!(
        err,
        SyncError::AuthRejected {
            path: "/v1/screens/S1".into()
        }
    );
    assert!(err.is_auth_error());
    assert_eq!(
        signals.try_recv().unwrap(),
        AuthSignal::Rejected {
            path: "/v1/screens/S1".into()
        }
    );
}

#[tokio::test]
async fn server_error_is_retryable_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/templates/T1"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client(&server, None);
    let mut signals = client.subscribe();

    let err = client.get("/v1/templates/T1").await.unwrap_err();
    assert!(matches!(err, SyncError::HttpStatus { status: 503, .. }));
    assert!(err.is_retryable());
    assert!(signals.try_recv().is_err());
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/media/M1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client(&server, None).get("/v1/media/M1").await.unwrap_err();
    assert!(matches!(err, SyncError::MalformedResource { .. }));
}

// ── Paged collections ───────────────────────────────────────────

#[tokio::test]
async fn get_all_pages_follows_total_items() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/playlists/P1/slides"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hydra:member": [{ "slide": { "@id": "/v1/slides/A" } }, { "slide": { "@id": "/v1/slides/B" } }],
            "hydra:totalItems": 3
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/playlists/P1/slides"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hydra:member": [{ "slide": { "@id": "/v1/slides/C" } }],
            "hydra:totalItems": 3
        })))
        .expect(1)
        .mount(&server)
        .await;

    let items = client(&server, None)
        .get_all_pages("/v1/playlists/P1/slides")
        .await
        .unwrap();
    let ids: Vec<_> = items
        .iter()
        .map(|i| i["slide"]["@id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["/v1/slides/A", "/v1/slides/B", "/v1/slides/C"]);
}

#[tokio::test]
async fn get_all_pages_stops_on_empty_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/screens/S1/campaigns"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hydra:member": [],
            "hydra:totalItems": 10
        })))
        .expect(1)
        .mount(&server)
        .await;

    let items = client(&server, None)
        .get_all_pages("/v1/screens/S1/campaigns")
        .await
        .unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn get_all_pages_propagates_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/screens/S1/screen-groups"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client(&server, None)
        .get_all_pages("/v1/screens/S1/screen-groups")
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::HttpStatus { status: 500, .. }));
}
