//! Integration tests for `RemoteSecretStore`: caching, fetch deduplication,
//! decode policies and error propagation against a mocked secret service.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{CredentialFiles, FakeTransport, NAMESPACE, SECRET, encoded_secret};
use http::StatusCode;
use jobserv_credential::secrets::{PassthroughDecoder, ReqwestTransport};
use jobserv_credential::{ExposeSecret, RemoteSecretStore, RequestSigner, SecretsError};
use jobserv_response::ErrorKind;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET_PATH: &str = "/api/v1/namespaces/ci/secrets/jwt-secrets/";

fn store_for(server: &MockServer, files: &CredentialFiles) -> RemoteSecretStore {
    RemoteSecretStore::builder(files.watcher(), server.uri())
        .server_path("api/v1/namespaces")
        .transport(Arc::new(ReqwestTransport::new(Duration::from_secs(5))))
        .build()
}

#[tokio::test]
async fn test_retrieve_authenticates_and_decodes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SECRET_PATH))
        .and(header("authorization", "Bearer token-v1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(encoded_secret(&[
            ("jwt-key", "current"),
            ("jwt-valid-at", "1700000000"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let files = CredentialFiles::new("ca-v1", "token-v1\n");
    let store = store_for(&server, &files);

    let bundle = store.retrieve(SECRET, NAMESPACE).await.unwrap();

    assert_eq!(bundle.get("jwt-key").unwrap().expose_secret(), "current");
    assert_eq!(bundle.get("jwt-valid-at").unwrap().expose_secret(), "1700000000");
    assert_eq!(bundle.namespace, NAMESPACE);
    assert_eq!(bundle.name, SECRET);
}

#[tokio::test]
async fn test_live_entry_makes_no_network_call() {
    let transport = FakeTransport::ok(encoded_secret(&[("jwt-key", "current")]));
    let files = CredentialFiles::new("ca", "token");
    let store = RemoteSecretStore::builder(files.watcher(), "https://secrets.internal")
        .transport(transport.clone())
        .build();

    let first = store.retrieve(SECRET, NAMESPACE).await.unwrap();
    let second = store.retrieve(SECRET, NAMESPACE).await.unwrap();

    assert_eq!(transport.calls(), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(store.cache_stats().hits, 1);
}

#[tokio::test]
async fn test_expired_entry_is_fetched_again() {
    let transport = FakeTransport::ok(encoded_secret(&[("jwt-key", "current")]));
    let files = CredentialFiles::new("ca", "token");
    let store = RemoteSecretStore::builder(files.watcher(), "https://secrets.internal")
        .transport(transport.clone())
        .ttl(Duration::from_millis(50))
        .build();

    store.retrieve(SECRET, NAMESPACE).await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    store.retrieve(SECRET, NAMESPACE).await.unwrap();

    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_concurrent_cold_retrieves_share_one_fetch() {
    let transport = FakeTransport::slow(
        encoded_secret(&[("jwt-key", "current")]),
        Duration::from_millis(50),
    );
    let files = CredentialFiles::new("ca", "token");
    let store = Arc::new(
        RemoteSecretStore::builder(files.watcher(), "https://secrets.internal")
            .transport(transport.clone())
            .build(),
    );

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.retrieve(SECRET, NAMESPACE).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_failure_status_propagates_and_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SECRET_PATH))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "message": "secret not found" })),
        )
        .expect(2)
        .mount(&server)
        .await;

    let files = CredentialFiles::new("ca", "token");
    let store = store_for(&server, &files);

    for _ in 0..2 {
        let err = store.retrieve(SECRET, NAMESPACE).await.unwrap_err();
        let domain = err.domain().expect("should carry the service response");
        assert_eq!(domain.kind, Some(ErrorKind::NotFound));
        assert_eq!(domain.json.as_ref().unwrap()["message"], "secret not found");
    }
}

#[tokio::test]
async fn test_transport_failure_is_a_fetch_error() {
    let files = CredentialFiles::new("ca", "token");
    // Nothing listens on port 1.
    let store = RemoteSecretStore::builder(files.watcher(), "http://127.0.0.1:1")
        .transport(Arc::new(ReqwestTransport::new(Duration::from_secs(2))))
        .build();

    let err = store.retrieve(SECRET, NAMESPACE).await.unwrap_err();

    assert!(matches!(err, SecretsError::Fetch { .. }));
    assert!(err.domain().is_none());
}

#[tokio::test]
async fn test_payload_not_matching_policy_is_a_decode_error() {
    let transport = FakeTransport::ok(json!({ "jwt-key": "plain" }));
    let files = CredentialFiles::new("ca", "token");
    let store = RemoteSecretStore::builder(files.watcher(), "https://secrets.internal")
        .transport(transport)
        .build();

    let err = store.retrieve(SECRET, NAMESPACE).await.unwrap_err();
    assert!(matches!(err, SecretsError::Decode { .. }));
}

#[tokio::test]
async fn test_passthrough_policy() {
    let transport = FakeTransport::ok(json!({ "jwt-key": "plain" }));
    let files = CredentialFiles::new("ca", "token");
    let store = RemoteSecretStore::builder(files.watcher(), "https://secrets.internal")
        .transport(transport)
        .decoder(Arc::new(PassthroughDecoder))
        .build();

    let value = store.field(SECRET, NAMESPACE, "jwt-key").await.unwrap().unwrap();
    assert_eq!(value.expose_secret(), "plain");
    assert!(store.field(SECRET, NAMESPACE, "absent").await.unwrap().is_none());
}

#[tokio::test]
async fn test_refreshed_token_used_after_invalidate() {
    let transport = FakeTransport::ok(encoded_secret(&[("jwt-key", "current")]));
    let files = CredentialFiles::new("ca", "token-v1");
    let watcher = files.watcher();
    let store = RemoteSecretStore::builder(Arc::clone(&watcher), "https://secrets.internal")
        .transport(transport.clone())
        .build();

    store.retrieve(SECRET, NAMESPACE).await.unwrap();
    files.write_token("token-v2", 0);
    assert!(watcher.refresh(jobserv_credential::CredentialKind::Token).await.unwrap());
    store.invalidate(SECRET, NAMESPACE).await;
    store.retrieve(SECRET, NAMESPACE).await.unwrap();

    let requests = transport.requests.lock();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].bearer_token.expose_secret(), "token-v1");
    assert_eq!(requests[1].bearer_token.expose_secret(), "token-v2");
    assert_eq!(requests[1].ca_certificate.expose_secret(), "ca");
}

#[tokio::test]
async fn test_request_signer_hmac() {
    let transport = FakeTransport::ok(encoded_secret(&[("sign-key", "Jefe")]));
    let files = CredentialFiles::new("ca", "token");
    let store = Arc::new(
        RemoteSecretStore::builder(files.watcher(), "https://secrets.internal")
            .transport(transport)
            .build(),
    );

    let signer = RequestSigner::new(Arc::clone(&store), SECRET, NAMESPACE, "sign-key");
    assert_eq!(
        signer.hmac("what do ya want for nothing?").await.unwrap().as_deref(),
        Some("5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843")
    );

    let missing = RequestSigner::new(store, SECRET, NAMESPACE, "other-key");
    assert_eq!(missing.hmac("data").await.unwrap(), None);
}

#[tokio::test]
async fn test_signer_propagates_fetch_failure() {
    let transport = FakeTransport::with_status(StatusCode::SERVICE_UNAVAILABLE, json!({}));
    let files = CredentialFiles::new("ca", "token");
    let store = Arc::new(
        RemoteSecretStore::builder(files.watcher(), "https://secrets.internal")
            .transport(transport)
            .build(),
    );

    let err = RequestSigner::new(store, SECRET, NAMESPACE, "sign-key")
        .hmac("data")
        .await
        .unwrap_err();
    assert_eq!(
        err.domain().and_then(|d| d.kind),
        Some(ErrorKind::ServiceUnavailable)
    );
}
