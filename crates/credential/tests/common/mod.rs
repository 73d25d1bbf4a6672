//! Shared fixtures for credential integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, StatusCode};
use jobserv_credential::secrets::{SecretRequest, SecretTransport};
use jobserv_credential::CredentialWatcher;
use jobserv_response::{RawResponse, ResponseError};
use parking_lot::Mutex;
use serde_json::{Value, json};

pub const SECRET: &str = "jwt-secrets";
pub const NAMESPACE: &str = "ci";

/// CA and token files in a temp dir, backdated so rewrites always look newer.
pub struct CredentialFiles {
    pub dir: tempfile::TempDir,
    pub ca: PathBuf,
    pub token: PathBuf,
}

impl CredentialFiles {
    pub fn new(ca: &str, token: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let files = Self {
            ca: dir.path().join("ca.crt"),
            token: dir.path().join("token"),
            dir,
        };
        files.write_ca(ca, -60);
        files.write_token(token, -60);
        files
    }

    pub fn write_ca(&self, value: &str, mtime_offset_secs: i64) {
        write_with_mtime(&self.ca, value, mtime_offset_secs);
    }

    pub fn write_token(&self, value: &str, mtime_offset_secs: i64) {
        write_with_mtime(&self.token, value, mtime_offset_secs);
    }

    pub fn watcher(&self) -> Arc<CredentialWatcher> {
        Arc::new(CredentialWatcher::initialize(&self.ca, &self.token).unwrap())
    }
}

/// Write `value` to `path` with an mtime `offset_secs` from now
pub fn write_with_mtime(path: &Path, value: &str, offset_secs: i64) {
    std::fs::write(path, value).unwrap();
    let now = SystemTime::now();
    let offset = Duration::from_secs(offset_secs.unsigned_abs());
    let when = if offset_secs >= 0 { now + offset } else { now - offset };
    std::fs::OpenOptions::new()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(when)
        .unwrap();
}

/// Kubernetes-style payload with base64 encoded fields
pub fn encoded_secret(fields: &[(&str, &str)]) -> Value {
    let data: serde_json::Map<String, Value> = fields
        .iter()
        .map(|(k, v)| ((*k).to_string(), Value::String(STANDARD.encode(v))))
        .collect();
    json!({ "kind": "Secret", "data": data })
}

/// Transport answering every request with a fixed response, counting calls.
pub struct FakeTransport {
    status: StatusCode,
    body: Value,
    delay: Duration,
    calls: AtomicUsize,
    pub requests: Mutex<Vec<SecretRequest>>,
}

impl FakeTransport {
    pub fn ok(body: Value) -> Arc<Self> {
        Self::with_status(StatusCode::OK, body)
    }

    pub fn with_status(status: StatusCode, body: Value) -> Arc<Self> {
        Arc::new(Self {
            status,
            body,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn slow(body: Value, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            status: StatusCode::OK,
            body,
            delay,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretTransport for FakeTransport {
    async fn get(&self, request: &SecretRequest) -> Result<RawResponse, ResponseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(RawResponse::new(
            self.status,
            headers,
            serde_json::to_vec(&self.body).unwrap(),
        ))
    }
}
