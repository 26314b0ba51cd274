//! Shared utilities for integration testing: mock upstreams and a running proxy.

#![allow(dead_code)]

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use settlement_proxy::config::ProxyConfig;
use settlement_proxy::{HttpServer, Shutdown};

pub const SUBSCRIBER_ID: &str = "np.example.com";
pub const SUBSCRIBER_URI: &str = "https://np.example.com/ondc";
pub const UNIQUE_KEY_ID: &str = "uk-1";
pub const CREDENTIAL_KEY_ID: &str = "proxy-client";
pub const CREDENTIAL_SECRET: &str = "s3cret";

/// Key the proxy signs with.
pub fn proxy_key() -> SigningKey {
    SigningKey::from_bytes(&[21u8; 32])
}

/// Key the settlement service signs caller tokens with.
pub fn caller_key() -> SigningKey {
    SigningKey::from_bytes(&[22u8; 32])
}

/// Key of a network participant calling us.
pub fn participant_key() -> SigningKey {
    SigningKey::from_bytes(&[23u8; 32])
}

/// A request seen by a mock upstream.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Clone, Default)]
pub struct Recorder {
    requests: Arc<Mutex<Vec<Recorded>>>,
    key_fetches: Arc<AtomicUsize>,
}

impl Recorder {
    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn key_fetches(&self) -> usize {
        self.key_fetches.load(Ordering::SeqCst)
    }

    fn record(&self, method: Method, uri: &Uri, headers: HeaderMap, body: Bytes) {
        self.requests.lock().unwrap().push(Recorded {
            method,
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            headers,
            body,
        });
    }
}

/// A mock upstream listening on an ephemeral loopback port.
pub struct MockUpstream {
    pub addr: SocketAddr,
    pub recorder: Recorder,
}

impl MockUpstream {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

#[derive(Clone)]
struct EchoState {
    recorder: Recorder,
    status: StatusCode,
    body: &'static str,
}

async fn echo(
    State(state): State<EchoState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    state.recorder.record(method, &uri, headers, body);
    (state.status, [("x-upstream", "mock"), ("connection", "close")], state.body)
}

/// Upstream answering every request with `status` and `body`.
pub async fn start_echo_upstream(status: StatusCode, body: &'static str) -> MockUpstream {
    let recorder = Recorder::default();
    let state = EchoState {
        recorder: recorder.clone(),
        status,
        body,
    };
    let addr = serve(Router::new().fallback(echo).with_state(state)).await;
    MockUpstream { addr, recorder }
}

#[derive(Clone)]
struct RsfState {
    recorder: Recorder,
    keys: Arc<Vec<Value>>,
}

async fn rsf_keys(State(state): State<RsfState>) -> Json<Value> {
    state.recorder.key_fetches.fetch_add(1, Ordering::SeqCst);
    Json(Value::Array(state.keys.as_ref().clone()))
}

async fn rsf_ondc(
    State(state): State<RsfState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    state.recorder.record(method, &uri, headers, body);
    (StatusCode::OK, Json(json!({ "message": { "ack": { "status": "ACK" } } })))
}

/// Settlement service: publishes `keys` and accepts forwarded callbacks.
pub async fn start_rsf(keys: &[(&str, VerifyingKey)]) -> MockUpstream {
    let recorder = Recorder::default();
    let keys = keys
        .iter()
        .map(|(id, key)| json!({ "keyId": id, "publicKey": STANDARD.encode(key.to_bytes()) }))
        .collect();
    let state = RsfState {
        recorder: recorder.clone(),
        keys: Arc::new(keys),
    };
    let router = Router::new()
        .route("/public/auth/keys", get(rsf_keys))
        .fallback(rsf_ondc)
        .with_state(state);
    let addr = serve(router).await;
    MockUpstream { addr, recorder }
}

#[derive(Clone)]
struct RegistryState {
    recorder: Recorder,
    subscribers: Arc<Vec<(String, String, VerifyingKey)>>,
}

async fn registry_lookup(State(state): State<RegistryState>, Json(request): Json<Value>) -> Json<Value> {
    state.recorder.key_fetches.fetch_add(1, Ordering::SeqCst);
    let subscriber_id = request["subscriber_id"].as_str().unwrap_or_default();
    let uk_id = request["ukId"].as_str().unwrap_or_default();

    let records: Vec<Value> = state
        .subscribers
        .iter()
        .filter(|(sub, uk, _)| sub == subscriber_id && uk == uk_id)
        .map(|(sub, uk, key)| {
            json!({
                "subscriber_id": sub,
                "ukId": uk,
                "signing_public_key": STANDARD.encode(key.to_bytes()),
            })
        })
        .collect();
    Json(Value::Array(records))
}

/// Network registry knowing `subscribers` as (subscriber id, unique key id, key).
pub async fn start_registry(subscribers: &[(&str, &str, VerifyingKey)]) -> MockUpstream {
    let recorder = Recorder::default();
    let state = RegistryState {
        recorder: recorder.clone(),
        subscribers: Arc::new(
            subscribers
                .iter()
                .map(|(sub, uk, key)| (sub.to_string(), uk.to_string(), *key))
                .collect(),
        ),
    };
    let router = Router::new()
        .route("/lookup", post(registry_lookup))
        .with_state(state);
    let addr = serve(router).await;
    MockUpstream { addr, recorder }
}

/// Valid configuration pointing at the given upstreams.
pub fn config(rsf_url: &str, registry_url: &str) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.rsf_url = rsf_url.into();
    config.upstream.registry_url = registry_url.into();
    config.subscriber.id = SUBSCRIBER_ID.into();
    config.subscriber.uri = SUBSCRIBER_URI.into();
    config.identity.key_id = UNIQUE_KEY_ID.into();
    config.identity.private_key = STANDARD.encode(proxy_key().to_bytes());
    config.credential.key_id = CREDENTIAL_KEY_ID.into();
    config.credential.secret_key = CREDENTIAL_SECRET.into();
    config.timeouts.upstream_secs = 5;
    config
}

/// A proxy serving on an ephemeral port. Dropping it stops the server.
pub struct RunningProxy {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl RunningProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for RunningProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_proxy(config: ProxyConfig) -> RunningProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, receiver).await;
    });

    RunningProxy { addr, shutdown }
}

/// Client that neither pools nor follows redirects.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
