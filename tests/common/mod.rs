#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{Method, Response, StatusCode};
use serde_json::{json, Value};

use hrm_api::access::AccessControl;
use hrm_api::auth::{issue_token, Claims};
use hrm_api::config::{AppConfig, StoreBackend};
use hrm_api::database::MemoryRecordStore;
use hrm_api::resources::ResourceRegistry;
use hrm_api::{create_app, AppState};

pub const TEST_SECRET: &str = "integration-test-secret";

/// Router served in-process on a free port, backed by a seeded memory store
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub store: Arc<MemoryRecordStore>,
    client: reqwest::Client,
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.database.backend = StoreBackend::Memory;
    config.security.jwt_secret = TEST_SECRET.to_string();
    config.security.jwt_expiry_hours = 1;
    config.validation.abort_early = false;
    config
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        Self::start_with(test_config()).await
    }

    pub async fn start_with(config: AppConfig) -> Result<Self> {
        Self::start_with_registry(config, ResourceRegistry::builtin()).await
    }

    pub async fn start_with_registry(config: AppConfig, registry: ResourceRegistry) -> Result<Self> {
        let store = Arc::new(seeded_store().await?);
        let state = AppState::new(&config, registry, store.clone());
        Self::serve(config, state, store).await
    }

    /// Default wiring with the access provider swapped out
    pub async fn start_with_access<F>(make_access: F) -> Result<Self>
    where
        F: FnOnce(Arc<MemoryRecordStore>) -> Arc<dyn AccessControl>,
    {
        let config = test_config();
        let store = Arc::new(seeded_store().await?);
        let mut state = AppState::new(&config, ResourceRegistry::builtin(), store.clone());
        state.access = make_access(store.clone());
        Self::serve(config, state, store).await
    }

    async fn serve(config: AppConfig, state: AppState, store: Arc<MemoryRecordStore>) -> Result<Self> {
        let app = create_app(state, &config.security);

        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("failed to bind port {}", port))?;

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let server = Self {
            port,
            base_url: format!("http://127.0.0.1:{}", port),
            store,
            client: reqwest::Client::new(),
        };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn request(&self, method: Method, path: &str, token: Option<&str>, body: Option<&str>) -> Result<Response> {
        let mut request = self.client.request(method, self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.to_string());
        }
        Ok(request.send().await?)
    }

    pub async fn get(&self, path: &str, token: &str) -> Result<Response> {
        self.request(Method::GET, path, Some(token), None).await
    }

    pub async fn put(&self, path: &str, token: &str, body: &Value) -> Result<Response> {
        self.request(Method::PUT, path, Some(token), Some(&body.to_string())).await
    }

    pub async fn delete(&self, path: &str, token: &str) -> Result<Response> {
        self.request(Method::DELETE, path, Some(token), None).await
    }
}

pub fn token(tenant: &str, roles: &[&str]) -> String {
    let claims = Claims::new("u1", tenant, roles.iter().map(|r| r.to_string()).collect(), 1);
    issue_token(TEST_SECRET, &claims).expect("failed to sign test token")
}

pub fn hr_manager() -> String {
    token("t1", &["hr-manager"])
}

pub fn employee() -> String {
    token("t1", &["employee"])
}

fn record(value: Value) -> serde_json::Map<String, Value> {
    value.as_object().cloned().expect("fixture must be an object")
}

/// Two tenants: `t1` owns leave abc123, attendance xyz and user u1;
/// `t2` owns leave def456 and user u2
pub async fn seeded_store() -> Result<MemoryRecordStore> {
    let store = MemoryRecordStore::new();

    store
        .insert("user", record(json!({
            "id": "u1", "tenant_id": "t1", "email": "ana@example.com", "subject": "auth0|ana",
            "first_name": "Ana", "last_name": null
        })))
        .await?;
    store
        .insert("user", record(json!({
            "id": "u2", "tenant_id": "t2", "email": "bo@example.com", "subject": "auth0|bo",
            "first_name": "Bo", "last_name": "Lind"
        })))
        .await?;
    store
        .insert("leave", record(json!({
            "id": "abc123", "tenant_id": "t1", "status": "pending",
            "start_date": "2024-03-04", "end_date": "2024-03-08", "reason": "family trip",
            "user_id": "u1", "created_at": "2024-02-01T09:00:00Z", "updated_at": "2024-02-01T09:00:00Z"
        })))
        .await?;
    store
        .insert("leave", record(json!({
            "id": "orphan1", "tenant_id": "t1", "status": "approved", "reason": null, "user_id": null
        })))
        .await?;
    store
        .insert("leave", record(json!({
            "id": "def456", "tenant_id": "t2", "status": "pending", "reason": "conference", "user_id": "u2"
        })))
        .await?;
    store
        .insert("attendance", record(json!({
            "id": "xyz", "tenant_id": "t1", "hours_worked": 8, "date": "2024-03-01", "user_id": "u1"
        })))
        .await?;

    Ok(store)
}
