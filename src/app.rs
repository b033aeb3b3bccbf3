//! Application wiring: shared state, router and middleware stack.

use anyhow::{bail, Context};
use axum::{
    http::HeaderValue,
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use std::any::Any;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::access::{load_policy, AccessControl, PolicyAccessControl};
use crate::auth::{JwtSessionProvider, SessionProvider};
use crate::config::{AppConfig, SecurityConfig, StoreBackend};
use crate::database::{MemoryRecordStore, PgRecordStore, RecordStore};
use crate::error::ApiError;
use crate::handlers;
use crate::middleware::session_middleware;
use crate::resources::ResourceRegistry;
use crate::validation::ValidationMode;

/// Collaborators constructed once at startup and shared by every request
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ResourceRegistry>,
    pub sessions: Arc<dyn SessionProvider>,
    pub access: Arc<dyn AccessControl>,
    pub store: Arc<dyn RecordStore>,
    pub validation_mode: ValidationMode,
}

impl AppState {
    /// JWT sessions and policy access control over the given store
    pub fn new(config: &AppConfig, registry: ResourceRegistry, store: Arc<dyn RecordStore>) -> Self {
        Self {
            registry: Arc::new(registry),
            sessions: Arc::new(JwtSessionProvider::new(
                config.security.jwt_secret.clone(),
                config.security.jwt_expiry_hours,
            )),
            access: Arc::new(PolicyAccessControl::new(store.clone())),
            store,
            validation_mode: ValidationMode::from_abort_early(config.validation.abort_early),
        }
    }

    /// Build the state described by `config`: pick the store backend, load
    /// the access policy and seed data
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        if config.security.jwt_secret.is_empty() {
            bail!("JWT_SECRET must be set in {:?} mode", config.environment);
        }

        let mut registry = ResourceRegistry::builtin();
        if let Some(path) = &config.access.policy_path {
            load_policy(&mut registry, path)?;
        }

        let store: Arc<dyn RecordStore> = match config.database.backend {
            StoreBackend::Postgres => Arc::new(
                PgRecordStore::connect(&config.database)
                    .await
                    .context("failed to connect to Postgres")?,
            ),
            StoreBackend::Memory => match &config.database.seed_path {
                Some(path) => Arc::new(MemoryRecordStore::from_seed_file(path).await?),
                None => {
                    warn!("Using an empty in-memory record store");
                    Arc::new(MemoryRecordStore::new())
                }
            },
        };
        info!("Record store backend: {}", store.backend_name());

        Ok(Self::new(config, registry, store))
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState, security: &SecurityConfig) -> Router {
    let common_middleware = ServiceBuilder::new()
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http());

    let public_routes = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health));

    let resource_routes = Router::new()
        .route("/api/:resource/:id", any(handlers::resource_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), session_middleware));

    let mut app = Router::new()
        .merge(public_routes)
        .merge(resource_routes)
        .fallback(handlers::not_found)
        .layer(common_middleware);

    if let Some(cors) = cors_layer(security) {
        app = app.layer(cors);
    }

    app.with_state(state)
}

fn cors_layer(security: &SecurityConfig) -> Option<CorsLayer> {
    if !security.enable_cors {
        return None;
    }

    let cors = CorsLayer::new().allow_methods(AnyOrigin).allow_headers(AnyOrigin);
    if security.cors_origins.iter().any(|o| o == "*") {
        return Some(cors.allow_origin(AnyOrigin));
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();
    Some(cors.allow_origin(origins))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("Request handler panicked: {}", detail);

    ApiError::internal_server_error("An unexpected error occurred").into_response()
}
